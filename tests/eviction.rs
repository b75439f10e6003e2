use kick_filter::{
    CuckooFilter, CuckooFilterBuilder, Exhaustion, Hash32, RandomSource, SeededRandom, XxHash32,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Every digest is zero: all items share bucket 0 as both candidates.
#[derive(Clone, Default)]
struct ZeroHash;

impl Hash32 for ZeroHash {
    fn reset(&mut self) {}

    fn absorb(&mut self, _bytes: &[u8]) {}

    fn digest32(&self) -> u32 {
        0
    }
}

/// The digest is the last byte absorbed since the last reset.
#[derive(Clone, Default)]
struct LastByteHash {
    last: u8,
}

impl Hash32 for LastByteHash {
    fn reset(&mut self) {
        self.last = 0;
    }

    fn absorb(&mut self, bytes: &[u8]) {
        if let Some(&byte) = bytes.last() {
            self.last = byte;
        }
    }

    fn digest32(&self) -> u32 {
        self.last as u32
    }
}

/// Seeded randomness that counts how many draws were made.
#[derive(Default)]
struct CountingRandom {
    inner: SeededRandom,
    draws: Arc<AtomicUsize>,
}

impl CountingRandom {
    fn new(draws: &Arc<AtomicUsize>) -> Self {
        Self {
            inner: SeededRandom::new(3),
            draws: draws.clone(),
        }
    }
}

impl RandomSource for CountingRandom {
    fn random_below(&mut self, bound: usize) -> usize {
        self.draws.fetch_add(1, Ordering::Relaxed);
        self.inner.random_below(bound)
    }
}

fn small_filter<H: Hash32 + Clone + Default>(
    exhaustion: Exhaustion,
    draws: &Arc<AtomicUsize>,
) -> CuckooFilter<H, CountingRandom> {
    CuckooFilterBuilder::<H, CountingRandom>::default()
        .bucket_size(4)
        .total_buckets(4)
        .max_kicks(500)
        .exhaustion(exhaustion)
        .random(CountingRandom::new(draws))
        .build()
        .unwrap()
}

#[test]
fn test_full_primary_bucket_rolls_back() {
    let draws = Arc::new(AtomicUsize::new(0));
    let filter = small_filter::<ZeroHash>(Exhaustion::Rollback, &draws);
    let residents: [[u8; 2]; 4] = [[1, 1], [2, 2], [3, 3], [4, 4]];

    for item in &residents {
        assert!(filter.insert(item));
    }
    assert_eq!(filter.count(), 4);
    assert_eq!(filter.load_factor(), 0.25);
    assert_eq!(draws.load(Ordering::Relaxed), 0);

    // Both candidates of the fifth item are bucket 0, and so is the
    // alternate of every resident: the table is full for this pattern.
    assert!(!filter.insert(&[5u8, 5]));
    assert_eq!(filter.count(), 4);
    assert_eq!(filter.load_factor(), 0.25);
    assert_eq!(draws.load(Ordering::Relaxed), 1 + 500);

    for item in &residents {
        assert!(filter.lookup(item));
    }
    assert!(!filter.lookup(&[5u8, 5]));
}

#[test]
fn test_full_primary_bucket_drops_last() {
    let draws = Arc::new(AtomicUsize::new(0));
    let filter = small_filter::<ZeroHash>(Exhaustion::DropLast, &draws);
    let items: [[u8; 2]; 5] = [[1, 1], [2, 2], [3, 3], [4, 4], [5, 5]];

    for item in &items[..4] {
        assert!(filter.insert(item));
    }
    assert!(!filter.insert(&items[4]));
    assert_eq!(filter.count(), 4);

    // The chain cycled through bucket 0 and one of the five fingerprints
    // fell out at the end.
    let present = items.iter().filter(|item| filter.lookup(item)).count();
    assert_eq!(present, 4);
}

#[test]
fn test_fifth_item_relocates_resident() {
    let draws = Arc::new(AtomicUsize::new(0));
    let filter = small_filter::<LastByteHash>(Exhaustion::Rollback, &draws);

    // Primary 0, alternate 0 ^ 2 = 2.
    let in_bucket_0: Vec<[u8; 3]> = (1..=4).map(|j| [j, 2, 0]).collect();
    // Primary 1, alternate 1 ^ 3 = 2.
    let in_bucket_1: Vec<[u8; 3]> = (1..=4).map(|j| [j, 3, 1]).collect();
    for item in in_bucket_0.iter().chain(&in_bucket_1) {
        assert!(filter.insert(item));
    }
    assert_eq!(filter.count(), 8);
    assert_eq!(draws.load(Ordering::Relaxed), 0);

    // Primary 0, alternate 0 ^ 1 = 1, both full. Whichever resident is
    // kicked moves to bucket 2.
    let newcomer = [9u8, 1, 0];
    assert!(filter.insert(&newcomer));
    assert_eq!(filter.count(), 9);
    assert_eq!(filter.load_factor(), 9.0 / 16.0);
    // One draw for the victim bucket, one for the slot.
    assert_eq!(draws.load(Ordering::Relaxed), 2);

    for item in in_bucket_0.iter().chain(&in_bucket_1) {
        assert!(filter.lookup(item));
    }
    assert!(filter.lookup(&newcomer));
}

#[test]
fn test_kicks_bounded_per_insertion() {
    let draws = Arc::new(AtomicUsize::new(0));
    let filter = CuckooFilterBuilder::<XxHash32, CountingRandom>::default()
        .total_buckets(4)
        .max_kicks(20)
        .random(CountingRandom::new(&draws))
        .build()
        .unwrap();

    for i in 0u16..64 {
        let before = draws.load(Ordering::Relaxed);
        let _ = filter.insert(&[(i >> 8) as u8, i as u8, 0xEE]);
        let spent = draws.load(Ordering::Relaxed) - before;
        // A starting bucket draw plus at most one slot draw per kick.
        assert!(spent <= 1 + 20, "insertion {i} drew {spent} times");
    }
    assert!(filter.count() <= filter.capacity());
}

#[test]
fn test_rollback_never_loses_members() {
    let filter = CuckooFilterBuilder::<XxHash32, SeededRandom>::default()
        .total_buckets(16)
        .max_kicks(50)
        .random(SeededRandom::new(11))
        .build()
        .unwrap();

    let mut members = Vec::new();
    let mut failures = 0;
    for i in 0u16..200 {
        let item = [(i >> 8) as u8, i as u8, b'r'];
        if filter.insert(&item) {
            members.push(item);
        } else {
            failures += 1;
        }
        for member in &members {
            assert!(filter.lookup(member), "lost {member:?} after inserting {i}");
        }
    }

    // Far more items than slots, so the filter did run out of room.
    assert!(failures > 0);
    assert_eq!(filter.count(), members.len());
}

#[test]
fn test_shared_fingerprint_is_false_positive() {
    let filter = CuckooFilterBuilder::<ZeroHash, SeededRandom>::default()
        .total_buckets(4)
        .build()
        .unwrap();

    assert!(filter.insert("ab-first"));

    // Same leading bytes and same buckets: indistinguishable.
    assert!(filter.lookup("ab-second"));
    assert!(!filter.lookup("ac-first"));
}

#[test]
fn test_two_byte_items_share_bucket_zero_as_alternate() {
    let filter = CuckooFilterBuilder::<LastByteHash, SeededRandom>::default()
        .total_buckets(4)
        .build()
        .unwrap();

    // Digest 3: primary 3, alternate (3 ^ 3) = 0.
    for j in 1..=8u8 {
        assert!(filter.insert(&[j, 3]));
    }
    // Primary 3 and bucket 0 are now both full.
    assert!(!filter.insert(&[9u8, 3]));
    assert_eq!(filter.count(), 8);
}
