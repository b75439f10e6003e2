// Cuckoo Filter over Byte Items
// An approximate-membership structure with partial-key cuckoo hashing, bounded
// eviction chains, support for deletions, and a single reader-writer lock that
// lets lookups run in parallel while mutations serialize.

use derive_builder::Builder;
use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use std::fmt;
use tracing::{debug, trace};

mod bucket;
mod eviction;
mod fingerprint;
mod hash;

use bucket::{BucketTable, MAX_SLOTS};
use eviction::{EvictionEngine, Relocation};
use fingerprint::{Candidates, FingerprintCodec, Item};

pub use eviction::{Exhaustion, RandomSource, SeededRandom, ThreadRandom};
pub use fingerprint::Fingerprint;
pub use hash::{DEFAULT_SEED, Hash32, StdHash32, XxHash32};

/// Slots per bucket of the standard filter.
pub const DEFAULT_BUCKET_SIZE: usize = 4;

/// Number of buckets of the standard filter.
pub const DEFAULT_TOTAL_BUCKETS: usize = 4 << 20;

/// Bound on the length of an eviction chain.
pub const DEFAULT_MAX_KICKS: usize = 500;

/// Error type for the `try_*` operations of the filter
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Returned when the item is an empty byte sequence
    #[error("Items must not be empty.")]
    EmptyItem,
    /// Returned when the eviction chain ran out of kicks
    #[error("Not enough space to store this item.")]
    NotEnoughSpace,
}

/// Everything guarded by the filter's lock.
#[derive(Default)]
struct State {
    table: BucketTable,
    /// Successful insertions minus successful deletions.
    count: usize,
}

/// A probabilistic set of byte sequences supporting insertion, deletion and
/// lookup in fixed memory.
///
/// ## Algorithm Overview
///
/// 1. **Fingerprints**: the first two bytes of an item, read big-endian, are
///    stored in place of the item. Single-byte items are left-padded with a
///    zero byte, empty items are rejected.
///
/// 2. **Dual Hashing**: the primary bucket comes from the digest of the whole
///    item, the alternate one is the primary XOR the digest of the
///    fingerprint. Either index can be recomputed from the other and the
///    fingerprint alone.
///
/// 3. **Eviction Chains**: when both buckets are full, a random resident is
///    kicked to its alternate bucket, possibly cascading, for at most
///    `max_kicks` swaps. What happens when the bound is hit is set by the
///    [`Exhaustion`] policy.
///
/// ## Concurrency Model
///
/// - **Lookups, counters**: shared lock, run in parallel with each other
/// - **Insert, delete, clear**: exclusive lock, eviction chains included
/// - **Unique insertions**: shared-lock fast path, then an upgradable lock so
///   that the final check and the insertion form one critical section
///
/// Item hashing happens before any lock is taken. Each operation works on its
/// own clone of the configured [`Hash32`] prototype.
///
/// ## Time Complexity
///
/// - **Lookup**: O(bucket_size)
/// - **Deletion**: O(bucket_size)
/// - **Insertion**: O(bucket_size × max_kicks) in the worst case
#[derive(Builder)]
#[builder(
    pattern = "owned",
    build_fn(private, name = "base_build", validate = "Self::validate")
)]
pub struct CuckooFilter<H = XxHash32, R = ThreadRandom>
where
    H: Hash32 + Clone + Default,
    R: RandomSource + Default,
{
    // Configuration parameters
    /// Number of fingerprints per bucket
    #[builder(default = "DEFAULT_BUCKET_SIZE")]
    bucket_size: usize,

    /// Number of buckets in the filter (power of 2)
    #[builder(default = "DEFAULT_TOTAL_BUCKETS")]
    total_buckets: usize,

    /// Maximum number of kicks to try before giving up
    #[builder(default = "DEFAULT_MAX_KICKS")]
    max_kicks: usize,

    /// Fate of an eviction chain that runs out of kicks
    #[builder(default)]
    exhaustion: Exhaustion,

    /// Prototype of the hash function, cloned by every operation
    #[builder(default)]
    hasher: H,

    /// Victim selection for eviction chains, only locked under the write lock
    #[builder(setter(custom), default)]
    random: Mutex<R>,

    // Internal values - automatically derived from the configuration
    /// Maps items onto the bucket table
    #[builder(setter(skip))]
    codec: FingerprintCodec,

    /// Runs eviction chains
    #[builder(setter(skip))]
    engine: EvictionEngine,

    /// Bucket table and counter
    #[builder(setter(skip))]
    state: RwLock<State>,
}

impl<H, R> CuckooFilter<H, R>
where
    H: Hash32 + Clone + Default,
    R: RandomSource + Default,
{
    /// Insert an item into the filter
    ///
    /// Returns `true` if the item was stored, `false` if it is empty or the
    /// filter is too full to make room for it.
    pub fn insert<T: ?Sized + AsRef<[u8]>>(&self, item: &T) -> bool {
        self.try_insert(item).is_ok()
    }

    /// Insert an item into the filter
    ///
    /// The fingerprint first goes to a free slot of either candidate bucket.
    /// If both are full, an eviction chain runs under the write lock.
    ///
    /// Returns `Error::EmptyItem` for empty input and `Error::NotEnoughSpace`
    /// when the chain ran out of kicks.
    pub fn try_insert<T: ?Sized + AsRef<[u8]>>(&self, item: &T) -> Result<(), Error> {
        let (mut hasher, candidates) = self.candidates(item)?;
        let mut state = self.state.write();
        self.insert_locked(&mut state, &mut hasher, candidates)
    }

    /// Insert an item unless it is already present
    ///
    /// Returns `true` if the item is present afterwards, either because it
    /// already was or because it was inserted.
    pub fn insert_unique<T: ?Sized + AsRef<[u8]>>(&self, item: &T) -> bool {
        self.try_insert_unique(item).is_ok()
    }

    /// Check if an item is in the filter and insert it if it is not present (atomically)
    ///
    /// The final lookup and the insertion run in one critical section, so
    /// concurrent calls for the same item insert it at most once.
    ///
    /// Returns Ok(true) if the item was inserted, Ok(false) if it was already present,
    /// or an error if it is empty or the filter is full
    pub fn try_insert_unique<T: ?Sized + AsRef<[u8]>>(&self, item: &T) -> Result<bool, Error> {
        let (mut hasher, candidates) = self.candidates(item)?;
        if Self::holds(&self.state.read().table, candidates) {
            return Ok(false);
        }
        let state = self.state.upgradable_read();
        if Self::holds(&state.table, candidates) {
            return Ok(false);
        }
        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        self.insert_locked(&mut state, &mut hasher, candidates).map(|_| true)
    }

    /// Check if an item is in the filter
    ///
    /// Returns `true` if the item is possibly in the filter (may have false positives),
    /// `false` if it is definitely not in the filter or is empty
    pub fn lookup<T: ?Sized + AsRef<[u8]>>(&self, item: &T) -> bool {
        match self.candidates(item) {
            Ok((_, candidates)) => Self::holds(&self.state.read().table, candidates),
            Err(_) => false,
        }
    }

    /// Attempts to remove one occurrence of an item from the filter.
    ///
    /// The primary bucket is searched first, then the alternate one.
    ///
    /// Returns `true` if a matching fingerprint was removed, or `false` if it was not found.
    ///
    /// Note:
    /// - An item should only be deleted if it was previously inserted. Deleting an item
    ///   that was never inserted may remove another item sharing its fingerprint.
    pub fn delete<T: ?Sized + AsRef<[u8]>>(&self, item: &T) -> bool {
        let Ok((_, candidates)) = self.candidates(item) else {
            return false;
        };
        let Candidates {
            fingerprint,
            primary,
            alternate,
        } = candidates;
        let mut state = self.state.write();
        let State { table, count } = &mut *state;
        let removed = table.bucket_mut(primary).try_remove(fingerprint)
            || table.bucket_mut(alternate).try_remove(fingerprint);
        if removed {
            *count -= 1;
        }
        removed
    }

    /// Counts the fingerprints matching an item in its candidate buckets.
    ///
    /// # Notes
    /// - This is not a counting filter; duplicates inserted with `insert` are simply stored twice.
    /// - Items sharing a fingerprint and a bucket are counted together.
    /// - At most `bucket_size * 2` per item.
    pub fn occurrences<T: ?Sized + AsRef<[u8]>>(&self, item: &T) -> usize {
        let Ok((_, candidates)) = self.candidates(item) else {
            return 0;
        };
        let state = self.state.read();
        let matches = |index| state.table.bucket(index).matches(candidates.fingerprint);
        if candidates.primary == candidates.alternate {
            matches(candidates.primary)
        } else {
            matches(candidates.primary) + matches(candidates.alternate)
        }
    }

    /// Number of successful insertions minus successful deletions
    pub fn count(&self) -> usize {
        self.state.read().count
    }

    /// Check if the filter is empty
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Fraction of the slots in use, `count / (bucket_size × total_buckets)`
    pub fn load_factor(&self) -> f64 {
        let count = self.state.read().count;
        count as f64 / self.capacity() as f64
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.bucket_size * self.total_buckets
    }

    /// Get the number of fingerprints per bucket
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Get the number of buckets
    pub fn total_buckets(&self) -> usize {
        self.total_buckets
    }

    /// Get the maximum number of kicks per insertion
    pub fn max_kicks(&self) -> usize {
        self.max_kicks
    }

    /// Get the policy applied when an eviction chain runs out of kicks
    pub fn exhaustion(&self) -> Exhaustion {
        self.exhaustion
    }

    /// Clear the filter, removing all elements
    pub fn clear(&self) {
        let mut state = self.state.write();
        let removed = state.table.occupied();
        state.table.clear();
        state.count = 0;
        debug!(removed, "cuckoo filter cleared");
    }

    /// Validate an item and compute its fingerprint and candidate buckets.
    ///
    /// Returns the hasher used, so that an eviction chain can reuse it.
    fn candidates<T: ?Sized + AsRef<[u8]>>(&self, item: &T) -> Result<(H, Candidates), Error> {
        let item = Item::new(item.as_ref()).ok_or(Error::EmptyItem)?;
        let mut hasher = self.hasher.clone();
        let candidates = self.codec.candidates(&mut hasher, &item);
        Ok((hasher, candidates))
    }

    /// Whether either candidate bucket holds the fingerprint
    fn holds(table: &BucketTable, candidates: Candidates) -> bool {
        table.bucket(candidates.primary).contains(candidates.fingerprint)
            || table.bucket(candidates.alternate).contains(candidates.fingerprint)
    }

    /// Insert a fingerprint with the write lock held
    ///
    /// Tries a free slot in the primary bucket, then in the alternate one, and
    /// falls back to an eviction chain. The counter only moves on success.
    fn insert_locked(
        &self,
        state: &mut State,
        hasher: &mut H,
        candidates: Candidates,
    ) -> Result<(), Error> {
        let State { table, count } = state;
        if table.bucket_mut(candidates.primary).try_add(candidates.fingerprint)
            || table.bucket_mut(candidates.alternate).try_add(candidates.fingerprint)
        {
            *count += 1;
            return Ok(());
        }

        let mut random = self.random.lock();
        match self.engine.relocate(table, hasher, &mut *random, candidates) {
            Relocation::Placed { kicks } => {
                trace!(kicks, "inserted after eviction chain");
                *count += 1;
                Ok(())
            }
            Relocation::Exhausted { kicks, dropped } => {
                debug!(kicks, ?dropped, "insertion failed, filter is full");
                Err(Error::NotEnoughSpace)
            }
        }
    }
}

impl CuckooFilter<XxHash32, ThreadRandom> {
    /// Create a new CuckooFilterBuilder with default settings
    pub fn builder() -> CuckooFilterBuilder<XxHash32, ThreadRandom> {
        CuckooFilterBuilder::default()
    }

    /// Create a new CuckooFilter with the standard settings: 4 slots per
    /// bucket, `4 << 20` buckets, 500 kicks and xxHash32 seeded with 59053
    pub fn new() -> CuckooFilter<XxHash32, ThreadRandom> {
        Self::builder()
            .build()
            .expect("standard configuration is valid")
    }

    /// Create a new CuckooFilter sized for `expected` items
    ///
    /// The table gets the next power of two of `expected` (at least 4)
    /// divided by 4 buckets, never less than one, rounded up to a power of
    /// two.
    pub fn with_capacity(expected: usize) -> CuckooFilter<XxHash32, ThreadRandom> {
        Self::builder()
            .capacity(expected)
            .build()
            .expect("capacity-derived configuration is valid")
    }
}

impl Default for CuckooFilter<XxHash32, ThreadRandom> {
    /// Create a new CuckooFilter with the standard settings
    fn default() -> Self {
        Self::new()
    }
}

impl<H, R> fmt::Debug for CuckooFilter<H, R>
where
    H: Hash32 + Clone + Default,
    R: RandomSource + Default,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CuckooFilter")
            .field("bucket_size", &self.bucket_size)
            .field("total_buckets", &self.total_buckets)
            .field("max_kicks", &self.max_kicks)
            .field("exhaustion", &self.exhaustion)
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

/// Number of buckets needed for `expected` items: the next power of two of
/// `expected` (at least 4), divided by `bucket_size`, never less than one,
/// rounded up to a power of two. Halved until the table fits in `MAX_SLOTS`.
fn buckets_for(expected: usize, bucket_size: usize) -> usize {
    let bucket_size = bucket_size.max(1);
    let slots = expected.clamp(4, MAX_SLOTS).next_power_of_two();
    let mut buckets = (slots / bucket_size).max(1).next_power_of_two();
    while buckets > 1 && buckets.saturating_mul(bucket_size) > MAX_SLOTS {
        buckets /= 2;
    }
    buckets
}

impl<H, R> CuckooFilterBuilder<H, R>
where
    H: Hash32 + Clone + Default,
    R: RandomSource + Default,
{
    /// Size the table for `expected` items with the bucket size set so far
    pub fn capacity(mut self, expected: usize) -> Self {
        let bucket_size = self.bucket_size.unwrap_or(DEFAULT_BUCKET_SIZE);
        self.total_buckets = Some(buckets_for(expected, bucket_size));
        self
    }

    /// Random source used to pick eviction victims
    pub fn random(mut self, random: R) -> Self {
        self.random = Some(Mutex::new(random));
        self
    }

    /// Validate the builder configuration
    fn validate(&self) -> Result<(), String> {
        if self.bucket_size == Some(0) {
            return Err("bucket_size must be greater than zero".into());
        }
        if let Some(total_buckets) = self.total_buckets {
            if total_buckets == 0 {
                return Err("total_buckets must be greater than zero".into());
            }
            if !total_buckets.is_power_of_two() {
                return Err("total_buckets must be a power of two".into());
            }
        }
        let bucket_size = self.bucket_size.unwrap_or(DEFAULT_BUCKET_SIZE);
        let total_buckets = self.total_buckets.unwrap_or(DEFAULT_TOTAL_BUCKETS);
        match bucket_size.checked_mul(total_buckets) {
            None => Err("bucket_size * total_buckets overflows".into()),
            Some(slots) if slots > MAX_SLOTS => {
                Err("bucket_size * total_buckets is too large".into())
            }
            Some(_) => Ok(()),
        }
    }

    /// Build a CuckooFilter with the specified configuration
    pub fn build(self) -> Result<CuckooFilter<H, R>, CuckooFilterBuilderError> {
        let mut filter = self.base_build()?;
        filter.codec = FingerprintCodec::new(filter.total_buckets);
        filter.engine = EvictionEngine::new(filter.codec, filter.max_kicks, filter.exhaustion);
        filter.state = RwLock::new(State {
            table: BucketTable::new(filter.total_buckets, filter.bucket_size),
            count: 0,
        });
        debug!(
            bucket_size = filter.bucket_size,
            total_buckets = filter.total_buckets,
            max_kicks = filter.max_kicks,
            exhaustion = ?filter.exhaustion,
            "cuckoo filter allocated"
        );
        Ok(filter)
    }
}
