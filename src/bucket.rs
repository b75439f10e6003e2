//! Bucket storage.
//!
//! All buckets live in one flat slot array. Whether a slot is in use is kept
//! out-of-band in a presence bitmap with one bit per slot, so every 16-bit
//! value, zero included, is a valid fingerprint.

use bitvec::prelude::*;

use crate::fingerprint::Fingerprint;

type Presence = BitSlice<u64, Lsb0>;

/// Largest slot count whose fingerprint array fits in one allocation.
pub(crate) const MAX_SLOTS: usize = isize::MAX as usize / size_of::<Fingerprint>();

/// Fixed-size table of `total_buckets` buckets with `bucket_size` slots each.
#[derive(Default)]
pub(crate) struct BucketTable {
    slots: Vec<Fingerprint>,
    occupied: BitVec<u64, Lsb0>,
    bucket_size: usize,
}

impl BucketTable {
    pub(crate) fn new(total_buckets: usize, bucket_size: usize) -> Self {
        let len = total_buckets * bucket_size;
        Self {
            slots: vec![0; len],
            occupied: BitVec::repeat(false, len),
            bucket_size,
        }
    }

    pub(crate) fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    pub(crate) fn bucket(&self, index: usize) -> Bucket<'_> {
        let range = self.range(index);
        Bucket {
            slots: &self.slots[range.clone()],
            occupied: &self.occupied[range],
        }
    }

    pub(crate) fn bucket_mut(&mut self, index: usize) -> BucketMut<'_> {
        let range = self.range(index);
        BucketMut {
            slots: &mut self.slots[range.clone()],
            occupied: &mut self.occupied[range],
        }
    }

    /// Number of occupied slots across the whole table.
    pub(crate) fn occupied(&self) -> usize {
        self.occupied.count_ones()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.fill(0);
        self.occupied.fill(false);
    }

    fn range(&self, index: usize) -> std::ops::Range<usize> {
        let start = index * self.bucket_size;
        start..start + self.bucket_size
    }
}

/// Read-only view of one bucket.
#[derive(Clone, Copy)]
pub(crate) struct Bucket<'a> {
    slots: &'a [Fingerprint],
    occupied: &'a Presence,
}

impl<'a> Bucket<'a> {
    /// Occupied fingerprints, left to right.
    pub(crate) fn iter(&self) -> impl Iterator<Item = Fingerprint> + 'a {
        let (slots, occupied) = (self.slots, self.occupied);
        occupied.iter_ones().map(move |slot| slots[slot])
    }

    pub(crate) fn contains(&self, fingerprint: Fingerprint) -> bool {
        self.iter().any(|fp| fp == fingerprint)
    }

    /// Number of occupied slots holding `fingerprint`.
    pub(crate) fn matches(&self, fingerprint: Fingerprint) -> usize {
        self.iter().filter(|&fp| fp == fingerprint).count()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.occupied.all()
    }
}

/// Mutable view of one bucket.
pub(crate) struct BucketMut<'a> {
    slots: &'a mut [Fingerprint],
    occupied: &'a mut Presence,
}

impl BucketMut<'_> {
    /// Place `fingerprint` in the first free slot.
    ///
    /// Returns `false` and leaves the bucket untouched when it is full.
    pub(crate) fn try_add(&mut self, fingerprint: Fingerprint) -> bool {
        match self.occupied.first_zero() {
            Some(slot) => {
                self.slots[slot] = fingerprint;
                self.occupied.set(slot, true);
                true
            }
            None => false,
        }
    }

    /// Free the first occupied slot holding `fingerprint`.
    pub(crate) fn try_remove(&mut self, fingerprint: Fingerprint) -> bool {
        let slots = &*self.slots;
        let found = self.occupied.iter_ones().find(|&slot| slots[slot] == fingerprint);
        match found {
            Some(slot) => {
                self.slots[slot] = 0;
                self.occupied.set(slot, false);
                true
            }
            None => false,
        }
    }

    /// Put `fingerprint` into an occupied `slot` and return the previous resident.
    pub(crate) fn swap(&mut self, slot: usize, fingerprint: Fingerprint) -> Fingerprint {
        debug_assert!(self.occupied[slot], "swap into an empty slot");
        std::mem::replace(&mut self.slots[slot], fingerprint)
    }
}
