//! Cuckoo eviction ("kick") algorithm.
//!
//! When both candidate buckets of a fingerprint are full, a random resident of
//! one of them is displaced to its own alternate bucket, which may in turn
//! displace another resident. The chain is bounded by `max_kicks` swaps.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::bucket::BucketTable;
use crate::fingerprint::{Candidates, Fingerprint, FingerprintCodec};
use crate::hash::Hash32;

/// Source of uniformly distributed indices for victim selection.
pub trait RandomSource {
    /// Uniform integer in `0..bound`. `bound` is never zero.
    fn random_below(&mut self, bound: usize) -> usize;
}

/// Draws from the thread-local generator of `rand`. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn random_below(&mut self, bound: usize) -> usize {
        rand::rng().random_range(0..bound)
    }
}

/// Reproducible generator seeded from a `u64`.
#[derive(Debug, Clone)]
pub struct SeededRandom(StdRng);

impl SeededRandom {
    /// Create a generator whose sequence is fixed by `seed`.
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Default for SeededRandom {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RandomSource for SeededRandom {
    fn random_below(&mut self, bound: usize) -> usize {
        self.0.random_range(0..bound)
    }
}

/// What happens to an eviction chain that runs out of kicks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Exhaustion {
    /// Undo every swap of the chain. The table is left exactly as it was
    /// before the failed insertion.
    #[default]
    Rollback,
    /// Discard the fingerprint displaced by the last kick. The item it
    /// belonged to stops being reported as present.
    DropLast,
}

/// Result of an eviction chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Relocation {
    /// Every fingerprint of the chain found a slot.
    Placed { kicks: usize },
    /// The kick bound was reached. `dropped` is the resident that was lost,
    /// only ever set under [`Exhaustion::DropLast`].
    Exhausted {
        kicks: usize,
        dropped: Option<Fingerprint>,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EvictionEngine {
    codec: FingerprintCodec,
    max_kicks: usize,
    exhaustion: Exhaustion,
}

impl EvictionEngine {
    pub(crate) fn new(codec: FingerprintCodec, max_kicks: usize, exhaustion: Exhaustion) -> Self {
        Self {
            codec,
            max_kicks,
            exhaustion,
        }
    }

    /// Make room for `candidates.fingerprint`, whose two buckets are both full.
    ///
    /// Each kick swaps the incoming fingerprint into a random slot of the
    /// current victim bucket and tries to add the displaced one to its
    /// alternate bucket, which becomes the next victim on failure. Exactly one
    /// swap happens per kick, so the chain does at most `max_kicks` swaps.
    ///
    /// Under [`Exhaustion::Rollback`] the swaps are journaled and replayed in
    /// reverse on failure.
    pub(crate) fn relocate<H, R>(
        &self,
        table: &mut BucketTable,
        hasher: &mut H,
        random: &mut R,
        candidates: Candidates,
    ) -> Relocation
    where
        H: Hash32,
        R: RandomSource,
    {
        if self.max_kicks == 0 {
            return Relocation::Exhausted {
                kicks: 0,
                dropped: None,
            };
        }

        let rollback = self.exhaustion == Exhaustion::Rollback;
        let mut journal = Vec::with_capacity(if rollback { self.max_kicks.min(32) } else { 0 });
        let mut index = if random.random_below(2) == 0 {
            candidates.primary
        } else {
            candidates.alternate
        };
        let mut incoming = candidates.fingerprint;

        for kick in 1..=self.max_kicks {
            debug_assert!(table.bucket(index).is_full());
            let slot = random.random_below(table.bucket_size());
            let evicted = table.bucket_mut(index).swap(slot, incoming);
            if rollback {
                journal.push((index, slot, evicted));
            }

            index = self.codec.alt_index(hasher, index, evicted);
            incoming = evicted;
            if table.bucket_mut(index).try_add(incoming) {
                return Relocation::Placed { kicks: kick };
            }
        }

        if rollback {
            let undone = journal.len();
            while let Some((index, slot, resident)) = journal.pop() {
                table.bucket_mut(index).swap(slot, resident);
            }
            debug!(kicks = self.max_kicks, undone, "eviction chain exhausted, rolled back");
            Relocation::Exhausted {
                kicks: self.max_kicks,
                dropped: None,
            }
        } else {
            warn!(
                kicks = self.max_kicks,
                fingerprint = incoming,
                "eviction chain exhausted, dropping fingerprint"
            );
            Relocation::Exhausted {
                kicks: self.max_kicks,
                dropped: Some(incoming),
            }
        }
    }
}
