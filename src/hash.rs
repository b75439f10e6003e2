//! Pluggable 32-bit streaming hash used for bucket indices.

use std::fmt;
use std::hash::Hasher;

use xxhash_rust::xxh32::Xxh32;

/// Seed of the default hash function.
pub const DEFAULT_SEED: u32 = 59053;

/// A streaming hash producing a 32-bit digest.
///
/// The filter keeps one instance as a prototype and clones it for every
/// operation, so an implementation must be cheap to clone and must return to
/// a fresh state on [`reset`](Hash32::reset) without reallocating.
pub trait Hash32 {
    /// Discard everything absorbed so far.
    fn reset(&mut self);

    /// Feed more bytes into the running digest.
    fn absorb(&mut self, bytes: &[u8]);

    /// Digest of the bytes absorbed since the last reset.
    fn digest32(&self) -> u32;

    /// Reset, absorb `bytes` and return the digest.
    fn digest_of(&mut self, bytes: &[u8]) -> u32 {
        self.reset();
        self.absorb(bytes);
        self.digest32()
    }
}

/// Seeded xxHash32, the default hash of every filter.
#[derive(Clone)]
pub struct XxHash32 {
    seed: u32,
    state: Xxh32,
}

impl XxHash32 {
    /// Create a hasher with the given seed.
    pub fn with_seed(seed: u32) -> Self {
        Self {
            seed,
            state: Xxh32::new(seed),
        }
    }

    /// Seed this hasher was created with.
    pub fn seed(&self) -> u32 {
        self.seed
    }
}

impl Default for XxHash32 {
    fn default() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }
}

impl fmt::Debug for XxHash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XxHash32").field("seed", &self.seed).finish()
    }
}

impl Hash32 for XxHash32 {
    fn reset(&mut self) {
        self.state.reset(self.seed);
    }

    fn absorb(&mut self, bytes: &[u8]) {
        self.state.update(bytes);
    }

    fn digest32(&self) -> u32 {
        self.state.digest()
    }
}

/// Adapts any `std::hash::Hasher` with a `Default` constructor.
///
/// The 64-bit output of [`Hasher::finish`] is truncated to its low 32 bits.
pub struct StdHash32<H> {
    state: H,
}

impl<H: Hasher + Default> Default for StdHash32<H> {
    fn default() -> Self {
        Self { state: H::default() }
    }
}

// A fresh default hasher is the only state worth copying.
impl<H: Hasher + Default> Clone for StdHash32<H> {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl<H> fmt::Debug for StdHash32<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdHash32")
            .field("hasher", &std::any::type_name::<H>())
            .finish()
    }
}

impl<H: Hasher + Default> Hash32 for StdHash32<H> {
    fn reset(&mut self) {
        self.state = H::default();
    }

    fn absorb(&mut self, bytes: &[u8]) {
        self.state.write(bytes);
    }

    fn digest32(&self) -> u32 {
        self.state.finish() as u32
    }
}
