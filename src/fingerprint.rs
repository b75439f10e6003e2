//! Fingerprints and candidate bucket indices (partial-key cuckoo hashing).

use crate::hash::Hash32;

/// Compact 16-bit summary of an item stored in place of the item itself.
pub type Fingerprint = u16;

/// An item that passed input validation.
///
/// Empty input is rejected, single bytes are left-padded with zero so that
/// every item carries at least the two bytes a fingerprint is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Item<'a> {
    Padded([u8; 2]),
    Raw(&'a [u8]),
}

impl<'a> Item<'a> {
    /// Validate raw input, `None` when it is empty.
    pub(crate) fn new(bytes: &'a [u8]) -> Option<Self> {
        match bytes {
            [] => None,
            [byte] => Some(Item::Padded([0, *byte])),
            _ => Some(Item::Raw(bytes)),
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        match self {
            Item::Padded(bytes) => &bytes[..],
            Item::Raw(bytes) => *bytes,
        }
    }

    /// Big-endian value of the first two bytes.
    pub(crate) fn fingerprint(&self) -> Fingerprint {
        let bytes = self.as_bytes();
        Fingerprint::from_be_bytes([bytes[0], bytes[1]])
    }
}

/// Fingerprint of an item together with its two candidate buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Candidates {
    pub fingerprint: Fingerprint,
    pub primary: usize,
    pub alternate: usize,
}

/// Maps items and fingerprints onto a table of `total_buckets` buckets.
///
/// `total_buckets` is always a power of two, so reducing a digest modulo the
/// table size is a mask and [`alt_index`](FingerprintCodec::alt_index) is its
/// own inverse.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FingerprintCodec {
    mask: usize,
}

impl FingerprintCodec {
    pub(crate) fn new(total_buckets: usize) -> Self {
        debug_assert!(total_buckets.is_power_of_two());
        Self {
            mask: total_buckets - 1,
        }
    }

    /// Derive the fingerprint and both candidate indices of `item`.
    ///
    /// The primary index comes from the digest of the whole item, the
    /// alternate one from the primary index and the digest of the two
    /// fingerprint bytes, so it can later be recomputed from the fingerprint
    /// alone.
    pub(crate) fn candidates<H: Hash32>(&self, hasher: &mut H, item: &Item<'_>) -> Candidates {
        let fingerprint = item.fingerprint();
        let primary = hasher.digest_of(item.as_bytes()) as usize & self.mask;
        let alternate = self.alt_index(hasher, primary, fingerprint);
        Candidates {
            fingerprint,
            primary,
            alternate,
        }
    }

    /// The other bucket `fingerprint` may live in, given that it is at `index`.
    pub(crate) fn alt_index<H: Hash32>(
        &self,
        hasher: &mut H,
        index: usize,
        fingerprint: Fingerprint,
    ) -> usize {
        (index ^ hasher.digest_of(&fingerprint.to_be_bytes()) as usize) & self.mask
    }
}
