//! Content digests, the mismatch dedup index, and the delta-digest table.
//!
//! Digests are MD5 and exist purely as dedup keys, never for integrity. Both
//! registries are the only state shared between leaf tasks and support safe
//! concurrent insert-if-absent.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use digest::Digest as _;
use md5::Md5;

/// A 128-bit content digest.
pub type ContentDigest = [u8; 16];

/// Digest over an (expected, actual) content pair: expected bytes first,
/// then actual bytes.
#[must_use]
pub fn pair_digest(expected: &[u8], actual: &[u8]) -> ContentDigest {
    let mut hasher = Md5::new();
    hasher.update(expected);
    hasher.update(actual);
    hasher.finalize().into()
}

/// Digest over a single side's bytes (unpaired items).
#[must_use]
pub fn single_digest(bytes: &[u8]) -> ContentDigest {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Digest over one diff hunk's original and revised line text.
#[must_use]
pub fn delta_digest(original: &[&str], revised: &[&str]) -> ContentDigest {
    let mut hasher = Md5::new();
    for line in original {
        hasher.update(line.as_bytes());
    }
    for line in revised {
        hasher.update(line.as_bytes());
    }
    hasher.finalize().into()
}

/// Registry mapping a content digest to the first item that claimed it.
///
/// Repeated mismatches (license headers, resources duplicated across
/// packaging targets) would otherwise dominate the report with copies of the
/// same root cause.
#[derive(Default)]
pub struct DedupIndex {
    first_claims: DashMap<ContentDigest, u64>,
}

impl DedupIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a digest for an item. Returns `true` for exactly one caller
    /// per digest, even under concurrent access.
    pub fn claim(&self, digest: ContentDigest, item_id: u64) -> bool {
        match self.first_claims.entry(digest) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(item_id);
                true
            }
        }
    }
}

/// Id-assigning table for delta digests, enabling the end-of-run "most
/// frequently recurring change" summary without retaining hunk text.
#[derive(Default)]
pub struct DeltaIndex {
    ids: DashMap<ContentDigest, u32>,
    next_id: AtomicU32,
}

impl DeltaIndex {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stable small id for a digest, assigning the next one on
    /// first sight.
    pub fn assign(&self, digest: ContentDigest) -> u32 {
        *self
            .ids
            .entry(digest)
            .or_insert_with(|| self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
