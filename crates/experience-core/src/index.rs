//! In-memory position index.
//!
//! Maps a position key to its chain of experience entries. Chains are
//! vectors kept sorted by descending pseudo-quality; one entry per
//! `(key, move)` pair, re-observations merge in place.

use std::collections::HashMap;
use std::hash::{BuildHasherDefault, Hasher};

use crate::entry::ExpEntry;
use crate::types::PositionKey;

/// Position keys are already high-entropy Zobrist values, so the map
/// hashes by passing the low 32 bits through.
#[derive(Default)]
pub struct KeyHasher(u64);

impl Hasher for KeyHasher {
    #[inline]
    fn write(&mut self, _bytes: &[u8]) {
        unreachable!("position keys hash via write_u64");
    }

    #[inline]
    fn write_u64(&mut self, key: u64) {
        self.0 = key & 0xFFFF_FFFF;
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }
}

type KeyBuildHasher = BuildHasherDefault<KeyHasher>;

/// Result of linking an entry into the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The entry now occupies its own slot in a chain.
    Inserted,
    /// An entry for the same `(key, move)` existed; the observation was
    /// merged into it.
    Merged,
}

#[derive(Default)]
pub struct PositionIndex {
    map: HashMap<PositionKey, Vec<ExpEntry>, KeyBuildHasher>,
}

impl PositionIndex {
    pub fn new() -> PositionIndex {
        PositionIndex::default()
    }

    /// Number of distinct positions.
    pub fn positions(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Insert an observation, merging into an existing `(key, move)`
    /// entry or placing it by descending pseudo-quality.
    pub fn link(&mut self, entry: ExpEntry) -> LinkOutcome {
        assert!(
            !entry.key.is_sentinel(),
            "sentinel position key linked into the index: {:#x}",
            entry.key
        );

        let chain = self.map.entry(entry.key).or_default();

        if let Some(existing) = chain.iter_mut().find(|e| e.mv == entry.mv) {
            existing.merge(&entry);
            return LinkOutcome::Merged;
        }

        let at = chain
            .iter()
            .position(|cursor| entry.compare(cursor) > 0)
            .unwrap_or(chain.len());
        chain.insert(at, entry);
        LinkOutcome::Inserted
    }

    /// Chain for a position, best entry first at load time. Merges can
    /// disturb the order afterwards, so "best" still scans.
    pub fn probe(&self, key: PositionKey) -> Option<&[ExpEntry]> {
        self.map.get(&key).map(|chain| {
            debug_assert!(chain.iter().all(|e| e.key == key));
            chain.as_slice()
        })
    }

    /// Argmax of the chain by pseudo-quality.
    pub fn best_entry(&self, key: PositionKey) -> Option<ExpEntry> {
        let chain = self.map.get(&key)?;
        let mut best = chain.first()?;
        for e in &chain[1..] {
            if e.compare(best) > 0 {
                best = e;
            }
        }
        Some(*best)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PositionKey, &Vec<ExpEntry>)> {
        self.map.iter()
    }

    /// All position keys in ascending order. Full saves iterate in this
    /// order so a rewritten file is canonical regardless of how the
    /// index was populated.
    pub fn sorted_keys(&self) -> Vec<PositionKey> {
        let mut keys: Vec<PositionKey> = self.map.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn chain_mut(&mut self, key: PositionKey) -> Option<&mut Vec<ExpEntry>> {
        self.map.get_mut(&key)
    }
}
