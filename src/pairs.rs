//! Fixed-distance pair tracking
//!
//! Pairs every classified Get event with the event `distance + 1`
//! positions earlier in the same block, keyed by an unordered identifier
//! so `(A,B)` and `(B,A)` land on the same counter. Block IDs where a
//! pair was seen are kept in a true integer set; substring checks against
//! a joined string are not a dedup (21 is inside 210).

use std::collections::{BTreeSet, HashMap, VecDeque};

/// Identifier of one side of a pair: the key's hex form plus value size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairSide {
    pub key_hex: String,
    pub size: u64,
}

impl PairSide {
    pub fn new(key: &[u8], size: u64) -> Self {
        Self {
            key_hex: hex::encode(key),
            size,
        }
    }

    fn label(&self) -> String {
        format!("{}-{}", self.key_hex, self.size)
    }
}

/// Canonical unordered pair key: sides ordered lexicographically by key
pub fn canonical_pair(a: &PairSide, b: &PairSide) -> String {
    if a.key_hex > b.key_hex {
        format!("{};{}", b.label(), a.label())
    } else {
        format!("{};{}", a.label(), b.label())
    }
}

/// Frequency and observed blocks for one canonical pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairStats {
    pub frequency: u64,
    pub blocks: BTreeSet<u64>,
}

/// Sliding-window detector for pairs at a fixed distance
///
/// The window holds at most `distance + 2` events; once full, the oldest
/// and newest events form a pair and the oldest is dropped. The window
/// resets at every block boundary, the frequency map only at batch
/// boundaries.
#[derive(Debug)]
pub struct PairTracker {
    distance: usize,
    window: VecDeque<PairSide>,
    pairs: HashMap<String, PairStats>,
}

impl PairTracker {
    pub fn new(distance: usize) -> Self {
        Self {
            distance,
            window: VecDeque::with_capacity(distance + 2),
            pairs: HashMap::new(),
        }
    }

    pub fn distance(&self) -> usize {
        self.distance
    }

    /// Forget the event window; called on every block start
    pub fn reset_window(&mut self) {
        self.window.clear();
    }

    /// Record the next Get event at the current block
    pub fn record(&mut self, side: PairSide, block_id: u64) {
        self.window.push_back(side);
        if self.window.len() == self.distance + 2 {
            let first = self.window.front().expect("window front");
            let last = self.window.back().expect("window back");
            let pair_key = canonical_pair(first, last);
            let stats = self.pairs.entry(pair_key).or_default();
            stats.frequency += 1;
            stats.blocks.insert(block_id);
            self.window.pop_front();
        }
    }

    /// Number of distinct pairs currently tracked
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Drain pairs seen at least `min_freq` times, sorted by descending
    /// frequency (ties by pair key), and reset the map for the next batch
    pub fn drain_frequent(&mut self, min_freq: u64) -> Vec<(String, PairStats)> {
        let mut entries: Vec<(String, PairStats)> = self
            .pairs
            .drain()
            .filter(|(_, stats)| stats.frequency >= min_freq)
            .collect();
        entries.sort_by(|a, b| b.1.frequency.cmp(&a.1.frequency).then_with(|| a.0.cmp(&b.0)));
        self.window.clear();
        entries
    }
}
