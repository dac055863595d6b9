//! Access Statistics
//!
//! Plain counters owned by each thread and folded into detector-wide totals
//! when the thread finishes. Nothing here is atomic; a thread only ever
//! touches its own copy.

use serde::Serialize;

/// Per-thread event counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessStats {
    /// Reads that reached the shadow scan
    pub reads: u64,
    /// Writes that reached the shadow scan
    pub writes: u64,
    /// Accesses by width: 1, 2, 4, 8 bytes
    pub by_size: [u64; 4],
    /// Accesses skipped inside an ignore region
    pub ignored: u64,
    /// Accesses already covered by an equal or stronger cell
    pub shadow_same: u64,
    /// Stores into an empty or superseded cell
    pub shadow_stored: u64,
    /// Stores that had to evict a live cell
    pub shadow_evicted: u64,
    /// Races detected (before suppression)
    pub races: u64,
    /// Range accesses decomposed into block-sized pieces
    pub range_accesses: u64,
    /// Function entries
    pub func_enter: u64,
    /// Function exits
    pub func_exit: u64,
    /// Acquire operations
    pub acquires: u64,
    /// Release operations
    pub releases: u64,
}

impl AccessStats {
    /// Add every counter of `other` into `self`
    pub fn merge(&mut self, other: &AccessStats) {
        self.reads += other.reads;
        self.writes += other.writes;
        for (mine, theirs) in self.by_size.iter_mut().zip(other.by_size) {
            *mine += theirs;
        }
        self.ignored += other.ignored;
        self.shadow_same += other.shadow_same;
        self.shadow_stored += other.shadow_stored;
        self.shadow_evicted += other.shadow_evicted;
        self.races += other.races;
        self.range_accesses += other.range_accesses;
        self.func_enter += other.func_enter;
        self.func_exit += other.func_exit;
        self.acquires += other.acquires;
        self.releases += other.releases;
    }

    /// Accesses that reached the shadow scan
    pub fn accesses(&self) -> u64 {
        self.reads + self.writes
    }
}
