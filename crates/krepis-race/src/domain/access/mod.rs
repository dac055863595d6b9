//! Shadow-Memory Access Algorithm
//!
//! # Fast Path
//!
//! ```text
//! on access(thr, pc, addr, SIZE, WRITE)
//!   ├─ ignored?                         → Ignored
//!   ├─ epoch += 1, trace ← Mop(pc)
//!   ├─ cur = fast_state | off | log | W
//!   └─ scan the block's cells, starting at slot `off`
//!        empty       → store cur here (once)
//!        same range  ┬ same thread, nothing synced since, old ⊇ cur → Redundant
//!                    ├ same thread otherwise                       → replace / keep
//!                    ├ other thread, ordered before us             → replace
//!                    ├ other thread, both reads                    → keep
//!                    └ other thread, unordered, a write            → Race
//!        overlapping ┬ same thread / ordered / both reads          → keep
//!                    └ otherwise                                   → Race
//!        disjoint    → keep
//!   cur not stored yet → evict slot chosen by the policy
//! ```
//!
//! `cur` is stored into the first qualifying slot; every later slot the scan
//! would have replaced is cleared instead, so one access never occupies two
//! slots. The scan stops at the first race or redundant match, so an access
//! costs at most `SHADOW_CELLS` relaxed loads.
//!
//! # Monomorphization
//!
//! [`memory_access`] is generic over the access width and kind. The eight
//! `(SIZE_LOG, IS_WRITE)` combinations each compile to a branch-free check of
//! those parameters inside the scan loop; [`dispatch_access`] selects one at
//! runtime.

pub mod eviction;

pub use eviction::{EpochModulo, EvictionPolicy};

use crate::domain::clock::VectorClock;
use crate::domain::error::InvariantViolation;
use crate::domain::shadow::{ShadowBackend, ShadowBlock, ShadowCell};
use crate::domain::thread::{RacyAccess, ThreadState};
use crate::domain::trace::EventType;
use crate::domain::types::{block_base, block_offset, Address, Epoch, Pc, BLOCK_SIZE, SHADOW_CELLS};

/// Result of one access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    /// Accesses of this kind are currently ignored by the thread
    Ignored,
    /// An equal or stronger access is already recorded
    Redundant,
    /// Recorded in an empty or superseded slot
    Stored,
    /// Recorded over a live cell chosen by the eviction policy
    Evicted,
    /// Conflicts with a previously recorded access
    Race(RacyAccess),
}

enum Scan {
    Redundant,
    Stored,
    Evicted,
    Race(ShadowCell),
}

#[inline(always)]
fn store_if_not_yet_stored(block: &ShadowBlock, idx: usize, pending: &mut Option<ShadowCell>) {
    block.store(idx, pending.take().unwrap_or(ShadowCell::EMPTY));
}

#[inline(always)]
fn scan_block<E: EvictionPolicy, const SIZE_LOG: u8, const IS_WRITE: bool>(
    block: &ShadowBlock,
    clock: &VectorClock,
    synch_epoch: Epoch,
    cur: ShadowCell,
) -> Scan {
    let size = 1usize << SIZE_LOG;
    let off = cur.search_offset();
    let mut pending = Some(cur);

    for i in 0..SHADOW_CELLS {
        let idx = (i + off) % SHADOW_CELLS;
        let old = block.load(idx);

        if old.is_empty() {
            if pending.is_some() {
                store_if_not_yet_stored(block, idx, &mut pending);
            }
            continue;
        }

        if ShadowCell::same_range(cur, old) {
            if ShadowCell::tids_equal(old, cur) {
                if old.epoch() >= synch_epoch {
                    if old.is_write() || !IS_WRITE {
                        return Scan::Redundant;
                    }
                    store_if_not_yet_stored(block, idx, &mut pending);
                } else if !old.is_write() || IS_WRITE {
                    store_if_not_yet_stored(block, idx, &mut pending);
                }
                continue;
            }
            if clock.covers(old.tid(), old.epoch()) {
                store_if_not_yet_stored(block, idx, &mut pending);
                continue;
            }
            if !old.is_write() && !IS_WRITE {
                continue;
            }
            return Scan::Race(old);
        }

        if ShadowCell::ranges_intersect(old, cur, size) {
            if ShadowCell::tids_equal(old, cur) || clock.covers(old.tid(), old.epoch()) {
                continue;
            }
            if !old.is_write() && !IS_WRITE {
                continue;
            }
            return Scan::Race(old);
        }
    }

    match pending {
        None => Scan::Stored,
        Some(cell) => {
            block.store(E::victim(cell), cell);
            Scan::Evicted
        }
    }
}

/// Check and record one naturally sized access that stays inside its block
///
/// On a race the conflicting pair is also left in the thread's scratch slot
/// for report assembly.
///
/// # Errors
///
/// Propagates epoch overflow and backend range violations.
#[inline(always)]
pub fn memory_access<S, E, const SIZE_LOG: u8, const IS_WRITE: bool>(
    shadow: &S,
    thr: &mut ThreadState,
    pc: Pc,
    addr: Address,
) -> Result<AccessOutcome, InvariantViolation>
where
    S: ShadowBackend,
    E: EvictionPolicy,
{
    debug_assert!(block_offset(addr) as usize + (1 << SIZE_LOG) <= BLOCK_SIZE);

    if thr.is_ignoring(IS_WRITE) {
        thr.stats.ignored += 1;
        return Ok(AccessOutcome::Ignored);
    }
    if IS_WRITE {
        thr.stats.writes += 1;
    } else {
        thr.stats.reads += 1;
    }
    thr.stats.by_size[SIZE_LOG as usize] += 1;

    thr.tick(EventType::Mop, pc)?;
    let cur = ShadowCell::from_fast_state(thr.fast_state, block_offset(addr), SIZE_LOG, IS_WRITE);
    let synch_epoch = thr.fast_synch_epoch;
    let clock = &thr.clock;
    let scan = shadow.with_block(addr, |block| {
        scan_block::<E, SIZE_LOG, IS_WRITE>(block, clock, synch_epoch, cur)
    })?;

    Ok(match scan {
        Scan::Redundant => {
            thr.stats.shadow_same += 1;
            AccessOutcome::Redundant
        }
        Scan::Stored => {
            thr.stats.shadow_stored += 1;
            AccessOutcome::Stored
        }
        Scan::Evicted => {
            thr.stats.shadow_evicted += 1;
            AccessOutcome::Evicted
        }
        Scan::Race(old) => {
            let racy = RacyAccess {
                block: block_base(addr),
                old,
                cur,
            };
            thr.racy = Some(racy);
            thr.stats.races += 1;
            AccessOutcome::Race(racy)
        }
    })
}

/// Whether `(addr, size)` can go through [`dispatch_access`] directly
#[inline(always)]
pub fn is_simple_access(addr: Address, size: usize) -> bool {
    matches!(size, 1 | 2 | 4 | 8) && block_offset(addr) as usize + size <= BLOCK_SIZE
}

/// Select the specialized access variant for a runtime width and kind
///
/// `size` must satisfy [`is_simple_access`].
#[inline(always)]
pub fn dispatch_access<S, E>(
    shadow: &S,
    thr: &mut ThreadState,
    pc: Pc,
    addr: Address,
    size: usize,
    is_write: bool,
) -> Result<AccessOutcome, InvariantViolation>
where
    S: ShadowBackend,
    E: EvictionPolicy,
{
    match (size, is_write) {
        (1, false) => memory_access::<S, E, 0, false>(shadow, thr, pc, addr),
        (2, false) => memory_access::<S, E, 1, false>(shadow, thr, pc, addr),
        (4, false) => memory_access::<S, E, 2, false>(shadow, thr, pc, addr),
        (8, false) => memory_access::<S, E, 3, false>(shadow, thr, pc, addr),
        (1, true) => memory_access::<S, E, 0, true>(shadow, thr, pc, addr),
        (2, true) => memory_access::<S, E, 1, true>(shadow, thr, pc, addr),
        (4, true) => memory_access::<S, E, 2, true>(shadow, thr, pc, addr),
        _ => memory_access::<S, E, 3, true>(shadow, thr, pc, addr),
    }
}

/// Split `[addr, addr + size)` into naturally aligned 1/2/4/8-byte pieces
///
/// Every piece lies inside a single block, so each one is checked and
/// recorded independently.
///
/// ```text
/// 0x1005, 13 bytes → (0x1005,1) (0x1006,2) (0x1008,8) (0x1010,2)
/// ```
#[derive(Debug, Clone)]
pub struct RangeChunks {
    addr: Address,
    remaining: usize,
}

impl RangeChunks {
    /// Iterate over the pieces of `[addr, addr + size)`
    pub fn new(addr: Address, size: usize) -> Self {
        Self {
            addr,
            remaining: size,
        }
    }
}

impl Iterator for RangeChunks {
    type Item = (Address, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let mut chunk = BLOCK_SIZE;
        while chunk > self.remaining || self.addr % chunk != 0 {
            chunk /= 2;
        }
        let piece = (self.addr, chunk);
        self.addr = self.addr.wrapping_add(chunk);
        self.remaining -= chunk;
        Some(piece)
    }
}
