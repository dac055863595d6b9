//! Thread State - the fast-path owner
//!
//! One [`ThreadState`] exists per running application thread and is owned
//! exclusively by it. The embedder keeps it in thread-local storage (or any
//! slot indexed by tid) and passes `&mut ThreadState` to every hook, so the
//! access path never looks anything up in a global table.
//!
//! ```text
//! ThreadState
//! ├─ fast_state        (tid, epoch) packed like a shadow cell
//! ├─ fast_synch_epoch  epoch of the last acquire/release
//! ├─ clock             VectorClock
//! ├─ shadow_stack      return pcs, outermost first
//! ├─ trace             Arc<Trace> shared with the registry
//! ├─ ignore counters   reads / writes
//! ├─ racy              scratch slot for the last conflicting pair
//! └─ stats             AccessStats
//! ```

use std::sync::Arc;

use crate::domain::clock::{FastState, VectorClock};
use crate::domain::error::InvariantViolation;
use crate::domain::shadow::ShadowCell;
use crate::domain::stats::AccessStats;
use crate::domain::trace::{EventType, Trace, TraceEvent};
use crate::domain::types::{Address, Epoch, Pc};

use super::ThreadId;

/// Conflicting pair captured by the access scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RacyAccess {
    /// Base address of the 8-byte block both accesses touch
    pub block: Address,
    /// Previously recorded access
    pub old: ShadowCell,
    /// Access that found the conflict
    pub cur: ShadowCell,
}

/// Per-thread detector state
pub struct ThreadState {
    pub(crate) fast_state: FastState,
    pub(crate) fast_synch_epoch: Epoch,
    ignore_reads: u32,
    ignore_writes: u32,
    pub(crate) clock: VectorClock,
    shadow_stack: Vec<Pc>,
    stack_depth: usize,
    trace: Arc<Trace>,
    pub(crate) racy: Option<RacyAccess>,
    pub(crate) stats: AccessStats,
}

impl ThreadState {
    pub(crate) fn new(tid: ThreadId, epoch0: Epoch, trace: Arc<Trace>, stack_depth: usize) -> Self {
        Self {
            fast_state: FastState::new(tid, epoch0),
            fast_synch_epoch: epoch0,
            ignore_reads: 0,
            ignore_writes: 0,
            clock: VectorClock::new(),
            shadow_stack: Vec::with_capacity(stack_depth.min(64)),
            stack_depth,
            trace,
            racy: None,
            stats: AccessStats::default(),
        }
    }

    /// Owning thread
    #[inline(always)]
    pub fn tid(&self) -> ThreadId {
        self.fast_state.tid()
    }

    /// Current epoch
    #[inline(always)]
    pub fn epoch(&self) -> Epoch {
        self.fast_state.epoch()
    }

    /// Epoch of the last synchronization event
    pub fn synch_epoch(&self) -> Epoch {
        self.fast_synch_epoch
    }

    /// Current vector clock
    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    /// Live shadow stack, outermost caller first
    pub fn shadow_stack(&self) -> &[Pc] {
        &self.shadow_stack
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> &AccessStats {
        &self.stats
    }

    /// Conflicting pair from the most recent race, if any
    pub fn last_race(&self) -> Option<RacyAccess> {
        self.racy
    }

    /// Whether accesses of this kind are currently ignored
    #[inline(always)]
    pub fn is_ignoring(&self, is_write: bool) -> bool {
        if is_write {
            self.ignore_writes > 0
        } else {
            self.ignore_reads > 0
        }
    }

    /// Advance the epoch and record one trace event
    #[inline(always)]
    pub(crate) fn tick(&mut self, kind: EventType, pc: Pc) -> Result<Epoch, InvariantViolation> {
        let epoch = self.fast_state.increment_epoch()?;
        self.trace.append(epoch, TraceEvent::new(kind, pc), &self.shadow_stack);
        Ok(epoch)
    }

    pub(crate) fn enter(&mut self, pc: Pc) -> Result<(), InvariantViolation> {
        if self.shadow_stack.len() >= self.stack_depth {
            return Err(InvariantViolation::ShadowStackOverflow {
                tid: self.tid(),
                depth: self.stack_depth,
            });
        }
        self.tick(EventType::FuncEnter, pc)?;
        self.shadow_stack.push(pc);
        self.stats.func_enter += 1;
        Ok(())
    }

    pub(crate) fn exit(&mut self) -> Result<(), InvariantViolation> {
        if self.shadow_stack.is_empty() {
            return Err(InvariantViolation::ShadowStackUnderflow(self.tid()));
        }
        self.tick(EventType::FuncExit, 0)?;
        self.shadow_stack.pop();
        self.stats.func_exit += 1;
        Ok(())
    }

    fn sync_tick(&mut self, kind: EventType) -> Result<Epoch, InvariantViolation> {
        let epoch = self.tick(kind, 0)?;
        self.clock.set(self.tid(), epoch)?;
        self.fast_synch_epoch = epoch;
        Ok(epoch)
    }

    /// Merge `sync` into this thread's clock
    pub(crate) fn acquire(&mut self, sync: &VectorClock) -> Result<(), InvariantViolation> {
        self.sync_tick(EventType::Acquire)?;
        self.clock.merge(sync);
        self.stats.acquires += 1;
        Ok(())
    }

    /// Publish this thread's clock into `sync`
    pub(crate) fn release(&mut self, sync: &mut VectorClock) -> Result<(), InvariantViolation> {
        self.sync_tick(EventType::Release)?;
        sync.merge(&self.clock);
        self.stats.releases += 1;
        Ok(())
    }

    pub(crate) fn ignore_begin(&mut self, is_write: bool) {
        if is_write {
            self.ignore_writes += 1;
        } else {
            self.ignore_reads += 1;
        }
    }

    pub(crate) fn ignore_end(&mut self, is_write: bool) -> Result<(), InvariantViolation> {
        let counter = if is_write {
            &mut self.ignore_writes
        } else {
            &mut self.ignore_reads
        };
        *counter = counter.checked_sub(1).ok_or(InvariantViolation::IgnoreUnderflow {
            tid: self.fast_state.tid(),
            is_write,
        })?;
        Ok(())
    }
}

impl std::fmt::Debug for ThreadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadState")
            .field("fast_state", &self.fast_state)
            .field("synch_epoch", &self.fast_synch_epoch)
            .field("clock", &self.clock)
            .field("depth", &self.shadow_stack.len())
            .finish_non_exhaustive()
    }
}
