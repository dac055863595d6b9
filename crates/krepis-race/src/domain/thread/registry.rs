//! Thread Registry - arena of thread contexts
//!
//! # Design
//!
//! A table of [`ThreadContext`] slots indexed by tid plus a FIFO list of dead
//! tids. Slots are never freed; a tid is recycled by resetting its slot and
//! bumping `reuse_count`. Each incarnation remembers the epoch range
//! `[epoch0, epoch1]` it ran in, so an epoch read from an old shadow cell can
//! be checked against the incarnation that currently owns the tid.
//!
//! ```text
//! contexts: [ t0 Running | t1 Finished | t2 Dead | t3 Running | ... ]
//! dead:     t2 → t7 → t5            (oldest first)
//! ```
//!
//! A dead tid is reused only once more than `quarantine` tids are waiting,
//! or when no fresh tid is left. The registry is guarded by one mutex in the
//! detector and is never touched on the access fast path.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::domain::clock::VectorClock;
use crate::domain::error::InvariantViolation;
use crate::domain::trace::{RestoredStack, Trace, TraceGeometry};
use crate::domain::types::{Epoch, Pc};

use super::state::ThreadState;
use super::types::{ThreadId, ThreadStatus};

/// One registry slot
#[derive(Debug)]
pub struct ThreadContext {
    /// Slot index
    pub tid: ThreadId,
    /// Lifecycle status of the current incarnation
    pub status: ThreadStatus,
    /// How many times this tid has been handed out before
    pub reuse_count: u32,
    /// First epoch of the current incarnation
    pub epoch0: Epoch,
    /// Last epoch of the current incarnation (`Epoch::MAX` while running)
    pub epoch1: Epoch,
    /// Embedder-supplied identifier
    pub uid: u64,
    /// Human-readable name, if any
    pub name: Option<String>,
    /// Creator of this incarnation
    pub parent: Option<ThreadId>,
    /// Whether the thread is reclaimed as soon as it finishes
    pub detached: bool,
    /// Shadow stack of the creating thread at creation time
    pub creation_stack: Vec<Pc>,
    trace: Option<Arc<Trace>>,
    sync: VectorClock,
}

impl ThreadContext {
    fn new(tid: ThreadId) -> Self {
        Self {
            tid,
            status: ThreadStatus::Invalid,
            reuse_count: 0,
            epoch0: 0,
            epoch1: 0,
            uid: 0,
            name: None,
            parent: None,
            detached: false,
            creation_stack: Vec::new(),
            trace: None,
            sync: VectorClock::new(),
        }
    }

    /// Whether `epoch` belongs to the current incarnation
    pub fn owns_epoch(&self, epoch: Epoch) -> bool {
        self.status.has_trace() && self.epoch0 <= epoch && epoch <= self.epoch1
    }

    fn transition(&self, to: ThreadStatus) -> InvariantViolation {
        InvariantViolation::InvalidTransition {
            tid: self.tid,
            from: self.status.name(),
            to: to.name(),
        }
    }
}

/// Sizes the registry needs from the detector configuration
#[derive(Debug, Clone, Copy)]
pub struct RegistryLimits {
    /// Capacity of the tid table
    pub max_threads: usize,
    /// Dead tids held back before reuse
    pub quarantine: usize,
    /// Trace ring of every thread
    pub trace: TraceGeometry,
    /// Maximum call depth per thread
    pub stack_depth: usize,
}

/// Table of all thread incarnations
#[derive(Debug)]
pub struct ThreadRegistry {
    limits: RegistryLimits,
    contexts: Vec<ThreadContext>,
    dead: VecDeque<ThreadId>,
    running: usize,
    total_created: u64,
}

impl ThreadRegistry {
    /// Create an empty registry
    pub fn new(limits: RegistryLimits) -> Self {
        Self {
            limits,
            contexts: Vec::with_capacity(limits.max_threads.min(1024)),
            dead: VecDeque::new(),
            running: 0,
            total_created: 0,
        }
    }

    /// Slot of `tid`, if it was ever handed out
    pub fn context(&self, tid: ThreadId) -> Option<&ThreadContext> {
        self.contexts.get(tid.as_usize())
    }

    fn context_mut(&mut self, tid: ThreadId) -> Result<&mut ThreadContext, InvariantViolation> {
        self.contexts
            .get_mut(tid.as_usize())
            .ok_or(InvariantViolation::UnknownThread(tid))
    }

    /// Threads currently in `Running`
    pub fn running(&self) -> usize {
        self.running
    }

    /// Incarnations created since startup
    pub fn total_created(&self) -> u64 {
        self.total_created
    }

    /// Tids waiting for reuse
    pub fn dead_len(&self) -> usize {
        self.dead.len()
    }

    fn allocate(&mut self) -> Result<ThreadId, InvariantViolation> {
        let table_full = self.contexts.len() >= self.limits.max_threads;
        if self.dead.len() > self.limits.quarantine || table_full {
            if let Some(tid) = self.dead.pop_front() {
                return Ok(tid);
            }
        }
        if table_full {
            return Err(InvariantViolation::ThreadLimitExceeded(self.limits.max_threads));
        }
        // max_threads never exceeds the u16 range (checked by the config)
        let tid = ThreadId::new(self.contexts.len() as u16);
        self.contexts.push(ThreadContext::new(tid));
        Ok(tid)
    }

    /// Register a new thread created by `parent`
    ///
    /// `parent` is `None` only for the main thread. The parent releases into
    /// the child's start clock, so everything the parent did before the
    /// creation happens-before the child's first access.
    pub fn create(
        &mut self,
        parent: Option<&mut ThreadState>,
        uid: u64,
        detached: bool,
    ) -> Result<ThreadId, InvariantViolation> {
        let tid = self.allocate()?;
        let ctx = self.context_mut(tid)?;
        match ctx.status {
            ThreadStatus::Invalid => {}
            ThreadStatus::Dead => ctx.reuse_count += 1,
            _ => return Err(ctx.transition(ThreadStatus::Created)),
        }

        ctx.status = ThreadStatus::Created;
        ctx.uid = uid;
        ctx.name = None;
        ctx.detached = detached;
        ctx.trace = None;
        ctx.sync.clear();
        ctx.parent = None;
        ctx.creation_stack.clear();
        if let Some(parent) = parent {
            parent.release(&mut ctx.sync)?;
            ctx.parent = Some(parent.tid());
            ctx.creation_stack.extend_from_slice(parent.shadow_stack());
        }
        let reuse_count = ctx.reuse_count;
        self.total_created += 1;

        debug!(%tid, uid, reuse_count, detached, "thread created");
        Ok(tid)
    }

    /// Move `tid` to `Running` and build its thread state
    pub fn start(&mut self, tid: ThreadId) -> Result<ThreadState, InvariantViolation> {
        let limits = self.limits;
        let ctx = self.context_mut(tid)?;
        if ctx.status != ThreadStatus::Created {
            return Err(ctx.transition(ThreadStatus::Running));
        }

        let epoch0 = ctx.epoch1 + 1;
        let trace = Arc::new(Trace::new(limits.trace, epoch0));
        let mut thr = ThreadState::new(tid, epoch0, Arc::clone(&trace), limits.stack_depth);
        thr.acquire(&ctx.sync)?;

        ctx.trace = Some(trace);
        ctx.epoch0 = epoch0;
        ctx.epoch1 = Epoch::MAX;
        ctx.status = ThreadStatus::Running;
        self.running += 1;

        debug!(%tid, epoch0, "thread started");
        Ok(thr)
    }

    /// Record the end of a running thread
    ///
    /// The thread releases into its context so that a later join acquires
    /// everything it did.
    pub fn finish(&mut self, thr: &mut ThreadState) -> Result<(), InvariantViolation> {
        let tid = thr.tid();
        let ctx = self.context_mut(tid)?;
        if ctx.status != ThreadStatus::Running {
            return Err(ctx.transition(ThreadStatus::Finished));
        }

        ctx.sync.clear();
        thr.release(&mut ctx.sync)?;
        ctx.epoch1 = thr.epoch();
        let detached = ctx.detached;
        ctx.status = ThreadStatus::Finished;
        self.running -= 1;
        debug!(%tid, epoch1 = thr.epoch(), "thread finished");

        if detached {
            self.kill(tid)?;
        }
        Ok(())
    }

    /// Join a finished thread: `joiner` acquires its final clock
    pub fn join(&mut self, joiner: &mut ThreadState, tid: ThreadId) -> Result<(), InvariantViolation> {
        let ctx = self.context_mut(tid)?;
        if ctx.status != ThreadStatus::Finished || ctx.detached {
            return Err(ctx.transition(ThreadStatus::Dead));
        }
        joiner.acquire(&ctx.sync)?;
        debug!(%tid, joiner = %joiner.tid(), "thread joined");
        self.kill(tid)
    }

    /// Detach a thread; a finished one is reclaimed immediately
    pub fn detach(&mut self, tid: ThreadId) -> Result<(), InvariantViolation> {
        let ctx = self.context_mut(tid)?;
        if ctx.detached {
            return Err(ctx.transition(ThreadStatus::Dead));
        }
        match ctx.status {
            ThreadStatus::Created | ThreadStatus::Running => {
                ctx.detached = true;
                debug!(%tid, "thread detached");
                Ok(())
            }
            ThreadStatus::Finished => {
                ctx.detached = true;
                self.kill(tid)
            }
            _ => Err(ctx.transition(ThreadStatus::Dead)),
        }
    }

    fn kill(&mut self, tid: ThreadId) -> Result<(), InvariantViolation> {
        let ctx = self.context_mut(tid)?;
        ctx.status = ThreadStatus::Dead;
        self.dead.push_back(tid);
        debug!(%tid, dead = self.dead.len(), "thread reclaimable");
        Ok(())
    }

    /// Name the current incarnation of `tid`
    pub fn set_name(&mut self, tid: ThreadId, name: impl Into<String>) -> Result<(), InvariantViolation> {
        self.context_mut(tid)?.name = Some(name.into());
        Ok(())
    }

    /// Call stack of `tid` at `epoch`
    ///
    /// Returns `None` when the tid is unknown, the epoch belongs to another
    /// incarnation, or the history has been overwritten.
    pub fn restore_stack(&self, tid: ThreadId, epoch: Epoch) -> Option<RestoredStack> {
        let ctx = self.context(tid)?;
        if !ctx.owns_epoch(epoch) {
            return None;
        }
        ctx.trace.as_ref()?.restore(epoch)
    }
}
