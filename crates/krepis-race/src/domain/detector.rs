//! Detector - the explicit runtime context
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────── Detector<S, E> ───────────────────────┐
//! │                                                             │
//! │  shadow: S (ShadowBackend)          ◀── every access        │
//! │  registry: Mutex<ThreadRegistry>    ◀── lifecycle, reports  │
//! │  reports: Mutex<ReportCounters>     ◀── reports only        │
//! │  expected: Mutex<ExpectedRaces>     ◀── annotations, races  │
//! │  symbolizer / suppressor / sink     ◀── reports only        │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//!           ▲ &self                         ▲ &mut ThreadState
//!           │                               │
//!      shared by all threads          owned by one thread
//! ```
//!
//! Instrumentation hooks take `&self` plus the calling thread's own
//! `&mut ThreadState`. The access path touches only the shadow backend and
//! the thread state; locks are taken on thread lifecycle events and when a
//! race is reported, always in the order registry → reports.
//!
//! # Single Initialization
//!
//! A detector is built once by [`DetectorBuilder`] and initialized once by
//! [`Detector::initialize`], which registers the main thread. A second
//! `initialize` is fatal.
//!
//! # Example
//!
//! ```rust
//! use krepis_race::adapters::CollectingSink;
//! use krepis_race::domain::detector::DetectorBuilder;
//!
//! let sink = CollectingSink::new();
//! let detector = DetectorBuilder::new().sink(sink.clone()).build().unwrap();
//!
//! let mut main = detector.initialize();
//! let tid = detector.on_thread_create(&mut main, 1, false);
//! let mut worker = detector.on_thread_start(tid);
//!
//! detector.on_memory_access(&mut main, 0x10, 0x1000, 8, true);
//! detector.on_memory_access(&mut worker, 0x20, 0x1000, 8, true);
//!
//! detector.on_thread_finish(worker);
//! detector.on_thread_join(&mut main, tid);
//! let summary = detector.finalize(main);
//! assert_eq!(summary.reported, 1);
//! assert_eq!(summary.exit_code, 66);
//! assert_eq!(sink.len(), 1);
//! ```

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use super::access::{dispatch_access, is_simple_access, AccessOutcome, EpochModulo, EvictionPolicy, RangeChunks};
use super::clock::VectorClock;
use super::config::DetectorConfig;
use super::error::{fatal, ConfigError, InvariantViolation, OrFatal};
use super::report::assembly::{assemble, racy_range};
use super::report::{ExpectedRaces, ReportSink, Suppressor, Symbolizer};
use super::shadow::{FlatShadow, PagedShadow, ShadowBackend, ShadowCell};
use super::stats::AccessStats;
use super::thread::{RacyAccess, ThreadId, ThreadRegistry, ThreadState, ThreadStatus};
use super::trace::RestoredStack;
use super::types::{Address, Epoch, Pc};
use crate::adapters::{LogSink, NoSuppressions, NoSymbolizer};

/// Outcome of a whole run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Reports forwarded to the sink
    pub reported: u64,
    /// Reports hidden by the suppressor
    pub suppressed: u64,
    /// Races swallowed by expected or benign annotations
    pub expected_hits: u64,
    /// Expected races that never fired
    pub missed_expected: u64,
    /// Counters of every finished thread
    pub stats: AccessStats,
    /// Process exit code the host should use
    pub exit_code: i32,
}

#[derive(Debug, Default)]
struct ReportCounters {
    reported: u64,
    suppressed: u64,
}

/// Race detection context shared by all threads
pub struct Detector<S: ShadowBackend = PagedShadow, E: EvictionPolicy = EpochModulo> {
    config: DetectorConfig,
    shadow: S,
    registry: Mutex<ThreadRegistry>,
    reports: Mutex<ReportCounters>,
    expected: Mutex<ExpectedRaces>,
    totals: Mutex<AccessStats>,
    symbolizer: Box<dyn Symbolizer>,
    suppressor: Box<dyn Suppressor>,
    sink: Box<dyn ReportSink>,
    initialized: AtomicBool,
    _eviction: PhantomData<fn() -> E>,
}

/// Detector over lazily paged shadow memory
pub type ProductionDetector = Detector<PagedShadow, EpochModulo>;

/// Detector over one pre-allocated application range
pub type FixedRangeDetector = Detector<FlatShadow, EpochModulo>;

impl<S: ShadowBackend, E: EvictionPolicy> Detector<S, E> {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Memory Accesses
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Check and record one access
    ///
    /// Widths other than 1, 2, 4, 8 and accesses crossing a block boundary
    /// are split like [`on_memory_access_range`](Self::on_memory_access_range).
    #[inline(always)]
    pub fn on_memory_access(&self, thr: &mut ThreadState, pc: Pc, addr: Address, size: usize, is_write: bool) {
        if !is_simple_access(addr, size) {
            self.on_memory_access_range(thr, pc, addr, size, is_write);
            return;
        }
        let outcome = dispatch_access::<S, E>(&self.shadow, thr, pc, addr, size, is_write).or_fatal();
        if let AccessOutcome::Race(racy) = outcome {
            self.report_race(&racy);
        }
    }

    /// Check and record every byte of `[addr, addr + size)`
    ///
    /// The range is split into naturally aligned pieces; each one is an
    /// independent access that may race on its own.
    pub fn on_memory_access_range(&self, thr: &mut ThreadState, pc: Pc, addr: Address, size: usize, is_write: bool) {
        if size == 0 {
            return;
        }
        thr.stats.range_accesses += 1;
        for (piece, len) in RangeChunks::new(addr, size) {
            let outcome = dispatch_access::<S, E>(&self.shadow, thr, pc, piece, len, is_write).or_fatal();
            if let AccessOutcome::Race(racy) = outcome {
                self.report_race(&racy);
            }
        }
    }

    /// Forget all history of `[addr, addr + size)`
    ///
    /// Used for freshly allocated memory. Ranges above `max_reset_size` are
    /// only reset up to that size.
    pub fn on_memory_range_reset(&self, addr: Address, size: usize) {
        let size = size.min(self.config.max_reset_size);
        self.shadow.fill_range(addr, size, ShadowCell::EMPTY).or_fatal();
    }

    /// Record a free of `[addr, addr + size)`
    ///
    /// The free itself is checked as a write; afterwards every access to
    /// the range is reported as a use after free.
    pub fn on_memory_range_freed(&self, thr: &mut ThreadState, pc: Pc, addr: Address, size: usize) {
        self.on_memory_access_range(thr, pc, addr, size, true);
        let size = size.min(self.config.max_reset_size);
        self.shadow.fill_range(addr, size, ShadowCell::FREED).or_fatal();
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Call Stack & Ignore Regions
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Push `pc` on the shadow stack
    #[inline]
    pub fn on_function_enter(&self, thr: &mut ThreadState, pc: Pc) {
        thr.enter(pc).or_fatal();
    }

    /// Pop the shadow stack
    #[inline]
    pub fn on_function_exit(&self, thr: &mut ThreadState) {
        thr.exit().or_fatal();
    }

    /// Start ignoring reads or writes of the calling thread
    pub fn on_ignore_begin(&self, thr: &mut ThreadState, is_write: bool) {
        thr.ignore_begin(is_write);
    }

    /// End the innermost ignore region of that kind
    pub fn on_ignore_end(&self, thr: &mut ThreadState, is_write: bool) {
        thr.ignore_end(is_write).or_fatal();
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Synchronization
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Acquire a synchronization object whose clock is `sync`
    pub fn on_acquire(&self, thr: &mut ThreadState, sync: &VectorClock) {
        thr.acquire(sync).or_fatal();
    }

    /// Release a synchronization object whose clock is `sync`
    pub fn on_release(&self, thr: &mut ThreadState, sync: &mut VectorClock) {
        thr.release(sync).or_fatal();
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Thread Lifecycle
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Register the main thread and return its state
    ///
    /// Must be called exactly once, before any other hook.
    pub fn initialize(&self) -> ThreadState {
        if self.initialized.swap(true, Ordering::AcqRel) {
            fatal(InvariantViolation::DoubleInitialization);
        }
        let mut registry = self.registry.lock();
        let tid = registry.create(None, 0, false).or_fatal();
        let main = registry.start(tid).or_fatal();
        info!(
            max_threads = self.config.max_threads,
            trace_size = self.config.trace_size,
            "race detector initialized"
        );
        main
    }

    /// Whether [`initialize`](Self::initialize) has run
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Register a thread created by `parent`
    pub fn on_thread_create(&self, parent: &mut ThreadState, uid: u64, detached: bool) -> ThreadId {
        self.registry.lock().create(Some(parent), uid, detached).or_fatal()
    }

    /// Called on the new thread before its first instrumented operation
    pub fn on_thread_start(&self, tid: ThreadId) -> ThreadState {
        self.registry.lock().start(tid).or_fatal()
    }

    /// Called when the thread function returns; consumes the thread state
    pub fn on_thread_finish(&self, mut thr: ThreadState) {
        self.registry.lock().finish(&mut thr).or_fatal();
        self.totals.lock().merge(&thr.stats);
    }

    /// `thr` joined the finished thread `tid`
    pub fn on_thread_join(&self, thr: &mut ThreadState, tid: ThreadId) {
        self.registry.lock().join(thr, tid).or_fatal();
    }

    /// `tid` was detached
    pub fn on_thread_detach(&self, tid: ThreadId) {
        self.registry.lock().detach(tid).or_fatal();
    }

    /// Name `tid` in future reports
    pub fn set_thread_name(&self, tid: ThreadId, name: impl Into<String>) {
        self.registry.lock().set_name(tid, name).or_fatal();
    }

    /// Lifecycle status of `tid`, if it was ever created
    pub fn thread_status(&self, tid: ThreadId) -> Option<ThreadStatus> {
        self.registry.lock().context(tid).map(|ctx| ctx.status)
    }

    /// Call stack of `tid` at `epoch`, outermost caller first
    pub fn restore_stack(&self, tid: ThreadId, epoch: Epoch) -> Option<RestoredStack> {
        self.registry.lock().restore_stack(tid, epoch)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Annotations
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// A race on `[addr, addr + size)` is expected and must fire
    pub fn expect_race(&self, addr: Address, size: usize, description: impl Into<String>) {
        self.expected.lock().add(addr, size, description, false);
    }

    /// A race on `[addr, addr + size)` is harmless and never reported
    pub fn benign_race(&self, addr: Address, size: usize, description: impl Into<String>) {
        self.expected.lock().add(addr, size, description, true);
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Reporting
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    #[cold]
    #[inline(never)]
    fn report_race(&self, racy: &RacyAccess) {
        let (addr, size) = racy_range(racy);
        if self.expected.lock().hit(addr, size) {
            return;
        }

        let registry = self.registry.lock();
        let mut counters = self.reports.lock();
        let report = assemble(&registry, racy, self.symbolizer.as_ref(), self.config.report_stack_limit);
        if self.suppressor.is_suppressed(&report) {
            counters.suppressed += 1;
            return;
        }
        self.sink.report(&report);
        counters.reported += 1;
    }

    /// Reports forwarded to the sink so far
    pub fn reported(&self) -> u64 {
        self.reports.lock().reported
    }

    /// Reports hidden by the suppressor so far
    pub fn suppressed(&self) -> u64 {
        self.reports.lock().suppressed
    }

    /// Counters of every thread that has finished so far
    pub fn stats(&self) -> AccessStats {
        self.totals.lock().clone()
    }

    /// Active configuration
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Shadow backend
    pub fn shadow(&self) -> &S {
        &self.shadow
    }

    /// Finish the main thread and summarize the run
    pub fn finalize(&self, main: ThreadState) -> RunSummary {
        self.on_thread_finish(main);

        let (expected_hits, missed_expected) = {
            let expected = self.expected.lock();
            let mut missed = 0;
            for race in expected.missed() {
                warn!(
                    addr = race.addr,
                    size = race.size,
                    description = %race.description,
                    "expected race did not fire"
                );
                missed += 1;
            }
            (expected.total_hits(), missed)
        };
        let (reported, suppressed) = {
            let counters = self.reports.lock();
            (counters.reported, counters.suppressed)
        };

        let failed = reported > 0 || missed_expected > 0;
        let summary = RunSummary {
            reported,
            suppressed,
            expected_hits,
            missed_expected,
            stats: self.stats(),
            exit_code: if failed { self.config.exit_code } else { 0 },
        };
        info!(
            reported,
            suppressed,
            expected_hits,
            missed_expected,
            accesses = summary.stats.accesses(),
            "race detector finished"
        );
        summary
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Builder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Assembles a [`Detector`] from configuration, backend and collaborators
///
/// # Example
///
/// ```rust
/// use krepis_race::domain::detector::DetectorBuilder;
/// use krepis_race::domain::shadow::FlatShadow;
///
/// let detector = DetectorBuilder::new()
///     .max_threads(16)
///     .shadow(FlatShadow::new(0x10_0000, 0x1_0000))
///     .build()
///     .unwrap();
/// assert_eq!(detector.config().max_threads, 16);
/// ```
pub struct DetectorBuilder<S = PagedShadow, E = EpochModulo> {
    config: DetectorConfig,
    shadow: S,
    symbolizer: Box<dyn Symbolizer>,
    suppressor: Box<dyn Suppressor>,
    sink: Box<dyn ReportSink>,
    _eviction: PhantomData<fn() -> E>,
}

impl DetectorBuilder<PagedShadow, EpochModulo> {
    /// Builder with default configuration, paged shadow and a logging sink
    pub fn new() -> Self {
        Self {
            config: DetectorConfig::default(),
            shadow: PagedShadow::new(),
            symbolizer: Box::new(NoSymbolizer),
            suppressor: Box::new(NoSuppressions),
            sink: Box::new(LogSink),
            _eviction: PhantomData,
        }
    }
}

impl Default for DetectorBuilder<PagedShadow, EpochModulo> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ShadowBackend, E: EvictionPolicy> DetectorBuilder<S, E> {
    /// Replace the whole configuration
    pub fn config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the thread table capacity
    pub fn max_threads(mut self, max_threads: usize) -> Self {
        self.config.max_threads = max_threads;
        self
    }

    /// Set the per-thread trace geometry
    pub fn trace(mut self, size: usize, parts: usize) -> Self {
        self.config.trace_size = size;
        self.config.trace_parts = parts;
        self
    }

    /// Use another shadow backend
    pub fn shadow<S2: ShadowBackend>(self, shadow: S2) -> DetectorBuilder<S2, E> {
        DetectorBuilder {
            config: self.config,
            shadow,
            symbolizer: self.symbolizer,
            suppressor: self.suppressor,
            sink: self.sink,
            _eviction: PhantomData,
        }
    }

    /// Use another eviction policy
    pub fn eviction<E2: EvictionPolicy>(self) -> DetectorBuilder<S, E2> {
        DetectorBuilder {
            config: self.config,
            shadow: self.shadow,
            symbolizer: self.symbolizer,
            suppressor: self.suppressor,
            sink: self.sink,
            _eviction: PhantomData,
        }
    }

    /// Resolve report pcs with `symbolizer`
    pub fn symbolizer(mut self, symbolizer: impl Symbolizer + 'static) -> Self {
        self.symbolizer = Box::new(symbolizer);
        self
    }

    /// Filter reports through `suppressor`
    pub fn suppressor(mut self, suppressor: impl Suppressor + 'static) -> Self {
        self.suppressor = Box::new(suppressor);
        self
    }

    /// Deliver reports to `sink`
    pub fn sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Validate the configuration and build the detector
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from [`DetectorConfig::validate`].
    pub fn build(self) -> Result<Detector<S, E>, ConfigError> {
        self.config.validate()?;
        let limits = self.config.registry_limits()?;
        Ok(Detector {
            config: self.config,
            shadow: self.shadow,
            registry: Mutex::new(ThreadRegistry::new(limits)),
            reports: Mutex::new(ReportCounters::default()),
            expected: Mutex::new(ExpectedRaces::new()),
            totals: Mutex::new(AccessStats::default()),
            symbolizer: self.symbolizer,
            suppressor: self.suppressor,
            sink: self.sink,
            initialized: AtomicBool::new(false),
            _eviction: PhantomData,
        })
    }
}
