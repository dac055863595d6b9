//! Krepis Race Detector
//!
//! # Overview
//!
//! `krepis-race` is a happens-before data race detection engine. Every
//! instrumented memory access is checked against a small fixed set of
//! recently recorded accesses to the same 8-byte block ("shadow cells"),
//! ordered by per-thread vector clocks. Conflicting unordered accesses are
//! reported together with both call stacks, which are reconstructed from a
//! per-thread event trace.
//!
//! # Trinity Architecture
//!
//! - **Domain**: shadow codec, access algorithm, clocks, threads, traces,
//!   report assembly and the [`Detector`] context
//! - **Adapters**: symbolizers, suppressors and report sinks
//! - **Infrastructure**: log subscriber and option loading
//!
//! # Detector Laws (Invariants)
//!
//! ## Access Laws
//! - An access by the same thread with the same range and an equal or
//!   stronger kind since the last synchronization is redundant
//! - Two reads never race
//! - Exactly one report per racing access
//!
//! ## Clock Laws
//! - Vector clock entries never decrease
//! - Every epoch increment appends exactly one trace event
//!
//! ## Thread Laws
//! - A thread id is reused only after it is dead and out of quarantine
//! - A stale shadow cell never resolves to the new owner of its tid
//!
//! # Usage
//!
//! ```rust
//! use krepis_race::{CollectingSink, DetectorBuilder, ReportKind, VectorClock};
//!
//! let sink = CollectingSink::new();
//! let detector = DetectorBuilder::new().sink(sink.clone()).build().unwrap();
//!
//! // 1. The host registers its main thread
//! let mut main = detector.initialize();
//!
//! // 2. Thread lifecycle hooks
//! let tid = detector.on_thread_create(&mut main, 1, false);
//! let mut worker = detector.on_thread_start(tid);
//!
//! // 3. Accesses ordered through a mutex do not race
//! let mut mutex = VectorClock::new();
//! detector.on_memory_access(&mut worker, 0x10, 0x1000, 8, true);
//! detector.on_release(&mut worker, &mut mutex);
//! detector.on_acquire(&mut main, &mutex);
//! detector.on_memory_access(&mut main, 0x20, 0x1000, 8, true);
//! assert!(sink.is_empty());
//!
//! // 4. Unordered accesses do
//! detector.on_memory_access(&mut worker, 0x30, 0x2000, 4, false);
//! detector.on_memory_access(&mut main, 0x40, 0x2000, 4, true);
//! assert_eq!(sink.reports()[0].kind, ReportKind::Race);
//!
//! detector.on_thread_finish(worker);
//! detector.on_thread_join(&mut main, tid);
//! assert_eq!(detector.finalize(main).reported, 1);
//! ```
//!
//! # Feature Flags
//!
//! None. Kani harnesses are compiled only under `cfg(kani)`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

// Trinity Architecture Layers
pub mod adapters;
pub mod domain;
pub mod infrastructure;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Re-export Primary Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

// Detector
pub use domain::{
    Detector,
    DetectorBuilder,
    DetectorConfig,
    FixedRangeDetector,
    ProductionDetector,
    RunSummary,
};

// Shadow memory
pub use domain::{
    AccessOutcome,
    EpochModulo,
    EvictionPolicy,
    FlatShadow,
    PagedShadow,
    ShadowBackend,
    ShadowCell,
};

// Clocks & threads
pub use domain::{
    AccessStats,
    Address,
    Epoch,
    Pc,
    ThreadId,
    ThreadState,
    ThreadStatus,
    VectorClock,
};

// Reports
pub use domain::{
    ReportDesc,
    ReportKind,
    ReportSink,
    Suppressor,
    Symbolizer,
};

// Errors
pub use domain::{ConfigError, InvariantViolation};

// Adapters
pub use adapters::{CollectingSink, LogSink, NoSuppressions, NoSymbolizer, TableSymbolizer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_defined() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_primary_types_exported() {
        let _tid = ThreadId::new(0);
        let _cell = ShadowCell::EMPTY;
        let _clock = VectorClock::new();
        let _status = ThreadStatus::Running;
        let _config = DetectorConfig::default();
    }

    #[test]
    fn test_default_builder_produces_production_detector() {
        let detector: ProductionDetector = DetectorBuilder::new().build().unwrap();
        assert!(!detector.is_initialized());
    }
}
