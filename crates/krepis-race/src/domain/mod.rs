//! Domain Layer
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Domain Layer                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  Detector<S, E>  ── the only entry point for hooks          │
//! │   ├─ access      scan of one shadow block (hot path)        │
//! │   ├─ shadow      ShadowCell codec, PagedShadow, FlatShadow  │
//! │   ├─ clock       FastState, VectorClock                     │
//! │   ├─ thread      ThreadState, ThreadRegistry                │
//! │   ├─ trace       per-thread event ring, stack replay        │
//! │   └─ report      assembly, expected races, ports            │
//! │                                                             │
//! │  config · error · stats · types                             │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Monomorphization
//!
//! The shadow backend and eviction policy are generic parameters, so
//! `ProductionDetector` compiles to:
//!
//! ```text
//! Detector<PagedShadow, EpochModulo>
//!   └─ 8 specialized memory_access::<SIZE_LOG, IS_WRITE> bodies
//!   └─ DashMap page lookup inlined into each
//!   └─ no dynamic dispatch until a race is reported
//! ```

pub mod access;
pub mod clock;
pub mod config;
pub mod detector;
pub mod error;
pub mod report;
pub mod shadow;
pub mod stats;
pub mod thread;
pub mod trace;
pub mod types;

pub use access::{AccessOutcome, EpochModulo, EvictionPolicy, RangeChunks};
pub use clock::{FastState, VectorClock};
pub use config::DetectorConfig;
pub use detector::{Detector, DetectorBuilder, FixedRangeDetector, ProductionDetector, RunSummary};
pub use error::{fatal, ConfigError, InvariantViolation};
pub use report::{
    ExpectedRaces, ReportDesc, ReportFrame, ReportKind, ReportMop, ReportSink, ReportStack, ReportThread,
    Suppressor, SymbolInfo, Symbolizer,
};
pub use shadow::{FlatShadow, PagedShadow, ShadowBackend, ShadowCell};
pub use stats::AccessStats;
pub use thread::{RacyAccess, ThreadId, ThreadState, ThreadStatus};
pub use trace::RestoredStack;
pub use types::{Address, Epoch, Pc};
