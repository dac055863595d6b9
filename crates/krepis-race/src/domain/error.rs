//! Domain Error Types
//!
//! Two families of failure exist inside the detector:
//!
//! - [`ConfigError`]: a rejected [`DetectorConfig`](super::config::DetectorConfig).
//!   Returned to the embedder from the builder, never raised on the hot path.
//! - [`InvariantViolation`]: the instrumentation contract or an internal
//!   invariant was broken. Inner layers return it as a `Result`; the detector
//!   boundary turns it into [`fatal`], which aborts the process.
//!
//! Best-effort degradations (overwritten trace history, stale tid epochs) are
//! not errors at all. They surface as shorter stacks in a report.

use super::thread::ThreadId;
use super::types::Epoch;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Configuration Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Rejected detector configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Thread table must hold at least one thread and leave the freed tid free
    #[error("max_threads must be in 1..={max}, got {requested}")]
    ThreadLimit {
        /// Requested table size
        requested: usize,
        /// Largest supported table size
        max: usize,
    },

    /// Trace ring must be a power of two
    #[error("trace_size must be a power of two, got {0}")]
    TraceSizeNotPowerOfTwo(usize),

    /// Trace ring must split evenly into segments
    #[error("trace_size {size} cannot be split into {parts} segments")]
    TraceParts {
        /// Ring size in events
        size: usize,
        /// Requested segment count
        parts: usize,
    },

    /// A limit that must be non-zero was zero
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Invariant Violations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
/// Broken instrumentation contract or internal invariant
///
/// Every variant is fatal. None of them is recoverable at runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// A vector clock entry was asked to move backwards
    #[error("vector clock for {tid} regressed: stored {stored}, requested {requested}")]
    ClockRegression {
        /// Clock slot
        tid: ThreadId,
        /// Value currently stored
        stored: Epoch,
        /// Smaller value that was requested
        requested: Epoch,
    },

    /// The per-thread epoch no longer fits the shadow word
    #[error("epoch overflow for {0}")]
    EpochOverflow(ThreadId),

    /// Function exit without a matching entry
    #[error("shadow stack underflow on {0}")]
    ShadowStackUnderflow(ThreadId),

    /// Call depth above the configured shadow stack depth
    #[error("shadow stack overflow on {tid} (depth {depth})")]
    ShadowStackOverflow {
        /// Offending thread
        tid: ThreadId,
        /// Configured limit
        depth: usize,
    },

    /// `OnIgnoreEnd` without a matching `OnIgnoreBegin`
    #[error("unbalanced ignore end on {tid} (writes: {is_write})")]
    IgnoreUnderflow {
        /// Offending thread
        tid: ThreadId,
        /// Which counter underflowed
        is_write: bool,
    },

    /// Every tid is live and the dead list is empty
    #[error("thread limit of {0} exceeded")]
    ThreadLimitExceeded(usize),

    /// Thread id outside the registry table
    #[error("unknown thread {0}")]
    UnknownThread(ThreadId),

    /// Lifecycle transition not allowed by the state machine
    #[error("invalid transition for {tid}: {from} -> {to}")]
    InvalidTransition {
        /// Offending thread
        tid: ThreadId,
        /// Current status
        from: &'static str,
        /// Requested status
        to: &'static str,
    },

    /// Address outside the region served by a fixed shadow backend
    #[error("address {addr:#x} is outside the shadowed application range")]
    AddressOutOfRange {
        /// Offending application address
        addr: usize,
    },

    /// `initialize()` was called more than once
    #[error("detector initialized twice")]
    DoubleInitialization,
}

/// Abort on a violated invariant
///
/// Logs the violation and panics. The release profile of the workspace
/// compiles panics as aborts, so this never unwinds into instrumented code.
#[cold]
#[inline(never)]
#[track_caller]
pub fn fatal(violation: InvariantViolation) -> ! {
    tracing::error!(%violation, "FATAL: race detector invariant violated");
    panic!("race detector invariant violated: {violation}");
}

/// Unwrap a layer result at the detector boundary
pub(crate) trait OrFatal<T> {
    /// Return the value or abort through [`fatal`]
    fn or_fatal(self) -> T;
}

impl<T> OrFatal<T> for Result<T, InvariantViolation> {
    #[inline(always)]
    #[track_caller]
    fn or_fatal(self) -> T {
        match self {
            Ok(value) => value,
            Err(violation) => fatal(violation),
        }
    }
}
