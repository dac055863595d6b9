//! Thread Types
//!
//! # State Machine
//!
//! ```text
//!            create            first op          thread returns
//! Invalid ─────────▶ Created ─────────▶ Running ─────────────▶ Finished
//!                       ▲                                          │
//!                       │ tid reused                    join /     │
//!                       │                               detach     ▼
//!                       └──────────────────────────────────────── Dead
//! ```
//!
//! A detached thread goes straight from `Running` to `Dead` when it returns.

use std::fmt;

use serde::Serialize;

/// Runtime-assigned small thread identifier
///
/// Tids are reused once a thread is reclaimed; the registry's `reuse_count`
/// tells incarnations apart.
///
/// # Example
///
/// ```rust
/// use krepis_race::domain::thread::ThreadId;
///
/// let main = ThreadId::new(0);
/// assert_eq!(main.to_string(), "t0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ThreadId(pub u16);

impl ThreadId {
    /// Reserved for the freed-memory marker; never assigned to a thread
    pub const RESERVED: Self = Self(u16::MAX);

    /// Largest number of threads the cell encoding can name
    ///
    /// Tids run from `0` to `0xfffe`; [`ThreadId::RESERVED`] is never handed out.
    pub const MAX_THREADS: usize = u16::MAX as usize;

    /// Create a thread identifier
    #[inline(always)]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Get the underlying index
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Lifecycle status of a registry slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    /// Slot never used
    #[default]
    Invalid,
    /// Creation observed, thread not started yet
    Created,
    /// Thread is executing instrumented code
    Running,
    /// Thread returned; its trace and final clock are kept
    Finished,
    /// Reclaimed; the tid waits in quarantine for reuse
    Dead,
}

impl ThreadStatus {
    /// Short lowercase name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Created => "created",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Dead => "dead",
        }
    }

    /// Whether a trace of this incarnation can still be replayed
    pub const fn has_trace(self) -> bool {
        matches!(self, Self::Running | Self::Finished | Self::Dead)
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
