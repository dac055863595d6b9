//! Vector Clock Implementation
//!
//! Vector clocks decide the happens-before relation between a recorded
//! access and the current thread.
//!
//! # Theory
//!
//! Access A by thread t1 at epoch e1 happens-before the current point of
//! thread t2 iff `VC(t2)[t1] >= e1`. No wall-clock time is involved.
//!
//! # Implementation
//!
//! Entries are stored densely by tid and grow on demand. A missing entry
//! reads as zero, so a clock only pays for the tids it has actually seen.

use std::fmt;

use crate::domain::error::InvariantViolation;
use crate::domain::thread::ThreadId;
use crate::domain::types::Epoch;

/// Per-thread vector of last-known epochs
///
/// # Example
///
/// ```text
/// Thread 0: [5, 2, 3]  (T0 is at epoch 5, last synchronized with T1 at 2, T2 at 3)
/// Thread 1: [4, 7, 3]  (T1 is at epoch 7, last synchronized with T0 at 4, T2 at 3)
/// ```
#[derive(Clone, PartialEq, Eq, Default)]
pub struct VectorClock {
    /// Clock values indexed by tid
    clocks: Vec<Epoch>,
}

impl VectorClock {
    /// Create an empty clock (every entry reads as zero)
    #[inline]
    pub fn new() -> Self {
        Self { clocks: Vec::new() }
    }

    /// Get the highest epoch of `tid` known to this clock
    #[inline(always)]
    pub fn get(&self, tid: ThreadId) -> Epoch {
        self.clocks.get(tid.as_usize()).copied().unwrap_or(0)
    }

    /// Whether an access by `tid` at `epoch` happens-before the owner
    #[inline(always)]
    pub fn covers(&self, tid: ThreadId, epoch: Epoch) -> bool {
        self.get(tid) >= epoch
    }

    /// Raise the entry for `tid` to `epoch`
    ///
    /// # Errors
    ///
    /// `ClockRegression` when `epoch` is below the stored value.
    #[inline]
    pub fn set(&mut self, tid: ThreadId, epoch: Epoch) -> Result<(), InvariantViolation> {
        let idx = tid.as_usize();
        if idx >= self.clocks.len() {
            self.clocks.resize(idx + 1, 0);
        }
        let stored = self.clocks[idx];
        if epoch < stored {
            return Err(InvariantViolation::ClockRegression {
                tid,
                stored,
                requested: epoch,
            });
        }
        self.clocks[idx] = epoch;
        Ok(())
    }

    /// Merge with another vector clock (element-wise max)
    ///
    /// # Example
    ///
    /// ```text
    /// self:  [3, 1, 2]
    /// other: [2, 5, 1, 4]
    /// result:[3, 5, 2, 4]
    /// ```
    #[inline]
    pub fn merge(&mut self, other: &VectorClock) {
        if other.clocks.len() > self.clocks.len() {
            self.clocks.resize(other.clocks.len(), 0);
        }
        for (mine, theirs) in self.clocks.iter_mut().zip(&other.clocks) {
            *mine = (*mine).max(*theirs);
        }
    }

    /// Forget every entry
    #[inline]
    pub fn clear(&mut self) {
        self.clocks.clear();
    }

    /// Number of tracked slots (highest tid seen + 1)
    #[inline]
    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    /// Whether no entry has been set yet
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }
}

impl fmt::Debug for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VC[")?;
        for (i, &val) in self.clocks.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", val)?;
        }
        write!(f, "]")
    }
}
