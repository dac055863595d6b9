//! Fast State - packed `(tid, epoch)` pair
//!
//! The owning thread keeps its identity and current epoch in one word laid
//! out exactly like the upper bits of a [`ShadowCell`](crate::domain::shadow::ShadowCell).
//! Building the descriptor of an access is then a single OR.

use std::fmt;

use crate::domain::error::InvariantViolation;
use crate::domain::shadow::cell::{EPOCH_SHIFT, MAX_EPOCH, TID_SHIFT};
use crate::domain::thread::ThreadId;
use crate::domain::types::Epoch;

/// Current `(tid, epoch)` of a running thread
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct FastState(u64);

impl FastState {
    /// Pack a thread id and epoch
    #[inline(always)]
    pub fn new(tid: ThreadId, epoch: Epoch) -> Self {
        debug_assert!(epoch <= MAX_EPOCH);
        Self((u64::from(tid.0) << TID_SHIFT) | (epoch << EPOCH_SHIFT))
    }

    /// Raw packed word (low six bits always zero)
    #[inline(always)]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Owning thread
    #[inline(always)]
    pub const fn tid(self) -> ThreadId {
        ThreadId((self.0 >> TID_SHIFT) as u16)
    }

    /// Current epoch
    #[inline(always)]
    pub const fn epoch(self) -> Epoch {
        (self.0 >> EPOCH_SHIFT) & MAX_EPOCH
    }

    /// Advance the epoch by one
    ///
    /// # Errors
    ///
    /// `EpochOverflow` once the epoch would no longer fit a shadow cell.
    #[inline(always)]
    pub fn increment_epoch(&mut self) -> Result<Epoch, InvariantViolation> {
        let next = self.epoch() + 1;
        if next > MAX_EPOCH {
            return Err(InvariantViolation::EpochOverflow(self.tid()));
        }
        self.0 += 1 << EPOCH_SHIFT;
        Ok(next)
    }
}

impl fmt::Debug for FastState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FastState({}@{})", self.tid(), self.epoch())
    }
}
