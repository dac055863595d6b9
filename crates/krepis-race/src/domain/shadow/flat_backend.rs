//! Flat Shadow Backend - Fixed Application Range
//!
//! One contiguous, pre-allocated array of blocks covering a known application
//! range. Lookup is a subtraction and a shift, with no hashing and no locks.
//! Intended for embedders that own a fixed arena (and for tests that want
//! fully deterministic memory use).
//!
//! An address outside the range breaks the instrumentation contract and is
//! reported as [`InvariantViolation::AddressOutOfRange`].

use super::backend::{blocks_spanned, ShadowBackend, ShadowBlock};
use super::cell::ShadowCell;
use crate::domain::error::InvariantViolation;
use crate::domain::types::{block_base, Address, BLOCK_SIZE};

/// Pre-allocated shadow for `[base, base + len)`
pub struct FlatShadow {
    base: Address,
    blocks: Box<[ShadowBlock]>,
}

impl FlatShadow {
    /// Shadow the application range `[base, base + len)`
    ///
    /// `base` is rounded down and the end rounded up to whole blocks.
    pub fn new(base: Address, len: usize) -> Self {
        let start = block_base(base);
        let end = base.saturating_add(len).saturating_add(BLOCK_SIZE - 1) & !(BLOCK_SIZE - 1);
        let count = (end - start) / BLOCK_SIZE;
        Self {
            base: start,
            blocks: (0..count).map(|_| ShadowBlock::new()).collect(),
        }
    }

    /// First shadowed address
    pub fn base(&self) -> Address {
        self.base
    }

    /// Bytes of application memory covered
    pub fn len(&self) -> usize {
        self.blocks.len() * BLOCK_SIZE
    }

    /// Whether the covered range is empty
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[inline(always)]
    fn index(&self, addr: Address) -> Result<usize, InvariantViolation> {
        addr.checked_sub(self.base)
            .map(|off| off / BLOCK_SIZE)
            .filter(|&idx| idx < self.blocks.len())
            .ok_or(InvariantViolation::AddressOutOfRange { addr })
    }
}

impl ShadowBackend for FlatShadow {
    #[inline(always)]
    fn with_block<R>(
        &self,
        addr: Address,
        f: impl FnOnce(&ShadowBlock) -> R,
    ) -> Result<R, InvariantViolation> {
        let idx = self.index(addr)?;
        Ok(f(&self.blocks[idx]))
    }

    fn fill_range(
        &self,
        addr: Address,
        size: usize,
        cell: ShadowCell,
    ) -> Result<(), InvariantViolation> {
        if size == 0 {
            return Ok(());
        }
        let first = self.index(addr)?;
        let blocks = self
            .blocks
            .get(first..first + blocks_spanned(addr, size))
            .ok_or(InvariantViolation::AddressOutOfRange {
                addr: addr.saturating_add(size - 1),
            })?;
        blocks.iter().for_each(|b| b.fill(cell));
        Ok(())
    }
}
