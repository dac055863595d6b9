//! Shadow Backend Abstraction
//!
//! The access algorithm only needs two things from shadow storage: the cell
//! group of one 8-byte block, and a bulk fill used when memory is allocated
//! or freed. Everything else (page tables, fixed regions) lives behind
//! [`ShadowBackend`] and is selected statically, so the scan loop of every
//! access variant is monomorphized against one concrete backend.

use std::array;
use std::sync::atomic::{AtomicU64, Ordering};

use super::cell::ShadowCell;
use crate::domain::error::InvariantViolation;
use crate::domain::types::{Address, BLOCK_SIZE, SHADOW_CELLS};

/// Cell group recording the recent history of one application block
///
/// Cells are loaded and stored individually with relaxed ordering. Another
/// thread may observe a half-updated group; it never observes a torn cell.
#[repr(align(32))]
pub struct ShadowBlock {
    cells: [AtomicU64; SHADOW_CELLS],
}

impl ShadowBlock {
    /// Create a group of empty cells
    pub fn new() -> Self {
        Self {
            cells: array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Load the cell in slot `idx`
    #[inline(always)]
    pub fn load(&self, idx: usize) -> ShadowCell {
        ShadowCell::from_raw(self.cells[idx].load(Ordering::Relaxed))
    }

    /// Overwrite the cell in slot `idx`
    #[inline(always)]
    pub fn store(&self, idx: usize, cell: ShadowCell) {
        self.cells[idx].store(cell.raw(), Ordering::Relaxed);
    }

    /// Overwrite every slot with `cell`
    #[inline]
    pub fn fill(&self, cell: ShadowCell) {
        for slot in &self.cells {
            slot.store(cell.raw(), Ordering::Relaxed);
        }
    }

    /// Copy of every slot, in slot order
    pub fn snapshot(&self) -> [ShadowCell; SHADOW_CELLS] {
        array::from_fn(|i| self.load(i))
    }
}

impl Default for ShadowBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage strategy for shadow cell groups
///
/// # Static Dispatch
///
/// `Detector<PagedShadow>` and `Detector<FlatShadow>` are distinct types; the
/// `with_block` call inside the access fast path compiles down to the
/// backend's own lookup with no vtable in between.
pub trait ShadowBackend: Send + Sync {
    /// Run `f` on the cell group covering `addr`
    ///
    /// # Errors
    ///
    /// `AddressOutOfRange` when the backend cannot shadow `addr`.
    fn with_block<R>(
        &self,
        addr: Address,
        f: impl FnOnce(&ShadowBlock) -> R,
    ) -> Result<R, InvariantViolation>;

    /// Overwrite every cell of every block touched by `[addr, addr + size)`
    ///
    /// # Errors
    ///
    /// `AddressOutOfRange` when part of the range cannot be shadowed.
    fn fill_range(
        &self,
        addr: Address,
        size: usize,
        cell: ShadowCell,
    ) -> Result<(), InvariantViolation>;

    /// Copy of the cell group covering `addr`
    fn snapshot(&self, addr: Address) -> Result<[ShadowCell; SHADOW_CELLS], InvariantViolation> {
        self.with_block(addr, ShadowBlock::snapshot)
    }
}

/// Number of blocks touched by `[addr, addr + size)`
#[inline]
pub(crate) fn blocks_spanned(addr: Address, size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    let first = addr / BLOCK_SIZE;
    let last = addr.saturating_add(size - 1) / BLOCK_SIZE;
    last - first + 1
}
