//! Paged Shadow Backend - Production
//!
//! # Design for Production
//!
//! Application address spaces are sparse. Shadow is therefore kept per 4 KiB
//! application page and allocated on first touch:
//! - `DashMap` for concurrent page lookup without a global lock
//! - one boxed slice of [`ShadowBlock`]s per page
//!
//! ```text
//! PagedShadow
//! └─ pages: DashMap<page index, Box<[ShadowBlock; 512]>>
//!     ├─ 0x7f00_0000 >> 12  →  [blk 0][blk 1] ... [blk 511]
//!     └─ 0x7f00_1000 >> 12  →  [blk 0][blk 1] ... [blk 511]
//! ```
//!
//! Resetting a range that was never touched allocates nothing.
//!
//! # Locking
//!
//! A block is scanned under the read guard of its `DashMap` shard. Readers
//! of one shard never wait on each other; the first touch of a page takes
//! the shard's write lock only for the insert, so threads hashing to the
//! same shard can briefly block there. The access path is therefore not
//! lock-free, only free of any global lock.

use dashmap::DashMap;

use super::backend::{ShadowBackend, ShadowBlock};
use super::cell::ShadowCell;
use crate::domain::error::InvariantViolation;
use crate::domain::types::{Address, BLOCK_SIZE};

/// log2 of the application page size
pub const PAGE_SHIFT: u32 = 12;

/// Application bytes per shadow page
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Shadow blocks per page
pub const BLOCKS_PER_PAGE: usize = PAGE_SIZE / BLOCK_SIZE;

/// Lazily allocated page table of shadow blocks
#[derive(Default)]
pub struct PagedShadow {
    pages: DashMap<usize, Box<[ShadowBlock]>>,
}

impl PagedShadow {
    /// Create an empty page table
    pub fn new() -> Self {
        Self {
            pages: DashMap::new(),
        }
    }

    /// Number of pages that have been allocated so far
    pub fn resident_pages(&self) -> usize {
        self.pages.len()
    }

    fn new_page() -> Box<[ShadowBlock]> {
        (0..BLOCKS_PER_PAGE).map(|_| ShadowBlock::new()).collect()
    }

    #[inline(always)]
    fn split(addr: Address) -> (usize, usize) {
        (addr >> PAGE_SHIFT, (addr & (PAGE_SIZE - 1)) / BLOCK_SIZE)
    }
}

impl ShadowBackend for PagedShadow {
    #[inline(always)]
    fn with_block<R>(
        &self,
        addr: Address,
        f: impl FnOnce(&ShadowBlock) -> R,
    ) -> Result<R, InvariantViolation> {
        let (page, idx) = Self::split(addr);
        if let Some(blocks) = self.pages.get(&page) {
            return Ok(f(&blocks[idx]));
        }
        let blocks = self.pages.entry(page).or_insert_with(Self::new_page).downgrade();
        Ok(f(&blocks[idx]))
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
        // inclusive bounds, so a range ending at the top of memory never wraps
        let last_byte = addr
            .checked_add(size - 1)
            .ok_or(InvariantViolation::AddressOutOfRange { addr: usize::MAX })?;
        let (first_page, first_idx) = Self::split(addr);
        let (last_page, last_idx) = Self::split(last_byte);

        for page in first_page..=last_page {
            let first = if page == first_page { first_idx } else { 0 };
            let last = if page == last_page { last_idx } else { BLOCKS_PER_PAGE - 1 };

            if cell.is_empty() {
                if let Some(blocks) = self.pages.get(&page) {
                    blocks[first..=last].iter().for_each(|b| b.fill(cell));
                }
            } else {
                let blocks = self.pages.entry(page).or_insert_with(Self::new_page);
                blocks[first..=last].iter().for_each(|b| b.fill(cell));
            }
        }
        Ok(())
    }
}
