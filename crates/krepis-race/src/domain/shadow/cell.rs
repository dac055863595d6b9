//! Shadow Cell Codec
//!
//! One recorded access packed into a single `u64` so that it can be loaded and
//! stored with one relaxed atomic operation.
//!
//! # Layout
//!
//! ```text
//!  63            48 47                                   6   5   4 3  2   0
//! ┌────────────────┬──────────────────────────────────────┬───┬─────┬──────┐
//! │ tid (16)       │ epoch (42)                           │ W │ log │ off  │
//! └────────────────┴──────────────────────────────────────┴───┴─────┴──────┘
//! ```
//!
//! The upper 58 bits are exactly a [`FastState`](crate::domain::clock::FastState),
//! so a descriptor for the current access is built by OR-ing the low six
//! bits into the accessing thread's fast state.
//!
//! The all-zero word means "empty slot". Epochs start at 1, so no genuine
//! access ever encodes to zero.

use std::fmt;

use crate::domain::clock::FastState;
use crate::domain::thread::ThreadId;
use crate::domain::types::Epoch;

/// Bits used for the thread id
pub const TID_BITS: u32 = 16;

/// Bits used for the epoch
pub const EPOCH_BITS: u32 = 42;

/// Shift of the epoch field
pub const EPOCH_SHIFT: u32 = 6;

/// Shift of the tid field
pub const TID_SHIFT: u32 = EPOCH_SHIFT + EPOCH_BITS;

/// Largest epoch representable in a cell
pub const MAX_EPOCH: Epoch = (1 << EPOCH_BITS) - 1;

const OFFSET_MASK: u64 = 0b111;
const SIZE_LOG_SHIFT: u32 = 3;
const SIZE_LOG_MASK: u64 = 0b11 << SIZE_LOG_SHIFT;
const WRITE_BIT: u64 = 1 << 5;
const RANGE_MASK: u64 = OFFSET_MASK | SIZE_LOG_MASK;
const EPOCH_MASK: u64 = MAX_EPOCH << EPOCH_SHIFT;

/// Decoded view of a shadow cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellFields {
    /// Owning thread
    pub tid: ThreadId,
    /// Owning thread's epoch at the time of the access
    pub epoch: Epoch,
    /// Byte offset inside the 8-byte block (0..=7)
    pub offset: u8,
    /// log2 of the access width (0..=3)
    pub size_log: u8,
    /// Whether the access was a write
    pub is_write: bool,
}

/// One packed access descriptor
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ShadowCell(u64);

impl ShadowCell {
    /// Unused slot
    pub const EMPTY: Self = Self(0);

    /// Freed memory marker
    ///
    /// An 8-byte write at offset 0 by the reserved all-ones tid at the
    /// largest epoch. No thread can have that tid in its vector clock, so the
    /// marker conflicts with every later access.
    pub const FREED: Self = Self(0xffff_ffff_ffff_fff8);

    /// Pack the fields of one access
    ///
    /// # Panics
    ///
    /// Panics in debug builds when a field exceeds its declared width or the
    /// result would collide with [`ShadowCell::EMPTY`].
    #[inline(always)]
    pub fn encode(tid: ThreadId, epoch: Epoch, offset: u8, size_log: u8, is_write: bool) -> Self {
        debug_assert!(epoch <= MAX_EPOCH, "epoch {epoch} exceeds cell width");
        debug_assert!(offset < 8, "offset {offset} outside block");
        debug_assert!(size_log < 4, "size_log {size_log} too large");

        let raw = (u64::from(tid.0) << TID_SHIFT)
            | (epoch << EPOCH_SHIFT)
            | (u64::from(is_write) << 5)
            | (u64::from(size_log) << SIZE_LOG_SHIFT)
            | u64::from(offset);
        debug_assert!(raw != 0, "genuine access encoded as empty slot");
        Self(raw)
    }

    /// Build the descriptor of the current access from a thread's fast state
    #[inline(always)]
    pub fn from_fast_state(state: FastState, offset: u8, size_log: u8, is_write: bool) -> Self {
        debug_assert!(offset < 8 && size_log < 4);
        Self(
            state.raw()
                | (u64::from(is_write) << 5)
                | (u64::from(size_log) << SIZE_LOG_SHIFT)
                | u64::from(offset),
        )
    }

    /// Reinterpret a raw shadow word
    #[inline(always)]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw shadow word
    #[inline(always)]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Unpack every field
    #[inline]
    pub fn decode(self) -> CellFields {
        CellFields {
            tid: self.tid(),
            epoch: self.epoch(),
            offset: self.offset(),
            size_log: self.size_log(),
            is_write: self.is_write(),
        }
    }

    /// Owning thread
    #[inline(always)]
    pub const fn tid(self) -> ThreadId {
        ThreadId((self.0 >> TID_SHIFT) as u16)
    }

    /// Epoch of the access
    #[inline(always)]
    pub const fn epoch(self) -> Epoch {
        (self.0 & EPOCH_MASK) >> EPOCH_SHIFT
    }

    /// Byte offset inside the block
    #[inline(always)]
    pub const fn offset(self) -> u8 {
        (self.0 & OFFSET_MASK) as u8
    }

    /// log2 of the access width
    #[inline(always)]
    pub const fn size_log(self) -> u8 {
        ((self.0 & SIZE_LOG_MASK) >> SIZE_LOG_SHIFT) as u8
    }

    /// Access width in bytes
    #[inline(always)]
    pub const fn size(self) -> usize {
        1 << self.size_log()
    }

    /// Whether the access was a write
    #[inline(always)]
    pub const fn is_write(self) -> bool {
        self.0 & WRITE_BIT != 0
    }

    /// Whether the slot is unused
    #[inline(always)]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether the slot carries the freed marker
    #[inline(always)]
    pub const fn is_freed(self) -> bool {
        self.0 == Self::FREED.0
    }

    /// Offset into the cell group at which a scan should start
    ///
    /// Single-threaded accesses to distinct fields of one block tend to land
    /// on their own slot first.
    #[inline(always)]
    pub const fn search_offset(self) -> usize {
        (self.0 & OFFSET_MASK) as usize
    }

    /// Same owning thread, by comparing the top bits only
    #[inline(always)]
    pub const fn tids_equal(a: Self, b: Self) -> bool {
        (a.0 ^ b.0) >> TID_SHIFT == 0
    }

    /// Same byte offset and width, by comparing the low five bits only
    #[inline(always)]
    pub const fn same_range(a: Self, b: Self) -> bool {
        (a.0 ^ b.0) & RANGE_MASK == 0
    }

    /// Whether the byte ranges of two accesses overlap
    ///
    /// `b_size` is the statically known width of the current access.
    #[inline(always)]
    pub const fn ranges_intersect(a: Self, b: Self, b_size: usize) -> bool {
        let a_off = a.offset() as usize;
        let b_off = b.offset() as usize;
        if a_off < b_off {
            a_off + a.size() > b_off
        } else {
            b_off + b_size > a_off
        }
    }
}

impl fmt::Debug for ShadowCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "Cell(empty)");
        }
        if self.is_freed() {
            return write!(f, "Cell(freed)");
        }
        write!(
            f,
            "Cell({}@{} {}{}+{})",
            self.tid(),
            self.epoch(),
            if self.is_write() { "W" } else { "R" },
            self.size(),
            self.offset()
        )
    }
}
