//! Core Scalar Types
//!
//! Plain aliases shared by every component. They are aliases rather than
//! newtypes because they flow straight from instrumentation hooks and are
//! only ever combined arithmetically.

/// Application memory address
pub type Address = usize;

/// Program counter recorded in traces and reports
pub type Pc = usize;

/// Per-thread logical clock value
///
/// Starts at 1 for every thread incarnation and increases on each memory
/// access, function entry/exit and synchronization event.
pub type Epoch = u64;

/// Application bytes covered by one shadow block
pub const BLOCK_SIZE: usize = 8;

/// Shadow cells kept per application block
pub const SHADOW_CELLS: usize = 4;

/// Round an address down to its shadow block
#[inline(always)]
pub const fn block_base(addr: Address) -> Address {
    addr & !(BLOCK_SIZE - 1)
}

/// Byte offset of an address inside its shadow block
#[inline(always)]
pub const fn block_offset(addr: Address) -> u8 {
    (addr & (BLOCK_SIZE - 1)) as u8
}
