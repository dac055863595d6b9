//! Trace Event Encoding
//!
//! Every epoch increment appends exactly one event word:
//!
//! ```text
//!  63   61 60                                                   0
//! ┌───────┬──────────────────────────────────────────────────────┐
//! │ type  │ pc (61 bits)                                         │
//! └───────┴──────────────────────────────────────────────────────┘
//! ```
//!
//! The all-zero word is an unwritten slot; replay skips it.

use std::fmt;

use crate::domain::types::Pc;

const TYPE_SHIFT: u32 = 61;
const PC_MASK: u64 = (1 << TYPE_SHIFT) - 1;

/// Kind of a recorded event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    /// Memory access at `pc`
    Mop = 1,
    /// Call into the function at `pc`
    FuncEnter = 2,
    /// Return from the current function
    FuncExit = 3,
    /// Acquire of a synchronization object
    Acquire = 4,
    /// Release of a synchronization object
    Release = 5,
}

impl EventType {
    #[inline(always)]
    const fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            1 => Some(Self::Mop),
            2 => Some(Self::FuncEnter),
            3 => Some(Self::FuncExit),
            4 => Some(Self::Acquire),
            5 => Some(Self::Release),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mop => write!(f, "mop"),
            Self::FuncEnter => write!(f, "enter"),
            Self::FuncExit => write!(f, "exit"),
            Self::Acquire => write!(f, "acquire"),
            Self::Release => write!(f, "release"),
        }
    }
}

/// One packed trace slot
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct TraceEvent(u64);

impl TraceEvent {
    /// Unwritten slot
    pub const EMPTY: Self = Self(0);

    /// Pack an event; pc bits above 61 are dropped
    #[inline(always)]
    pub const fn new(kind: EventType, pc: Pc) -> Self {
        Self(((kind as u64) << TYPE_SHIFT) | (pc as u64 & PC_MASK))
    }

    /// Reinterpret a raw slot
    #[inline(always)]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw slot word
    #[inline(always)]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Event kind, `None` for an unwritten slot
    #[inline(always)]
    pub const fn kind(self) -> Option<EventType> {
        EventType::from_tag(self.0 >> TYPE_SHIFT)
    }

    /// Program counter
    #[inline(always)]
    pub const fn pc(self) -> Pc {
        (self.0 & PC_MASK) as Pc
    }
}

impl fmt::Debug for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{}({:#x})", kind, self.pc()),
            None => write!(f, "empty"),
        }
    }
}
