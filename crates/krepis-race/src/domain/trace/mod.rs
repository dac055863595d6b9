//! Event Trace
//!
//! Per-thread history of call-stack-shaping events, used only to recover
//! the stack of an access after the fact, when a race is reported.
//!
//! - [`event`]: packed event words
//! - [`ring`]: partitioned ring buffer with segment headers and replay

pub mod event;
pub mod ring;

pub use event::{EventType, TraceEvent};
pub use ring::{RestoredStack, Trace, TraceGeometry, TraceHeader};
