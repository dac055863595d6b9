//! Logical Clocks
//!
//! # Components
//!
//! - [`FastState`]: the owning thread's packed `(tid, epoch)` word.
//! - [`VectorClock`]: per-thread happens-before knowledge, merged on acquire
//!   and published on release.
//!
//! The synchronization objects that carry clocks between threads belong to
//! the embedder; the detector only ever sees `&VectorClock` (acquire) and
//! `&mut VectorClock` (release).

pub mod fast_state;
pub mod vector_clock;

pub use fast_state::FastState;
pub use vector_clock::VectorClock;
