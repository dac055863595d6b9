//! Shadow Memory
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  application block (8 bytes)                             │
//! │  0x7f00_1230 ─┐                                          │
//! │               ▼                                          │
//! │  ShadowBlock [ cell 0 | cell 1 | cell 2 | cell 3 ]       │
//! │                  │                                       │
//! │                  └─ ShadowCell(u64): tid|epoch|W|log|off │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`cell`]: the packed descriptor and its masked comparisons
//! - [`backend`]: the block type and the [`ShadowBackend`] trait
//! - [`PagedShadow`]: production storage, lazily paged through `DashMap`
//! - [`FlatShadow`]: fixed pre-allocated range

pub mod backend;
pub mod cell;
pub mod flat_backend;
pub mod paged_backend;

#[cfg(kani)]
mod proofs;

pub use backend::{ShadowBackend, ShadowBlock};
pub use cell::{CellFields, ShadowCell};
pub use flat_backend::FlatShadow;
pub use paged_backend::PagedShadow;
