//! Threads
//!
//! - [`types`]: `ThreadId` and the lifecycle `ThreadStatus`
//! - [`state`]: `ThreadState`, owned by the application thread itself
//! - [`registry`]: the tid arena with lifecycle transitions and stack replay

pub mod registry;
pub mod state;
pub mod types;

pub use registry::{RegistryLimits, ThreadContext, ThreadRegistry};
pub use state::{RacyAccess, ThreadState};
pub use types::{ThreadId, ThreadStatus};
