//! Infrastructure Layer - External Technology Stack
//!
//! # Responsibilities
//! - Log subscriber installation (`tracing-subscriber`)
//! - Configuration loading (`serde_json`, environment)

pub mod logging;
pub mod options;

pub use logging::init_tracing;
pub use options::{load_options, options_from_env, OptionsError, OPTIONS_ENV};
