//! Detector Configuration
//!
//! Plain serde-friendly settings. Every field has a default, so a host may
//! deserialize a partial document (for example from an environment-provided
//! JSON string) and validate it before building a detector.

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::thread::{RegistryLimits, ThreadId};
use super::trace::TraceGeometry;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Defaults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Default capacity of the thread table
pub const DEFAULT_MAX_THREADS: usize = 1024;

/// Default number of dead tids held back before reuse
pub const DEFAULT_THREAD_QUARANTINE: usize = 16;

/// Default trace ring size in events
pub const DEFAULT_TRACE_SIZE: usize = 16 * 1024;

/// Default number of trace segments
pub const DEFAULT_TRACE_PARTS: usize = 8;

/// Default maximum call depth
pub const DEFAULT_SHADOW_STACK_DEPTH: usize = 1024;

/// Default cap on frames per reported stack
pub const DEFAULT_REPORT_STACK_LIMIT: usize = 64;

/// Largest range a single reset or free touches (1 GiB)
pub const DEFAULT_MAX_RESET_SIZE: usize = 1 << 30;

/// Exit code of a run that reported races
pub const DEFAULT_EXIT_CODE: i32 = 66;

/// Detector settings
///
/// # Example
///
/// ```rust
/// use krepis_race::domain::config::DetectorConfig;
///
/// let config = DetectorConfig {
///     max_threads: 64,
///     ..DetectorConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Capacity of the thread table, at most `0xffff` (tids `0..=0xfffe`)
    pub max_threads: usize,
    /// Dead tids held back before one is reused
    pub thread_quarantine: usize,
    /// Trace ring size per thread, in events (power of two)
    pub trace_size: usize,
    /// Segments per trace ring
    pub trace_parts: usize,
    /// Maximum call depth per thread
    pub shadow_stack_depth: usize,
    /// Maximum frames kept per reported stack
    pub report_stack_limit: usize,
    /// Largest range touched by one reset or free
    pub max_reset_size: usize,
    /// Exit code when races were reported or expected races were missed
    pub exit_code: i32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            thread_quarantine: DEFAULT_THREAD_QUARANTINE,
            trace_size: DEFAULT_TRACE_SIZE,
            trace_parts: DEFAULT_TRACE_PARTS,
            shadow_stack_depth: DEFAULT_SHADOW_STACK_DEPTH,
            report_stack_limit: DEFAULT_REPORT_STACK_LIMIT,
            max_reset_size: DEFAULT_MAX_RESET_SIZE,
            exit_code: DEFAULT_EXIT_CODE,
        }
    }
}

impl DetectorConfig {
    /// Check every limit
    ///
    /// # Errors
    ///
    /// The first limit found out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = ThreadId::MAX_THREADS;
        if self.max_threads == 0 || self.max_threads > max {
            return Err(ConfigError::ThreadLimit {
                requested: self.max_threads,
                max,
            });
        }
        self.trace_geometry()?;
        if self.shadow_stack_depth == 0 {
            return Err(ConfigError::Zero("shadow_stack_depth"));
        }
        if self.report_stack_limit == 0 {
            return Err(ConfigError::Zero("report_stack_limit"));
        }
        Ok(())
    }

    /// Trace geometry described by `trace_size` and `trace_parts`
    pub fn trace_geometry(&self) -> Result<TraceGeometry, ConfigError> {
        TraceGeometry::new(self.trace_size, self.trace_parts)
    }

    pub(crate) fn registry_limits(&self) -> Result<RegistryLimits, ConfigError> {
        Ok(RegistryLimits {
            max_threads: self.max_threads,
            quarantine: self.thread_quarantine,
            trace: self.trace_geometry()?,
            stack_depth: self.shadow_stack_depth,
        })
    }
}
