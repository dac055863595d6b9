//! Detector Options
//!
//! A [`DetectorConfig`] is read from a JSON document, usually taken from the
//! `KREPIS_RACE_OPTIONS` environment variable. Missing keys keep their
//! defaults:
//!
//! ```text
//! KREPIS_RACE_OPTIONS='{"max_threads": 64, "exit_code": 1}'
//! ```

use crate::domain::config::DetectorConfig;
use crate::domain::error::ConfigError;

/// Environment variable holding the JSON options
pub const OPTIONS_ENV: &str = "KREPIS_RACE_OPTIONS";

/// Failure to load options
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    /// Not valid JSON or an unknown value type
    #[error("malformed detector options: {0}")]
    Parse(#[from] serde_json::Error),

    /// Parsed but rejected by validation
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Parse and validate options from JSON
///
/// # Example
///
/// ```rust
/// use krepis_race::infrastructure::load_options;
///
/// let config = load_options(r#"{"max_threads": 64}"#).unwrap();
/// assert_eq!(config.max_threads, 64);
/// assert_eq!(config.exit_code, 66);
/// ```
pub fn load_options(json: &str) -> Result<DetectorConfig, OptionsError> {
    let config: DetectorConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Options from [`OPTIONS_ENV`], or the defaults when it is unset
pub fn options_from_env() -> Result<DetectorConfig, OptionsError> {
    match std::env::var(OPTIONS_ENV) {
        Ok(json) if !json.trim().is_empty() => load_options(&json),
        _ => Ok(DetectorConfig::default()),
    }
}
