//! Log Subscriber
//!
//! The detector only emits `tracing` events. Hosts that have no subscriber
//! of their own call [`init_tracing`]; the filter comes from `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `RUST_LOG`
///
/// Returns `false` when a global subscriber was already installed, which
/// makes repeated calls from several tests harmless.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .try_init()
        .is_ok()
}
