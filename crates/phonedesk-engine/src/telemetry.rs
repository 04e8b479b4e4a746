//! # Tracing Setup
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages
//! - `RUST_LOG=phonedesk_engine=trace` - Trace one crate only
//! - Default: `info,phonedesk=debug,sqlx=warn`

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,phonedesk=debug,sqlx=warn";

/// Installs the global fmt subscriber.
///
/// Safe to call more than once; later calls leave the first subscriber
/// in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
