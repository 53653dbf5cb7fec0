//! # Nove Telemetry
//!
//! Log output for applications and tests embedding the Nove bus. The bus
//! itself only emits `tracing` events; this crate installs the subscriber
//! that renders them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nove_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("Failed to init telemetry");
//!     // Bus registrations and posts are now logged
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NOVE_SERVICE_NAME` | `nove` | Service name in the startup log |
//! | `NOVE_LOG_LEVEL` | `info` | Log level filter |
//! | `NOVE_CONSOLE_OUTPUT` | `true` | Write logs to the console |
//! | `NOVE_JSON_LOGS` | `false` | JSON instead of pretty output |

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;

use std::sync::OnceLock;
use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Initialize logging as the global default subscriber.
///
/// Returns a guard that should be held for the lifetime of the application.
///
/// # Errors
///
/// [`TelemetryError::Config`] for an unparseable log level and
/// [`TelemetryError::AlreadyInitialized`] if another subscriber is installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    tracing_setup::init_tracing(&config, false)?;
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Initialize logging for test binaries, at most once per process.
///
/// Output goes through the test writer so it is captured per test. Safe to
/// call from every test.
pub fn try_init_for_tests() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        // Another harness may own the global subscriber already; that is fine.
        let _ = tracing_setup::init_tracing(&TelemetryConfig::for_tests(), true);
    });
}

/// Guard that keeps telemetry active. Logs on drop.
#[derive(Debug)]
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry...");
    }
}
