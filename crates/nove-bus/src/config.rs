//! Bus configuration from defaults, environment variables or a config file.

use serde::{Deserialize, Serialize};
use std::env;

/// Default bus name used in log fields.
pub const DEFAULT_BUS_NAME: &str = "nove";

/// Configuration for a [`Bus`](crate::Bus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Name recorded as the `bus` field on every log line.
    pub name: String,

    /// Emit a trace event when a posted message matches no dispatcher.
    pub log_unmatched: bool,

    /// Drop bindings of released subscribers on every registration.
    pub prune_on_register: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_BUS_NAME.to_string(),
            log_unmatched: true,
            prune_on_register: true,
        }
    }
}

impl BusConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `NOVE_BUS_NAME`: Bus name (default: nove)
    /// - `NOVE_LOG_UNMATCHED`: Trace unmatched posts (default: true)
    /// - `NOVE_PRUNE_ON_REGISTER`: Prune released subscribers on register (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            name: env::var("NOVE_BUS_NAME").unwrap_or(defaults.name),
            log_unmatched: parse_flag(env::var("NOVE_LOG_UNMATCHED").ok(), defaults.log_unmatched),
            prune_on_register: parse_flag(
                env::var("NOVE_PRUNE_ON_REGISTER").ok(),
                defaults.prune_on_register,
            ),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_log_unmatched(mut self, enabled: bool) -> Self {
        self.log_unmatched = enabled;
        self
    }

    #[must_use]
    pub fn with_prune_on_register(mut self, enabled: bool) -> Self {
        self.prune_on_register = enabled;
        self
    }
}

/// Interpret `true`/`1` and `false`/`0` (any case); anything else keeps the default.
fn parse_flag(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
