//! Runtime tunables for the dispatch engine.
//!
//! A process installs its configuration once at startup; decorators and the
//! delegation front-end read the current values when no explicit override
//! is supplied.

use std::sync::OnceLock;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

static CURRENT: OnceLock<RwLock<DispatchConfig>> = OnceLock::new();

fn cell() -> &'static RwLock<DispatchConfig> {
    CURRENT.get_or_init(|| RwLock::new(DispatchConfig::default()))
}

/// Engine-wide defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Delay before a pending operation counts as activity, milliseconds.
    pub activity_grace_ms: u64,
    /// Duration applied by the default timeout decorator, milliseconds.
    /// `None` leaves results unraced.
    pub default_timeout_ms: Option<u64>,
    /// Whether delegated invocations require declared capability adoption
    /// when the chain does not specify strictness.
    pub strict_invocations: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            activity_grace_ms: 50,
            default_timeout_ms: None,
            strict_invocations: false,
        }
    }
}

impl DispatchConfig {
    /// Reads overrides from `RELAY_*` environment variables on top of the
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = read_env("RELAY_ACTIVITY_GRACE_MS") {
            config.activity_grace_ms = ms;
        }
        if let Some(ms) = read_env("RELAY_DEFAULT_TIMEOUT_MS") {
            config.default_timeout_ms = Some(ms);
        }
        if let Ok(strict) = std::env::var("RELAY_STRICT_INVOCATIONS") {
            config.strict_invocations = matches!(strict.as_str(), "1" | "true" | "yes");
        }
        config
    }

    pub fn activity_grace(&self) -> Duration {
        Duration::from_millis(self.activity_grace_ms)
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    /// Installs this configuration process-wide.
    pub fn install(self) {
        info!(
            activity_grace_ms = self.activity_grace_ms,
            default_timeout_ms = self.default_timeout_ms,
            strict_invocations = self.strict_invocations,
            "dispatch configuration installed"
        );
        *cell().write() = self;
    }

    /// The currently installed configuration.
    pub fn current() -> DispatchConfig {
        cell().read().clone()
    }
}

fn read_env(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_stable() {
        let config = DispatchConfig::default();
        assert_eq!(config.activity_grace(), Duration::from_millis(50));
        assert_eq!(config.default_timeout(), None);
        assert!(!config.strict_invocations);
    }

    #[test]
    fn install_replaces_the_current_configuration() {
        let config = DispatchConfig {
            activity_grace_ms: 75,
            ..DispatchConfig::default()
        };
        config.clone().install();
        assert_eq!(DispatchConfig::current(), config);
        DispatchConfig::default().install();
    }
}
