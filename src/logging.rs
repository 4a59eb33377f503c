//! Console logging initialization for binaries and tests.
//!
//! The library itself only emits `tracing` events; embedding applications
//! own the subscriber. This helper installs a console subscriber driven by
//! `RELAY_LOG` (falling back to `RUST_LOG`, then `info`), and is safe to
//! call more than once.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Installs the console subscriber once per process.
pub fn init_logging() {
    INITIALIZED.get_or_init(|| {
        let filter = std::env::var("RELAY_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_target(true)
            .try_init();
    });
}
