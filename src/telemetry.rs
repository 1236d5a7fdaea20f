//! Process-global tracing initialization.

use std::sync::OnceLock;

use thiserror::Error;

static INIT: OnceLock<()> = OnceLock::new();

#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to install global tracing subscriber: {0}")]
    SubscriberInstall(String),
}

/// Installs a `tracing-subscriber` `fmt` layer driven by `RUST_LOG`, defaulting to
/// `info` when unset. Idempotent: subsequent calls are no-ops, so a host embedding
/// this crate alongside its own tracing setup can call this safely without
/// double-initializing.
pub fn init_tracing() -> Result<(), TelemetryInitError> {
    let mut result = Ok(());
    INIT.get_or_init(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        result = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| TelemetryInitError::SubscriberInstall(err.to_string()));
    });
    result
}

/// Truncates long strings for log lines, e.g. rendered prompts or trajectories.
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len).collect();
        format!("{truncated}…")
    }
}
