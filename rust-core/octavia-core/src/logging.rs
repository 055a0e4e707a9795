//! # Logging
//!
//! Subscriber setup and the logger capability used by the orchestrator.

use serde_json::Value;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            json: false,
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_tracing(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

/// Logging capability with a structured context
pub trait Logger: Send + Sync {
    /// Informational message
    fn info(&self, message: &str, context: &Value);
    /// Failure
    fn error(&self, message: &str, context: &Value);
    /// Unexpected but recoverable condition
    fn warning(&self, message: &str, context: &Value);
    /// Diagnostic detail
    fn debug(&self, message: &str, context: &Value);
}

/// Logger forwarding to `tracing` events
#[derive(Debug, Clone)]
pub struct TracingLogger {
    name: String,
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("octavia")
    }
}

impl TracingLogger {
    /// Logger tagging its events with `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Name attached to every event
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Logger for TracingLogger {
    fn info(&self, message: &str, context: &Value) {
        info!(logger = %self.name, context = %context, "{}", message);
    }

    fn error(&self, message: &str, context: &Value) {
        error!(logger = %self.name, context = %context, "{}", message);
    }

    fn warning(&self, message: &str, context: &Value) {
        warn!(logger = %self.name, context = %context, "{}", message);
    }

    fn debug(&self, message: &str, context: &Value) {
        debug!(logger = %self.name, context = %context, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, "debug");
        assert!(!config.json);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        let config = LogConfig::default();
        init_tracing(&config);
        assert!(!init_tracing(&config));
    }

    #[test]
    fn test_tracing_logger() {
        let logger = TracingLogger::new("router");
        assert_eq!(logger.name(), "router");
        logger.info("[GET] /", &json!({"request_id": "abc"}));
        logger.error("NOT_FOUND", &json!({}));
        logger.warning("slow", &Value::Null);
        logger.debug("detail", &json!([1, 2]));
    }
}
