//! Structured logging setup.

use tracing::Span;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LogLevel, McpConfig};
use crate::error::{McpError, Result};

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, takes precedence over `level`. Fails if a global
/// subscriber is already installed.
pub fn init(level: LogLevel, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_tracing().as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Text => builder.try_init(),
    };

    installed.map_err(|e| McpError::Internal(format!("failed to install logger: {}", e)))
}

/// Install the global subscriber from server configuration.
pub fn init_from_config(config: &McpConfig) -> Result<()> {
    init(config.log_level, config.log_format)
}

/// A span carrying request context; enter it around request handling so
/// every event logged inside carries the ids.
pub fn request_span(request_id: &str, user_id: Option<&str>) -> Span {
    match user_id {
        Some(user_id) => tracing::info_span!("request", request_id = %request_id, user_id = %user_id),
        None => tracing::info_span!("request", request_id = %request_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_error() {
        // Whichever call wins installs the subscriber; the other must fail cleanly.
        let first = init(LogLevel::Debug, LogFormat::Text);
        let second = init(LogLevel::Info, LogFormat::Json);
        assert!(first.is_err() || second.is_err());
    }

    #[test]
    fn test_request_span_enters() {
        let span = request_span("req-1", Some("user-7"));
        let _guard = span.enter();
        tracing::info!("inside request");
    }
}
