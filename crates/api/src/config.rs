use bloch_events::queue::{DEFAULT_EMIT_TIMEOUT, DEFAULT_MAX_IN_FLIGHT, DEFAULT_QUEUE_CAPACITY};

use crate::auth::jwt::JwtConfig;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines (default).
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parse `LOG_FORMAT`; anything other than `json` is [`LogFormat::Pretty`].
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for the notification worker (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Capacity of the notification hand-off queue (default: `1024`).
    pub notification_queue_capacity: usize,
    /// Emissions the worker runs concurrently (default: `64`).
    pub notification_max_in_flight: usize,
    /// Upper bound on one emission in seconds (default: `30`).
    pub notification_emit_timeout_secs: u64,
    /// Seconds between WebSocket pings (default: `30`).
    pub heartbeat_interval_secs: u64,
    pub log_format: LogFormat,
    /// JWT validation settings.
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                    |
    /// |-------------------------------|----------------------------|
    /// | `HOST`                        | `0.0.0.0`                  |
    /// | `PORT`                        | `3000`                     |
    /// | `CORS_ORIGINS`                | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`       | `30`                       |
    /// | `NOTIFICATION_QUEUE_CAPACITY` | `1024`                     |
    /// | `NOTIFICATION_MAX_IN_FLIGHT`  | `64`                       |
    /// | `NOTIFICATION_EMIT_TIMEOUT_SECS` | `30`                    |
    /// | `HEARTBEAT_INTERVAL_SECS`     | `30`                       |
    /// | `LOG_FORMAT`                  | `pretty`                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = parse_cors_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let notification_queue_capacity: usize = std::env::var("NOTIFICATION_QUEUE_CAPACITY")
            .unwrap_or_else(|_| DEFAULT_QUEUE_CAPACITY.to_string())
            .parse()
            .expect("NOTIFICATION_QUEUE_CAPACITY must be a valid usize");

        let notification_max_in_flight: usize = std::env::var("NOTIFICATION_MAX_IN_FLIGHT")
            .unwrap_or_else(|_| DEFAULT_MAX_IN_FLIGHT.to_string())
            .parse()
            .expect("NOTIFICATION_MAX_IN_FLIGHT must be a valid usize");

        let notification_emit_timeout_secs: u64 = std::env::var("NOTIFICATION_EMIT_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_EMIT_TIMEOUT.as_secs().to_string())
            .parse()
            .expect("NOTIFICATION_EMIT_TIMEOUT_SECS must be a valid u64");

        let heartbeat_interval_secs: u64 = std::env::var("HEARTBEAT_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("HEARTBEAT_INTERVAL_SECS must be a valid u64");

        let log_format = LogFormat::parse(&std::env::var("LOG_FORMAT").unwrap_or_default());

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            notification_queue_capacity,
            notification_max_in_flight,
            notification_emit_timeout_secs,
            heartbeat_interval_secs,
            log_format,
            jwt,
        }
    }
}

/// Split a comma-separated origin list, dropping blanks.
pub fn parse_cors_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_origins_are_trimmed_and_blanks_dropped() {
        assert_eq!(
            parse_cors_origins(" http://a.test , ,http://b.test,"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert!(parse_cors_origins("").is_empty());
    }

    #[test]
    fn log_format_defaults_to_pretty() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" json "), LogFormat::Json);
        assert_eq!(LogFormat::parse(""), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Pretty);
    }
}
