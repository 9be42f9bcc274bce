//! Application configuration loaded from environment variables.

use std::time::Duration;

use engine::EngineConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset runs on the in-memory ledger
/// - `SWEEP_INTERVAL_SECS`: expiry sweep period (default: `30`)
/// - `HOLD_SECONDS`, `MAX_HOLD_SECONDS`, `MAX_TICKETS_PER_HOLD`,
///   `MAX_TIER_CAPACITY`: engine limits
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub sweep_interval: Duration,
    pub engine: EngineConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Unparseable numeric values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let engine_defaults = defaults.engine.clone();

        let number = |key: &str, default: u64| -> u64 {
            lookup(key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            sweep_interval: Duration::from_secs(
                number("SWEEP_INTERVAL_SECS", defaults.sweep_interval.as_secs()).max(1),
            ),
            engine: EngineConfig {
                default_hold_seconds: number("HOLD_SECONDS", engine_defaults.default_hold_seconds),
                max_hold_seconds: number("MAX_HOLD_SECONDS", engine_defaults.max_hold_seconds),
                max_tickets_per_hold: lookup("MAX_TICKETS_PER_HOLD")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(engine_defaults.max_tickets_per_hold),
                max_tier_capacity: lookup("MAX_TIER_CAPACITY")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(engine_defaults.max_tier_capacity),
                ..engine_defaults
            },
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            sweep_interval: Duration::from_secs(30),
            engine: EngineConfig::default(),
        }
    }
}
