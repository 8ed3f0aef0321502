//! Server configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Configuration that could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `LISTEN_ADDR` is set but is not a socket address.
    #[error("invalid LISTEN_ADDR {value:?}: {source}")]
    ListenAddr {
        /// Raw value.
        value: String,
        /// Parser error.
        source: std::net::AddrParseError,
    },

    /// `ASSETS_PREFIX` is not a plain absolute path.
    #[error("ASSETS_PREFIX must start with '/' and hold no '{{', '}}' or '*', got {0:?}")]
    AssetsPrefix(String),
}

/// Top-level server configuration.
///
/// Loaded once at startup via [`GuiConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GuiConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8000`).
    pub listen_addr: SocketAddr,

    /// Directory served as static files. `None` disables mounting.
    pub assets_dir: Option<PathBuf>,

    /// URL prefix the static files are mounted under.
    pub assets_prefix: String,

    /// Timeout applied to action and page requests. The stream socket is
    /// not subject to it.
    pub request_timeout: Duration,

    /// Tracing output format.
    pub log_format: LogFormat,
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            assets_dir: None,
            assets_prefix: "/dist".to_string(),
            request_timeout: Duration::from_secs(30),
            log_format: LogFormat::Text,
        }
    }
}

impl GuiConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `LISTEN_ADDR` is set but cannot be
    /// parsed, or if `ASSETS_PREFIX` is not a plain absolute path.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(value) => value
                .parse()
                .map_err(|source| ConfigError::ListenAddr { value, source })?,
            Err(_) => defaults.listen_addr,
        };

        let assets_dir = std::env::var("ASSETS_DIR")
            .ok()
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        let assets_prefix = std::env::var("ASSETS_PREFIX").unwrap_or(defaults.assets_prefix);
        if !is_plain_prefix(&assets_prefix) {
            return Err(ConfigError::AssetsPrefix(assets_prefix));
        }

        let request_timeout = Duration::from_secs(parse_env(
            "REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        ));

        let log_format = parse_log_format(std::env::var("LOG_FORMAT").ok().as_deref());

        Ok(Self {
            listen_addr,
            assets_dir,
            assets_prefix,
            request_timeout,
            log_format,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// A static-file prefix is absolute and carries no route placeholders.
fn is_plain_prefix(prefix: &str) -> bool {
    prefix.starts_with('/') && !prefix.contains(['{', '}', '*'])
}

/// Accepts `json` (case-insensitive); anything else means text.
fn parse_log_format(value: Option<&str>) -> LogFormat {
    match value {
        Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = GuiConfig::default();
        assert_eq!(config.listen_addr.port(), 8000);
        assert_eq!(config.assets_prefix, "/dist");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.assets_dir.is_none());
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(parse_log_format(Some("JSON")), LogFormat::Json);
        assert_eq!(parse_log_format(Some("text")), LogFormat::Text);
        assert_eq!(parse_log_format(Some("yaml")), LogFormat::Text);
        assert_eq!(parse_log_format(None), LogFormat::Text);
    }

    #[test]
    fn assets_prefix_must_be_plain() {
        assert!(is_plain_prefix("/dist"));
        assert!(is_plain_prefix("/"));
        assert!(!is_plain_prefix("dist"));
        assert!(!is_plain_prefix("/dist/{file}"));
        assert!(!is_plain_prefix("/dist/*"));
    }

    #[test]
    fn parse_env_falls_back_on_missing_keys() {
        assert_eq!(parse_env("GUIAPI_TEST_SURELY_UNSET", 7_u64), 7);
    }
}
