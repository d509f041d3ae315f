//! TOML configuration for the demo binary.
//!
//! The session section carries the broadcast descriptor that an external
//! API client would normally supply; the client section tunes timeouts and
//! the post-key endpoint.  Fields annotated with `#[serde(default = ...)]`
//! fall back to their defaults when absent, so a minimal file only needs
//! `[session]`:
//!
//! ```toml
//! [session]
//! broadcast_id = "lv123456789"
//! addr = "msg.live.example.jp"
//! port = 2805
//! thread = "1234567890"
//! user_id = 123456
//! is_premium = false
//! cookie = "user_session=..."
//!
//! [client]
//! first_get_comments = 100
//! connect_timeout_ms = 5000
//! post_timeout_ms = 3000
//! log_level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connection::ConnectOptions;
use crate::postkey::DEFAULT_POSTKEY_ENDPOINT;
use crate::session::SessionInfo;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Broadcast descriptor (normally supplied by the out-of-scope API).
    pub session: SessionInfo,
    #[serde(default)]
    pub client: ClientConfig,
}

/// Client tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Backlog comments requested on connect.
    #[serde(default = "default_first_get_comments")]
    pub first_get_comments: u32,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Post-result timeout in milliseconds.
    #[serde(default = "default_post_timeout_ms")]
    pub post_timeout_ms: u64,
    /// Post-key endpoint URL.
    #[serde(default = "default_postkey_endpoint")]
    pub postkey_endpoint: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_first_get_comments() -> u32 {
    100
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_post_timeout_ms() -> u64 {
    3000
}
fn default_postkey_endpoint() -> String {
    DEFAULT_POSTKEY_ENDPOINT.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            first_get_comments: default_first_get_comments(),
            connect_timeout_ms: default_connect_timeout_ms(),
            post_timeout_ms: default_post_timeout_ms(),
            postkey_endpoint: default_postkey_endpoint(),
            log_level: default_log_level(),
        }
    }
}

impl ClientConfig {
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            first_get_comments: self.first_get_comments,
            timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    pub fn post_timeout(&self) -> Duration {
        Duration::from_millis(self.post_timeout_ms)
    }
}

/// Loads the configuration from `path`.
///
/// Unlike an app-settings file there is no useful default here – the
/// session descriptor cannot be invented – so a missing file is an error.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures and
/// [`ConfigError::Parse`] for malformed TOML.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[session]
broadcast_id = "lv1"
addr = "127.0.0.1"
port = 2805
thread = "1000"
user_id = 42
is_premium = false
cookie = "user_session=x"
"#;

    #[test]
    fn test_minimal_config_uses_client_defaults() {
        let config: AppConfig = toml::from_str(MINIMAL).expect("deserialize minimal");
        assert_eq!(config.client.first_get_comments, 100);
        assert_eq!(config.client.connect_timeout_ms, 5000);
        assert_eq!(config.client.post_timeout_ms, 3000);
        assert_eq!(config.client.postkey_endpoint, DEFAULT_POSTKEY_ENDPOINT);
        assert_eq!(config.client.log_level, "info");
    }

    #[test]
    fn test_partial_client_section_overrides_defaults() {
        let text = format!("{MINIMAL}\n[client]\nconnect_timeout_ms = 9000\n");
        let config: AppConfig = toml::from_str(&text).expect("deserialize partial");
        assert_eq!(config.client.connect_timeout_ms, 9000);
        assert_eq!(config.client.post_timeout_ms, 3000);
    }

    #[test]
    fn test_connect_options_reflect_config() {
        let mut config = ClientConfig::default();
        config.first_get_comments = 25;
        config.connect_timeout_ms = 1234;

        let options = config.connect_options();
        assert_eq!(options.first_get_comments, 25);
        assert_eq!(options.timeout, Duration::from_millis(1234));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config: AppConfig = toml::from_str(MINIMAL).unwrap();
        let text = toml::to_string_pretty(&config).expect("serialize");
        let restored: AppConfig = toml::from_str(&text).expect("deserialize");
        assert_eq!(config, restored);
    }

    #[test]
    fn test_missing_session_section_is_a_parse_error() {
        let result: Result<AppConfig, toml::de::Error> = toml::from_str("[client]\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_missing_file_is_io_error() {
        let result = load_config(Path::new("/nonexistent/nicolive.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
