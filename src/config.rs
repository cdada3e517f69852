//! Configuration loading and constants.
//!
//! Loads application configuration from TOML files and defines constants for
//! pagination, reply rendering, upload limits, profile storage, logging format,
//! and default paths. `AppConfig` is the root configuration struct containing all settings.

use const_format::formatcp;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// List View / Pagination Constants
// =============================================================================

/// Messages shown per page in the list view
pub const MESSAGES_PER_PAGE: usize = 10;

/// Pages always shown at the start and end of the page-button row
pub const PAGINATION_EDGE_PAGES: usize = 3;

/// Pages shown on each side of the current page
pub const PAGINATION_WINDOW: usize = 1;

// =============================================================================
// Template / Preview Constants
// =============================================================================

/// Maximum characters for a message preview (hard limit)
pub const PREVIEW_HARD_LIMIT: usize = 1024;

/// Default number of lines for preview filter
pub const DEFAULT_PREVIEW_LINES: usize = 10;

/// Default cap on reply indentation depth
pub const DEFAULT_REPLY_INDENT_CAP: usize = 6;

// Time unit constants (in seconds) for timeago filter
/// Seconds in a minute
pub const SECONDS_PER_MINUTE: i64 = 60;
/// Seconds in an hour
pub const SECONDS_PER_HOUR: i64 = 3600;
/// Seconds in a day
pub const SECONDS_PER_DAY: i64 = 86400;
/// Seconds in a 30-day month
pub const SECONDS_PER_MONTH: i64 = 2592000;
/// Seconds in a 365-day year
pub const SECONDS_PER_YEAR: i64 = 31536000;

/// Timestamp format used by the guestbook API
pub const API_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Upload Constants
// =============================================================================

/// Largest attachment the server accepts (100 MiB)
pub const MAX_ATTACHMENT_BYTES: u64 = 100 * 1024 * 1024;

/// Maximum length for message and reply content (characters)
pub const MAX_CONTENT_CHARS: usize = 64000;

/// File extensions accepted for image attachments
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// File extensions accepted for video attachments
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "webm"];

// =============================================================================
// API Constants
// =============================================================================

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

pub const USER_AGENT: &str = formatcp!("guestbook/{}", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default location of the local profile store
pub const DEFAULT_PROFILE_PATH: &str = "data/profile.json";

/// Key under which the user profile is kept in the profile store
pub const PROFILE_STORAGE_KEY: &str = "user_profile";

/// Default API base URL (the reference server listens on port 8000)
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default site title
pub const DEFAULT_SITE_NAME: &str = "Guestbook";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "guestbook=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// REST API connection settings
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ui: UiConfig,
    /// Background refresh settings
    #[serde(default)]
    pub polling: PollingConfig,
    /// Local profile storage
    #[serde(default)]
    pub profile: ProfileConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Guestbook REST API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the guestbook server (e.g. "http://127.0.0.1:8000")
    #[serde(default = "ApiConfig::default_base_url")]
    pub base_url: String,
    /// Whole-request timeout in seconds
    #[serde(default = "ApiConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Connection timeout in seconds
    #[serde(default = "ApiConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            request_timeout_seconds: Self::default_request_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
        }
    }
}

impl ApiConfig {
    fn default_base_url() -> String {
        DEFAULT_API_BASE_URL.to_string()
    }

    fn default_request_timeout() -> u64 {
        15
    }

    fn default_connect_timeout() -> u64 {
        5
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UiConfig {
    /// Site title shown in the list and detail headers
    #[serde(default = "UiConfig::default_site_name")]
    pub site_name: String,
    /// Replies nested deeper than this are drawn at this indent
    #[serde(default = "UiConfig::default_reply_indent_cap")]
    pub reply_indent_cap: usize,
    /// Lines of content shown per message in the list view
    #[serde(default = "UiConfig::default_preview_lines")]
    pub preview_lines: usize,
    /// Version string, populated at runtime
    #[serde(skip_deserializing, default = "UiConfig::default_version")]
    pub version: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            site_name: Self::default_site_name(),
            reply_indent_cap: Self::default_reply_indent_cap(),
            preview_lines: Self::default_preview_lines(),
            version: Self::default_version(),
        }
    }
}

impl UiConfig {
    fn default_site_name() -> String {
        DEFAULT_SITE_NAME.to_string()
    }

    fn default_reply_indent_cap() -> usize {
        DEFAULT_REPLY_INDENT_CAP
    }

    fn default_preview_lines() -> usize {
        DEFAULT_PREVIEW_LINES
    }

    fn default_version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Seconds between background refreshes of the message list (default: 30)
    #[serde(default = "PollingConfig::default_interval")]
    pub interval_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: Self::default_interval(),
        }
    }
}

impl PollingConfig {
    fn default_interval() -> u64 {
        30
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    /// Path of the JSON key-value file holding the user profile
    #[serde(default = "ProfileConfig::default_path")]
    pub path: PathBuf,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

impl ProfileConfig {
    fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_PROFILE_PATH)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    /// Whether structured JSON output was requested
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(contents)?;

        // Trailing slashes would double up when joining API paths
        let trimmed = config.api.base_url.trim_end_matches('/').to_string();
        config.api.base_url = trimmed;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let base = &self.api.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "api.base_url must start with http:// or https:// (got {:?})",
                base
            )));
        }
        if self.polling.interval_seconds == 0 {
            return Err(ConfigError::Validation(
                "polling.interval_seconds must be greater than zero".to_string(),
            ));
        }
        if self.api.request_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "api.request_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if !matches!(self.logging.format.to_ascii_lowercase().as_str(), "text" | "json") {
            return Err(ConfigError::Validation(format!(
                "logging.format must be \"text\" or \"json\" (got {:?})",
                self.logging.format
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.api.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.api.request_timeout_seconds, 15);
        assert_eq!(config.polling.interval_seconds, 30);
        assert_eq!(config.ui.reply_indent_cap, DEFAULT_REPLY_INDENT_CAP);
        assert_eq!(config.profile.path, PathBuf::from(DEFAULT_PROFILE_PATH));
        assert!(!config.logging.is_json());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = AppConfig::from_toml("[api]\nbase_url = \"https://board.example.com/\"\n").unwrap();
        assert_eq!(config.api.base_url, "https://board.example.com");
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let err = AppConfig::from_toml("[api]\nbase_url = \"ftp://example.com\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let err = AppConfig::from_toml("[polling]\ninterval_seconds = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let err = AppConfig::from_toml("[logging]\nformat = \"xml\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_json_log_format() {
        let config = AppConfig::from_toml("[logging]\nformat = \"JSON\"\n").unwrap();
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = AppConfig::from_toml("[api\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_user_agent_carries_version() {
        assert!(USER_AGENT.starts_with("guestbook/"));
        assert!(USER_AGENT.ends_with(env!("CARGO_PKG_VERSION")));
    }
}
