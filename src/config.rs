//! Layered configuration for the Lines client.
//!
//! Settings are resolved in order: built-in defaults → `lines.toml` →
//! environment (`.env` honoured) → explicit overrides from the caller.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api]
//! base_url = "https://api.lines.news/api"
//! timeout_secs = 15
//!
//! [cache]
//! default_stale_secs = 60
//!
//! [cache.stale_secs]
//! articles = 120
//! categories = 600
//!
//! [auth]
//! token_path = "/home/me/.local/share/lines/tokens.json"
//! otp_validity_secs = 600
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

pub const CONFIG_FILE_NAME: &str = "lines.toml";

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    format!("lines-client/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// `[cache]` section. Stale times are keyed by query resource name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_stale_secs")]
    pub default_stale_secs: u64,
    #[serde(default)]
    pub stale_secs: HashMap<String, u64>,
}

fn default_stale_secs() -> u64 {
    60
}

/// Stale windows the pages have always used for their queries.
fn builtin_stale_secs() -> HashMap<String, u64> {
    [
        ("articles", 120),
        ("article", 120),
        ("categories", 600),
        ("trending-articles", 300),
        ("aiml-news", 120),
        ("aiml-article", 300),
        ("aiml-categories", 600),
        ("aiml-trending", 300),
        ("aiml-topics", 600),
        ("timesaver-content", 60),
        ("timesaver-stats", 120),
        ("content-group", 120),
        ("timesaver-item", 120),
        ("user-dashboard", 300),
        ("favorites-stats", 300),
        ("unread-notifications", 60),
        ("home-articles", 300),
        ("home-aiml", 300),
        ("home-timesaver", 300),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            default_stale_secs: default_stale_secs(),
            stale_secs: builtin_stale_secs(),
        }
    }
}

/// `[auth]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub token_path: Option<PathBuf>,
    /// Fallback OTP validity when the server does not state one.
    #[serde(default = "default_otp_validity_secs")]
    pub otp_validity_secs: u64,
}

fn default_otp_validity_secs() -> u64 {
    600
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            token_path: None,
            otp_validity_secs: default_otp_validity_secs(),
        }
    }
}

/// The complete `lines.toml` structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub auth: AuthSection,
}

impl ClientConfig {
    /// Parse configuration from a TOML string. Stale-time entries in the
    /// file are merged over the built-in ones.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config: ClientConfig =
            toml::from_str(content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let mut merged = builtin_stale_secs();
        merged.extend(config.cache.stale_secs.drain());
        config.cache.stale_secs = merged;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Resolve the full layered configuration for a working directory:
    /// `<dir>/lines.toml` when present, then `.env` and process environment.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = dir.join(CONFIG_FILE_NAME);
        let config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides through an injectable lookup.
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("LINES_API_URL") {
            self.api.base_url = url;
        }
        if let Some(raw) = lookup("LINES_TIMEOUT_SECS") {
            self.api.timeout_secs =
                raw.trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        key: "LINES_TIMEOUT_SECS".to_string(),
                        message: e.to_string(),
                    })?;
        }
        if let Some(path) = lookup("LINES_TOKEN_PATH") {
            self.auth.token_path = Some(PathBuf::from(path));
        }
        self.validate()?;
        Ok(self)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.auth.token_path = Some(path.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Where tokens persist between runs: the configured path, else the
    /// platform data directory, else `.lines/tokens.json`.
    pub fn token_path(&self) -> PathBuf {
        if let Some(path) = &self.auth.token_path {
            return path.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("lines").join("tokens.json"))
            .unwrap_or_else(|| PathBuf::from(".lines/tokens.json"))
    }

    /// Stale window for a query resource name.
    pub fn stale_time(&self, resource: &str) -> Duration {
        let secs = self
            .cache
            .stale_secs
            .get(resource)
            .copied()
            .unwrap_or(self.cache.default_stale_secs);
        Duration::from_secs(secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "api.base_url".to_string(),
                message: format!("'{}' must start with http:// or https://", url),
            });
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_use_builtin_stale_times() {
        let config = ClientConfig::default();
        assert_eq!(config.stale_time("articles"), Duration::from_secs(120));
        assert_eq!(config.stale_time("categories"), Duration::from_secs(600));
        assert_eq!(config.stale_time("timesaver-content"), Duration::from_secs(60));
        assert_eq!(config.stale_time("unknown"), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_merges_file_stale_times_over_builtin() {
        let toml = r#"
[api]
base_url = "https://api.example.com"

[cache]
default_stale_secs = 30

[cache.stale_secs]
articles = 5
"#;
        let config = ClientConfig::parse(toml, Path::new("lines.toml")).unwrap();
        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.api.timeout_secs, 15);
        assert_eq!(config.stale_time("articles"), Duration::from_secs(5));
        assert_eq!(config.stale_time("categories"), Duration::from_secs(600));
        assert_eq!(config.stale_time("other"), Duration::from_secs(30));
    }

    #[test]
    fn test_parse_error_names_path() {
        let err = ClientConfig::parse("[api\nbase_url=", Path::new("/etc/lines.toml")).unwrap_err();
        assert!(err.to_string().contains("/etc/lines.toml"));
    }

    #[test]
    fn test_env_overrides_file() {
        let config = ClientConfig::default()
            .apply_env_with(|key| match key {
                "LINES_API_URL" => Some("https://override.example.com/api".to_string()),
                "LINES_TIMEOUT_SECS" => Some("3".to_string()),
                "LINES_TOKEN_PATH" => Some("/tmp/lines-tokens.json".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.api.base_url, "https://override.example.com/api");
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.token_path(), PathBuf::from("/tmp/lines-tokens.json"));
    }

    #[test]
    fn test_invalid_timeout_env_is_rejected() {
        let err = ClientConfig::default()
            .apply_env_with(|key| (key == "LINES_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_non_http_base_url_is_rejected() {
        let err = ClientConfig::default()
            .with_base_url("ftp://nope")
            .apply_env_with(no_env)
            .unwrap_err();
        assert!(err.to_string().contains("api.base_url"));
    }

    #[test]
    fn test_load_reads_lines_toml_from_dir() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[auth]\notp_validity_secs = 300\n",
        )
        .unwrap();
        let config = ClientConfig::from_file(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config.auth.otp_validity_secs, 300);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempdir().unwrap();
        let err = ClientConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
