//! Configuration management for the news notifier.
//!
//! Configuration is read from `~/.config/life-news/config.toml` unless a path
//! is given on the command line. If the default file doesn't exist, one with
//! comments is created. Environment variables override the file so secrets
//! never have to live on disk.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::{default_sources, NewsSource};
use crate::fetcher::http_fetcher::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::fetcher::parallel::DEFAULT_WORKERS;
use crate::push::{VapidKeys, VAPID_PRIVATE_KEY_ENV, VAPID_PUBLIC_KEY_ENV, VAPID_SUBJECT_ENV};

pub const DATABASE_URL_ENV: &str = "NEWS_DATABASE_URL";
pub const CRON_SECRET_ENV: &str = "NEWS_NOTIFICATIONS_CRON_SECRET";
pub const BIND_ADDRESS_ENV: &str = "NEWS_BIND_ADDRESS";
pub const PORT_ENV: &str = "NEWS_PORT";

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub fetch: FetchConfig,
    pub retention: RetentionConfig,
    pub notifications: NotificationConfig,
    pub sources: Vec<NewsSource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            fetch: FetchConfig::default(),
            retention: RetentionConfig::default(),
            notifications: NotificationConfig::default(),
            sources: default_sources(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// File path or `sqlite:`/`file:` url. Falls back to the user data dir.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub workers: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            workers: DEFAULT_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub notified_item_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            notified_item_days: 30,
        }
    }
}

/// Push signing identity and the cron secret. Usually supplied through the
/// environment.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub vapid_public_key: Option<String>,
    pub vapid_private_key: Option<String>,
    pub subject: Option<String>,
    pub cron_secret: Option<String>,
}

impl std::fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("NotificationConfig")
            .field("vapid_public_key", &self.vapid_public_key)
            .field("vapid_private_key", &redacted(&self.vapid_private_key))
            .field("subject", &self.subject)
            .field("cron_secret", &redacted(&self.cron_secret))
            .finish()
    }
}

impl NotificationConfig {
    /// All three VAPID values, when every one of them is present.
    pub fn vapid_keys(&self) -> Option<VapidKeys> {
        match (&self.vapid_public_key, &self.vapid_private_key, &self.subject) {
            (Some(public_key), Some(private_key), Some(subject)) => {
                Some(VapidKeys::new(public_key, private_key, subject))
            }
            _ => None,
        }
    }
}

impl Config {
    /// Load configuration from the default path, then apply the environment.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, which must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Overrides file values with non-empty variables from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = read(DATABASE_URL_ENV) {
            self.database.path = Some(url);
        }
        if let Some(key) = read(VAPID_PUBLIC_KEY_ENV) {
            self.notifications.vapid_public_key = Some(key);
        }
        if let Some(key) = read(VAPID_PRIVATE_KEY_ENV) {
            self.notifications.vapid_private_key = Some(key);
        }
        if let Some(subject) = read(VAPID_SUBJECT_ENV) {
            self.notifications.subject = Some(subject);
        }
        if let Some(secret) = read(CRON_SECRET_ENV) {
            self.notifications.cron_secret = Some(secret);
        }
        if let Some(address) = read(BIND_ADDRESS_ENV) {
            self.server.bind_address = address;
        }
        if let Some(port) = read(PORT_ENV) {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: PORT_ENV.to_string(),
                value: port,
            })?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.retention.notified_item_days < 1 {
            return Err(ConfigError::Invalid(
                "retention.notified_item_days must be at least 1".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate source id: {}",
                    source.id
                )));
            }
            url::Url::parse(&source.url).map_err(|e| {
                ConfigError::Invalid(format!("source {} has an invalid url: {}", source.id, e))
            })?;
        }

        Ok(())
    }

    /// Database location, defaulting to `<data dir>/life-news/life-news.db`.
    pub fn database_location(&self) -> Result<String, ConfigError> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
        Ok(data_dir
            .join("life-news")
            .join("life-news.db")
            .to_string_lossy()
            .into_owned())
    }

    /// Get the default config file path: `~/.config/life-news/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("life-news").join("config.toml"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        tracing::info!(path = %path.display(), "Created default config file");
        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# life-news configuration
#
# Secrets are better kept in the environment (or a .env file):
#   NEWS_NOTIFICATIONS_VAPID_PUBLIC_KEY, NEWS_NOTIFICATIONS_VAPID_PRIVATE_KEY,
#   NEWS_NOTIFICATIONS_SUBJECT, NEWS_NOTIFICATIONS_CRON_SECRET
# NEWS_DATABASE_URL, NEWS_BIND_ADDRESS and NEWS_PORT override the values below.

[server]
bind_address = "127.0.0.1"
port = 3000

[database]
# SQLite file. Defaults to the user data directory when unset.
# path = "/var/lib/life-news/life-news.db"

[fetch]
# Per-source request timeout in seconds
timeout_secs = 10
user_agent = "life-news-aggregator/1.0"
# Maximum feeds fetched at once
workers = 10

[retention]
# Notified item records older than this are removed by `cleanup`
notified_item_days = 30

[[sources]]
id = "zenn"
name = "Zenn"
url = "https://zenn.dev/feed"
type = "rss"

[[sources]]
id = "ai-news"
name = "AI News"
url = "https://ai-news.dev/feeds/"
type = "rss"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for crate::app::NewsError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeedType;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.fetch.user_agent, "life-news-aggregator/1.0");
        assert_eq!(config.retention.notified_item_days, 30);
        assert_eq!(config.sources, default_sources());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[server]
port = 8080

[[sources]]
id = "atom"
name = "Atom Blog"
url = "https://blog.example.com/atom.xml"
type = "atom"
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.fetch.workers, DEFAULT_WORKERS);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].feed_type, FeedType::Atom);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config.sources.len(), 2);
        assert!(config.database.path.is_none());
        assert!(config.notifications.vapid_keys().is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut vars = HashMap::new();
        vars.insert(DATABASE_URL_ENV, "sqlite::memory:");
        vars.insert(VAPID_PUBLIC_KEY_ENV, "pub");
        vars.insert(VAPID_PRIVATE_KEY_ENV, "priv");
        vars.insert(VAPID_SUBJECT_ENV, "mailto:ops@example.com");
        vars.insert(CRON_SECRET_ENV, "s3cret");
        vars.insert(PORT_ENV, "9000");
        vars.insert(BIND_ADDRESS_ENV, "");

        let mut config = Config::default();
        config
            .apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.path.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.notifications.cron_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(
            config.notifications.vapid_keys(),
            Some(VapidKeys::new("pub", "priv", "mailto:ops@example.com"))
        );
    }

    #[test]
    fn test_invalid_port_env() {
        let mut config = Config::default();
        let err = config
            .apply_env(|name| (name == PORT_ENV).then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_validate_rejects_duplicate_sources() {
        let mut config = Config::default();
        config.sources.push(config.sources[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_bad_source_url() {
        let mut config = Config::default();
        config.sources = vec![NewsSource::new("bad", "Bad", "not a url", FeedType::Rss)];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_create_and_read_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::create_default_config(&path).unwrap();
        let config = Config::read_file(&path).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.server.addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_parse_error_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server\nport = ").unwrap();

        let err = Config::read_file(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let notifications = NotificationConfig {
            vapid_private_key: Some("private-value".into()),
            cron_secret: Some("secret-value".into()),
            ..NotificationConfig::default()
        };
        let debug = format!("{:?}", notifications);
        assert!(!debug.contains("private-value"));
        assert!(!debug.contains("secret-value"));
    }
}
