use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Environment variable consulted before `access_token` in the file.
pub const ACCESS_TOKEN_ENV: &str = "DRIVEFS_ACCESS_TOKEN";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    Ttl,
    Lru,
    None,
}

/// How to pick among several live objects sharing a name under one parent.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Whatever the store lists first. Not guaranteed stable.
    First,
    /// Lexicographically smallest object id.
    SmallestId,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid api_base_url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub access_token: Option<String>,
    pub root_id: String,
    pub cache_strategy: CacheStrategy,
    pub cache_ttl_seconds: u64,
    pub cache_lru_capacity: usize,
    /// Zero disables the background sweep.
    pub cache_sweep_seconds: u64,
    pub tie_break: TieBreak,
    pub request_timeout_seconds: u64,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com".to_string(),
            access_token: None,
            root_id: "root".to_string(),
            cache_strategy: CacheStrategy::Ttl,
            cache_ttl_seconds: 60,
            cache_lru_capacity: 1000,
            cache_sweep_seconds: 30,
            tie_break: TieBreak::First,
            request_timeout_seconds: 30,
            log_filter: "drivefs=info".to_string(),
        }
    }
}

impl Config {
    /// How long a resolved path stays trusted.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Period of the background purge of expired cache entries.
    ///
    /// # Returns
    /// `None` when `cache_sweep_seconds` is zero, meaning no sweeper thread.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.cache_sweep_seconds > 0).then(|| Duration::from_secs(self.cache_sweep_seconds))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Parses `api_base_url`.
    ///
    /// # Returns
    /// The parsed URL, or `ConfigError::InvalidUrl` when it does not parse.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Ok(Url::parse(&self.api_base_url)?)
    }

    /// The bearer token, environment first. Acquiring it is someone else's job.
    pub fn access_token(&self) -> Option<String> {
        std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty())
            .or_else(|| self.access_token.clone())
    }
}

/// Loads the configuration from `path`, or the defaults when the file does
/// not exist.
///
/// # Arguments
/// * `path` - Location of the TOML file.
///
/// # Returns
/// The parsed `Config`. A file that exists but does not parse, or names an
/// invalid base URL, is an error.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.base_url()?;
    Ok(config)
}
