//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via SCOUTSYNC_CONFIG)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Remote store configuration.
    pub remote: RemoteConfigSection,
    /// Local cache configuration.
    pub cache: CacheConfig,
    /// Record categories served by this deployment.
    pub categories: Vec<CategoryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            remote: RemoteConfigSection::default(),
            cache: CacheConfig::default(),
            categories: CategoryConfig::defaults(),
        }
    }
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("SCOUTSYNC_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.remote.apply_env_overrides();
        self.cache.apply_env_overrides();
    }

    /// Validates cross-section constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.categories.is_empty() {
            return Err(ConfigError::ValidationError(
                "no record categories configured".to_string(),
            ));
        }
        for category in &self.categories {
            if category.tag.chars().count() != 1 {
                return Err(ConfigError::ValidationError(format!(
                    "category '{}' has tag '{}', expected a single character",
                    category.name, category.tag
                )));
            }
            if category.key_fields.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "category '{}' has no key fields",
                    category.name
                )));
            }
        }
        Ok(())
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections. Bounded by physical tablets, so low.
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", scoutsync_protocol::DEFAULT_PORT)
                .parse()
                .unwrap(),
            max_connections: 16,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("SCOUTSYNC_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }

        if let Ok(max) = std::env::var("SCOUTSYNC_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse() {
                self.max_connections = n;
            }
        }
    }
}

/// Remote store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfigSection {
    /// Base URL of the remote authoritative store.
    pub base_url: String,
    /// Event name; prefixes remote paths and names the cache subdirectory.
    pub event: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Retry budget per remote operation.
    pub attempts: u32,
}

impl Default for RemoteConfigSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            event: "practice".to_string(),
            request_timeout_secs: 10,
            attempts: 3,
        }
    }
}

impl RemoteConfigSection {
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SCOUTSYNC_REMOTE_URL") {
            self.base_url = url;
        }

        if let Ok(event) = std::env::var("SCOUTSYNC_EVENT") {
            self.event = event;
        }

        if let Ok(timeout) = std::env::var("SCOUTSYNC_REMOTE_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.request_timeout_secs = secs;
            }
        }

        if let Ok(attempts) = std::env::var("SCOUTSYNC_REMOTE_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.attempts = n;
            }
        }
    }

    /// Returns the per-request timeout as Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Local cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root directory; each event caches under its own subdirectory.
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./cache"),
        }
    }
}

impl CacheConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("SCOUTSYNC_CACHE_DIR") {
            self.dir = PathBuf::from(dir);
        }
    }

    /// Returns the cache root for an event.
    pub fn root_for(&self, event: &str) -> PathBuf {
        self.dir.join(event)
    }
}

/// One record category: wire tag, storage location, key derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Single-character wire tag.
    pub tag: String,
    /// Category name; keys the full-sync reply.
    pub name: String,
    /// Cache/remote location, defaults to the name.
    #[serde(default)]
    pub location: Option<String>,
    /// Record fields whose values are joined to derive the storage key.
    pub key_fields: Vec<String>,
}

impl CategoryConfig {
    /// The scouting deployment defaults.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                tag: "M".to_string(),
                name: "match".to_string(),
                location: None,
                key_fields: vec!["match".to_string(), "team".to_string()],
            },
            Self {
                tag: "S".to_string(),
                name: "super".to_string(),
                location: None,
                key_fields: vec!["match".to_string(), "team".to_string()],
            },
            Self {
                tag: "P".to_string(),
                name: "pit".to_string(),
                location: None,
                key_fields: vec!["team".to_string()],
            },
            Self {
                tag: "F".to_string(),
                name: "feedback".to_string(),
                location: None,
                key_fields: vec!["id".to_string()],
            },
        ]
    }

    /// Returns the effective location.
    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or(&self.name)
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Custom serde module for SocketAddr (to handle as string in YAML).
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
