use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatch::DEFAULT_DISCOVERY_TIMEOUT;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/maps.sqlite")
}

/// Where `mapctl upload` sends maps in remote mode.
///
/// Remote mode needs both a `name` and an `endpoint`; otherwise uploads are
/// committed directly into `[db]`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            endpoint: None,
            discovery_timeout_secs: default_discovery_timeout_secs(),
        }
    }
}

fn default_discovery_timeout_secs() -> u64 {
    DEFAULT_DISCOVERY_TIMEOUT.as_secs()
}

impl ServiceConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            service_name: default_service_name(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

fn default_service_name() -> String {
    "map_manager".to_string()
}

impl Config {
    /// Defaults for running without a config file: direct uploads into
    /// `./data/maps.sqlite`.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig::default(),
            service: ServiceConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_minimal(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::minimal())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    if config.service.discovery_timeout_secs == 0 {
        anyhow::bail!("service.discovery_timeout_secs must be > 0");
    }

    if let Some(endpoint) = &config.service.endpoint {
        let url = reqwest::Url::parse(endpoint)
            .with_context(|| format!("service.endpoint is not a valid URL: '{}'", endpoint))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!(
                "service.endpoint must use http or https, got '{}'",
                url.scheme()
            );
        }
    }

    let name = &config.server.service_name;
    if name.is_empty() || name.contains('/') {
        anyhow::bail!("server.service_name must be a non-empty path segment");
    }

    Ok(())
}
