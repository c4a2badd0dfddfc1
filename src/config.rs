use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
    time::Duration,
};

pub const CONFIG_ENV: &str = "HOUSE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/house.toml";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Configs {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub ingest: IngestConfig,
    pub aggregator: AggregatorConfig,
    pub persistence: PersistenceConfig,
    pub render: RenderConfig,
}

/// Where the loaded configuration came from. Reported once logging is up.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults(PathBuf),
}

impl Configs {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let config_content = fs::read_to_string(&path)?;
        let configs: Configs = toml::from_str(&config_content)?;
        configs.validate()?;
        Ok(configs)
    }

    /// Reads the file named by `HOUSE_CONFIG` (or the default path).
    /// A missing file yields the built-in defaults; a broken one is an error.
    pub fn load() -> Result<(Self, ConfigSource), Box<dyn std::error::Error>> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        if !path.exists() {
            return Ok((Self::default(), ConfigSource::Defaults(path)));
        }

        let configs = Self::load_from_file(&path)?;
        Ok((configs, ConfigSource::File(path)))
    }

    /// Sizes that drive loops and chunking must be positive.
    pub fn validate(&self) -> Result<(), String> {
        let sizes = [
            ("ingest.chunk_size", self.ingest.chunk_size),
            ("aggregator.max_items", self.aggregator.max_items),
            ("aggregator.max_lease", self.aggregator.max_lease),
            ("persistence.chunk_size", self.persistence.chunk_size),
        ];
        match sizes.iter().find(|(_, size)| *size == 0) {
            Some((name, _)) => Err(format!("{} must be greater than zero", name)),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 3030,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    /// Remote addresses allowed to submit readings. Empty allows everyone.
    pub allowed_addrs: Vec<IpAddr>,
    pub chunk_size: usize,
    /// Per-reading chance of kicking off a background drain after an ingest.
    pub consume_probability: f64,
}

impl IngestConfig {
    pub fn is_allowed(&self, addr: Option<IpAddr>) -> bool {
        if self.allowed_addrs.is_empty() {
            return true;
        }
        addr.map(|ip| self.allowed_addrs.contains(&ip))
            .unwrap_or(false)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            allowed_addrs: Vec::new(),
            chunk_size: 100,
            consume_probability: 0.01,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AggregatorConfig {
    pub max_items: usize,
    pub max_lease: usize,
    pub lease_timeout_seconds: u64,
    pub current_ttl_seconds: u64,
    pub history_ttl_seconds: u64,
    /// Zero disables the periodic drain.
    pub drain_interval_seconds: u64,
}

impl AggregatorConfig {
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_seconds)
    }

    pub fn current_ttl(&self) -> Duration {
        Duration::from_secs(self.current_ttl_seconds)
    }

    pub fn history_ttl(&self) -> Duration {
        Duration::from_secs(self.history_ttl_seconds)
    }

    pub fn drain_interval(&self) -> Option<Duration> {
        match self.drain_interval_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_items: 250,
            max_lease: 1000,
            lease_timeout_seconds: 60,
            current_ttl_seconds: 15 * 60,
            history_ttl_seconds: 24 * 60 * 60,
            drain_interval_seconds: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PersistenceConfig {
    pub enabled: bool,
    pub chunk_size: usize,
    pub mongodb_uri: String,
    pub database: String,
    pub collection: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            chunk_size: 100,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            database: "house".to_string(),
            collection: "readings".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConfig {
    pub layout: PathBuf,
    pub base_image: PathBuf,
    pub image_ttl_seconds: u64,
}

impl RenderConfig {
    pub fn image_ttl(&self) -> Duration {
        Duration::from_secs(self.image_ttl_seconds)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            layout: PathBuf::from("assets/house.json"),
            base_image: PathBuf::from("assets/house.png"),
            image_ttl_seconds: 5 * 60,
        }
    }
}
