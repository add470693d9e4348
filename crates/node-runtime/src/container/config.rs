//! # Node Configuration
//!
//! One TOML file holds every runtime setting. The file is created with
//! defaults when missing; keys absent from an existing file take their
//! defaults. The teardown peer snapshot is written back to the same file.
//!
//! ```toml
//! [network]
//! port = 6870
//! connection_low = 100
//! connection_high = 200
//! seeds = ["203.0.113.7:6870"]
//! peers = []
//!
//! [database]
//! storage_path = "database/"
//!
//! [security]
//! proofofwork_level = 24
//! min_accepted_difficulty = 0
//!
//! [logging]
//! level = "info"
//! file = "dforum.log"
//! ```
//!
//! ## Environment overrides
//!
//! `DFORUM_PORT`, `DFORUM_DB_PATH` and `DFORUM_POW_LEVEL` replace the file
//! values for the running process only. They are never written back.

use std::fs;
use std::path::{Path, PathBuf};

use df_01_content_model::ProofOfWorkConfig;
use df_03_gossip::{GossipConfig, GossipError, PeerAddressStore};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::adapters::TcpNetworkConfig;

/// File name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "dforum.toml";

pub const ENV_PORT: &str = "DFORUM_PORT";
pub const ENV_DB_PATH: &str = "DFORUM_DB_PATH";
pub const ENV_POW_LEVEL: &str = "DFORUM_POW_LEVEL";

/// Base difficulty of the coarse proof-of-work levels.
const POW_LEVEL_BASE: i64 = 16;
/// Difficulty added per level.
const POW_LEVEL_STEP: i64 = 4;
const MAX_POW_LEVEL: i64 = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("failed to serialize config: {0}")]
    Serialize(String),
}

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// TCP listening port.
    pub port: u16,
    /// Low connection watermark.
    pub connection_low: usize,
    /// High connection watermark. The peer table never grows past it.
    pub connection_high: usize,
    /// Bootstrap addresses (`ip:port`).
    pub seeds: Vec<String>,
    /// Peers known from the previous run, rewritten at teardown.
    pub peers: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: 6870,
            connection_low: 100,
            connection_high: 200,
            seeds: Vec::new(),
            peers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory of the persistent store. Always ends in `/`.
    pub storage_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            storage_path: "database/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Difficulty used when stamping local nodes. Values outside [16, 28]
    /// fall back to 24.
    pub proofofwork_level: i64,
    /// Lowest difficulty accepted on received nodes. 0 trusts the
    /// difficulty each node declares.
    pub min_accepted_difficulty: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            proofofwork_level: 24,
            min_accepted_difficulty: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive. `RUST_LOG` takes precedence.
    pub level: String,
    /// Log file, truncated at start. Empty disables file output.
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: "dforum.log".to_string(),
        }
    }
}

impl NodeConfig {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Copy with the process environment applied on top.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Copy with overrides taken from `lookup`. Unparsable values are
    /// ignored with a warning.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(port) = lookup(ENV_PORT) {
            match port.parse() {
                Ok(port) => self.network.port = port,
                Err(_) => warn!(value = %port, "DFORUM_PORT is not a valid port, ignored"),
            }
        }
        if let Some(path) = lookup(ENV_DB_PATH) {
            if !path.is_empty() {
                self.database.storage_path = with_trailing_slash(path);
            }
        }
        if let Some(level) = lookup(ENV_POW_LEVEL) {
            match level.parse() {
                Ok(level) => self.security.proofofwork_level = level,
                Err(_) => warn!(value = %level, "DFORUM_POW_LEVEL is not a number, ignored"),
            }
        }
        self
    }

    /// Apply the settings-page update.
    ///
    /// `pow_level` in `0..=3` selects difficulty `16 + 4 * level`; any other
    /// value leaves the difficulty alone. An empty `db_path` keeps the
    /// current path.
    pub fn update(&mut self, db_path: &str, min_conn: usize, max_conn: usize, pow_level: i64) {
        if !db_path.is_empty() {
            self.database.storage_path = with_trailing_slash(db_path.to_string());
        }
        if (0..=MAX_POW_LEVEL).contains(&pow_level) {
            self.security.proofofwork_level = POW_LEVEL_BASE + pow_level * POW_LEVEL_STEP;
        }
        self.network.connection_low = min_conn;
        self.network.connection_high = max_conn;
    }

    pub fn proof_of_work(&self) -> ProofOfWorkConfig {
        ProofOfWorkConfig::with_difficulty(self.security.proofofwork_level)
    }

    pub fn gossip(&self) -> GossipConfig {
        GossipConfig {
            min_accepted_difficulty: self.security.min_accepted_difficulty,
            ..GossipConfig::default()
        }
    }

    /// Transport settings: all interfaces on the configured port.
    pub fn peer_network(&self) -> TcpNetworkConfig {
        TcpNetworkConfig {
            listen_port: self.network.port,
            connection_high: self.network.connection_high,
            ..TcpNetworkConfig::default()
        }
    }

    /// Seeds followed by the peers remembered from the previous run.
    pub fn bootstrap_addresses(&self) -> Vec<String> {
        self.network
            .seeds
            .iter()
            .chain(self.network.peers.iter())
            .cloned()
            .collect()
    }
}

fn with_trailing_slash(mut path: String) -> String {
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

/// The configuration file on disk and its last loaded contents.
pub struct ConfigStore {
    path: PathBuf,
    config: RwLock<NodeConfig>,
}

impl ConfigStore {
    /// Load `path`, creating it with defaults when it does not exist.
    ///
    /// The file is rewritten after loading so that keys it lacked appear
    /// with their defaults. A file that exists but does not parse is an
    /// error.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let config = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            NodeConfig::from_toml(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            info!(path = %path.display(), "creating new config file");
            NodeConfig::default()
        };

        let store = Self {
            path,
            config: RwLock::new(config),
        };
        store.save()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> NodeConfig {
        self.config.read().clone()
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let content = self.config.read().to_toml()?;
        fs::write(&self.path, content).map_err(|e| ConfigError::Io {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// [`NodeConfig::update`] followed by a save.
    pub fn update(
        &self,
        db_path: &str,
        min_conn: usize,
        max_conn: usize,
        pow_level: i64,
    ) -> Result<(), ConfigError> {
        self.config
            .write()
            .update(db_path, min_conn, max_conn, pow_level);
        self.save()
    }

    pub fn set_network_peers(&self, peers: Vec<String>) -> Result<(), ConfigError> {
        self.config.write().network.peers = peers;
        self.save()
    }
}

impl PeerAddressStore for ConfigStore {
    fn save_peer_addresses(&self, addresses: Vec<String>) -> Result<(), GossipError> {
        self.set_network_peers(addresses)
            .map_err(|e| GossipError::Persistence(e.to_string()))
    }
}
