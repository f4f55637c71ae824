//!
//! Configuration file for the record service.
//!
//! Every knob has a default, so an empty file (or no file at all) yields a
//! working configuration; a user file only overrides what it names.
//!

use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Error that can occur when reading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigReadError {
    /// The file did not exist or could not be read.
    #[error("config file not found: {0}")]
    ConfigFileNotFound(#[from] std::io::Error),
    /// The TOML was syntactically invalid.
    #[error("config file is not valid TOML: {0}")]
    ConfigFileNotValid(#[from] toml::de::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeneralToml {
    /// How long a resolved record stays in the cache, in seconds.
    pub cache_ttl_s: u64,
    /// Maximum number of cached records.
    pub cache_capacity: usize,
}

impl Default for GeneralToml {
    fn default() -> Self {
        Self {
            cache_ttl_s: 600,
            cache_capacity: 10_000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StorageToml {
    /// Directory holding the LMDB environment.
    pub data_dir: PathBuf,
}

impl Default for StorageToml {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct DhtToml {
    /// Bootstrap node override. `None` uses the Mainline defaults.
    pub bootstrap_nodes: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RepublisherToml {
    /// Republish interval in seconds. Zero disables republishing.
    pub interval_s: u64,
}

impl Default for RepublisherToml {
    fn default() -> Self {
        Self { interval_s: 3600 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HttpToml {
    pub listen_socket: SocketAddr,
}

impl Default for HttpToml {
    fn default() -> Self {
        Self {
            listen_socket: SocketAddr::from(([0, 0, 0, 0], 8305)),
        }
    }
}

/// The overall service configuration, composed of several subsections.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ConfigToml {
    pub general: GeneralToml,
    pub storage: StorageToml,
    pub dht: DhtToml,
    pub republisher: RepublisherToml,
    pub http: HttpToml,
}

impl ConfigToml {
    /// Read and parse a configuration file, overlaying it on the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigReadError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::from_str(&raw)?)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.general.cache_ttl_s)
    }

    pub fn republish_interval(&self) -> Duration {
        Duration::from_secs(self.republisher.interval_s)
    }

    /// Returns a default config tuned for unit tests.
    pub fn test() -> Self {
        let mut config = Self::default();
        // Ephemeral port so parallel tests don't collide.
        config.http.listen_socket = SocketAddr::from(([127, 0, 0, 1], 0));
        config.republisher.interval_s = 0;
        config
    }
}

impl FromStr for ConfigToml {
    type Err = toml::de::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s)
    }
}
