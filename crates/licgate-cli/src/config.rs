//! Licgate configuration.

use licgate_core::{Error, Result};
use licgate_licensing::WatchConfig;
use licgate_secrets::{ClusterIdentityConfig, SecretLocation};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file consulted when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/licgate/config.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicgateConfig {
    /// License secret location.
    #[serde(default)]
    pub secret: SecretLocation,
    /// Directory backing the secret store.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    /// Where the cluster UUID comes from.
    #[serde(default)]
    pub cluster_identity: ClusterIdentityConfig,
    /// Watch loop intervals.
    #[serde(default)]
    pub watch: WatchConfig,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("/var/lib/licgate/secrets")
}

impl Default for LicgateConfig {
    fn default() -> Self {
        Self {
            secret: SecretLocation::default(),
            store_dir: default_store_dir(),
            cluster_identity: ClusterIdentityConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl LicgateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Load the given file, or the default file if present, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.watch.startup_interval()?;
        self.watch.expiry_interval()?;
        licgate_secrets::parse_label_selector(&self.secret.labels)?;
        Ok(())
    }
}
