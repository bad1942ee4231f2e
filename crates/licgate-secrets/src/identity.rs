//! Cluster identity sources.
//!
//! Every lookup reads the source again; the UUID is key material and is
//! never cached.

use async_trait::async_trait;
use licgate_core::{ClusterIdentitySource, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

fn checked(raw: &str, source: &str) -> Result<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(Error::ClusterIdentityUnavailable(format!("{} is empty", source)));
    }
    Uuid::parse_str(value).map_err(|e| {
        Error::ClusterIdentityUnavailable(format!("{} is not a UUID: {}", source, e))
    })?;
    Ok(value.to_string())
}

/// A fixed cluster UUID.
#[derive(Debug, Clone)]
pub struct StaticClusterIdentity {
    uuid: String,
}

impl StaticClusterIdentity {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into() }
    }
}

#[async_trait]
impl ClusterIdentitySource for StaticClusterIdentity {
    async fn cluster_uuid(&self) -> Result<String> {
        checked(&self.uuid, "static cluster identity")
    }
}

/// Reads the cluster UUID from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvClusterIdentity {
    var: String,
}

impl EnvClusterIdentity {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl ClusterIdentitySource for EnvClusterIdentity {
    async fn cluster_uuid(&self) -> Result<String> {
        let value = std::env::var(&self.var).map_err(|e| {
            Error::ClusterIdentityUnavailable(format!("{}: {}", self.var, e))
        })?;
        checked(&value, &self.var)
    }
}

/// Reads the cluster UUID from a file, e.g. one projected from the
/// `kube-system` namespace UID.
#[derive(Debug, Clone)]
pub struct FileClusterIdentity {
    path: PathBuf,
}

impl FileClusterIdentity {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ClusterIdentitySource for FileClusterIdentity {
    async fn cluster_uuid(&self) -> Result<String> {
        let source = self.path.display().to_string();
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::ClusterIdentityUnavailable(format!("{}: {}", source, e)))?;
        debug!(path = %source, "Resolved cluster identity");
        checked(&content, &source)
    }
}

/// Which cluster identity source to use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ClusterIdentityConfig {
    File {
        #[serde(default = "default_identity_path")]
        path: PathBuf,
    },
    Env {
        #[serde(default = "default_identity_var")]
        var: String,
    },
    Static {
        value: String,
    },
}

fn default_identity_path() -> PathBuf {
    PathBuf::from("/var/run/licgate/cluster-uuid")
}

fn default_identity_var() -> String {
    "LICGATE_CLUSTER_UUID".to_string()
}

impl Default for ClusterIdentityConfig {
    fn default() -> Self {
        ClusterIdentityConfig::File {
            path: default_identity_path(),
        }
    }
}

impl ClusterIdentityConfig {
    pub fn build(&self) -> Arc<dyn ClusterIdentitySource> {
        match self {
            ClusterIdentityConfig::File { path } => Arc::new(FileClusterIdentity::new(path)),
            ClusterIdentityConfig::Env { var } => Arc::new(EnvClusterIdentity::new(var)),
            ClusterIdentityConfig::Static { value } => {
                Arc::new(StaticClusterIdentity::new(value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "6f1c2e0a-93a4-4c55-9d36-1f6c3f0c2b7e";

    #[tokio::test]
    async fn test_static_identity() {
        let identity = StaticClusterIdentity::new(UUID);
        assert_eq!(identity.cluster_uuid().await.unwrap(), UUID);

        let bogus = StaticClusterIdentity::new("kube-system");
        assert!(matches!(
            bogus.cluster_uuid().await,
            Err(Error::ClusterIdentityUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_file_identity_is_read_on_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster-uuid");
        let identity = FileClusterIdentity::new(&path);

        assert!(matches!(
            identity.cluster_uuid().await,
            Err(Error::ClusterIdentityUnavailable(_))
        ));

        std::fs::write(&path, format!("{}\n", UUID)).unwrap();
        assert_eq!(identity.cluster_uuid().await.unwrap(), UUID);

        let rotated = "0b5e1d7c-2c55-4a11-8f0e-7a3b9d2e4c10";
        std::fs::write(&path, rotated).unwrap();
        assert_eq!(identity.cluster_uuid().await.unwrap(), rotated);
    }

    #[tokio::test]
    async fn test_env_identity() {
        // SAFETY: This test runs in isolation and doesn't rely on this env var elsewhere
        unsafe { std::env::set_var("LICGATE_TEST_CLUSTER_UUID_1", UUID) };
        let identity = EnvClusterIdentity::new("LICGATE_TEST_CLUSTER_UUID_1");
        assert_eq!(identity.cluster_uuid().await.unwrap(), UUID);

        let missing = EnvClusterIdentity::new("LICGATE_TEST_CLUSTER_UUID_UNSET");
        let err = missing.cluster_uuid().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_identity_config_from_json() {
        let config: ClusterIdentityConfig =
            serde_json::from_str(r#"{"source":"env"}"#).unwrap();
        assert!(matches!(
            config,
            ClusterIdentityConfig::Env { ref var } if var == "LICGATE_CLUSTER_UUID"
        ));

        let config: ClusterIdentityConfig = serde_json::from_str(r#"{"source":"file"}"#).unwrap();
        assert!(matches!(config, ClusterIdentityConfig::File { .. }));
    }
}
