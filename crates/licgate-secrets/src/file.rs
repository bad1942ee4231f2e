//! File-backed secret store.
//!
//! Each secret is one JSON document at `<dir>/<namespace>/<name>.json`,
//! carrying its labels and a `data` map with `user-id` and `key` entries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use licgate_core::{Error, RawLicense, Result, SecretStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DATA_SUBJECT: &str = "user-id";
const DATA_KEY: &str = "key";

/// Where the license secret lives and how it is labelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretLocation {
    /// Secret name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Namespace the secret is scoped to.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Label selector the secret must match, e.g. `app=licgate`.
    #[serde(default = "default_labels")]
    pub labels: String,
}

fn default_name() -> String {
    "licgate-license".to_string()
}

fn default_namespace() -> String {
    "licgate".to_string()
}

fn default_labels() -> String {
    "app=licgate".to_string()
}

impl Default for SecretLocation {
    fn default() -> Self {
        Self {
            name: default_name(),
            namespace: default_namespace(),
            labels: default_labels(),
        }
    }
}

/// Parse `k1=v1,k2=v2` into a label map.
pub fn parse_label_selector(selector: &str) -> Result<BTreeMap<String, String>> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => {
                Ok((k.trim().to_string(), v.trim().to_string()))
            }
            _ => Err(Error::Config(format!("Invalid label selector: {}", pair))),
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
struct SecretDocument {
    name: String,
    namespace: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    data: BTreeMap<String, String>,
    updated_at: DateTime<Utc>,
}

/// Secret store persisting the license as a JSON document on disk.
pub struct FileSecretStore {
    path: PathBuf,
    location: SecretLocation,
    selector: BTreeMap<String, String>,
}

impl FileSecretStore {
    pub fn new(dir: impl AsRef<Path>, location: SecretLocation) -> Result<Self> {
        let selector = parse_label_selector(&location.labels)?;
        let path = dir
            .as_ref()
            .join(&location.namespace)
            .join(format!("{}.json", location.name));
        Ok(Self {
            path,
            location,
            selector,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn matches_selector(&self, labels: &BTreeMap<String, String>) -> bool {
        self.selector
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|l| l == v))
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get_raw_license(&self) -> Result<Option<RawLicense>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "License secret does not exist");
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::SecretStore(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let document: SecretDocument = serde_json::from_str(&content).map_err(|e| {
            Error::SecretStore(format!("Invalid secret document {}: {}", self.path.display(), e))
        })?;

        if !self.matches_selector(&document.labels) {
            warn!(
                name = %document.name,
                selector = %self.location.labels,
                "License secret does not match label selector, ignoring"
            );
            return Ok(None);
        }

        let field = |key: &str| {
            document.data.get(key).cloned().ok_or_else(|| {
                Error::SecretStore(format!("Secret {} has no '{}' entry", document.name, key))
            })
        };

        Ok(Some(RawLicense::new(field(DATA_SUBJECT)?, field(DATA_KEY)?)))
    }

    async fn put_raw_license(&self, license: &RawLicense) -> Result<()> {
        let document = SecretDocument {
            name: self.location.name.clone(),
            namespace: self.location.namespace.clone(),
            labels: self.selector.clone(),
            data: BTreeMap::from([
                (DATA_SUBJECT.to_string(), license.subject_id.clone()),
                (DATA_KEY.to_string(), license.encrypted_key.clone()),
            ]),
            updated_at: Utc::now(),
        };
        let content = serde_json::to_vec_pretty(&document)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::SecretStore(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        // Write beside the target and rename so readers never see a partial file.
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, &content).await.map_err(|e| {
            Error::SecretStore(format!("Failed to write {}: {}", staging.display(), e))
        })?;
        tokio::fs::rename(&staging, &self.path).await.map_err(|e| {
            Error::SecretStore(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;

        info!(
            name = %self.location.name,
            namespace = %self.location.namespace,
            "License secret stored"
        );
        Ok(())
    }

    async fn delete_raw_license(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(name = %self.location.name, "License secret deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::SecretStore(format!(
                "Failed to delete {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn name(&self) -> &str {
        &self.location.name
    }
}
