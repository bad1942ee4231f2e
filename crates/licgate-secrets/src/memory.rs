//! In-memory secret store.

use async_trait::async_trait;
use licgate_core::{RawLicense, Result, SecretStore};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Keeps the raw license in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secret: RwLock<Option<RawLicense>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_license(license: RawLicense) -> Self {
        Self {
            secret: RwLock::new(Some(license)),
        }
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get_raw_license(&self) -> Result<Option<RawLicense>> {
        Ok(self
            .secret
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn put_raw_license(&self, license: &RawLicense) -> Result<()> {
        *self.secret.write().unwrap_or_else(PoisonError::into_inner) = Some(license.clone());
        debug!(subject_id = %license.subject_id, "License secret stored");
        Ok(())
    }

    async fn delete_raw_license(&self) -> Result<()> {
        self.secret
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemorySecretStore::new();
        assert_eq!(store.get_raw_license().await.unwrap(), None);

        let license = RawLicense::new("tenant-42", "ciphertext");
        store.put_raw_license(&license).await.unwrap();
        assert_eq!(store.get_raw_license().await.unwrap(), Some(license));

        store.delete_raw_license().await.unwrap();
        store.delete_raw_license().await.unwrap();
        assert_eq!(store.get_raw_license().await.unwrap(), None);
    }
}
