//! Port traits for the collaborators that live outside the licensing core.

use crate::Result;
use crate::license::RawLicense;
use async_trait::async_trait;

/// Durable storage for the single encrypted license secret.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the raw license, `None` when no secret exists.
    async fn get_raw_license(&self) -> Result<Option<RawLicense>>;

    /// Create or overwrite the raw license.
    async fn put_raw_license(&self, license: &RawLicense) -> Result<()>;

    /// Remove the raw license. Removing an absent secret is not an error.
    async fn delete_raw_license(&self) -> Result<()>;

    /// Store name for logging.
    fn name(&self) -> &str;
}

/// Source of the cluster UUID used as decryption key material.
#[async_trait]
pub trait ClusterIdentitySource: Send + Sync {
    /// Resolve the cluster UUID. Implementations must not cache across calls.
    async fn cluster_uuid(&self) -> Result<String>;
}
