//! Validation engine: decrypt, verify, decode, check, then store.

use crate::claims::decode_claims;
use crate::crypto::decrypt;
use crate::signature::{TrustAnchor, verify_signature};
use crate::store::LicenseStore;
use chrono::{DateTime, Utc};
use licgate_core::{
    Clock, ClusterIdentitySource, Entitlement, Error, RawLicense, Result, SecretStore, SystemClock,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expiry {
    Enforce,
    Ignore,
}

/// Validates raw licenses and installs them as the current entitlement.
pub struct LicenseValidator {
    store: LicenseStore,
    secrets: Arc<dyn SecretStore>,
    identity: Arc<dyn ClusterIdentitySource>,
    anchor: TrustAnchor,
    clock: Arc<dyn Clock>,
    /// Serialises `validate` so the conflict check and the replace cannot interleave.
    renewal: Mutex<()>,
}

impl LicenseValidator {
    pub fn new(
        store: LicenseStore,
        secrets: Arc<dyn SecretStore>,
        identity: Arc<dyn ClusterIdentitySource>,
        anchor: TrustAnchor,
    ) -> Self {
        Self {
            store,
            secrets,
            identity,
            anchor,
            clock: Arc::new(SystemClock),
            renewal: Mutex::new(()),
        }
    }

    /// Use a different clock for expiry decisions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &LicenseStore {
        &self.store
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Fetch the stored license secret and validate it.
    pub async fn load_from_store(&self) -> Result<Arc<Entitlement>> {
        info!(store = self.secrets.name(), "Fetching license secret to validate");
        let raw = self
            .secrets
            .get_raw_license()
            .await?
            .ok_or_else(|| Error::SecretNotFound(self.secrets.name().to_string()))?;
        self.validate(raw).await
    }

    /// Validate a raw license and make it the current entitlement.
    ///
    /// Fails with [`Error::AlreadyLicensed`] while an unexpired entitlement is
    /// current. An expired one is replaced, but only after the new license
    /// passes every check; until then, stored and in-memory state are untouched.
    pub async fn validate(&self, raw: RawLicense) -> Result<Arc<Entitlement>> {
        let _guard = self.renewal.lock().await;
        let now = self.clock.now();

        let previous = self.store.current();
        if let Some(existing) = &previous {
            if !existing.is_expired_at(now) {
                warn!(
                    subject_id = %existing.subject_id,
                    expires_at = %existing.expires_at,
                    "Valid license already exists"
                );
                return Err(Error::AlreadyLicensed {
                    subject_id: existing.subject_id.clone(),
                    expires_at: existing.expires_at,
                });
            }
            info!(
                subject_id = %existing.subject_id,
                expires_at = %existing.expires_at,
                "Expired license exists, attempting replacement"
            );
        }

        let entitlement = self.check(&raw, now, Expiry::Enforce).await.inspect_err(|e| {
            error!(subject_id = %raw.subject_id, error = %e, "License validation failed");
        })?;

        if previous.is_some() {
            if let Err(e) = self.secrets.delete_raw_license().await {
                error!(error = %e, "Failed to remove expired license secret");
                return Err(e);
            }
            if let Err(e) = self.secrets.put_raw_license(&raw).await {
                // The durable secret is gone; drop the in-memory copy to match.
                self.store.clear();
                error!(
                    subject_id = %raw.subject_id,
                    error = %e,
                    "Expired license removed but replacement could not be stored"
                );
                return Err(Error::PersistenceAfterRemoval(e.to_string()));
            }
        } else {
            self.secrets.put_raw_license(&raw).await.inspect_err(|e| {
                error!(error = %e, "Failed to store license secret");
            })?;
        }

        let current = Arc::new(entitlement);
        self.store.commit(current.clone());

        info!(
            subject_id = %current.subject_id,
            expires_at = %current.expires_at,
            features = current.features.len(),
            "License installed successfully"
        );
        Ok(current)
    }

    /// Run every check on a raw license without the conflict guard and without
    /// touching either store.
    pub async fn inspect(&self, raw: &RawLicense) -> Result<Entitlement> {
        self.check(raw, self.clock.now(), Expiry::Enforce).await
    }

    /// Adopt the stored license as the current entitlement even if it has
    /// expired, without writing to the secret store.
    ///
    /// Used by processes that need the durable state in memory before acting
    /// on it, so that a later [`validate`](Self::validate) sees the conflict
    /// or takes the replacement path. The signature and subject are still
    /// checked.
    pub async fn restore(&self) -> Result<Option<Arc<Entitlement>>> {
        let _guard = self.renewal.lock().await;
        let Some(raw) = self.secrets.get_raw_license().await? else {
            return Ok(None);
        };

        let entitlement = Arc::new(self.check(&raw, self.clock.now(), Expiry::Ignore).await?);
        self.store.commit(entitlement.clone());
        debug!(
            subject_id = %entitlement.subject_id,
            expires_at = %entitlement.expires_at,
            "Restored stored license"
        );
        Ok(Some(entitlement))
    }

    async fn check(
        &self,
        raw: &RawLicense,
        now: DateTime<Utc>,
        expiry: Expiry,
    ) -> Result<Entitlement> {
        let cluster_uuid = self.identity.cluster_uuid().await?;

        let token = decrypt(&raw.encrypted_key, &cluster_uuid)?;
        let verified = verify_signature(&token, &self.anchor)?;
        let claims = decode_claims(&verified.claims)?;

        if claims.subject != raw.subject_id {
            return Err(Error::SubjectMismatch {
                expected: raw.subject_id.clone(),
                actual: claims.subject,
            });
        }
        if let Some(not_before) = claims.not_before
            && not_before > now
        {
            return Err(Error::LicenseNotYetValid { not_before });
        }
        if expiry == Expiry::Enforce && claims.expires_at <= now {
            return Err(Error::LicenseExpired {
                expires_at: claims.expires_at,
            });
        }

        Ok(Entitlement {
            subject_id: claims.subject,
            encrypted_key: raw.encrypted_key.clone(),
            cluster_uuid,
            features: claims.features,
            expires_at: claims.expires_at,
            validated_at: now,
        })
    }
}
