//! License types and structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// License material as stored: still encrypted, plus the subject it claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLicense {
    /// Identity the license claims to be issued to.
    pub subject_id: String,
    /// Opaque ciphertext of the signed token.
    pub encrypted_key: String,
}

impl RawLicense {
    pub fn new(subject_id: impl Into<String>, encrypted_key: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            encrypted_key: encrypted_key.into(),
        }
    }
}

/// A validated, in-force license.
///
/// Only the validation engine builds these, after the signature and subject
/// checks have passed. Instances are never mutated; the lifecycle store
/// swaps whole values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Identity the license is issued to.
    pub subject_id: String,
    /// Ciphertext as stored.
    pub encrypted_key: String,
    /// Cluster the license was decrypted against.
    pub cluster_uuid: String,
    /// Entitled feature names, in token order.
    #[serde(default)]
    pub features: Vec<String>,
    /// Absolute expiration instant.
    pub expires_at: DateTime<Utc>,
    /// When validation succeeded.
    pub validated_at: DateTime<Utc>,
}

impl Entitlement {
    /// Expired when `expires_at` is at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Check if a feature is entitled.
    pub fn has_feature(&self, name: &str) -> bool {
        self.features.iter().any(|f| f == name)
    }

    /// The raw secret this entitlement was validated from.
    pub fn raw(&self) -> RawLicense {
        RawLicense::new(&self.subject_id, &self.encrypted_key)
    }
}

/// Observed state of the current entitlement at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseState {
    Absent,
    Active(Arc<Entitlement>),
    Expired(Arc<Entitlement>),
}

impl LicenseState {
    pub fn from_current(current: Option<Arc<Entitlement>>, now: DateTime<Utc>) -> Self {
        match current {
            None => LicenseState::Absent,
            Some(e) if e.is_expired_at(now) => LicenseState::Expired(e),
            Some(e) => LicenseState::Active(e),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LicenseState::Active(_))
    }

    pub fn entitlement(&self) -> Option<&Arc<Entitlement>> {
        match self {
            LicenseState::Absent => None,
            LicenseState::Active(e) | LicenseState::Expired(e) => Some(e),
        }
    }
}
