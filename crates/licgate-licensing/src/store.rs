//! In-process holder of the single current entitlement.

use chrono::{DateTime, Utc};
use licgate_core::{Entitlement, LicenseState};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Handle to the current entitlement, shared by the validator and the watch
/// loops. Cloning yields another handle to the same slot.
///
/// Writers swap the whole `Arc<Entitlement>`, so readers see either the
/// value before a write or the one after. Expiry is computed at read time
/// and never written back.
#[derive(Debug, Clone, Default)]
pub struct LicenseStore {
    current: Arc<RwLock<Option<Arc<Entitlement>>>>,
}

impl LicenseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current entitlement, if any.
    pub fn current(&self) -> Option<Arc<Entitlement>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the current entitlement, returning the previous one.
    pub fn commit(&self, entitlement: impl Into<Arc<Entitlement>>) -> Option<Arc<Entitlement>> {
        let entitlement = entitlement.into();
        debug!(
            subject_id = %entitlement.subject_id,
            expires_at = %entitlement.expires_at,
            "Committing entitlement"
        );
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(entitlement)
    }

    /// Remove the current entitlement, returning it.
    pub fn clear(&self) -> Option<Arc<Entitlement>> {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        slot.take()
    }

    /// Presence and expiry of the current entitlement at `now`.
    pub fn state(&self, now: DateTime<Utc>) -> LicenseState {
        LicenseState::from_current(self.current(), now)
    }
}
