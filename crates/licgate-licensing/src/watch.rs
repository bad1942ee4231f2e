//! Polling loops over the current entitlement.

use crate::store::LicenseStore;
use crate::supervisor::{Termination, TerminationHandle};
use licgate_core::{Clock, Entitlement, Error, LicenseState, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, error, info};

/// Poll intervals for the watch loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Startup gate poll interval in seconds.
    #[serde(default = "default_startup_poll")]
    pub startup_poll_secs: u64,
    /// Expiry enforcement poll interval in seconds.
    #[serde(default = "default_expiry_poll")]
    pub expiry_poll_secs: u64,
}

fn default_startup_poll() -> u64 {
    5
}

fn default_expiry_poll() -> u64 {
    15
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            startup_poll_secs: default_startup_poll(),
            expiry_poll_secs: default_expiry_poll(),
        }
    }
}

impl WatchConfig {
    pub fn startup_interval(&self) -> Result<Duration> {
        non_zero("startup_poll_secs", self.startup_poll_secs)
    }

    pub fn expiry_interval(&self) -> Result<Duration> {
        non_zero("expiry_poll_secs", self.expiry_poll_secs)
    }
}

fn non_zero(field: &str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(Error::Config(format!("{} must be greater than zero", field)));
    }
    Ok(Duration::from_secs(secs))
}

/// How the startup gate finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Satisfied(Arc<Entitlement>),
    Cancelled,
}

/// Blocks startup until some unexpired entitlement is current.
pub struct StartupGate {
    store: LicenseStore,
    clock: Arc<dyn Clock>,
    poll: Duration,
}

impl StartupGate {
    pub fn new(store: LicenseStore, clock: Arc<dyn Clock>, poll: Duration) -> Self {
        Self { store, clock, poll }
    }

    /// Poll until satisfied, or until `shutdown` flips to `true` or its
    /// sender is dropped.
    pub async fn wait(&self, mut shutdown: watch::Receiver<bool>) -> GateOutcome {
        let mut ticker = interval(self.poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(poll_secs = self.poll.as_secs(), "Waiting for a valid license");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.store.state(self.clock.now()) {
                        LicenseState::Active(entitlement) => {
                            info!(
                                subject_id = %entitlement.subject_id,
                                "Valid license exists"
                            );
                            return GateOutcome::Satisfied(entitlement);
                        }
                        LicenseState::Expired(entitlement) => {
                            debug!(expires_at = %entitlement.expires_at, "Current license is expired");
                        }
                        LicenseState::Absent => debug!("No license installed yet"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Startup gate cancelled");
                        return GateOutcome::Cancelled;
                    }
                }
            }
        }
    }
}

/// Watches the current entitlement and requests process termination as soon
/// as it is absent or expired. Not cancellable.
pub struct ExpiryEnforcer {
    store: LicenseStore,
    clock: Arc<dyn Clock>,
    poll: Duration,
}

impl ExpiryEnforcer {
    pub fn new(store: LicenseStore, clock: Arc<dyn Clock>, poll: Duration) -> Self {
        Self { store, clock, poll }
    }

    /// Poll until the license lapses, request termination, and return the reason.
    pub async fn run(&self, termination: TerminationHandle) -> Termination {
        let mut ticker = interval(self.poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(poll_secs = self.poll.as_secs(), "Enforcing license validity");

        loop {
            ticker.tick().await;
            let reason = match self.store.state(self.clock.now()) {
                LicenseState::Active(_) => continue,
                LicenseState::Absent => Termination::LicenseAbsent,
                LicenseState::Expired(entitlement) => Termination::LicenseExpired {
                    subject_id: entitlement.subject_id.clone(),
                    expires_at: entitlement.expires_at,
                },
            };

            error!(reason = %reason, "License no longer valid, terminating");
            termination.request(reason.clone());
            return reason;
        }
    }
}
