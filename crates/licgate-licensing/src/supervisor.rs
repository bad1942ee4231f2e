//! Termination requests from the licensing core to the host process.
//!
//! Nothing in this crate exits the process. Components that decide the
//! process must stop send a [`Termination`] through a [`TerminationHandle`];
//! the binary owning the [`Supervisor`] performs the exit.

use chrono::{DateTime, Utc};
use licgate_core::Error;
use std::fmt;
use tokio::sync::mpsc;
use tracing::warn;

/// Exit status when the license is absent or expired. Supervisors should not
/// restart the process on this status without a new license.
pub const EXIT_LICENSE_INVALID: i32 = 77;

/// Exit status when durable and in-memory license state diverged.
pub const EXIT_STATE_INCONSISTENT: i32 = 70;

/// Why the host process must stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    LicenseAbsent,
    LicenseExpired {
        subject_id: String,
        expires_at: DateTime<Utc>,
    },
    StateInconsistent(String),
}

impl Termination {
    pub fn exit_code(&self) -> i32 {
        match self {
            Termination::LicenseAbsent | Termination::LicenseExpired { .. } => {
                EXIT_LICENSE_INVALID
            }
            Termination::StateInconsistent(_) => EXIT_STATE_INCONSISTENT,
        }
    }

    /// The termination a validation error demands, if any.
    pub fn from_error(err: &Error) -> Option<Self> {
        err.is_fatal()
            .then(|| Termination::StateInconsistent(err.to_string()))
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::LicenseAbsent => write!(f, "license doesn't exist"),
            Termination::LicenseExpired {
                subject_id,
                expires_at,
            } => write!(
                f,
                "license for {} expired at {}, get a new license",
                subject_id, expires_at
            ),
            Termination::StateInconsistent(reason) => {
                write!(f, "license state inconsistent: {}", reason)
            }
        }
    }
}

/// Sending side, cloned into every component that may request termination.
#[derive(Debug, Clone)]
pub struct TerminationHandle {
    tx: mpsc::UnboundedSender<Termination>,
}

impl TerminationHandle {
    pub fn request(&self, reason: Termination) {
        if self.tx.send(reason).is_err() {
            warn!("Termination requested after supervisor shut down");
        }
    }
}

/// Receiving side, owned by the top-level process.
#[derive(Debug)]
pub struct Supervisor {
    tx: mpsc::UnboundedSender<Termination>,
    rx: mpsc::UnboundedReceiver<Termination>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> TerminationHandle {
        TerminationHandle {
            tx: self.tx.clone(),
        }
    }

    /// Wait for the first termination request.
    pub async fn wait(&mut self) -> Termination {
        // The supervisor keeps a sender, so the channel cannot close under us.
        self.rx.recv().await.unwrap_or_else(|| {
            Termination::StateInconsistent("termination channel closed".to_string())
        })
    }

    /// A pending request, without waiting.
    pub fn try_wait(&mut self) -> Option<Termination> {
        self.rx.try_recv().ok()
    }
}
