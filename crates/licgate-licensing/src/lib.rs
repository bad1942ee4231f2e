//! License validation, lifecycle and enforcement for Licgate.
//!
//! The pipeline is decrypt → verify → decode → check → store, with two
//! polling loops watching the stored entitlement: one gating startup, one
//! requesting process termination when the entitlement lapses.

pub mod claims;
pub mod crypto;
pub mod signature;
pub mod store;
pub mod supervisor;
pub mod validator;
pub mod watch;

pub use claims::{LicenseClaims, decode_claims};
pub use crypto::{decrypt, encrypt};
pub use signature::{ACCEPTED_ALGORITHMS, TrustAnchor, VerifiedToken, verify_signature};
pub use store::LicenseStore;
pub use supervisor::{
    EXIT_LICENSE_INVALID, EXIT_STATE_INCONSISTENT, Supervisor, Termination, TerminationHandle,
};
pub use validator::LicenseValidator;
pub use watch::{ExpiryEnforcer, GateOutcome, StartupGate, WatchConfig};
