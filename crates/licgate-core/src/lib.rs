//! Licgate Core
//!
//! Core domain types, traits, and error handling for Licgate.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used across all other crates.

pub mod clock;
pub mod error;
pub mod license;
pub mod ports;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use license::{Entitlement, LicenseState, RawLicense};
pub use ports::{ClusterIdentitySource, SecretStore};
