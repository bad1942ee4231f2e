//! Secret store and cluster identity adapters for Licgate.

pub mod file;
pub mod identity;
pub mod memory;

pub use file::{FileSecretStore, SecretLocation, parse_label_selector};
pub use identity::{
    ClusterIdentityConfig, EnvClusterIdentity, FileClusterIdentity, StaticClusterIdentity,
};
pub use memory::MemorySecretStore;
