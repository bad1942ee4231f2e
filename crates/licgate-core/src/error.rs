//! Error types for Licgate.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Secret store errors
    #[error("License secret not found: {0}")]
    SecretNotFound(String),

    #[error("Secret store error: {0}")]
    SecretStore(String),

    // Cluster identity errors
    #[error("Cluster identity unavailable: {0}")]
    ClusterIdentityUnavailable(String),

    // License content errors
    #[error("License decryption failed: {0}")]
    Decryption(String),

    #[error("License signature rejected: {0}")]
    Signature(String),

    #[error("Malformed license claims: {0}")]
    MalformedClaims(String),

    #[error("License subject mismatch: expected {expected}, token issued to {actual}")]
    SubjectMismatch { expected: String, actual: String },

    #[error("License expired at {expires_at}")]
    LicenseExpired { expires_at: DateTime<Utc> },

    #[error("License not valid before {not_before}")]
    LicenseNotYetValid { not_before: DateTime<Utc> },

    // Lifecycle errors
    #[error("A valid license already exists for {subject_id} (expires at {expires_at})")]
    AlreadyLicensed {
        subject_id: String,
        expires_at: DateTime<Utc>,
    },

    #[error("Previous license removed but new license could not be persisted: {0}")]
    PersistenceAfterRemoval(String),

    // Infrastructure errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether retrying the same operation without a new license can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::SecretNotFound(_)
                | Error::SecretStore(_)
                | Error::ClusterIdentityUnavailable(_)
                | Error::Io(_)
        )
    }

    /// Whether the error leaves durable and in-memory state diverged.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::PersistenceAfterRemoval(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(Error::SecretNotFound("licgate/licgate-license".into()).is_retryable());
        assert!(Error::ClusterIdentityUnavailable("no uuid".into()).is_retryable());
        assert!(!Error::Signature("bad signature".into()).is_retryable());
        assert!(
            !Error::SubjectMismatch {
                expected: "a".into(),
                actual: "b".into()
            }
            .is_retryable()
        );
        assert!(!Error::MalformedClaims("exp".into()).is_retryable());
    }

    #[test]
    fn test_only_persistence_after_removal_is_fatal() {
        assert!(Error::PersistenceAfterRemoval("disk full".into()).is_fatal());
        assert!(!Error::SecretStore("disk full".into()).is_fatal());
        assert!(!Error::Decryption("garbage".into()).is_fatal());
    }
}
