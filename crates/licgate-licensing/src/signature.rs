//! Signature verification against the embedded trust anchor.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use licgate_core::{Error, Result};
use std::fmt;
use tracing::{debug, warn};

/// The only signing family licenses may use: RSA PKCS#1 v1.5.
pub const ACCEPTED_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

/// Public key of the license signing authority. Rotating it requires a rebuild.
const EMBEDDED_PUBLIC_KEY: &str = include_str!("../keys/license_signing.pub.pem");

/// Public key every license signature is checked against.
#[derive(Clone)]
pub struct TrustAnchor {
    decoding_key: DecodingKey,
}

impl TrustAnchor {
    /// The anchor compiled into this binary.
    pub fn embedded() -> Result<Self> {
        Self::from_rsa_pem(EMBEDDED_PUBLIC_KEY.as_bytes())
    }

    /// Build an anchor from a PEM-encoded RSA public key.
    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self> {
        let decoding_key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| Error::Config(format!("Invalid trust anchor: {}", e)))?;
        Ok(Self { decoding_key })
    }
}

impl fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustAnchor").finish_non_exhaustive()
    }
}

/// A token whose signature checked out. Claims are not yet interpreted.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub algorithm: Algorithm,
    pub claims: serde_json::Value,
}

/// Verify a compact token's signature.
///
/// The algorithm named in the header must be in [`ACCEPTED_ALGORITHMS`];
/// anything else is rejected before the key is used. Time-based claims are
/// left to the caller.
pub fn verify_signature(token: &str, anchor: &TrustAnchor) -> Result<VerifiedToken> {
    let header = decode_header(token)
        .map_err(|e| Error::Signature(format!("unreadable token header: {}", e)))?;

    if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
        warn!(alg = ?header.alg, "License token uses an unsupported signing algorithm");
        return Err(Error::Signature(format!(
            "unsupported signing algorithm: {:?}",
            header.alg
        )));
    }

    let mut validation = Validation::new(header.alg);
    validation.leeway = 0;
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<serde_json::Value>(token, &anchor.decoding_key, &validation)
        .map_err(|e| Error::Signature(e.to_string()))?;

    debug!(alg = ?header.alg, "License signature verified");
    Ok(VerifiedToken {
        algorithm: header.alg,
        claims: data.claims,
    })
}
