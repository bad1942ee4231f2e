//! Interpreting verified token claims as license terms.

use chrono::{DateTime, Utc};
use licgate_core::{Error, Result};
use serde::Deserialize;

/// License terms carried by a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseClaims {
    pub subject: String,
    pub features: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub not_before: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct WireClaims {
    sub: Option<String>,
    exp: Option<f64>,
    nbf: Option<f64>,
    iat: Option<f64>,
    features: Option<Vec<String>>,
}

/// Extract license terms from verified claims.
///
/// A missing or unparseable `exp` is an error; a license never defaults to
/// "does not expire". Missing `features` means none.
pub fn decode_claims(claims: &serde_json::Value) -> Result<LicenseClaims> {
    let wire = WireClaims::deserialize(claims)
        .map_err(|e| Error::MalformedClaims(e.to_string()))?;

    let subject = wire
        .sub
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::MalformedClaims("missing subject".to_string()))?;

    let exp = wire
        .exp
        .ok_or_else(|| Error::MalformedClaims("missing expiration".to_string()))?;

    Ok(LicenseClaims {
        subject,
        features: wire.features.unwrap_or_default(),
        expires_at: numeric_date("exp", exp)?,
        not_before: wire.nbf.map(|v| numeric_date("nbf", v)).transpose()?,
        issued_at: wire.iat.map(|v| numeric_date("iat", v)).transpose()?,
    })
}

/// Seconds since the epoch, fractional part dropped.
fn numeric_date(claim: &str, value: f64) -> Result<DateTime<Utc>> {
    if !value.is_finite() {
        return Err(Error::MalformedClaims(format!("{} is not a number", claim)));
    }
    DateTime::from_timestamp(value.floor() as i64, 0)
        .ok_or_else(|| Error::MalformedClaims(format!("{} out of range: {}", claim, value)))
}
