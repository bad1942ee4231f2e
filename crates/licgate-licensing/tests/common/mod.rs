//! Shared fixtures for licensing scenario tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use licgate_core::{ClusterIdentitySource, Error, ManualClock, RawLicense, Result, SecretStore};
use licgate_licensing::{LicenseStore, LicenseValidator, TrustAnchor, encrypt};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CLUSTER_UUID: &str = "6f1c2e0a-93a4-4c55-9d36-1f6c3f0c2b7e";
pub const OTHER_CLUSTER_UUID: &str = "0b5e1d7c-2c55-4a11-8f0e-7a3b9d2e4c10";
pub const SUBJECT: &str = "tenant-42";

const SIGNING_KEY: &str = include_str!("../fixtures/signing_rsa.key.pem");
const VERIFY_KEY: &str = include_str!("../fixtures/signing_rsa.pub.pem");
const UNTRUSTED_KEY: &str = include_str!("../fixtures/untrusted_rsa.key.pem");

/// 2026-01-01T00:00:00Z
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,licgate_licensing=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn anchor() -> TrustAnchor {
    TrustAnchor::from_rsa_pem(VERIFY_KEY.as_bytes()).unwrap()
}

pub fn sign(claims: &Value) -> String {
    let key = EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).unwrap();
    encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
}

pub fn sign_untrusted(claims: &Value) -> String {
    let key = EncodingKey::from_rsa_pem(UNTRUSTED_KEY.as_bytes()).unwrap();
    encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
}

pub fn claims(subject: &str, expires_at: DateTime<Utc>) -> Value {
    json!({
        "sub": subject,
        "exp": expires_at.timestamp(),
        "iat": (expires_at - Duration::days(365)).timestamp(),
        "features": ["discovery", "policy"],
    })
}

/// A raw license as the signing authority would hand it out for this cluster.
pub fn sealed(stored_subject: &str, claims: &Value) -> RawLicense {
    RawLicense::new(stored_subject, encrypt(&sign(claims), CLUSTER_UUID).unwrap())
}

pub fn license(subject: &str, expires_at: DateTime<Utc>) -> RawLicense {
    sealed(subject, &claims(subject, expires_at))
}

/// Secret store double that records calls and can be told to fail.
#[derive(Default)]
pub struct TestSecretStore {
    current: Mutex<Option<RawLicense>>,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
    pub puts: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl TestSecretStore {
    pub fn with(license: RawLicense) -> Self {
        let store = Self::default();
        *store.current.lock().unwrap() = Some(license);
        store
    }

    pub fn stored(&self) -> Option<RawLicense> {
        self.current.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecretStore for TestSecretStore {
    async fn get_raw_license(&self) -> Result<Option<RawLicense>> {
        Ok(self.stored())
    }

    async fn put_raw_license(&self, license: &RawLicense) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(Error::SecretStore("put refused".to_string()));
        }
        *self.current.lock().unwrap() = Some(license.clone());
        Ok(())
    }

    async fn delete_raw_license(&self) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::SecretStore("delete refused".to_string()));
        }
        *self.current.lock().unwrap() = None;
        Ok(())
    }

    fn name(&self) -> &str {
        "test"
    }
}

/// Cluster identity double that counts lookups. `None` means unavailable.
pub struct TestIdentity {
    uuid: Mutex<Option<String>>,
    pub calls: AtomicUsize,
}

impl TestIdentity {
    pub fn new(uuid: Option<&str>) -> Self {
        Self {
            uuid: Mutex::new(uuid.map(str::to_string)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, uuid: Option<&str>) {
        *self.uuid.lock().unwrap() = uuid.map(str::to_string);
    }
}

#[async_trait]
impl ClusterIdentitySource for TestIdentity {
    async fn cluster_uuid(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.uuid
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::ClusterIdentityUnavailable("kube-system not reachable".into()))
    }
}

pub struct Harness {
    pub store: LicenseStore,
    pub secrets: Arc<TestSecretStore>,
    pub identity: Arc<TestIdentity>,
    pub clock: Arc<ManualClock>,
    pub validator: LicenseValidator,
}

impl Harness {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_secrets(now, TestSecretStore::default())
    }

    pub fn with_secrets(now: DateTime<Utc>, secrets: TestSecretStore) -> Self {
        init_test_logging();
        let store = LicenseStore::new();
        let secrets = Arc::new(secrets);
        let identity = Arc::new(TestIdentity::new(Some(CLUSTER_UUID)));
        let clock = Arc::new(ManualClock::new(now));
        let validator =
            LicenseValidator::new(store.clone(), secrets.clone(), identity.clone(), anchor())
                .with_clock(clock.clone());

        Self {
            store,
            secrets,
            identity,
            clock,
            validator,
        }
    }

    pub fn puts(&self) -> usize {
        self.secrets.puts.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.secrets.deletes.load(Ordering::SeqCst)
    }
}
