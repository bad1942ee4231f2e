//! Command handlers.

use crate::config::LicgateConfig;
use anyhow::Context;
use chrono::{DateTime, Utc};
use licgate_core::{Clock, Error, LicenseState, RawLicense, SecretStore};
use licgate_licensing::{
    ExpiryEnforcer, GateOutcome, LicenseStore, LicenseValidator, StartupGate, Supervisor,
    Termination, TrustAnchor,
};
use licgate_secrets::FileSecretStore;
use serde::Serialize;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// How a command wants the process to end.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Exit(i32),
    Terminate(Termination),
}

fn build_validator(config: &LicgateConfig) -> anyhow::Result<LicenseValidator> {
    let secrets: Arc<dyn SecretStore> = Arc::new(
        FileSecretStore::new(&config.store_dir, config.secret.clone())
            .context("Failed to open secret store")?,
    );
    let identity = config.cluster_identity.build();
    let anchor = TrustAnchor::embedded().context("Embedded trust anchor is unusable")?;
    Ok(LicenseValidator::new(
        LicenseStore::new(),
        secrets,
        identity,
        anchor,
    ))
}

/// Validate the stored license. Only fatal errors end the process.
async fn reload(validator: &LicenseValidator) -> Option<Termination> {
    match validator.load_from_store().await {
        Ok(entitlement) => {
            info!(
                subject_id = %entitlement.subject_id,
                expires_at = %entitlement.expires_at,
                "License loaded from secret store"
            );
            None
        }
        Err(Error::AlreadyLicensed { .. }) => None,
        Err(e) => {
            warn!(error = %e, retryable = e.is_retryable(), "Stored license not usable");
            Termination::from_error(&e)
        }
    }
}

pub async fn run(config: &LicgateConfig, command: Vec<String>) -> anyhow::Result<Outcome> {
    let validator = Arc::new(build_validator(config)?);
    let store = validator.store().clone();
    let mut supervisor = Supervisor::new();

    if let Some(reason) = reload(&validator).await {
        return Ok(Outcome::Terminate(reason));
    }

    // SIGHUP re-reads the secret store, e.g. after `licgate install`.
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut hangups = signal(SignalKind::hangup()).context("Failed to watch SIGHUP")?;
        let validator = validator.clone();
        let handle = supervisor.handle();
        tokio::spawn(async move {
            while hangups.recv().await.is_some() {
                info!("SIGHUP received, reloading license");
                if let Some(reason) = reload(&validator).await {
                    handle.request(reason);
                }
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let gate = StartupGate::new(
        store.clone(),
        validator.clock(),
        config.watch.startup_interval()?,
    );
    tokio::select! {
        outcome = gate.wait(shutdown_rx) => {
            if outcome == GateOutcome::Cancelled {
                return Ok(Outcome::Exit(0));
            }
        }
        reason = supervisor.wait() => return Ok(Outcome::Terminate(reason)),
    }

    let enforcer = ExpiryEnforcer::new(store, validator.clock(), config.watch.expiry_interval()?);
    let handle = supervisor.handle();
    tokio::spawn(async move { enforcer.run(handle).await });

    let mut child = match command.split_first() {
        Some((program, args)) => {
            info!(program = %program, "Starting licensed service");
            Some(
                Command::new(program)
                    .args(args)
                    .kill_on_drop(true)
                    .spawn()
                    .with_context(|| format!("Failed to start {}", program))?,
            )
        }
        None => None,
    };

    let stop = tokio::select! {
        reason = supervisor.wait() => Stop::Terminated(reason),
        status = wait_child(&mut child) => Stop::Exited(status),
        _ = tokio::signal::ctrl_c() => Stop::Interrupted,
    };

    match stop {
        Stop::Terminated(reason) => {
            if let Some(child) = child.as_mut() {
                stop_child(child).await;
            }
            Ok(Outcome::Terminate(reason))
        }
        Stop::Exited(status) => {
            let status = status.context("Failed to wait for service")?;
            info!(status = %status, "Licensed service exited");
            Ok(Outcome::Exit(status.code().unwrap_or(1)))
        }
        Stop::Interrupted => {
            info!("Interrupted, shutting down");
            if let Some(child) = child.as_mut() {
                stop_child(child).await;
            }
            Ok(Outcome::Exit(0))
        }
    }
}

enum Stop {
    Terminated(Termination),
    Exited(std::io::Result<std::process::ExitStatus>),
    Interrupted,
}

async fn wait_child(child: &mut Option<Child>) -> std::io::Result<std::process::ExitStatus> {
    match child {
        Some(child) => child.wait().await,
        None => std::future::pending().await,
    }
}

async fn stop_child(child: &mut Child) {
    if let Err(e) = child.kill().await {
        error!(error = %e, "Failed to stop licensed service");
    }
}

pub async fn install(
    config: &LicgateConfig,
    subject: String,
    key: String,
) -> anyhow::Result<Outcome> {
    let validator = build_validator(config)?;

    // Bring the stored license into memory so the conflict guard and the
    // replacement path see it.
    match validator.restore().await {
        Ok(Some(existing)) => info!(
            subject_id = %existing.subject_id,
            expires_at = %existing.expires_at,
            "Found stored license"
        ),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Stored license is unusable, ignoring it"),
    }

    match validator.validate(RawLicense::new(subject, key)).await {
        Ok(entitlement) => {
            println!(
                "License installed for {} (expires {})",
                entitlement.subject_id, entitlement.expires_at
            );
            Ok(Outcome::Exit(0))
        }
        Err(e) => match Termination::from_error(&e) {
            Some(reason) => Ok(Outcome::Terminate(reason)),
            None => Err(e).context("License was not installed"),
        },
    }
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl StatusReport {
    pub fn from_state(state: &LicenseState) -> Self {
        let label = match state {
            LicenseState::Absent => "absent",
            LicenseState::Active(_) => "active",
            LicenseState::Expired(_) => "expired",
        };
        let entitlement = state.entitlement();
        Self {
            state: label,
            subject_id: entitlement.map(|e| e.subject_id.clone()),
            expires_at: entitlement.map(|e| e.expires_at),
            features: entitlement.map(|e| e.features.clone()).unwrap_or_default(),
        }
    }
}

pub async fn status(config: &LicgateConfig, json: bool) -> anyhow::Result<Outcome> {
    let validator = build_validator(config)?;
    validator
        .restore()
        .await
        .context("Stored license failed validation")?;

    let state = validator.store().state(validator.clock().now());
    let report = StatusReport::from_state(&state);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("State:    {}", report.state);
        if let Some(subject_id) = &report.subject_id {
            println!("Subject:  {}", subject_id);
        }
        if let Some(expires_at) = report.expires_at {
            println!("Expires:  {}", expires_at);
        }
        if !report.features.is_empty() {
            println!("Features: {}", report.features.join(", "));
        }
    }

    Ok(Outcome::Exit(if state.is_active() { 0 } else { 1 }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use licgate_core::Entitlement;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_report_for_each_state() {
        let absent = StatusReport::from_state(&LicenseState::Absent);
        assert_eq!(absent.state, "absent");
        assert_eq!(
            serde_json::to_value(&absent).unwrap(),
            serde_json::json!({"state": "absent"})
        );

        let expires_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let entitlement = Arc::new(Entitlement {
            subject_id: "tenant-42".to_string(),
            encrypted_key: "ciphertext".to_string(),
            cluster_uuid: "6f1c2e0a-93a4-4c55-9d36-1f6c3f0c2b7e".to_string(),
            features: vec!["discovery".to_string()],
            expires_at,
            validated_at: expires_at,
        });
        let expired = StatusReport::from_state(&LicenseState::Expired(entitlement));
        assert_eq!(expired.state, "expired");
        assert_eq!(expired.subject_id.as_deref(), Some("tenant-42"));
        assert_eq!(expired.expires_at, Some(expires_at));
        assert_eq!(expired.features, vec!["discovery"]);

        let json = serde_json::to_string(&expired).unwrap();
        assert!(!json.contains("ciphertext"));
    }

    #[tokio::test]
    async fn test_status_without_license() {
        let dir = tempfile::tempdir().unwrap();
        let config = LicgateConfig {
            store_dir: dir.path().to_path_buf(),
            ..LicgateConfig::default()
        };

        let outcome = status(&config, true).await.unwrap();
        assert_eq!(outcome, Outcome::Exit(1));
    }
}
