//! Environment-driven configuration.
//!
//! Every knob the engine, ledger client, and registration surface expose
//! is reachable through a `PV_*` variable; unset variables fall back to
//! the contract defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use pv_engine::{EngineConfig, RegistrationConfig};
use pv_ledger::{BreakerConfig, LedgerConfig, RetryPolicy};

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Signer key file location.
    pub keystore_path: PathBuf,
    /// Ledger client configuration.
    pub ledger: LedgerConfig,
    /// Confirmation engine configuration.
    pub engine: EngineConfig,
    /// Registration limits.
    pub registration: RegistrationConfig,
}

impl AppConfig {
    /// Resolve configuration from the environment.
    ///
    /// `PV_LEDGER_URL`, `PV_LEDGER_API_KEY`, `PV_LEDGER_ORG_ID`, and
    /// `PV_LEDGER_TENANT_ID` are required; everything else defaults.
    pub fn from_env() -> Result<Self> {
        let base_url = require("PV_LEDGER_URL")?;
        let api_key = require("PV_LEDGER_API_KEY")?;
        let org_id = require("PV_LEDGER_ORG_ID")?;
        let tenant_id = require("PV_LEDGER_TENANT_ID")?;

        let mut ledger = LedgerConfig::new(base_url, api_key, org_id, tenant_id);
        if let Some(ms) = optional_u64("PV_SUBMIT_DEADLINE_MS")? {
            ledger.submit_deadline = Duration::from_millis(ms);
        }
        ledger.retry = RetryPolicy {
            max_attempts: optional_u64("PV_MAX_ATTEMPTS")?
                .map(|n| n as u32)
                .unwrap_or(RetryPolicy::default().max_attempts),
            ..RetryPolicy::default()
        };
        ledger.breaker = BreakerConfig {
            threshold: optional_u64("PV_CIRCUIT_THRESHOLD")?
                .map(|n| n as u32)
                .unwrap_or(BreakerConfig::default().threshold),
            open_timeout: optional_u64("PV_CIRCUIT_OPEN_MS")?
                .map(Duration::from_millis)
                .unwrap_or(BreakerConfig::default().open_timeout),
        };

        let mut engine = EngineConfig::default();
        if let Some(n) = optional_u64("PV_WORKER_POOL_SIZE")? {
            engine.worker_pool_size = n as usize;
        }
        if let Some(ms) = optional_u64("PV_POLL_INITIAL_MS")? {
            engine.poll_initial = Duration::from_millis(ms);
        }
        if let Some(ms) = optional_u64("PV_POLL_CEILING_MS")? {
            engine.poll_ceiling = Duration::from_millis(ms);
        }
        if let Some(ms) = optional_u64("PV_TOTAL_DEADLINE_MS")? {
            engine.total_deadline = Duration::from_millis(ms);
        }

        let mut registration = RegistrationConfig::default();
        if let Some(n) = optional_u64("PV_MAX_UPLOAD_BYTES")? {
            registration.max_bytes = n as usize;
        }

        Ok(Self {
            keystore_path: std::env::var("PV_KEYSTORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("proofvault-key.json")),
            ledger,
            engine,
            registration,
        })
    }
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}

fn optional_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => {
            let value = raw
                .parse::<u64>()
                .with_context(|| format!("{name} must be a non-negative integer, got {raw:?}"))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}
