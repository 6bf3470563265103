//! Engine and registration tuning knobs with contract defaults.

use std::time::Duration;

/// Confirmation engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Bounded worker pool size.
    pub worker_pool_size: usize,
    /// First poll delay after submission.
    pub poll_initial: Duration,
    /// Poll delay ceiling.
    pub poll_ceiling: Duration,
    /// Per-record deadline from ingest to a terminal state.
    pub total_deadline: Duration,
    /// How often the recovery sweeper scans for stale records.
    pub sweep_interval: Duration,
    /// Maximum records re-enqueued per sweep.
    pub sweep_batch: u32,
    /// How long shutdown waits for in-flight drivers before aborting.
    pub shutdown_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_pool_size(),
            poll_initial: Duration::from_secs(2),
            poll_ceiling: Duration::from_secs(60),
            total_deadline: Duration::from_secs(900),
            sweep_interval: Duration::from_secs(30),
            sweep_batch: 64,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// CPU count capped at 8.
fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
        .min(8)
}

/// Registration service configuration.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationConfig {
    /// Maximum accepted document size in bytes.
    pub max_bytes: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
        }
    }
}
