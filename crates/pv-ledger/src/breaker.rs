//! # Circuit Breaker
//!
//! A per-endpoint three-state breaker guarding the ledger transport.
//!
//! ```text
//! CLOSED ── threshold consecutive failures ──► OPEN
//!    ▲                                           │
//!    │ probe success          open_timeout since last failure
//!    │                                           ▼
//!    └───────────────────── HALF_OPEN ◄──────────┘
//!                               │
//!                               └─ probe failure ──► OPEN (timer restarts)
//! ```
//!
//! While OPEN, callers fail fast with [`CircuitOpen`] and the network is
//! never touched. HALF_OPEN admits exactly one probe; concurrent callers
//! keep failing fast until the probe settles. State lives behind a
//! `parking_lot::Mutex` — the critical section is a handful of loads and
//! stores.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::CircuitOpen;

/// Breaker tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker.
    pub threshold: u32,
    /// How long an open breaker waits before admitting a probe.
    pub open_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerState {
    /// Requests flow normally.
    Closed,
    /// Requests fail fast.
    Open,
    /// One probe is allowed through.
    HalfOpen,
}

impl BreakerState {
    /// The canonical name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    probe_in_flight: bool,
}

/// A circuit breaker for one logical ledger endpoint.
#[derive(Debug)]
pub struct CircuitBreaker {
    endpoint: &'static str,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a closed breaker for the named endpoint.
    pub fn new(endpoint: &'static str, config: BreakerConfig) -> Self {
        Self {
            endpoint,
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Ask permission to issue a request.
    ///
    /// CLOSED always admits. OPEN admits nothing until `open_timeout` has
    /// elapsed since the last failure, at which point the breaker moves to
    /// HALF_OPEN and admits this caller as the single probe. While a probe
    /// is in flight, everyone else fails fast.
    pub fn try_acquire(&self) -> Result<(), CircuitOpen> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.config.open_timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_in_flight = true;
                    tracing::info!(endpoint = self.endpoint, "circuit half-open, admitting probe");
                    Ok(())
                } else {
                    Err(CircuitOpen {
                        endpoint: self.endpoint,
                    })
                }
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(CircuitOpen {
                        endpoint: self.endpoint,
                    })
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful request. Closes the breaker and resets counters.
    pub fn on_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != BreakerState::Closed {
            tracing::info!(endpoint = self.endpoint, "circuit closed after successful probe");
        }
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.last_failure_at = None;
        inner.probe_in_flight = false;
    }

    /// Record a failed request.
    ///
    /// In CLOSED, counts toward the trip threshold. In HALF_OPEN, the
    /// failed probe re-opens the breaker and restarts the open timer.
    pub fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure_at = Some(Instant::now());
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.threshold {
                    inner.state = BreakerState::Open;
                    tracing::warn!(
                        endpoint = self.endpoint,
                        failures = inner.failure_count,
                        "circuit opened"
                    );
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.probe_in_flight = false;
                tracing::warn!(endpoint = self.endpoint, "probe failed, circuit re-opened");
            }
            BreakerState::Open => {}
        }
    }

    /// The current state.
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// The endpoint this breaker guards.
    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }
}
