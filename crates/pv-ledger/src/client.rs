//! # Ledger Client
//!
//! The [`LedgerClient`] trait and its HTTP implementation.
//!
//! ## Submission discipline
//!
//! Every attempt is categorized before any decision: retryable classes
//! (network, timeout, 5xx, 429) consume backoff and feed the breaker;
//! a 4xx means the attestation itself is bad and the call returns
//! immediately — retrying a malformed submission can only waste quota.
//! On exhaustion the caller receives the ordered per-attempt error list.
//!
//! ## Breakers
//!
//! `submit` and `get_status` are independent logical endpoints with
//! independent breakers: a flood of submit failures must not blind the
//! engine's polling, and vice versa.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use pv_attest::Attestation;
use pv_core::{ErrorCategory, LedgerTxId};

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::error::{LedgerClientError, StatusError, SubmissionFailure, SubmitError};
use crate::retry::RetryPolicy;
use crate::types::{parse_ack, parse_status_body, LedgerAck, LedgerStatus, SubmitEnvelope};

/// Configuration for the HTTP ledger client.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Base URL of the ledger service.
    pub base_url: String,
    /// Bearer API key, injected on every call.
    pub api_key: String,
    /// Organization identifier header value.
    pub org_id: String,
    /// Tenant identifier header value.
    pub tenant_id: String,
    /// Per-call deadline.
    pub submit_deadline: Duration,
    /// Submission retry policy.
    pub retry: RetryPolicy,
    /// Per-endpoint breaker tuning.
    pub breaker: BreakerConfig,
}

impl LedgerConfig {
    /// Create a configuration with default deadline, retry, and breaker
    /// settings.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        org_id: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            org_id: org_id.into(),
            tenant_id: tenant_id.into(),
            submit_deadline: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

/// Typed submit/query interface to the external ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit an attestation; retries and breaker accounting included.
    async fn submit(&self, attestation: &Attestation) -> Result<LedgerAck, SubmitError>;

    /// Query the commitment status of a submitted attestation.
    async fn get_status(&self, tx_id: &LedgerTxId) -> Result<LedgerStatus, StatusError>;
}

/// Production HTTP transport for the ledger contract.
#[derive(Debug)]
pub struct HttpLedgerClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    deadline: Duration,
    submit_breaker: CircuitBreaker,
    status_breaker: CircuitBreaker,
}

impl HttpLedgerClient {
    /// Build the client: default headers carry the bearer key and the
    /// organization/tenant identifiers on every call.
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerClientError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|_| LedgerClientError::Unknown {
                    reason: "invalid API key characters".into(),
                })?,
        );
        headers.insert(
            "X-Organization-Id",
            reqwest::header::HeaderValue::from_str(&config.org_id).map_err(|_| {
                LedgerClientError::Unknown {
                    reason: "invalid organization id characters".into(),
                }
            })?,
        );
        headers.insert(
            "X-Tenant-Id",
            reqwest::header::HeaderValue::from_str(&config.tenant_id).map_err(|_| {
                LedgerClientError::Unknown {
                    reason: "invalid tenant id characters".into(),
                }
            })?,
        );
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .timeout(config.submit_deadline)
            .default_headers(headers)
            .build()
            .map_err(|e| LedgerClientError::Unknown {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry,
            deadline: config.submit_deadline,
            submit_breaker: CircuitBreaker::new("submit", config.breaker),
            status_breaker: CircuitBreaker::new("status", config.breaker),
        })
    }

    /// The submit-endpoint breaker (exposed for observability).
    pub fn submit_breaker(&self) -> &CircuitBreaker {
        &self.submit_breaker
    }

    /// The status-endpoint breaker (exposed for observability).
    pub fn status_breaker(&self) -> &CircuitBreaker {
        &self.status_breaker
    }

    fn categorize_transport(&self, err: reqwest::Error) -> LedgerClientError {
        if err.is_timeout() {
            LedgerClientError::Timeout {
                elapsed_ms: self.deadline.as_millis() as u64,
            }
        } else if err.is_connect() || err.is_request() {
            LedgerClientError::Network {
                reason: err.to_string(),
            }
        } else {
            LedgerClientError::Unknown {
                reason: err.to_string(),
            }
        }
    }

    /// One submission attempt: send, classify the status code, parse the
    /// body.
    async fn send_submit(
        &self,
        url: &str,
        payload: &[SubmitEnvelope<'_>; 1],
    ) -> Result<Value, LedgerClientError> {
        let resp = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.categorize_transport(e))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(LedgerClientError::RateLimited {
                status: status.as_u16(),
            });
        }
        if status.is_server_error() {
            let body = body_excerpt(resp).await;
            return Err(LedgerClientError::Server {
                status: status.as_u16(),
                body,
            });
        }
        if status.is_client_error() {
            let body = body_excerpt(resp).await;
            return Err(LedgerClientError::Client {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| LedgerClientError::Unknown {
                reason: format!("response deserialization failed: {e}"),
            })
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn submit(&self, attestation: &Attestation) -> Result<LedgerAck, SubmitError> {
        let url = format!("{}/attestations", self.base_url);
        let payload = SubmitEnvelope::payload(attestation);
        let mut attempts: Vec<LedgerClientError> = Vec::new();

        for attempt in 1..=self.retry.max_attempts {
            self.submit_breaker.try_acquire()?;

            match self.send_submit(&url, &payload).await {
                Ok(body) => {
                    self.submit_breaker.on_success();
                    let ack = parse_ack(&body, attestation.fingerprint());
                    if ack.synthetic {
                        tracing::warn!(
                            fingerprint = %attestation.fingerprint(),
                            "ledger ack carried no identifier; recorded local fingerprint"
                        );
                    }
                    tracing::info!(tx_id = %ack.tx_id, attempt, "attestation submitted");
                    return Ok(ack);
                }
                Err(err) => {
                    let category = err.category();
                    // A 4xx reflects the request, not endpoint health; it
                    // neither trips the breaker nor earns a retry.
                    if category != ErrorCategory::Client {
                        self.submit_breaker.on_failure();
                    }
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        category = %category,
                        "ledger submission attempt failed: {err}"
                    );

                    if !err.is_retryable() {
                        return Err(SubmitError::Rejected(err));
                    }

                    let rate_limited = category == ErrorCategory::RateLimited;
                    attempts.push(err);
                    if attempt < self.retry.max_attempts {
                        let delay = self.retry.backoff_delay(attempt, rate_limited);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(SubmissionFailure { attempts }.into())
    }

    async fn get_status(&self, tx_id: &LedgerTxId) -> Result<LedgerStatus, StatusError> {
        self.status_breaker.try_acquire()?;

        let url = format!("{}/attestations/{}", self.base_url, tx_id.as_str());
        let resp = match self.http.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                self.status_breaker.on_failure();
                return Err(StatusError::Query(self.categorize_transport(e)));
            }
        };

        let status = resp.status();
        if status.as_u16() == 404 {
            self.status_breaker.on_success();
            return Ok(LedgerStatus::NotFound);
        }
        if status.as_u16() == 429 {
            self.status_breaker.on_failure();
            return Err(StatusError::Query(LedgerClientError::RateLimited {
                status: status.as_u16(),
            }));
        }
        if status.is_server_error() {
            self.status_breaker.on_failure();
            let body = body_excerpt(resp).await;
            return Err(StatusError::Query(LedgerClientError::Server {
                status: status.as_u16(),
                body,
            }));
        }
        if status.is_client_error() {
            let body = body_excerpt(resp).await;
            return Err(StatusError::Query(LedgerClientError::Client {
                status: status.as_u16(),
                body,
            }));
        }

        let body: Value = match resp.json().await {
            Ok(body) => body,
            Err(e) => {
                self.status_breaker.on_failure();
                return Err(StatusError::Query(LedgerClientError::Unknown {
                    reason: format!("response deserialization failed: {e}"),
                }));
            }
        };

        match parse_status_body(&body) {
            Some(ledger_status) => {
                self.status_breaker.on_success();
                Ok(ledger_status)
            }
            None => Err(StatusError::Query(LedgerClientError::Unknown {
                reason: format!("unrecognized status body: {body}"),
            })),
        }
    }
}

/// Read at most 1 KiB of the response body for diagnostics.
async fn body_excerpt(resp: reqwest::Response) -> String {
    let mut body = resp.text().await.unwrap_or_default();
    body.truncate(1024);
    body
}
