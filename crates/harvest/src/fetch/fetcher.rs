//! Rate-limited, retrying JSON fetcher.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;

use super::endpoint::{Endpoint, Keys, Request};
use super::gate::AdmissionGate;
use super::transport::{HttpTransport, Transport};

/// Retry schedule for one logical fetch.
///
/// Attempt 0 is preceded by `initial_delay_ms`; attempt `n > 0` by
/// `2^n * backoff_unit_ms` (2 s, 4 s, ... with the default unit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_unit_ms: u64,
}

impl RetryPolicy {
    /// Delay before the given (0-based) attempt.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::from_millis(self.initial_delay_ms)
        } else {
            let factor = 2u64.saturating_pow(attempt);
            Duration::from_millis(factor.saturating_mul(self.backoff_unit_ms))
        }
    }

    /// A policy with no waits at all; handy for tests against real sockets.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            backoff_unit_ms: 0,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            backoff_unit_ms: 1000,
        }
    }
}

/// Fetcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum simultaneous in-flight fetches.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Per-request timeout.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            retry: RetryPolicy::default(),
            timeout_secs: 30,
            user_agent: concat!("harvest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Result of one logical fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Status 200 with a JSON body.
    Json(Value),
    /// Status 204: a valid, empty answer.
    Empty,
    /// Anything else, after retries where applicable.
    Failed,
}

impl FetchOutcome {
    pub fn into_json(self) -> Option<Value> {
        match self {
            FetchOutcome::Json(value) => Some(value),
            FetchOutcome::Empty | FetchOutcome::Failed => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed)
    }
}

/// How a status code is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    Ok,
    NoContent,
    RateLimited,
    Terminal,
}

fn classify(status: u16) -> StatusClass {
    match status {
        200 => StatusClass::Ok,
        204 => StatusClass::NoContent,
        403 => StatusClass::RateLimited,
        _ => StatusClass::Terminal,
    }
}

/// Issues GETs through a shared admission gate, retrying rate-limited
/// responses with exponential backoff.
///
/// Nothing escapes this boundary as an error: every failure is logged and
/// reported as [`FetchOutcome::Failed`] (or `None` from [`Fetcher::fetch`]).
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    gate: AdmissionGate,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, config: &FetchConfig) -> Self {
        Self {
            transport,
            gate: AdmissionGate::new(config.concurrency),
            retry: config.retry.clone(),
        }
    }

    /// A fetcher over the real network.
    pub fn http(config: &FetchConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?), config))
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Fetch and parse JSON; `None` for empty or failed responses.
    pub async fn fetch(&self, request: &Request) -> Option<Value> {
        self.fetch_outcome(request).await.into_json()
    }

    /// Render `endpoint` with `keys` and fetch it.
    pub async fn fetch_endpoint(&self, endpoint: &Endpoint, keys: &Keys) -> FetchOutcome {
        match endpoint.render(keys) {
            Ok(request) => self.fetch_outcome(&request).await,
            Err(e) => {
                warn!("{}", e);
                FetchOutcome::Failed
            }
        }
    }

    /// Fetch, distinguishing a valid empty answer from a failure.
    pub async fn fetch_outcome(&self, request: &Request) -> FetchOutcome {
        // The slot is held across retries and released when the guard drops,
        // whichever way this function returns.
        let Some(_guard) = self.gate.acquire().await else {
            warn!(url = %request, "admission gate closed");
            return FetchOutcome::Failed;
        };

        let attempts = self.retry.max_attempts.max(1);
        for attempt in 0..attempts {
            let delay = self.retry.delay_before(attempt);
            if attempt > 0 {
                debug!(url = %request, wait_ms = delay.as_millis() as u64, "retrying after backoff");
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let response = match self.transport.get(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(url = %request, "request failed: {}", e);
                    return FetchOutcome::Failed;
                }
            };

            match classify(response.status) {
                StatusClass::Ok => {
                    return match serde_json::from_str(&response.body) {
                        Ok(value) => FetchOutcome::Json(value),
                        Err(e) => {
                            warn!(url = %request, "response not in JSON format: {}", e);
                            FetchOutcome::Failed
                        }
                    };
                }
                StatusClass::NoContent => {
                    debug!(url = %request, "no content (204)");
                    return FetchOutcome::Empty;
                }
                StatusClass::RateLimited => {
                    warn!(
                        url = %request,
                        "403 on attempt {}/{}",
                        attempt + 1,
                        attempts
                    );
                }
                StatusClass::Terminal => {
                    debug!(url = %request, status = response.status, "unexpected status");
                    return FetchOutcome::Failed;
                }
            }
        }

        warn!(url = %request, "giving up after {} attempts", attempts);
        FetchOutcome::Failed
    }
}
