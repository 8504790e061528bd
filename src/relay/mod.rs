//! Caller side of the governor.
//!
//! [`Relay`] wraps every upstream call in the governor and applies the caller
//! contract: quota rejections are reported and retried on a fresh credential,
//! transient failures are retried with exponential backoff, permanent failures
//! are returned at once. Attempts of both retriable kinds share one budget.

mod client;

pub use client::{build_request_body, extract_text, prompt_body, UpstreamClient};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error_handling::{get_retry_strategy, EventStats, EventType, RelayError, UpstreamError};
use crate::governor::{Lease, RejectionOutcome, RequestGovernor};

/// A successful relayed call.
#[derive(Debug, Clone)]
pub struct Relayed<T> {
    /// Redacted label of the credential that served the call
    pub label: String,
    /// Attempts used, counting the successful one
    pub attempts: usize,
    pub output: T,
}

/// Runs upstream calls through a shared [`RequestGovernor`].
#[derive(Clone)]
pub struct Relay {
    governor: Arc<RequestGovernor>,
    stats: Arc<EventStats>,
    max_attempts: usize,
}

impl Relay {
    /// `max_attempts` counts the first attempt; values below 1 are raised to 1.
    pub fn new(governor: Arc<RequestGovernor>, stats: Arc<EventStats>, max_attempts: usize) -> Self {
        Relay {
            governor,
            stats,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn governor(&self) -> &Arc<RequestGovernor> {
        &self.governor
    }

    pub fn stats(&self) -> &Arc<EventStats> {
        &self.stats
    }

    /// Performs `op` with a governed credential, retrying as the caller
    /// contract requires.
    ///
    /// # Errors
    ///
    /// - `RelayError::ServiceUnavailable` if the governor has no credentials
    /// - `RelayError::Upstream` for a permanent upstream failure
    /// - `RelayError::Exhausted` when every attempt hit a quota or transient error
    pub async fn call<F, Fut, T>(&self, op: F) -> Result<Relayed<T>, RelayError>
    where
        F: Fn(Lease) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut backoff = get_retry_strategy();

        for attempt in 1..=self.max_attempts {
            let (lease, outcome) = match self.governor.dispatch(&op).await {
                Ok(dispatched) => dispatched,
                Err(e) => {
                    self.stats.increment(EventType::ServiceUnavailable);
                    log::error!("Cannot relay request: {}", e);
                    return Err(RelayError::ServiceUnavailable(e));
                }
            };

            let retry_delay = match outcome {
                Ok(output) => {
                    self.stats.increment(EventType::RequestCompleted);
                    return Ok(Relayed {
                        label: lease.label().to_string(),
                        attempts: attempt,
                        output,
                    });
                }
                Err(UpstreamError::QuotaExceeded { status, .. }) => {
                    self.stats.increment(EventType::QuotaRejected);
                    log::warn!(
                        "Credential {} rejected with HTTP {} (attempt {}/{})",
                        lease.label(),
                        status,
                        attempt,
                        self.max_attempts
                    );
                    match self.governor.report_rejection(&lease).await {
                        RejectionOutcome::Frozen { .. } => {
                            self.stats.increment(EventType::CredentialFrozen);
                            None
                        }
                        RejectionOutcome::Ignored => {
                            self.stats.increment(EventType::RejectionIgnored);
                            backoff.next()
                        }
                    }
                }
                Err(UpstreamError::Transient(message)) => {
                    self.stats.increment(EventType::TransientError);
                    log::warn!(
                        "Transient upstream error via {} (attempt {}/{}): {}",
                        lease.label(),
                        attempt,
                        self.max_attempts,
                        message
                    );
                    backoff.next()
                }
                Err(e) => {
                    self.stats.increment(EventType::PermanentError);
                    log::error!("Upstream rejected request via {}: {}", lease.label(), e);
                    return Err(RelayError::Upstream(e));
                }
            };

            if attempt < self.max_attempts {
                pause(retry_delay).await;
            }
        }

        self.stats.increment(EventType::RetriesExhausted);
        log::warn!("Giving up after {} attempts", self.max_attempts);
        Err(RelayError::Exhausted {
            attempts: self.max_attempts,
        })
    }
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        log::debug!("Backing off for {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}
