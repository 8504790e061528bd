//! Optional credential health probe.
//!
//! Before the governor accepts traffic, every configured credential can be
//! tried once with a minimal call. Probes run in parallel under a concurrency
//! limit and a per-probe timeout. A credential is usable if the call succeeds
//! or is rejected for quota reasons (the key is valid, just capped right now);
//! anything else excludes it from the initial pool.
//!
//! What happens when nothing passes is an explicit choice, see [`ProbeFallback`].

mod http;

pub use http::HttpProber;

use async_trait::async_trait;
use clap::ValueEnum;
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::config::{DEFAULT_PROBE_CONCURRENCY, DEFAULT_PROBE_TIMEOUT_MS};
use crate::error_handling::GovernorError;
use crate::governor::redact;

/// Classification of one probed credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// The call succeeded.
    Working,
    /// The upstream rejected the call for quota reasons; the key itself is valid.
    QuotaLimited,
    /// Auth failure, other HTTP error, network error, or timeout.
    Dead(String),
}

impl ProbeVerdict {
    pub fn is_usable(&self) -> bool {
        !matches!(self, ProbeVerdict::Dead(_))
    }
}

/// Limits for one probe pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Probes in flight at once
    pub concurrency: usize,
    /// Time allowed per probe
    pub timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        ProbeSettings {
            concurrency: DEFAULT_PROBE_CONCURRENCY,
            timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
        }
    }
}

/// What to do when no credential passes the probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ProbeFallback {
    /// Start with the full unfiltered list; probe failures may be false negatives
    #[default]
    UseAll,
    /// Refuse to start
    Refuse,
}

/// Performs one minimal upstream call with a credential.
#[async_trait]
pub trait CredentialProber: Send + Sync {
    async fn probe(&self, secret: &str) -> ProbeVerdict;
}

/// Result for a single credential.
#[derive(Clone)]
pub struct ProbeOutcome {
    secret: String,
    position: usize,
    pub label: String,
    pub verdict: ProbeVerdict,
    pub latency: Duration,
}

impl std::fmt::Debug for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeOutcome")
            .field("label", &self.label)
            .field("verdict", &self.verdict)
            .field("latency", &self.latency)
            .finish()
    }
}

/// Results of a probe pass: usable credentials fastest first, then failures in
/// configuration order.
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    working: Vec<ProbeOutcome>,
    failed: Vec<ProbeOutcome>,
}

impl ProbeReport {
    pub fn working(&self) -> &[ProbeOutcome] {
        &self.working
    }

    pub fn failed(&self) -> &[ProbeOutcome] {
        &self.failed
    }

    pub fn total(&self) -> usize {
        self.working.len() + self.failed.len()
    }

    /// Secrets to build the governor from.
    ///
    /// Usable credentials come back fastest first. If none passed, `fallback`
    /// decides: `UseAll` returns every probed credential in configuration
    /// order, `Refuse` fails.
    ///
    /// # Errors
    ///
    /// Returns `GovernorError::NoWorkingCredentials` when nothing passed and
    /// `fallback` is `Refuse`.
    pub fn into_pool(self, fallback: ProbeFallback) -> Result<Vec<String>, GovernorError> {
        if !self.working.is_empty() {
            return Ok(self.working.into_iter().map(|o| o.secret).collect());
        }

        match fallback {
            ProbeFallback::Refuse => Err(GovernorError::NoWorkingCredentials),
            ProbeFallback::UseAll => {
                if !self.failed.is_empty() {
                    log::warn!(
                        "No credential passed the health probe; falling back to all {} configured credential(s)",
                        self.failed.len()
                    );
                }
                let mut all = self.failed;
                all.sort_by_key(|o| o.position);
                Ok(all.into_iter().map(|o| o.secret).collect())
            }
        }
    }
}

/// Probes every secret once and classifies it.
///
/// At most `settings.concurrency` probes run at a time; a probe that does not
/// finish within `settings.timeout` counts as dead.
pub async fn probe_credentials<P>(secrets: &[String], prober: &P, settings: ProbeSettings) -> ProbeReport
where
    P: CredentialProber + ?Sized,
{
    let semaphore = Semaphore::new(settings.concurrency.max(1));
    let mut tasks = FuturesUnordered::new();

    for (position, secret) in secrets.iter().enumerate() {
        let semaphore = &semaphore;
        tasks.push(async move {
            let (verdict, latency) = match semaphore.acquire().await {
                Ok(_permit) => {
                    let started = Instant::now();
                    let verdict = match tokio::time::timeout(settings.timeout, prober.probe(secret)).await {
                        Ok(verdict) => verdict,
                        Err(_) => ProbeVerdict::Dead(format!(
                            "timed out after {}ms",
                            settings.timeout.as_millis()
                        )),
                    };
                    (verdict, started.elapsed())
                }
                Err(_) => (
                    ProbeVerdict::Dead("probe semaphore closed".to_string()),
                    Duration::ZERO,
                ),
            };
            ProbeOutcome {
                secret: secret.clone(),
                position,
                label: redact(secret),
                verdict,
                latency,
            }
        });
    }

    let mut report = ProbeReport::default();
    while let Some(outcome) = tasks.next().await {
        match &outcome.verdict {
            ProbeVerdict::Working => {
                log::info!(
                    "Credential {} is working ({}ms)",
                    outcome.label,
                    outcome.latency.as_millis()
                );
                report.working.push(outcome);
            }
            ProbeVerdict::QuotaLimited => {
                log::info!(
                    "Credential {} is valid but currently rate limited",
                    outcome.label
                );
                report.working.push(outcome);
            }
            ProbeVerdict::Dead(reason) => {
                log::warn!("Credential {} failed the health probe: {}", outcome.label, reason);
                report.failed.push(outcome);
            }
        }
    }

    report.working.sort_by_key(|o| o.latency);
    report.failed.sort_by_key(|o| o.position);
    log::info!(
        "Health probe finished: {}/{} credential(s) usable",
        report.working.len(),
        report.total()
    );
    report
}
