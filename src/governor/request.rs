//! The request governor: the single entry point wrapped around every upstream call.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use super::credential::Lease;
use super::pool::CredentialPool;
use super::selection;
use crate::config::{GovernorConfig, WAIT_PADDING};
use crate::error_handling::GovernorError;
use crate::telemetry::{CredentialSnapshot, GovernorSnapshot, UsageTelemetry};

/// Result of one pass of the acquire state machine.
#[derive(Debug)]
pub enum AcquireStep {
    /// A credential was claimed; its window slot is already recorded.
    Found(Lease),
    /// Nothing is eligible; scan again after this long.
    Wait(Duration),
    /// The pool has no credentials at all.
    Empty,
}

/// What `report_rejection` did with the credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionOutcome {
    /// The credential is excluded from selection until `until`.
    Frozen {
        /// Cooldown end
        until: Instant,
        /// Cooldown length from the moment of the report
        duration: Duration,
    },
    /// The window still had capacity; treated as a transient upstream error.
    Ignored,
}

/// Arbiter for a pool of interchangeable credentials.
///
/// Guarantees, for every credential, at most `max_calls_per_window` calls in any
/// rolling window, and at least `min_interval` between any two dispatched calls
/// process-wide. Credentials reported as rejected are frozen until their window
/// frees up plus a buffer.
///
/// # Concurrency
///
/// Pool state sits behind one mutex; eligibility is read and the use is
/// recorded in the same critical section, so two sessions can never both claim
/// the last slot of a window. Nothing is reserved before that step, which makes
/// a waiting `acquire` safe to cancel. Acquisition order across sessions is not
/// FIFO: whichever session scans next after capacity frees up wins.
pub struct RequestGovernor {
    pool: Mutex<CredentialPool>,
    last_dispatch: Mutex<Option<Instant>>,
    telemetry: UsageTelemetry,
    config: GovernorConfig,
}

impl RequestGovernor {
    /// Creates a governor over `secrets`.
    ///
    /// An empty secret list is accepted here so that the caller sees the
    /// configuration error from `acquire`, the point where it must be handled.
    ///
    /// # Errors
    ///
    /// Returns `GovernorError::InvalidConfig` if `config` fails validation.
    pub fn new<S: AsRef<str>>(secrets: &[S], config: GovernorConfig) -> Result<Self, GovernorError> {
        config.validate()?;
        let pool = CredentialPool::new(secrets, config.window, config.max_calls_per_window);
        if pool.is_empty() {
            log::warn!("Request governor created with zero credentials; every acquire will fail");
        } else {
            log::info!(
                "Request governor initialized: {} credential(s), {} calls per {:?}, min interval {:?}, {:?} selection",
                pool.len(),
                config.max_calls_per_window,
                config.window,
                config.min_interval,
                config.selection
            );
        }

        Ok(RequestGovernor {
            telemetry: UsageTelemetry::new(pool.len()),
            pool: Mutex::new(pool),
            last_dispatch: Mutex::new(None),
            config,
        })
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &UsageTelemetry {
        &self.telemetry
    }

    /// Number of configured credentials (frozen ones included).
    pub async fn len(&self) -> usize {
        self.pool.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pool.lock().await.is_empty()
    }

    /// Runs one pass of the acquire state machine without sleeping.
    ///
    /// Restores expired cooldowns, then either claims an eligible credential,
    /// reports how long to wait, or reports an empty pool.
    pub async fn try_acquire(&self) -> AcquireStep {
        let mut pool = self.pool.lock().await;
        let now = Instant::now();

        for id in pool.restore_expired(now) {
            self.telemetry.record_restore(id);
            if let Some(credential) = pool.get(id) {
                log::info!("Credential {} restored to rotation", credential.label());
            }
        }

        if pool.is_empty() {
            return AcquireStep::Empty;
        }

        let candidates = pool.eligible_with_usage(now);
        let picked = selection::choose(self.config.selection, &candidates, &mut rand::rng());
        if let Some(id) = picked {
            pool.record_use(id, now);
            self.telemetry.record_call(id);
            if let Some(lease) = pool.lease(id, now) {
                log::debug!("Acquired credential {}", lease.label());
                return AcquireStep::Found(lease);
            }
        }

        let wait = match pool.soonest_available(now) {
            Some(soonest) => (soonest + WAIT_PADDING).min(self.config.wait_cap),
            None => match pool.soonest_thaw(now) {
                Some(thaw) => thaw.min(self.config.wait_cap),
                None => self.config.fallback_wait,
            },
        };
        AcquireStep::Wait(wait.max(Duration::from_millis(1)))
    }

    /// Claims a credential, waiting as long as it takes for one to free up.
    ///
    /// There is no retry limit here; wrap the call in a timeout to bound it.
    /// Dropping the future while it waits has no side effects.
    ///
    /// # Errors
    ///
    /// Returns `GovernorError::NoCredentials` immediately if the pool is empty.
    pub async fn acquire(&self) -> Result<Lease, GovernorError> {
        loop {
            match self.try_acquire().await {
                AcquireStep::Found(lease) => return Ok(lease),
                AcquireStep::Empty => return Err(GovernorError::NoCredentials),
                AcquireStep::Wait(wait) => {
                    log::debug!("No credential eligible, waiting {:?}", wait);
                    sleep(wait).await;
                }
            }
        }
    }

    /// Acquires a credential, waits out the global minimum interval, then runs
    /// `call` with the lease.
    ///
    /// The credential's window slot is restamped with the moment the call goes
    /// out, so the per-credential quota holds for real call times even when
    /// dispatches queue up behind the throttle. A claim that ages out of its
    /// window while queued is only used if the window still has room;
    /// otherwise a fresh credential is acquired.
    ///
    /// Returns the lease alongside the call's output so the caller can report a
    /// rejection against the credential that was used.
    ///
    /// # Errors
    ///
    /// Returns `GovernorError::NoCredentials` if the pool is empty; `call` is
    /// not invoked in that case.
    pub async fn dispatch<F, Fut, T>(&self, call: F) -> Result<(Lease, T), GovernorError>
    where
        F: FnOnce(Lease) -> Fut,
        Fut: Future<Output = T>,
    {
        let lease = loop {
            let lease = self.acquire().await?;
            if self.pass_global_throttle(&lease).await {
                break lease;
            }
            log::debug!(
                "Claim on {} aged out while queued, acquiring again",
                lease.label()
            );
        };
        let output = call(lease.clone()).await;
        Ok((lease, output))
    }

    /// Sleeps until `min_interval` has passed since the previous dispatch, then
    /// moves the lease's window slot to now and stamps this dispatch. The
    /// throttle lock is held through the sleep so concurrent dispatches line up
    /// one interval apart.
    ///
    /// Returns false, without stamping, if the lease's slot was lost.
    async fn pass_global_throttle(&self, lease: &Lease) -> bool {
        let mut last = self.last_dispatch.lock().await;
        if let Some(previous) = *last {
            let elapsed = Instant::now().saturating_duration_since(previous);
            if elapsed < self.config.min_interval {
                sleep(self.config.min_interval - elapsed).await;
            }
        }

        let now = Instant::now();
        let confirmed = self
            .pool
            .lock()
            .await
            .confirm_dispatch(lease.id(), lease.claimed_at(), now);
        if confirmed {
            *last = Some(now);
        }
        confirmed
    }

    /// Handles an upstream quota rejection for the credential behind `lease`.
    ///
    /// If the credential's window is full, it is frozen until the window frees
    /// up plus `freeze_buffer`. If the window still has room, the rejection is
    /// not a real quota breach and nothing changes.
    pub async fn report_rejection(&self, lease: &Lease) -> RejectionOutcome {
        let mut pool = self.pool.lock().await;
        let now = Instant::now();

        let Some(check) = pool.check(lease.id(), now) else {
            log::error!(
                "Rejection reported for unknown credential #{} ({})",
                lease.id(),
                lease.label()
            );
            return RejectionOutcome::Ignored;
        };
        self.telemetry.record_rejection(lease.id());

        if check.eligible {
            log::debug!(
                "Credential {} rejected but its window has capacity; not freezing",
                lease.label()
            );
            return RejectionOutcome::Ignored;
        }

        let duration = check.wait + self.config.freeze_buffer;
        let until = now + duration;
        pool.freeze(lease.id(), until);
        self.telemetry.record_freeze(lease.id());
        log::warn!(
            "Credential {} hit its quota, frozen for {:.1}s",
            lease.label(),
            duration.as_secs_f64()
        );

        RejectionOutcome::Frozen { until, duration }
    }

    /// Read-only view of every credential, addressed by redacted label.
    pub async fn snapshot(&self) -> GovernorSnapshot {
        let mut pool = self.pool.lock().await;
        let now = Instant::now();
        let ids: Vec<_> = pool.iter().map(|c| c.id()).collect();

        let mut credentials = Vec::with_capacity(ids.len());
        for id in ids {
            let calls_in_window = pool.calls_in_window(id, now);
            let Some(credential) = pool.get(id) else {
                continue;
            };
            let remaining = credential.cooldown_remaining(now);
            let frozen = remaining.is_some();
            credentials.push(CredentialSnapshot {
                label: credential.label().to_string(),
                calls_in_window,
                usage_count: credential.usage_count(),
                frozen,
                frozen_remaining_secs: remaining.map(|d| d.as_secs_f64()),
                eligible: !frozen && calls_in_window < pool.max_calls(),
                counters: self.telemetry.values(id),
            });
        }

        GovernorSnapshot {
            eligible_count: credentials.iter().filter(|c| c.eligible).count(),
            frozen_count: credentials.iter().filter(|c| c.frozen).count(),
            window_secs: pool.window().as_secs_f64(),
            max_calls_per_window: pool.max_calls(),
            totals: self.telemetry.totals(),
            credentials,
        }
    }
}
