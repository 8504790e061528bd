//! Per-credential usage counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::governor::CredentialId;

/// Point-in-time copy of one credential's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterValues {
    /// Calls dispatched with this credential
    pub calls_issued: u64,
    /// Quota rejections reported by callers
    pub rejections: u64,
    /// Rejections that actually froze the credential
    pub freezes: u64,
    /// Cooldowns that elapsed and returned the credential to rotation
    pub restores: u64,
}

impl std::ops::Add for CounterValues {
    type Output = CounterValues;

    fn add(self, other: CounterValues) -> CounterValues {
        CounterValues {
            calls_issued: self.calls_issued + other.calls_issued,
            rejections: self.rejections + other.rejections,
            freezes: self.freezes + other.freezes,
            restores: self.restores + other.restores,
        }
    }
}

#[derive(Default)]
struct CredentialCounters {
    calls_issued: AtomicU64,
    rejections: AtomicU64,
    freezes: AtomicU64,
    restores: AtomicU64,
}

impl CredentialCounters {
    fn values(&self) -> CounterValues {
        CounterValues {
            calls_issued: self.calls_issued.load(Ordering::SeqCst),
            rejections: self.rejections.load(Ordering::SeqCst),
            freezes: self.freezes.load(Ordering::SeqCst),
            restores: self.restores.load(Ordering::SeqCst),
        }
    }
}

/// Thread-safe usage counters, one set per credential.
///
/// Sized once at construction and indexed by [`CredentialId`]; increments are
/// lock-free so the governor can record them without widening its critical
/// section. Counters are observational only and never feed back into selection.
pub struct UsageTelemetry {
    counters: Vec<CredentialCounters>,
}

impl UsageTelemetry {
    pub fn new(credential_count: usize) -> Self {
        UsageTelemetry {
            counters: (0..credential_count)
                .map(|_| CredentialCounters::default())
                .collect(),
        }
    }

    fn bump(&self, id: CredentialId, pick: impl Fn(&CredentialCounters) -> &AtomicU64) {
        match self.counters.get(id) {
            Some(counters) => {
                pick(counters).fetch_add(1, Ordering::Relaxed);
            }
            None => log::error!(
                "Telemetry has no counters for credential #{}. \
                 This indicates a bug in UsageTelemetry initialization.",
                id
            ),
        }
    }

    pub fn record_call(&self, id: CredentialId) {
        self.bump(id, |c| &c.calls_issued);
    }

    pub fn record_rejection(&self, id: CredentialId) {
        self.bump(id, |c| &c.rejections);
    }

    pub fn record_freeze(&self, id: CredentialId) {
        self.bump(id, |c| &c.freezes);
    }

    pub fn record_restore(&self, id: CredentialId) {
        self.bump(id, |c| &c.restores);
    }

    /// Counters for one credential (all zero for an unknown id).
    pub fn values(&self, id: CredentialId) -> CounterValues {
        self.counters
            .get(id)
            .map(CredentialCounters::values)
            .unwrap_or_default()
    }

    /// Sum over every credential.
    pub fn totals(&self) -> CounterValues {
        self.counters
            .iter()
            .map(CredentialCounters::values)
            .fold(CounterValues::default(), |acc, v| acc + v)
    }
}
