//! Status server data structures.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error_handling::EventStats;
use crate::governor::RequestGovernor;
use crate::telemetry::GovernorSnapshot;

/// Shared state for the status server
#[derive(Clone)]
pub struct StatusState {
    pub total_requests: Arc<AtomicUsize>,
    pub completed_requests: Arc<AtomicUsize>,
    pub failed_requests: Arc<AtomicUsize>,
    pub start_time: Arc<Instant>,
    pub event_stats: Arc<EventStats>,
    pub governor: Arc<RequestGovernor>,
}

impl StatusState {
    /// Fresh progress counters around an existing governor and event stats.
    pub fn new(governor: Arc<RequestGovernor>, event_stats: Arc<EventStats>) -> Self {
        StatusState {
            total_requests: Arc::new(AtomicUsize::new(0)),
            completed_requests: Arc::new(AtomicUsize::new(0)),
            failed_requests: Arc::new(AtomicUsize::new(0)),
            start_time: Arc::new(Instant::now()),
            event_stats,
            governor,
        }
    }

    pub(crate) fn progress(&self) -> Progress {
        let total = self.total_requests.load(Ordering::SeqCst);
        let completed = self.completed_requests.load(Ordering::SeqCst);
        let failed = self.failed_requests.load(Ordering::SeqCst);
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let attempted = completed + failed;
        Progress {
            total,
            completed,
            failed,
            pending: total.saturating_sub(attempted),
            percentage: if total > 0 {
                (attempted as f64 / total as f64) * 100.0
            } else {
                0.0
            },
            elapsed,
            rate: if elapsed > 0.0 {
                completed as f64 / elapsed
            } else {
                0.0
            },
        }
    }
}

/// Point-in-time batch progress, derived from the atomics.
pub(crate) struct Progress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub percentage: f64,
    pub elapsed: f64,
    pub rate: f64,
}

/// JSON response for `/status` endpoint
#[derive(Serialize)]
pub struct StatusResponse {
    pub total_requests: usize,
    pub completed_requests: usize,
    pub failed_requests: usize,
    pub pending_requests: usize,
    pub percentage_complete: f64,
    pub elapsed_seconds: f64,
    pub rate_per_second: f64,
    /// Event counters keyed by metric name
    pub events: BTreeMap<&'static str, usize>,
    pub governor: GovernorSnapshot,
}
