//! Read-only governor snapshot for dashboards and logs.
//!
//! Credentials are addressed by their redacted label only.

use serde::Serialize;

use super::counters::CounterValues;

/// State of one credential at snapshot time.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialSnapshot {
    /// Redacted secret (`abcd…wxyz`)
    pub label: String,
    /// Calls counted in the current window
    pub calls_in_window: usize,
    /// Lifetime usage count
    pub usage_count: u64,
    /// Whether the credential is excluded by a cooldown
    pub frozen: bool,
    /// Seconds until the cooldown ends, if frozen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen_remaining_secs: Option<f64>,
    /// Whether the credential could be handed out right now
    pub eligible: bool,
    /// Telemetry counters
    pub counters: CounterValues,
}

/// State of the whole pool at snapshot time.
#[derive(Debug, Clone, Serialize)]
pub struct GovernorSnapshot {
    pub credentials: Vec<CredentialSnapshot>,
    pub eligible_count: usize,
    pub frozen_count: usize,
    pub window_secs: f64,
    pub max_calls_per_window: usize,
    pub totals: CounterValues,
}

impl GovernorSnapshot {
    /// One-line summary suitable for an info log.
    pub fn summary(&self) -> String {
        format!(
            "{} credential(s): {} eligible, {} frozen, {} calls issued, {} freezes",
            self.credentials.len(),
            self.eligible_count,
            self.frozen_count,
            self.totals.calls_issued,
            self.totals.freezes
        )
    }
}
