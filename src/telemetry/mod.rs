//! Usage telemetry.
//!
//! Per-credential counters (calls issued, rejections, freezes, restores) and
//! the serializable snapshot types the governor builds from them. Nothing in
//! here influences credential selection.

mod counters;
mod snapshot;

pub use counters::{CounterValues, UsageTelemetry};
pub use snapshot::{CredentialSnapshot, GovernorSnapshot};
