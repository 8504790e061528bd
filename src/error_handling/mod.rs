//! Error handling and relay statistics.
//!
//! This module provides:
//! - Error type definitions for the governor, upstream calls, and the relay
//! - Upstream error categorization (quota vs transient vs permanent)
//! - Retry strategy configuration for transient failures
//! - Event statistics tracking

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{
    categorize_reqwest_error, categorize_status, get_retry_strategy, is_quota_message,
};
pub use stats::EventStats;
pub use types::{EventType, GovernorError, InitializationError, RelayError, UpstreamError};
