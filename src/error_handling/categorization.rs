//! Upstream error categorization and retry strategy.
//!
//! This module decides whether an upstream failure is a quota rejection (freeze
//! the credential, pick another), transient (back off and retry), or permanent.

use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;

use super::types::UpstreamError;
use crate::config::{
    HTTP_STATUS_REQUEST_TIMEOUT, HTTP_STATUS_TOO_MANY_REQUESTS, MAX_ERROR_MESSAGE_LENGTH,
    QUOTA_ERROR_MARKERS,
};

/// Creates an exponential backoff retry strategy for transient upstream errors.
///
/// Returns a retry strategy configured with:
/// - Initial delay: `RETRY_INITIAL_DELAY_MS` milliseconds
/// - Backoff factor: `RETRY_FACTOR` (doubles delay each retry)
/// - Maximum delay: `RETRY_MAX_DELAY_SECS` seconds
///
/// The iterator is unbounded; the relay's attempt budget limits how many
/// delays are taken from it.
pub fn get_retry_strategy() -> impl Iterator<Item = Duration> {
    // tokio-retry yields `base^n * factor`, so the growth rate is the base and
    // the factor scales the first delay down to the initial value.
    ExponentialBackoff::from_millis(crate::config::RETRY_FACTOR)
        .factor(crate::config::RETRY_INITIAL_DELAY_MS / crate::config::RETRY_FACTOR)
        .max_delay(Duration::from_secs(crate::config::RETRY_MAX_DELAY_SECS))
}

/// Returns true if an error text looks like a quota or rate-limit rejection.
///
/// Matching is case-insensitive against [`QUOTA_ERROR_MARKERS`].
pub fn is_quota_message(text: &str) -> bool {
    let lowered = text.to_ascii_lowercase();
    QUOTA_ERROR_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Categorizes a non-success HTTP response.
///
/// - 429, or any status whose body mentions a quota marker: `QuotaExceeded`
/// - 408 and 5xx: `Transient`
/// - everything else: `Permanent`
pub fn categorize_status(status: u16, body: &str) -> UpstreamError {
    let message = truncate_message(body);
    if status == HTTP_STATUS_TOO_MANY_REQUESTS || is_quota_message(body) {
        return UpstreamError::QuotaExceeded { status, message };
    }
    if status == HTTP_STATUS_REQUEST_TIMEOUT || (500..600).contains(&status) {
        return UpstreamError::Transient(format!("HTTP {}: {}", status, message));
    }
    UpstreamError::Permanent { status, message }
}

/// Categorizes a `reqwest::Error` raised before a response was read.
pub fn categorize_reqwest_error(error: &reqwest::Error) -> UpstreamError {
    if let Some(status) = error.status() {
        return categorize_status(status.as_u16(), &error.to_string());
    }

    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        UpstreamError::Transient(error.to_string())
    } else if is_quota_message(&error.to_string()) {
        UpstreamError::QuotaExceeded {
            status: HTTP_STATUS_TOO_MANY_REQUESTS,
            message: truncate_message(&error.to_string()),
        }
    } else {
        UpstreamError::Permanent {
            status: 0,
            message: truncate_message(&error.to_string()),
        }
    }
}

/// Caps an upstream message at `MAX_ERROR_MESSAGE_LENGTH` characters.
fn truncate_message(text: &str) -> String {
    let trimmed = text.trim();
    let char_count = trimmed.chars().count();
    if char_count <= MAX_ERROR_MESSAGE_LENGTH {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(MAX_ERROR_MESSAGE_LENGTH).collect();
    format!("{}... (truncated, {} chars)", truncated, char_count)
}
