//! Error type definitions.
//!
//! This module defines the governor, upstream, relay, and initialization errors,
//! plus the event types tracked in [`EventStats`](super::EventStats).

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Errors signalled by the request governor.
///
/// Only configuration problems are errors; "no credential right now" is a wait.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernorError {
    /// Zero credentials configured. Fatal, never retried.
    #[error("No credentials configured: the governor has nothing to hand out")]
    NoCredentials,

    /// A governor setting is out of range.
    #[error("Invalid governor configuration: {0}")]
    InvalidConfig(String),

    /// Every credential failed the health probe and the fallback refuses to start.
    #[error("No credential passed the health probe")]
    NoWorkingCredentials,
}

/// Outcome of a failed upstream call, as seen by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// The upstream rejected the call for quota or rate-limit reasons.
    #[error("Upstream quota exceeded (HTTP {status}): {message}")]
    QuotaExceeded {
        /// HTTP status code
        status: u16,
        /// Upstream error text (truncated)
        message: String,
    },

    /// Timeouts, connection failures, 5xx: worth retrying later.
    #[error("Transient upstream error: {0}")]
    Transient(String),

    /// Any other rejection; retrying will not help.
    #[error("Upstream rejected the request (HTTP {status}): {message}")]
    Permanent {
        /// HTTP status code
        status: u16,
        /// Upstream error text (truncated)
        message: String,
    },
}

impl UpstreamError {
    /// True for quota/rate-limit rejections.
    pub fn is_quota(&self) -> bool {
        matches!(self, UpstreamError::QuotaExceeded { .. })
    }
}

/// Errors returned to the end user by the relay.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The governor cannot hand out credentials at all.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(#[from] GovernorError),

    /// Every attempt hit a quota or transient error.
    #[error("All {attempts} attempts were rejected, try again later")]
    Exhausted {
        /// Attempts made before giving up
        attempts: usize,
    },

    /// A non-retriable upstream failure.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),

    /// Error reading the credential file.
    #[error("Credential file error: {0}")]
    CredentialFileError(#[from] std::io::Error),

    /// The upstream endpoint could not be parsed.
    #[error("Invalid endpoint URL: {0}")]
    EndpointError(#[from] url::ParseError),
}

/// Events counted while relaying calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum EventType {
    RequestCompleted,
    QuotaRejected,
    CredentialFrozen,
    RejectionIgnored,
    TransientError,
    PermanentError,
    RetriesExhausted,
    ServiceUnavailable,
    ProbeFailed,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::RequestCompleted => "Request completed",
            EventType::QuotaRejected => "Quota rejection (429)",
            EventType::CredentialFrozen => "Credential frozen",
            EventType::RejectionIgnored => "Rejection ignored (window had capacity)",
            EventType::TransientError => "Transient upstream error",
            EventType::PermanentError => "Permanent upstream error",
            EventType::RetriesExhausted => "Retries exhausted",
            EventType::ServiceUnavailable => "Service unavailable (no credentials)",
            EventType::ProbeFailed => "Health probe failed",
        }
    }

    /// Snake-case name used for metric labels and JSON keys.
    pub fn metric_name(&self) -> &'static str {
        match self {
            EventType::RequestCompleted => "request_completed",
            EventType::QuotaRejected => "quota_rejected",
            EventType::CredentialFrozen => "credential_frozen",
            EventType::RejectionIgnored => "rejection_ignored",
            EventType::TransientError => "transient_error",
            EventType::PermanentError => "permanent_error",
            EventType::RetriesExhausted => "retries_exhausted",
            EventType::ServiceUnavailable => "service_unavailable",
            EventType::ProbeFailed => "probe_failed",
        }
    }
}
