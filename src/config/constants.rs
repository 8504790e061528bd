//! Configuration constants.
//!
//! Defaults for the governor, the health probe, the relay, and the CLI. All of
//! the governor values are deployment tuning knobs and can be overridden on the
//! command line or in [`GovernorConfig`](super::GovernorConfig).

use std::time::Duration;

// Governor defaults
/// Rolling quota window per credential
pub const DEFAULT_WINDOW_SECS: u64 = 60;
/// Calls allowed per credential inside one window
pub const DEFAULT_MAX_CALLS_PER_WINDOW: usize = 15;
/// Minimum spacing between any two dispatched calls, process-wide
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 1000;
/// Added to the computed cooldown when a credential is frozen, to absorb clock skew
pub const DEFAULT_FREEZE_BUFFER_MS: u64 = 2000;
/// Upper bound on a single wait inside the acquire loop, so state is re-read often
pub const DEFAULT_WAIT_CAP_MS: u64 = 5000;
/// Wait used when no credential reports how long it needs
pub const DEFAULT_FALLBACK_WAIT_MS: u64 = 500;
/// Added to the soonest window wait before re-scanning
pub const WAIT_PADDING: Duration = Duration::from_secs(1);

// Health probe
/// Probes allowed in flight at once
pub const DEFAULT_PROBE_CONCURRENCY: usize = 10;
/// Per-probe timeout in milliseconds
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3000;
/// Prompt sent by the HTTP probe; kept tiny so probing costs almost nothing
pub const PROBE_PROMPT: &str = "ping";

// Relay
/// Attempts per relayed call, counting the first one
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;
/// Upstream request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Relayed calls allowed in flight at once in batch mode
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Default upstream endpoint (Gemini `generateContent`)
pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
/// Header the credential is sent in
pub const DEFAULT_KEY_HEADER: &str = "x-goog-api-key";
/// Environment variable holding comma-separated credentials
pub const KEYS_ENV_VAR: &str = "KEY_GOVERNOR_KEYS";

/// User-Agent sent upstream
pub const DEFAULT_USER_AGENT: &str = concat!("key_governor/", env!("CARGO_PKG_VERSION"));

// Retry strategy (transient errors only; quota errors rotate credentials instead)
/// Initial delay in milliseconds before first retry
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;
/// Factor by which retry delay is multiplied on each attempt
pub const RETRY_FACTOR: u64 = 2;
/// Maximum delay between retries in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 15;

// Error message size limits
/// Maximum upstream error text kept in errors and logs
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 500;

/// Lowercase substrings that mark an upstream error as a quota rejection
pub const QUOTA_ERROR_MARKERS: &[&str] = &[
    "429",
    "quota",
    "rate limit",
    "rate_limit",
    "resource_exhausted",
    "too many requests",
];

// Progress logging
/// Progress log interval in seconds
pub const LOGGING_INTERVAL: u64 = 5;
/// Progress log interval when the status server is enabled
pub const STATUS_SERVER_LOGGING_INTERVAL_SECS: u64 = 30;

// HTTP status codes (for clarity and consistency)
pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;
pub const HTTP_STATUS_REQUEST_TIMEOUT: u16 = 408;
