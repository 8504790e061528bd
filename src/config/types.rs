//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::constants::*;
use crate::error_handling::GovernorError;
use crate::governor::SelectionPolicy;
use crate::probe::{ProbeFallback, ProbeSettings};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted:
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Tuning parameters for the request governor.
///
/// None of these are architectural constants; every deployment picks its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernorConfig {
    /// Rolling window over which `max_calls_per_window` applies, per credential
    pub window: Duration,
    /// Calls one credential may make inside a window
    pub max_calls_per_window: usize,
    /// Minimum spacing between any two dispatched calls, across all credentials
    pub min_interval: Duration,
    /// Extra cooldown added when a credential is frozen
    pub freeze_buffer: Duration,
    /// Longest single sleep inside the acquire loop
    pub wait_cap: Duration,
    /// Sleep used when no credential can say how long it needs
    pub fallback_wait: Duration,
    /// Tie-break among eligible credentials
    pub selection: SelectionPolicy,
}

impl GovernorConfig {
    /// Rejects settings the governor cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `GovernorError::InvalidConfig` for a zero window, a zero call
    /// budget, or a zero wait cap (which would spin the acquire loop).
    pub fn validate(&self) -> Result<(), GovernorError> {
        if self.window.is_zero() {
            return Err(GovernorError::InvalidConfig(
                "window must be greater than zero".to_string(),
            ));
        }
        if self.max_calls_per_window == 0 {
            return Err(GovernorError::InvalidConfig(
                "max_calls_per_window must be at least 1".to_string(),
            ));
        }
        if self.wait_cap.is_zero() || self.fallback_wait.is_zero() {
            return Err(GovernorError::InvalidConfig(
                "wait_cap and fallback_wait must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(DEFAULT_WINDOW_SECS),
            max_calls_per_window: DEFAULT_MAX_CALLS_PER_WINDOW,
            min_interval: Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
            freeze_buffer: Duration::from_millis(DEFAULT_FREEZE_BUFFER_MS),
            wait_cap: Duration::from_millis(DEFAULT_WAIT_CAP_MS),
            fallback_wait: Duration::from_millis(DEFAULT_FALLBACK_WAIT_MS),
            selection: SelectionPolicy::default(),
        }
    }
}

/// Application configuration.
///
/// Parsed from the command line by the binary, or constructed directly (with
/// `..Default::default()`) when the crate is used as a library.
///
/// # Examples
///
/// ```no_run
/// use key_governor::Config;
/// use std::path::PathBuf;
///
/// let config = Config {
///     file: PathBuf::from("prompts.jsonl"),
///     keys: Some("key-one,key-two".to_string()),
///     max_calls_per_window: 10,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Parser)]
#[command(name = "key_governor")]
#[command(about = "Relay prompts to a quota-limited API across a pool of keys")]
pub struct Config {
    /// File with one request per line (JSON object or plain prompt); `-` for stdin
    pub file: PathBuf,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Comma-separated credentials
    #[arg(long, env = KEYS_ENV_VAR, hide_env_values = true)]
    pub keys: Option<String>,

    /// File with one credential per line (`#` starts a comment)
    #[arg(long)]
    pub keys_file: Option<PathBuf>,

    /// Upstream endpoint every request is POSTed to
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Header carrying the credential
    #[arg(long, default_value = DEFAULT_KEY_HEADER)]
    pub key_header: String,

    /// Rolling quota window in seconds
    #[arg(long, default_value_t = DEFAULT_WINDOW_SECS)]
    pub window_secs: u64,

    /// Calls allowed per credential per window
    #[arg(long, default_value_t = DEFAULT_MAX_CALLS_PER_WINDOW)]
    pub max_calls_per_window: usize,

    /// Minimum spacing between any two upstream calls, in milliseconds
    #[arg(long, default_value_t = DEFAULT_MIN_INTERVAL_MS)]
    pub min_interval_ms: u64,

    /// Extra cooldown added when a credential is frozen, in milliseconds
    #[arg(long, default_value_t = DEFAULT_FREEZE_BUFFER_MS)]
    pub freeze_buffer_ms: u64,

    /// Tie-break among eligible credentials
    #[arg(long, value_enum, default_value_t = SelectionPolicy::LeastUsed)]
    pub selection: SelectionPolicy,

    /// Attempts per request before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,

    /// Requests in flight at once
    #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub max_concurrency: usize,

    /// Per-request upstream timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_seconds: u64,

    /// Probe every credential before accepting traffic
    #[arg(long)]
    pub probe: bool,

    /// Probes in flight at once
    #[arg(long, default_value_t = DEFAULT_PROBE_CONCURRENCY)]
    pub probe_concurrency: usize,

    /// Per-probe timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_PROBE_TIMEOUT_MS)]
    pub probe_timeout_ms: u64,

    /// What to do when no credential passes the probe
    #[arg(long, value_enum, default_value_t = ProbeFallback::UseAll)]
    pub probe_fallback: ProbeFallback,

    /// HTTP status server port (disabled when absent)
    #[arg(long)]
    pub status_port: Option<u16>,

    /// Write JSON result lines here instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

impl Config {
    /// Governor settings derived from the CLI values.
    pub fn governor_config(&self) -> GovernorConfig {
        GovernorConfig {
            window: Duration::from_secs(self.window_secs),
            max_calls_per_window: self.max_calls_per_window,
            min_interval: Duration::from_millis(self.min_interval_ms),
            freeze_buffer: Duration::from_millis(self.freeze_buffer_ms),
            selection: self.selection,
            ..GovernorConfig::default()
        }
    }

    /// Health probe settings derived from the CLI values.
    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            concurrency: self.probe_concurrency.max(1),
            timeout: Duration::from_millis(self.probe_timeout_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file: PathBuf::from("prompts.txt"),
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            keys: None,
            keys_file: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            key_header: DEFAULT_KEY_HEADER.to_string(),
            window_secs: DEFAULT_WINDOW_SECS,
            max_calls_per_window: DEFAULT_MAX_CALLS_PER_WINDOW,
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
            freeze_buffer_ms: DEFAULT_FREEZE_BUFFER_MS,
            selection: SelectionPolicy::LeastUsed,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            probe: false,
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            probe_fallback: ProbeFallback::UseAll,
            status_port: None,
            output: None,
        }
    }
}
