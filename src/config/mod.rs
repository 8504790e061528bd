//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (defaults for the governor, probe, and relay)
//! - Governor tuning parameters
//! - CLI option types and parsing

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{Config, GovernorConfig, LogFormat, LogLevel};
