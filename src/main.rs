//! Main application entry point (CLI binary).
//!
//! A thin wrapper around the `key_governor` library that handles:
//! - Environment variable loading (.env file, e.g. `KEY_GOVERNOR_KEYS`)
//! - Command-line argument parsing
//! - Logger initialization
//! - The end-of-run summary on stderr (stdout carries the results)

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use key_governor::initialization::init_logger_with;
use key_governor::{run_batch, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal; keys may come from the CLI or the real environment
    if dotenvy::dotenv().is_err() {
        if let Some(env_path) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(".env")))
        {
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
            }
        }
    }

    let config = Config::parse();

    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    match run_batch(config).await {
        Ok(report) => {
            eprintln!(
                "Relayed {} request{} ({} succeeded, {} failed) across {} credential{} in {:.1}s",
                report.total_requests,
                if report.total_requests == 1 { "" } else { "s" },
                report.successful,
                report.failed,
                report.credentials,
                if report.credentials == 1 { "" } else { "s" },
                report.elapsed_seconds
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("key_governor error: {:#}", e);
            process::exit(1);
        }
    }
}
