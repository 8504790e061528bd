//! key_governor library: spread upstream API calls across a pool of keys
//!
//! The core is [`RequestGovernor`], which hands out credentials so that no key
//! exceeds its rolling-window quota, spaces every dispatched call by a global
//! minimum interval, and freezes keys the upstream rejects until their window
//! frees up. [`Relay`] wraps it with the caller side of the contract (report
//! rejections, rotate, back off), and [`run_batch`] drives a whole file of
//! prompts through it.
//!
//! # Example
//!
//! ```no_run
//! use key_governor::{GovernorConfig, RequestGovernor};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let governor = RequestGovernor::new(
//!     &["first-key", "second-key"],
//!     GovernorConfig {
//!         window: Duration::from_secs(60),
//!         max_calls_per_window: 15,
//!         ..Default::default()
//!     },
//! )?;
//!
//! let (lease, status) = governor
//!     .dispatch(|_lease| async move {
//!         // call the upstream with _lease.secret()
//!         429u16
//!     })
//!     .await?;
//! if status == 429 {
//!     governor.report_rejection(&lease).await;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime.

mod app;
pub mod config;
pub mod error_handling;
pub mod governor;
pub mod initialization;
pub mod probe;
pub mod relay;
mod status_server;
pub mod telemetry;

// Re-export public API
pub use config::{Config, GovernorConfig, LogFormat, LogLevel};
pub use error_handling::{GovernorError, RelayError, UpstreamError};
pub use governor::{Lease, RejectionOutcome, RequestGovernor, SelectionPolicy};
pub use probe::{ProbeFallback, ProbeReport, ProbeVerdict};
pub use relay::{Relay, Relayed, UpstreamClient};
pub use run::{run_batch, BatchReport};
pub use telemetry::GovernorSnapshot;

// Internal run module (drives a batch of requests through the governor)
mod run {
    use anyhow::{Context, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures::stream::FuturesUnordered;
    use futures::StreamExt;
    use log::{info, warn};
    use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::app::{
        log_progress, open_output, print_credential_summary, print_event_statistics,
        shutdown_gracefully, spawn_writer, BatchRecord,
    };
    use crate::config::{Config, LOGGING_INTERVAL, STATUS_SERVER_LOGGING_INTERVAL_SECS};
    use crate::error_handling::{EventStats, EventType, GovernorError};
    use crate::governor::RequestGovernor;
    use crate::initialization::{init_semaphore, init_upstream, load_credentials};
    use crate::probe::{probe_credentials, HttpProber};
    use crate::relay::{build_request_body, Relay};
    use crate::status_server::{start_status_server, StatusState};
    use crate::telemetry::GovernorSnapshot;

    /// Results of a batch run.
    #[derive(Debug, Clone)]
    pub struct BatchReport {
        /// Requests read from the input
        pub total_requests: usize,
        /// Requests relayed successfully
        pub successful: usize,
        /// Requests that ended in an error
        pub failed: usize,
        /// Credentials the governor started with (after probing)
        pub credentials: usize,
        /// Elapsed time in seconds
        pub elapsed_seconds: f64,
        /// Governor state at the end of the run
        pub snapshot: GovernorSnapshot,
    }

    /// Relays every request in `config.file` through a governed key pool.
    ///
    /// Each non-empty line not starting with `#` is one request: a JSON object
    /// is forwarded as the request body, anything else is sent as a prompt.
    /// Results are written as JSON lines to `config.output` (or stdout) in
    /// completion order.
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - No credentials are configured
    /// - The credential file or the input file cannot be read
    /// - The endpoint is invalid or the HTTP client cannot be built
    /// - Probing found no working credential and the fallback is `refuse`
    /// - The output cannot be written
    ///
    /// Individual request failures are not errors; they are counted and
    /// written as `"status": "error"` records.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use key_governor::{run_batch, Config};
    /// use std::path::PathBuf;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = Config {
    ///     file: PathBuf::from("prompts.txt"),
    ///     keys: Some("key-one,key-two".to_string()),
    ///     ..Default::default()
    /// };
    /// let report = run_batch(config).await?;
    /// println!("{} of {} requests relayed", report.successful, report.total_requests);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_batch(config: Config) -> Result<BatchReport> {
        let mut secrets = load_credentials(&config).context("Failed to load credentials")?;
        if secrets.is_empty() {
            return Err(GovernorError::NoCredentials).context(format!(
                "Pass --keys, --keys-file, or set {}",
                crate::config::KEYS_ENV_VAR
            ));
        }

        let upstream =
            Arc::new(init_upstream(&config).context("Failed to initialize upstream client")?);
        let event_stats = Arc::new(EventStats::new());

        if config.probe {
            info!("Probing {} credential(s)", secrets.len());
            let prober = HttpProber::new(upstream.as_ref().clone());
            let report = probe_credentials(&secrets, &prober, config.probe_settings()).await;
            for _ in report.failed() {
                event_stats.increment(EventType::ProbeFailed);
            }
            secrets = report
                .into_pool(config.probe_fallback)
                .context("Health probe rejected every credential")?;
        }

        let governor = Arc::new(
            RequestGovernor::new(&secrets, config.governor_config())
                .context("Failed to initialize request governor")?,
        );
        let credentials = governor.len().await;
        let relay = Relay::new(
            Arc::clone(&governor),
            Arc::clone(&event_stats),
            config.max_attempts,
        );

        let status_state = StatusState::new(Arc::clone(&governor), Arc::clone(&event_stats));
        let total_requests = Arc::clone(&status_state.total_requests);
        let completed = Arc::clone(&status_state.completed_requests);
        let failed = Arc::clone(&status_state.failed_requests);
        let start_time = std::time::Instant::now();

        if let Some(port) = config.status_port {
            let state = status_state.clone();
            tokio::spawn(async move {
                if let Err(e) = start_status_server(port, state).await {
                    warn!("Status server error: {}", e);
                }
            });
        }

        let sink = open_output(config.output.as_deref()).await?;
        let (record_tx, record_rx) = mpsc::channel::<BatchRecord>(config.max_concurrency.max(1) * 2);
        let writer = spawn_writer(sink, record_rx);

        let cancel = CancellationToken::new();
        let cancel_logging = cancel.child_token();
        let logging_interval = if config.status_port.is_some() {
            STATUS_SERVER_LOGGING_INTERVAL_SECS
        } else {
            LOGGING_INTERVAL
        };
        let logging_task = {
            let (completed, failed, total) = (
                Arc::clone(&completed),
                Arc::clone(&failed),
                Arc::clone(&total_requests),
            );
            Some(tokio::spawn(async move {
                let mut interval =
                    tokio::time::interval(std::time::Duration::from_secs(logging_interval));
                // The first tick fires immediately
                interval.tick().await;
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            log_progress(start_time, &completed, &failed, &total);
                        }
                        _ = cancel_logging.cancelled() => {
                            break;
                        }
                    }
                }
            }))
        };

        let mut lines = open_input(&config).await?;
        let semaphore = init_semaphore(config.max_concurrency);
        let mut tasks = FuturesUnordered::new();
        let mut line_number = 0usize;

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read line from input: {e}");
                    break;
                }
            };
            line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Semaphore closed, skipping line {}", line_number);
                    continue;
                }
            };
            total_requests.fetch_add(1, Ordering::SeqCst);

            let body = build_request_body(trimmed);
            let relay = relay.clone();
            let upstream = Arc::clone(&upstream);
            let record_tx = record_tx.clone();
            let (completed, failed) = (Arc::clone(&completed), Arc::clone(&failed));
            let current_line = line_number;

            tasks.push(tokio::spawn(async move {
                let _permit = permit;

                let outcome = relay
                    .call(|lease| {
                        let upstream = &upstream;
                        let body = &body;
                        async move { upstream.send(lease.secret(), body).await }
                    })
                    .await;

                let record = match outcome {
                    Ok(relayed) => {
                        completed.fetch_add(1, Ordering::SeqCst);
                        log::debug!(
                            "Line {} relayed via {} after {} attempt(s)",
                            current_line,
                            relayed.label,
                            relayed.attempts
                        );
                        BatchRecord::success(current_line, relayed)
                    }
                    Err(e) => {
                        failed.fetch_add(1, Ordering::SeqCst);
                        warn!("Line {} failed: {}", current_line, e);
                        BatchRecord::failure(current_line, &e)
                    }
                };

                if record_tx.send(record).await.is_err() {
                    warn!("Output writer stopped, dropping result for line {}", current_line);
                }
            }));
        }
        drop(record_tx);

        while let Some(task_result) = tasks.next().await {
            if let Err(join_error) = task_result {
                failed.fetch_add(1, Ordering::SeqCst);
                warn!("Task panicked: {:?}", join_error);
            }
        }

        let written = writer
            .await
            .context("Output writer task failed")?
            .context("Failed to write results")?;
        log::debug!("Wrote {} result line(s)", written);

        shutdown_gracefully(cancel, logging_task).await;
        log_progress(start_time, &completed, &failed, &total_requests);

        let snapshot = governor.snapshot().await;
        print_event_statistics(&event_stats);
        print_credential_summary(&snapshot);

        Ok(BatchReport {
            total_requests: total_requests.load(Ordering::SeqCst),
            successful: completed.load(Ordering::SeqCst),
            failed: failed.load(Ordering::SeqCst),
            credentials,
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
            snapshot,
        })
    }

    type InputLines = tokio::io::Lines<Box<dyn AsyncBufRead + Send + Unpin>>;

    async fn open_input(config: &Config) -> Result<InputLines> {
        let reader: Box<dyn AsyncBufRead + Send + Unpin> = if config.file.as_os_str() == "-" {
            info!("Reading requests from stdin");
            Box::new(BufReader::new(tokio::io::stdin()))
        } else {
            let file = tokio::fs::File::open(&config.file)
                .await
                .with_context(|| format!("Failed to open input file {}", config.file.display()))?;
            Box::new(BufReader::new(file))
        };
        Ok(reader.lines())
    }
}
