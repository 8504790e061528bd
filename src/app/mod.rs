//! Batch application helpers.
//!
//! Progress logging, result output, shutdown handling, and end-of-run
//! statistics used by the batch runner.

pub mod logging;
pub mod output;
pub mod shutdown;
pub mod statistics;

// Re-export public API
pub use logging::log_progress;
pub use output::{open_output, spawn_writer, BatchRecord, RecordStatus};
pub use shutdown::shutdown_gracefully;
pub use statistics::{print_credential_summary, print_event_statistics};
