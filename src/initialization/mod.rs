//! Application initialization and resource setup.
//!
//! This module builds the shared resources a run needs:
//! - the logger
//! - the HTTP client used for relayed calls and probes
//! - the credential list, from the CLI, the environment, or a file
//! - the concurrency semaphore for batch tasks

mod client;
mod credentials;
mod logger;

use std::sync::Arc;

use tokio::sync::Semaphore;

// Re-export public API
pub use client::{init_client, init_upstream};
pub use credentials::{load_credentials, parse_credential_file, parse_credential_list};
pub use logger::init_logger_with;

/// Creates the semaphore bounding how many relayed calls are in flight.
///
/// A count of zero is raised to one so the batch can make progress.
pub fn init_semaphore(count: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(count.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_semaphore_permits() {
        assert_eq!(init_semaphore(4).available_permits(), 4);
        assert_eq!(init_semaphore(0).available_permits(), 1);
    }
}
