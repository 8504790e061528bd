// Shared test helpers: input files, mock upstream responses, and configs.

use key_governor::{Config, GovernorConfig, LogFormat, LogLevel};
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

/// A `generateContent`-shaped success body.
#[allow(dead_code)]
pub fn generate_response(text: &str) -> Value {
    json!({
        "candidates": [
            { "content": { "role": "model", "parts": [ { "text": text } ] } }
        ]
    })
}

/// The error body the upstream sends with a 429.
#[allow(dead_code)]
pub fn quota_error_body() -> Value {
    json!({
        "error": {
            "code": 429,
            "message": "Resource has been exhausted (e.g. check quota).",
            "status": "RESOURCE_EXHAUSTED"
        }
    })
}

/// Writes one line per entry to a temporary file.
#[allow(dead_code)]
pub fn write_lines(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    for line in lines {
        writeln!(file, "{}", line).expect("Failed to write line");
    }
    file.flush().expect("Failed to flush file");
    file
}

/// Governor settings that keep real-time tests fast.
#[allow(dead_code)]
pub fn fast_governor(max_calls: usize, window: Duration) -> GovernorConfig {
    GovernorConfig {
        window,
        max_calls_per_window: max_calls,
        min_interval: Duration::ZERO,
        freeze_buffer: Duration::ZERO,
        wait_cap: Duration::from_millis(200),
        fallback_wait: Duration::from_millis(50),
        ..Default::default()
    }
}

/// A batch config pointed at a mock endpoint, with no global spacing.
#[allow(dead_code)]
pub fn batch_config(input: PathBuf, endpoint: String, keys: &[&str], output: PathBuf) -> Config {
    Config {
        file: input,
        log_level: LogLevel::Error,
        log_format: LogFormat::Plain,
        keys: (!keys.is_empty()).then(|| keys.join(",")),
        endpoint,
        min_interval_ms: 0,
        max_concurrency: 4,
        timeout_seconds: 5,
        output: Some(output),
        ..Default::default()
    }
}
