//! JSON-lines result output.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error_handling::RelayError;
use crate::relay::{extract_text, Relayed};

/// Whether a request was relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Ok,
    Error,
}

/// One output line per input request.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRecord {
    /// 1-based line number in the input
    pub line: usize,
    pub status: RecordStatus,
    /// Redacted label of the credential that served the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<usize>,
    /// Generated text, when the response has the `generateContent` shape
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 timestamp
    pub completed_at: String,
}

impl BatchRecord {
    pub fn success(line: usize, relayed: Relayed<Value>) -> Self {
        BatchRecord {
            line,
            status: RecordStatus::Ok,
            text: extract_text(&relayed.output),
            credential: Some(relayed.label),
            attempts: Some(relayed.attempts),
            response: Some(relayed.output),
            error: None,
            completed_at: now(),
        }
    }

    pub fn failure(line: usize, error: &RelayError) -> Self {
        BatchRecord {
            line,
            status: RecordStatus::Error,
            credential: None,
            attempts: match error {
                RelayError::Exhausted { attempts } => Some(*attempts),
                _ => None,
            },
            text: None,
            response: None,
            error: Some(error.to_string()),
            completed_at: now(),
        }
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Destination for result lines.
pub type OutputSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Opens `path` for writing (truncating), or stdout when `path` is `None`.
pub async fn open_output(path: Option<&Path>) -> Result<OutputSink> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Writes every record received on `rx` as one JSON line, in arrival order.
///
/// The task ends when all senders are dropped and returns the number of lines
/// written.
pub fn spawn_writer(
    mut sink: OutputSink,
    mut rx: mpsc::Receiver<BatchRecord>,
) -> JoinHandle<Result<usize>> {
    tokio::spawn(async move {
        let mut written = 0usize;
        while let Some(record) = rx.recv().await {
            let mut line =
                serde_json::to_string(&record).context("Failed to serialize result record")?;
            line.push('\n');
            sink.write_all(line.as_bytes())
                .await
                .context("Failed to write result record")?;
            written += 1;
        }
        sink.flush().await.context("Failed to flush output")?;
        Ok(written)
    })
}
