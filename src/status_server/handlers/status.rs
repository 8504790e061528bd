//! JSON status handler.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use strum::IntoEnumIterator;

use super::super::types::{StatusResponse, StatusState};
use crate::error_handling::EventType;

/// JSON status endpoint: batch progress, event counters, and the governor snapshot
pub async fn status_handler(State(state): State<StatusState>) -> Response {
    let progress = state.progress();

    let response = StatusResponse {
        total_requests: progress.total,
        completed_requests: progress.completed,
        failed_requests: progress.failed,
        pending_requests: progress.pending,
        percentage_complete: progress.percentage,
        elapsed_seconds: progress.elapsed,
        rate_per_second: progress.rate,
        events: EventType::iter()
            .map(|event| (event.metric_name(), state.event_stats.get(event)))
            .collect(),
        governor: state.governor.snapshot().await,
    };

    let json = match serde_json::to_string_pretty(&response) {
        Ok(json) => json,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialize status: {}", e),
            )
                .into_response();
        }
    };

    (StatusCode::OK, [("content-type", "application/json")], json).into_response()
}
