//! Prometheus metrics handler.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt::Write;
use strum::IntoEnumIterator;

use super::super::types::StatusState;
use crate::error_handling::EventType;

/// Prometheus-compatible metrics endpoint
pub async fn metrics_handler(State(state): State<StatusState>) -> Response {
    let progress = state.progress();
    let snapshot = state.governor.snapshot().await;

    let mut metrics = format!(
        r#"# HELP key_governor_total_requests Requests read from the input
# TYPE key_governor_total_requests gauge
key_governor_total_requests {}

# HELP key_governor_completed_requests Requests relayed successfully
# TYPE key_governor_completed_requests gauge
key_governor_completed_requests {}

# HELP key_governor_failed_requests Requests that ended in an error
# TYPE key_governor_failed_requests gauge
key_governor_failed_requests {}

# HELP key_governor_rate_per_second Successful requests per second
# TYPE key_governor_rate_per_second gauge
key_governor_rate_per_second {}

# HELP key_governor_eligible_credentials Credentials that could be handed out now
# TYPE key_governor_eligible_credentials gauge
key_governor_eligible_credentials {}

# HELP key_governor_frozen_credentials Credentials in a quota cooldown
# TYPE key_governor_frozen_credentials gauge
key_governor_frozen_credentials {}
"#,
        progress.total,
        progress.completed,
        progress.failed,
        progress.rate,
        snapshot.eligible_count,
        snapshot.frozen_count,
    );

    // Writing to a String cannot fail
    let _ = writeln!(metrics, "\n# HELP key_governor_events_total Relay events by kind");
    let _ = writeln!(metrics, "# TYPE key_governor_events_total counter");
    for event in EventType::iter() {
        let _ = writeln!(
            metrics,
            "key_governor_events_total{{event=\"{}\"}} {}",
            event.metric_name(),
            state.event_stats.get(event)
        );
    }

    let per_credential: [(&str, &str, &str); 4] = [
        ("calls_in_window", "gauge", "Calls counted in the current window"),
        ("calls_issued_total", "counter", "Calls issued with the credential"),
        ("rejections_total", "counter", "Quota rejections reported"),
        ("freezes_total", "counter", "Cooldowns started"),
    ];
    for (name, kind, help) in per_credential {
        let _ = writeln!(metrics, "\n# HELP key_governor_credential_{} {}", name, help);
        let _ = writeln!(metrics, "# TYPE key_governor_credential_{} {}", name, kind);
        for credential in &snapshot.credentials {
            let value = match name {
                "calls_in_window" => credential.calls_in_window as u64,
                "calls_issued_total" => credential.counters.calls_issued,
                "rejections_total" => credential.counters.rejections,
                _ => credential.counters.freezes,
            };
            let _ = writeln!(
                metrics,
                "key_governor_credential_{}{{credential=\"{}\"}} {}",
                name,
                escape_label_value(&credential.label),
                value
            );
        }
    }

    (StatusCode::OK, metrics).into_response()
}

/// Escapes a label value for the Prometheus text format.
fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_label_value() {
        assert_eq!(escape_label_value("AIza…cdef"), "AIza…cdef");
        assert_eq!(escape_label_value(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(escape_label_value("x\ny"), "x\\ny");
    }
}
