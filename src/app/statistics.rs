//! End-of-run statistics.

use log::info;
use strum::IntoEnumIterator;

use crate::error_handling::{EventStats, EventType};
use crate::telemetry::GovernorSnapshot;

/// Logs every non-zero relay event counter.
pub fn print_event_statistics(stats: &EventStats) {
    let total = stats.total();
    if total == 0 {
        return;
    }

    info!("Relay events ({} total):", total);
    for event in EventType::iter() {
        let count = stats.get(event);
        if count > 0 {
            info!("   {}: {}", event.as_str(), count);
        }
    }
}

/// Logs one line per credential, by redacted label.
pub fn print_credential_summary(snapshot: &GovernorSnapshot) {
    info!("Credential usage: {}", snapshot.summary());
    for credential in &snapshot.credentials {
        let state = match credential.frozen_remaining_secs {
            Some(secs) => format!("frozen for another {:.1}s", secs),
            None if credential.eligible => "available".to_string(),
            None => "window full".to_string(),
        };
        info!(
            "   {}: {} call(s), {} rejection(s), {} freeze(s), {}",
            credential.label,
            credential.counters.calls_issued,
            credential.counters.rejections,
            credential.counters.freezes,
            state
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GovernorConfig;
    use crate::governor::RequestGovernor;

    #[test]
    fn test_print_event_statistics_empty_and_populated() {
        let stats = EventStats::new();
        print_event_statistics(&stats);
        stats.increment(EventType::QuotaRejected);
        stats.increment(EventType::CredentialFrozen);
        print_event_statistics(&stats);
    }

    #[tokio::test]
    async fn test_print_credential_summary() {
        let governor =
            RequestGovernor::new(&["key-aaaa-1111", "key-bbbb-2222"], GovernorConfig::default())
                .unwrap();
        governor.acquire().await.unwrap();
        print_credential_summary(&governor.snapshot().await);
    }
}
