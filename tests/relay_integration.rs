//! Relay against a mock upstream.
//!
//! Verifies the caller contract over real HTTP: credentials travel in the key
//! header, 429s rotate or freeze keys, 5xx responses are retried with backoff,
//! and other 4xx responses end the call at once.

mod helpers;

use helpers::{fast_governor, generate_response, quota_error_body};
use key_governor::error_handling::{EventStats, EventType};
use key_governor::governor::redact;
use key_governor::relay::{extract_text, prompt_body};
use key_governor::{RelayError, Relay, RequestGovernor, UpstreamClient, UpstreamError};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GOOD_KEY: &str = "good-key-0123456789";
const CAPPED_KEY: &str = "capped-key-9876543210";

fn upstream(server: &MockServer) -> Arc<UpstreamClient> {
    let endpoint = Url::parse(&format!("{}/v1/generate", server.uri())).unwrap();
    Arc::new(UpstreamClient::new(
        reqwest::Client::new(),
        endpoint,
        "x-goog-api-key",
    ))
}

fn relay(keys: &[&str], max_calls: usize, window: Duration, max_attempts: usize) -> Relay {
    let governor = Arc::new(RequestGovernor::new(keys, fast_governor(max_calls, window)).unwrap());
    Relay::new(governor, Arc::new(EventStats::new()), max_attempts)
}

async fn send_prompt(
    relay: &Relay,
    upstream: &Arc<UpstreamClient>,
    prompt: &str,
) -> Result<key_governor::Relayed<serde_json::Value>, RelayError> {
    let body = prompt_body(prompt);
    relay
        .call(|lease| {
            let body = &body;
            async move { upstream.send(lease.secret(), body).await }
        })
        .await
}

#[tokio::test]
async fn credential_is_sent_in_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .and(header("x-goog-api-key", GOOD_KEY))
        .and(body_partial_json(prompt_body("hello")))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_response("hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let relay = relay(&[GOOD_KEY], 15, Duration::from_secs(60), 3);
    let result = send_prompt(&relay, &upstream(&server), "hello").await.unwrap();

    assert_eq!(result.attempts, 1);
    assert_eq!(result.label, redact(GOOD_KEY));
    assert_eq!(extract_text(&result.output).as_deref(), Some("hi there"));
}

#[tokio::test]
async fn quota_rejection_rotates_to_working_credential() {
    let server = MockServer::start().await;
    // Whichever key goes out first is rejected; every later call succeeds.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(quota_error_body()))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_response("ok")))
        .expect(1)
        .mount(&server)
        .await;

    // One call per window, so a rejected key always has a full window and is frozen.
    let relay = relay(&[CAPPED_KEY, GOOD_KEY], 1, Duration::from_secs(60), 5);
    let result = send_prompt(&relay, &upstream(&server), "rotate me").await.unwrap();

    assert_eq!(result.attempts, 2);
    assert_eq!(relay.stats().get(EventType::QuotaRejected), 1);
    assert_eq!(relay.stats().get(EventType::CredentialFrozen), 1);

    let snapshot = relay.governor().snapshot().await;
    assert_eq!(snapshot.frozen_count, 1);
    let frozen: Vec<&str> = snapshot
        .credentials
        .iter()
        .filter(|c| c.frozen)
        .map(|c| c.label.as_str())
        .collect();
    assert_eq!(frozen.len(), 1);
    assert_ne!(frozen[0], result.label);
    assert!([redact(CAPPED_KEY), redact(GOOD_KEY)].contains(&result.label));
}

#[tokio::test]
async fn quota_rejection_with_window_capacity_is_not_a_freeze() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(quota_error_body()))
        .expect(2)
        .mount(&server)
        .await;

    let relay = relay(&[CAPPED_KEY], 15, Duration::from_secs(60), 2);
    let err = send_prompt(&relay, &upstream(&server), "still capped")
        .await
        .unwrap_err();

    assert_eq!(err, RelayError::Exhausted { attempts: 2 });
    assert_eq!(relay.stats().get(EventType::RejectionIgnored), 2);
    assert_eq!(relay.stats().get(EventType::CredentialFrozen), 0);
    assert_eq!(relay.governor().snapshot().await.frozen_count, 0);
}

#[tokio::test]
async fn frozen_single_credential_is_retried_after_cooldown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(quota_error_body()))
        .expect(2)
        .mount(&server)
        .await;

    let relay = relay(&[CAPPED_KEY], 1, Duration::from_millis(300), 2);
    let err = send_prompt(&relay, &upstream(&server), "retry later")
        .await
        .unwrap_err();

    assert_eq!(err, RelayError::Exhausted { attempts: 2 });
    assert!(err.to_string().contains("try again later"));
    assert_eq!(relay.stats().get(EventType::CredentialFrozen), 2);
    assert_eq!(relay.stats().get(EventType::RetriesExhausted), 1);
}

#[tokio::test]
async fn server_error_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_response("recovered")))
        .mount(&server)
        .await;

    let relay = relay(&[GOOD_KEY], 15, Duration::from_secs(60), 3);
    let result = send_prompt(&relay, &upstream(&server), "flaky").await.unwrap();

    assert_eq!(result.attempts, 2);
    assert_eq!(relay.stats().get(EventType::TransientError), 1);
    assert_eq!(relay.governor().snapshot().await.frozen_count, 0);
}

#[tokio::test]
async fn auth_error_is_returned_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("API key not valid"))
        .expect(1)
        .mount(&server)
        .await;

    let relay = relay(&[GOOD_KEY], 15, Duration::from_secs(60), 5);
    let err = send_prompt(&relay, &upstream(&server), "denied")
        .await
        .unwrap_err();

    match err {
        RelayError::Upstream(UpstreamError::Permanent { status, message }) => {
            assert_eq!(status, 401);
            assert!(message.contains("API key not valid"));
        }
        other => panic!("expected a permanent error, got {:?}", other),
    }
    assert_eq!(relay.stats().get(EventType::PermanentError), 1);
}

#[tokio::test]
async fn quota_text_in_non_429_body_counts_as_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(403).set_body_string("Quota exceeded for quota metric 'requests'"),
        )
        .mount(&server)
        .await;

    let relay = relay(&[CAPPED_KEY], 15, Duration::from_secs(60), 1);
    let err = send_prompt(&relay, &upstream(&server), "quota text")
        .await
        .unwrap_err();

    assert_eq!(err, RelayError::Exhausted { attempts: 1 });
    assert_eq!(relay.stats().get(EventType::QuotaRejected), 1);
}
