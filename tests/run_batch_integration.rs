//! Integration tests for `run_batch`.
//!
//! These run whole batches against a mock upstream and check the report, the
//! JSON-lines output, and the startup errors.

mod helpers;

use helpers::{batch_config, generate_response, quota_error_body, write_lines};
use key_governor::{run_batch, ProbeFallback};
use serde_json::Value;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY_A: &str = "batch-key-a-000000001";
const KEY_B: &str = "batch-key-b-000000002";

fn read_records(path: &std::path::Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .expect("output file should exist")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each output line is JSON"))
        .collect()
}

#[tokio::test]
async fn batch_relays_every_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_response("answer")))
        .expect(3)
        .mount(&server)
        .await;

    let input = write_lines(&["first prompt", "", "# skipped", "second prompt", "third prompt"]);
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("results.jsonl");
    let config = batch_config(
        input.path().to_path_buf(),
        format!("{}/v1/generate", server.uri()),
        &[KEY_A, KEY_B],
        output.clone(),
    );

    let report = run_batch(config).await.expect("batch should complete");
    assert_eq!(report.total_requests, 3);
    assert_eq!(report.successful, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.credentials, 2);
    assert_eq!(report.snapshot.totals.calls_issued, 3);

    let records = read_records(&output);
    assert_eq!(records.len(), 3);
    let mut lines: Vec<u64> = records.iter().map(|r| r["line"].as_u64().unwrap()).collect();
    lines.sort();
    assert_eq!(lines, vec![1, 4, 5]);
    for record in &records {
        assert_eq!(record["status"], "ok");
        assert_eq!(record["text"], "answer");
        let label = record["credential"].as_str().unwrap();
        assert!(!label.contains(KEY_A) && !label.contains(KEY_B));
    }
}

#[tokio::test]
async fn json_lines_are_forwarded_as_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({ "custom": "payload" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "echo": true })))
        .expect(1)
        .mount(&server)
        .await;

    let input = write_lines(&[r#"{"custom": "payload"}"#]);
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("results.jsonl");
    let config = batch_config(
        input.path().to_path_buf(),
        server.uri(),
        &[KEY_A],
        output.clone(),
    );

    let report = run_batch(config).await.unwrap();
    assert_eq!(report.successful, 1);

    let records = read_records(&output);
    assert_eq!(records[0]["response"]["echo"], true);
    assert!(records[0].get("text").is_none());
}

#[tokio::test]
async fn failures_are_recorded_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-goog-api-key", KEY_A))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;

    let input = write_lines(&["one", "two"]);
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("results.jsonl");
    let config = batch_config(
        input.path().to_path_buf(),
        server.uri(),
        &[KEY_A],
        output.clone(),
    );

    let report = run_batch(config).await.unwrap();
    assert_eq!(report.total_requests, 2);
    assert_eq!(report.failed, 2);

    for record in read_records(&output) {
        assert_eq!(record["status"], "error");
        assert!(record["error"].as_str().unwrap().contains("HTTP 400"));
    }
}

#[tokio::test]
async fn missing_credentials_fail_at_startup() {
    let input = write_lines(&["prompt"]);
    let dir = TempDir::new().unwrap();
    let config = batch_config(
        input.path().to_path_buf(),
        "http://127.0.0.1:9/".to_string(),
        &[],
        dir.path().join("results.jsonl"),
    );

    let err = run_batch(config).await.unwrap_err();
    assert!(format!("{:#}", err).contains("No credentials configured"));
}

#[tokio::test]
async fn probe_drops_dead_credentials_before_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-goog-api-key", KEY_A))
        .respond_with(ResponseTemplate::new(401).set_body_string("API key not valid"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("x-goog-api-key", KEY_B))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_response("fine")))
        .mount(&server)
        .await;

    let input = write_lines(&["a", "b"]);
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("results.jsonl");
    let mut config = batch_config(
        input.path().to_path_buf(),
        server.uri(),
        &[KEY_A, KEY_B],
        output.clone(),
    );
    config.probe = true;

    let report = run_batch(config).await.unwrap();
    assert_eq!(report.credentials, 1);
    assert_eq!(report.successful, 2);
}

#[tokio::test]
async fn probe_refuse_fails_when_nothing_works() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let input = write_lines(&["a"]);
    let dir = TempDir::new().unwrap();
    let mut config = batch_config(
        input.path().to_path_buf(),
        server.uri(),
        &[KEY_A],
        dir.path().join("results.jsonl"),
    );
    config.probe = true;
    config.probe_fallback = ProbeFallback::Refuse;

    let err = run_batch(config).await.unwrap_err();
    assert!(format!("{:#}", err).contains("No credential passed the health probe"));
}

#[tokio::test]
async fn quota_limited_key_survives_probe() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(quota_error_body()))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(generate_response("later")))
        .mount(&server)
        .await;

    let input = write_lines(&["prompt"]);
    let dir = TempDir::new().unwrap();
    let mut config = batch_config(
        input.path().to_path_buf(),
        server.uri(),
        &[KEY_A],
        dir.path().join("results.jsonl"),
    );
    config.probe = true;

    let report = run_batch(config).await.unwrap();
    assert_eq!(report.credentials, 1);
    assert_eq!(report.successful, 1);
}
