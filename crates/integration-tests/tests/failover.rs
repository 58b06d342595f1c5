//! Fallback-chain behavior over real HTTP with mock upstreams

mod harness;

use harness::config::ConfigBuilder;
use harness::mock_provider::MockProvider;
use harness::server::TestServer;
use plexus_ledger::{Outcome, RecordFilter};

fn completion_body(model: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": "Hello"}]
    })
}

#[tokio::test]
async fn primary_success_leaves_backup_untouched() {
    let primary = MockProvider::start().await.unwrap();
    let backup = MockProvider::start_with_response("backup response").await.unwrap();

    let config = ConfigBuilder::new()
        .with_provider("primary", &primary.base_url())
        .with_provider("backup", &backup.base_url())
        .with_chain("default", &["primary", "backup"])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&completion_body("auto"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "Hello from mock");

    assert_eq!(primary.completion_count(), 1);
    assert_eq!(backup.completion_count(), 0);
}

#[tokio::test]
async fn upstream_failure_advances_to_backup() {
    let primary = MockProvider::start_failing(1).await.unwrap();
    let backup = MockProvider::start_with_response("backup response").await.unwrap();

    let config = ConfigBuilder::new()
        .with_provider("primary", &primary.base_url())
        .with_provider("backup", &backup.base_url())
        .with_chain("default", &["primary", "backup"])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&completion_body("auto"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "backup response");

    assert_eq!(primary.completion_count(), 1);
    assert_eq!(backup.completion_count(), 1);

    // The successful attempt is recorded as a fallback, not a first-choice
    // success; the failed attempt carries no cost
    let ledger = server.state().ledger();
    let fallbacks = ledger.aggregate(&RecordFilter {
        outcome: Some(Outcome::Fallback),
        ..RecordFilter::default()
    });
    assert_eq!(fallbacks.total_requests, 1);

    let errors = ledger.aggregate(&RecordFilter {
        outcome: Some(Outcome::Error),
        ..RecordFilter::default()
    });
    assert_eq!(errors.total_requests, 1);
    assert!(errors.total_cost_usd.abs() < 1e-12);
}

#[tokio::test]
async fn rate_limited_upstream_advances_chain() {
    let primary = MockProvider::start_rate_limited(1).await.unwrap();
    let backup = MockProvider::start_with_response("backup response").await.unwrap();

    let config = ConfigBuilder::new()
        .with_provider("primary", &primary.base_url())
        .with_provider("backup", &backup.base_url())
        .with_chain("default", &["primary", "backup"])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&completion_body("auto"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "backup response");
}

#[tokio::test]
async fn exhausted_chain_names_every_candidate() {
    let primary = MockProvider::start_failing(10).await.unwrap();
    let backup = MockProvider::start_failing(10).await.unwrap();

    let config = ConfigBuilder::new()
        .with_provider("primary", &primary.base_url())
        .with_provider("backup", &backup.base_url())
        .with_chain("default", &["primary", "backup"])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&completion_body("auto"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 502);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["type"], "all_candidates_exhausted");

    // The summary states what was tried and why, not just the last error
    let message = json["error"]["message"].as_str().unwrap();
    assert!(message.contains("primary"), "missing primary in: {message}");
    assert!(message.contains("backup"), "missing backup in: {message}");

    assert_eq!(primary.completion_count(), 1);
    assert_eq!(backup.completion_count(), 1);
}

#[tokio::test]
async fn unknown_provider_override_is_not_found() {
    let mock = MockProvider::start().await.unwrap();
    let config = ConfigBuilder::new()
        .with_provider("mock", &mock.base_url())
        .with_chain("default", &["mock"])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&completion_body("nowhere/some-model"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
    assert_eq!(mock.completion_count(), 0);
}
