//! Routing-mode behavior: rules, overrides, cost ranking

mod harness;

use harness::config::ConfigBuilder;
use harness::mock_provider::MockProvider;
use harness::server::TestServer;
use plexus_config::{RoutingMode, RuleMatch};

fn completion_body(model: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": "Hello"}]
    })
}

#[tokio::test]
async fn caller_header_selects_matching_rule() {
    let batch = MockProvider::start_with_response("batch lane").await.unwrap();
    let interactive = MockProvider::start_with_response("interactive lane").await.unwrap();

    let config = ConfigBuilder::new()
        .with_provider("batch", &batch.base_url())
        .with_provider("interactive", &interactive.base_url())
        .with_rule(
            "batch-jobs",
            RuleMatch {
                caller: Some("batch-*".to_owned()),
                ..RuleMatch::default()
            },
            &["batch"],
        )
        .with_chain("default", &["interactive"])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .header("x-plexus-caller", "batch-nightly")
        .json(&completion_body("auto"))
        .send()
        .await
        .unwrap();
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "batch lane");

    // Unidentified callers fall through to the catch-all
    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&completion_body("auto"))
        .send()
        .await
        .unwrap();
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "interactive lane");

    assert_eq!(batch.completion_count(), 1);
    assert_eq!(interactive.completion_count(), 1);
}

#[tokio::test]
async fn privacy_header_routes_to_pinned_provider() {
    let pinned = MockProvider::start_with_response("pinned").await.unwrap();
    let open = MockProvider::start_with_response("open").await.unwrap();

    let config = ConfigBuilder::new()
        .with_provider("pinned", &pinned.base_url())
        .with_provider("open", &open.base_url())
        .with_rule(
            "restricted-data",
            RuleMatch {
                privacy: Some("restricted".to_owned()),
                ..RuleMatch::default()
            },
            &["pinned"],
        )
        .with_chain("default", &["open"])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .header("x-plexus-privacy", "restricted")
        .json(&completion_body("auto"))
        .send()
        .await
        .unwrap();
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "pinned");
    assert_eq!(open.completion_count(), 0);
}

#[tokio::test]
async fn unmatched_request_yields_routing_error() {
    let mock = MockProvider::start().await.unwrap();
    let config = ConfigBuilder::new()
        .with_provider("mock", &mock.base_url())
        .with_rule(
            "batch-only",
            RuleMatch {
                caller: Some("batch-*".to_owned()),
                ..RuleMatch::default()
            },
            &["mock"],
        )
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&completion_body("auto"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 503);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["type"], "routing_error");
}

#[tokio::test]
async fn cost_mode_routes_to_cheapest_compatible() {
    let cheap = MockProvider::start_with_response("cheap").await.unwrap();
    let premium = MockProvider::start_with_response("premium").await.unwrap();

    // Declared premium-first so the win cannot come from declaration order
    let config = ConfigBuilder::new()
        .with_priced_provider("premium", &premium.base_url(), 3.0, 15.0)
        .with_priced_provider("cheap", &cheap.base_url(), 0.15, 0.6)
        .with_mode(RoutingMode::Cost)
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&completion_body("auto"))
        .send()
        .await
        .unwrap();

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "cheap");
    assert_eq!(premium.completion_count(), 0);
}

#[tokio::test]
async fn bare_provider_name_bypasses_selection() {
    let alpha = MockProvider::start_with_response("alpha").await.unwrap();
    let beta = MockProvider::start_with_response("beta").await.unwrap();

    let config = ConfigBuilder::new()
        .with_provider("alpha", &alpha.base_url())
        .with_provider("beta", &beta.base_url())
        .with_chain("default", &["alpha"])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&completion_body("beta"))
        .send()
        .await
        .unwrap();

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["choices"][0]["message"]["content"], "beta");
    assert_eq!(alpha.completion_count(), 0);

    // The provider's bound model went out on the wire
    assert_eq!(beta.last_request().unwrap()["model"], "mock-model-1");
}

#[tokio::test]
async fn slash_override_requests_the_named_model() {
    let mock = MockProvider::start().await.unwrap();
    let config = ConfigBuilder::new()
        .with_provider("mock", &mock.base_url())
        .with_chain("default", &["mock"])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/v1/chat/completions"))
        .json(&completion_body("mock/experimental-model"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(mock.last_request().unwrap()["model"], "experimental-model");
}
