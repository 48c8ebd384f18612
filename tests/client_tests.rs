//! Client façade tests: probe round trips, save/restore semantics of
//! `test_connection`, streaming through the façade, and advisory usage
//! accounting.

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use unichat::{
    FinishReason, LlmClient, LlmError, MemoryConfigStore, Message, ProviderConfig, RequestOptions,
};

fn store_with(configs: Vec<ProviderConfig>, active: Option<&str>) -> Arc<MemoryConfigStore> {
    let store = MemoryConfigStore::new();
    for config in configs {
        store.save_config(config);
    }
    store.set_active(active);
    Arc::new(store)
}

fn provider_ptr(client: &LlmClient) -> *const () {
    client
        .provider()
        .map(|p| p as *const dyn unichat::ProviderAdapter as *const ())
        .unwrap_or(std::ptr::null())
}

async fn mount_pong(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "  pong\n"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn ping_round_trips_and_trims_the_reply() {
    let server = MockServer::start().await;
    mount_pong(&server).await;

    let config = ProviderConfig::new("custom", server.uri())
        .with_id("c1")
        .with_model("test-model");
    let mut client = LlmClient::new(store_with(vec![config], Some("c1")));

    assert_eq!(client.ping().await.unwrap(), "pong");
    assert!(client.is_initialized());
}

#[tokio::test]
async fn chat_normalizes_the_response_and_records_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "truncated"}, "finish_reason": "max_tokens"}],
            "usage": {"total_tokens": 42}
        })))
        .mount(&server)
        .await;

    let config = ProviderConfig::new("custom", server.uri())
        .with_id("c1")
        .with_model("test-model");
    let mut client = LlmClient::new(store_with(vec![config], Some("c1")));

    let response = client
        .chat(&[Message::user("hi")], RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(response.content, "truncated");
    assert_eq!(response.finish_reason, Some(FinishReason::Length));
    assert_eq!(client.usage_stats().total_tokens, 42);
}

#[tokio::test]
async fn stream_through_the_facade_accumulates_and_counts_tokens() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"po\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"ng\"}}],\"usage\":{\"total_tokens\":5}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let config = ProviderConfig::new("custom", server.uri())
        .with_id("c1")
        .with_model("test-model");
    let mut client = LlmClient::new(store_with(vec![config], Some("c1")));

    let mut done_chunks = 0usize;
    let full = client
        .stream(&[Message::user("hi")], RequestOptions::default(), |chunk| {
            if chunk.done {
                done_chunks += 1;
            }
        })
        .await
        .unwrap();
    assert_eq!(full, "pong");
    assert_eq!(done_chunks, 1);
    assert_eq!(client.usage_stats().total_tokens, 5);
}

#[tokio::test]
async fn test_connection_restores_the_active_adapter_on_success() {
    let server = MockServer::start().await;
    mount_pong(&server).await;

    let active = ProviderConfig::new("custom", server.uri())
        .with_id("active")
        .with_model("main-model");
    let candidate = ProviderConfig::new("custom", server.uri())
        .with_id("candidate")
        .with_model("probe-model");

    let mut client = LlmClient::new(store_with(vec![active], Some("active")));
    client.initialize(None).await.unwrap();

    let provider_before = provider_ptr(&client);
    let config_before = client.active_config().unwrap().id.clone();

    assert_eq!(client.test_connection(candidate).await.unwrap(), "pong");

    let provider_after = provider_ptr(&client);
    assert!(std::ptr::eq(provider_before, provider_after));
    assert_eq!(client.active_config().unwrap().id, config_before);
}

#[tokio::test]
async fn test_connection_restores_the_active_adapter_on_failure() {
    let server = MockServer::start().await;
    mount_pong(&server).await;

    let active = ProviderConfig::new("custom", server.uri())
        .with_id("active")
        .with_model("main-model");
    let mut client = LlmClient::new(store_with(vec![active], Some("active")));
    client.initialize(None).await.unwrap();
    let provider_before = provider_ptr(&client);

    // Unknown provider: initialization of the temporary adapter fails.
    let candidate = ProviderConfig::new("no-such-vendor", "http://localhost:1");
    let error = client.test_connection(candidate).await.err().unwrap();
    assert!(matches!(error, LlmError::UnknownProvider(_)));

    let provider_after = provider_ptr(&client);
    assert!(std::ptr::eq(provider_before, provider_after));
    assert_eq!(client.active_config().unwrap().id, "active");

    // A probe that dies over the wire must restore too.
    let unreachable = ProviderConfig::new("custom", "http://127.0.0.1:1").with_model("m");
    let error = client.test_connection(unreachable).await.err().unwrap();
    assert!(matches!(error, LlmError::HttpError(_)));
    let provider_after = provider_ptr(&client);
    assert!(std::ptr::eq(provider_before, provider_after));

    // And the original adapter still works.
    assert_eq!(client.ping().await.unwrap(), "pong");
}

#[tokio::test]
async fn test_connection_on_an_uninitialized_client_leaves_it_uninitialized() {
    let server = MockServer::start().await;
    mount_pong(&server).await;

    let mut client = LlmClient::new(store_with(vec![], None));
    let candidate = ProviderConfig::new("custom", server.uri()).with_model("probe-model");
    assert_eq!(client.test_connection(candidate).await.unwrap(), "pong");
    assert!(!client.is_initialized());
}

#[tokio::test]
async fn refresh_follows_the_store_active_configuration() {
    let server = MockServer::start().await;
    mount_pong(&server).await;

    let first = ProviderConfig::new("custom", server.uri())
        .with_id("first")
        .with_model("model-a");
    let second = ProviderConfig::new("custom", server.uri())
        .with_id("second")
        .with_model("model-b");
    let store = store_with(vec![first, second], Some("first"));
    let mut client = LlmClient::new(store.clone());
    client.initialize(None).await.unwrap();
    assert_eq!(client.active_config().unwrap().id, "first");

    store.set_active(Some("second"));
    client.refresh().await.unwrap();
    assert_eq!(client.active_config().unwrap().id, "second");
}

#[tokio::test]
async fn transport_errors_carry_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let config = ProviderConfig::new("custom", server.uri())
        .with_id("c1")
        .with_model("m");
    let mut client = LlmClient::new(store_with(vec![config], Some("c1")));
    let error = client
        .chat(&[Message::user("hi")], RequestOptions::default())
        .await
        .err()
        .unwrap();
    match error {
        LlmError::ApiError { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected ApiError, got {other:?}"),
    }
}
