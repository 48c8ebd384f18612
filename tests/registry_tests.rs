//! Runtime provider registration, exercised through the public API the way
//! an embedding application would extend the built-in vendor set.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use unichat::{
    AdapterCore, Capability, CapabilitySet, ChatResponse, LlmClient, LlmError, MemoryConfigStore,
    Message, ProviderAdapter, ProviderConfig, RequestOptions, StreamDelta, create_provider_flexible,
    register_provider,
};

/// A minimal adapter for a bespoke wire protocol.
struct EchoAdapter {
    core: AdapterCore,
}

impl EchoAdapter {
    fn new(config: ProviderConfig) -> Self {
        Self {
            core: AdapterCore::new(config),
        }
    }
}

#[async_trait]
impl ProviderAdapter for EchoAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AdapterCore {
        &mut self.core
    }

    async fn detect_capabilities(&self) -> Result<CapabilitySet, LlmError> {
        Ok(CapabilitySet::default()
            .with(Capability::Thinking)
            .with(Capability::Tools))
    }

    fn prepare_request(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<Value, LlmError> {
        Ok(json!({
            "echo": messages.last().map(|m| m.text()),
            "stream": options.stream,
        }))
    }

    fn process_response(&self, raw: Value) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse {
            content: raw["echo"].as_str().unwrap_or_default().to_string(),
            thinking: None,
            usage: None,
            finish_reason: None,
        })
    }

    fn extract_stream_delta(&self, _payload: Value) -> Result<Option<StreamDelta>, LlmError> {
        Ok(None)
    }

    fn api_path(&self) -> String {
        "/echo".to_string()
    }

    fn models_endpoint(&self) -> String {
        format!("{}/echo/models", self.core.config.base_url)
    }

    fn parse_models_response(&self, _data: Value) -> Vec<String> {
        vec!["echo-1".to_string()]
    }
}

#[test]
fn registered_constructor_is_used_for_its_identifier() {
    register_provider("echo-x", |config| Box::new(EchoAdapter::new(config)));

    let adapter =
        create_provider_flexible("echo-x", ProviderConfig::new("echo-x", "http://localhost:1"))
            .unwrap();
    assert_eq!(adapter.api_path(), "/echo");
    assert_eq!(adapter.parse_models_response(json!({})), vec!["echo-1"]);
}

#[test]
fn registration_overrides_a_builtin_identifier() {
    // Shadow the built-in custom adapter, then confirm the registered
    // constructor wins.
    register_provider("custom-shadow-test", |config| {
        Box::new(EchoAdapter::new(config))
    });
    register_provider("custom-shadow-test", |config| {
        Box::new(unichat::providers::CustomAdapter::new(config))
    });
    let adapter = create_provider_flexible(
        "custom-shadow-test",
        ProviderConfig::new("custom-shadow-test", "http://localhost:1"),
    )
    .unwrap();
    assert_eq!(adapter.api_path(), "/v1/chat/completions");
}

#[tokio::test]
async fn client_validation_respects_a_registered_adapter_capabilities() {
    register_provider("echo-caps", |config| Box::new(EchoAdapter::new(config)));

    let store = MemoryConfigStore::new();
    store.save_config(ProviderConfig::new("echo-caps", "http://localhost:1").with_id("e1"));
    store.set_active(Some("e1"));
    let mut client = LlmClient::new(Arc::new(store));
    client.initialize(None).await.unwrap();

    let options = RequestOptions {
        enable_thinking: Some(true),
        images: Some(vec![unichat::ImageInput::new("x")]),
        tools: Some(vec![json!({"type": "function"})]),
        ..RequestOptions::default()
    };
    let validated = client.validate_options(options);

    // Thinking and tools are supported, vision is not.
    assert_eq!(validated.enable_thinking, Some(true));
    assert!(validated.tools.is_some());
    assert!(validated.images.is_none());
}
