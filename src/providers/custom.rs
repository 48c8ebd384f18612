//! Custom endpoint adapter
//!
//! Any OpenAI-compatible endpoint the user points at: plain chat-completions
//! dialect, bearer auth only when a key is configured, and no capability
//! assumptions at all - unsupported options are stripped by validation
//! before they get here.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LlmError;
use crate::types::{ChatResponse, Message, ProviderConfig, RequestOptions, StreamDelta};

use super::openai_compat;
use super::{AdapterCore, ProviderAdapter};

pub struct CustomAdapter {
    core: AdapterCore,
}

impl CustomAdapter {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            core: AdapterCore::new(config),
        }
    }
}

#[async_trait]
impl ProviderAdapter for CustomAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AdapterCore {
        &mut self.core
    }

    fn prepare_request(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<Value, LlmError> {
        let model = super::resolve_model(options, &self.core.config, "gpt-3.5-turbo");
        let rendered = openai_compat::render_messages(messages, None);
        Ok(openai_compat::chat_body(model, rendered, options))
    }

    fn process_response(&self, raw: Value) -> Result<ChatResponse, LlmError> {
        openai_compat::process_chat_response(raw)
    }

    fn extract_stream_delta(&self, payload: Value) -> Result<Option<StreamDelta>, LlmError> {
        openai_compat::extract_chat_delta(payload)
    }

    fn api_path(&self) -> String {
        "/v1/chat/completions".to_string()
    }

    fn requires_auth(&self) -> bool {
        self.core.config.has_api_key()
    }

    fn models_endpoint(&self) -> String {
        format!("{}/v1/models", self.core.config.base_url)
    }

    fn parse_models_response(&self, data: Value) -> Vec<String> {
        let mut models: Vec<String> = openai_compat::model_entries(data)
            .into_iter()
            .map(|entry| entry.id)
            .collect();
        models.sort();
        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn no_capabilities_are_assumed() {
        let mut adapter =
            CustomAdapter::new(ProviderConfig::new("custom", "http://localhost:5000"));
        adapter.initialize().await.unwrap();
        assert!(adapter.capabilities().is_empty());
    }

    #[test]
    fn model_listing_is_unfiltered_but_sorted() {
        let adapter = CustomAdapter::new(ProviderConfig::new("custom", "http://localhost:5000"));
        let models = adapter.parse_models_response(json!({
            "data": [{"id": "zephyr"}, {"id": "alpha"}]
        }));
        assert_eq!(models, vec!["alpha", "zephyr"]);
    }
}
