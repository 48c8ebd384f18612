//! Grok (x.ai) adapter
//!
//! Standard chat-completions dialect at `api.x.ai`. Every Grok model takes
//! tools; grok-2 and the vision variants take images.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::types::{
    Capability, CapabilitySet, ChatResponse, Message, ProviderConfig, RequestOptions, StreamDelta,
};

use super::openai_compat;
use super::{AdapterCore, ProviderAdapter};

pub struct GrokAdapter {
    core: AdapterCore,
}

impl GrokAdapter {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            core: AdapterCore::new(config),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GrokAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AdapterCore {
        &mut self.core
    }

    async fn detect_capabilities(&self) -> Result<CapabilitySet, LlmError> {
        let mut capabilities = CapabilitySet::default();
        let model = self.core.config.model.to_ascii_lowercase();
        if model.is_empty() {
            return Ok(capabilities);
        }
        if model.contains("grok-2") || model.contains("vision") {
            capabilities.insert(Capability::Vision);
        }
        capabilities.insert(Capability::Tools);
        Ok(capabilities)
    }

    fn prepare_request(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<Value, LlmError> {
        let model = super::resolve_model(options, &self.core.config, "grok-beta");
        let images = options
            .images
            .as_deref()
            .filter(|_| self.has_capability(Capability::Vision));
        let rendered = openai_compat::render_messages(messages, images);
        let mut body = openai_compat::chat_body(model, rendered, options);
        if let Some(tools) = &options.tools
            && self.has_capability(Capability::Tools)
        {
            openai_compat::insert(&mut body, "tools", json!(tools));
        }
        Ok(body)
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
            .filter(|entry| entry.id.to_ascii_lowercase().contains("grok"))
            .map(|entry| entry.id)
            .collect();
        models.sort();
        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_grok_model_gets_tools() {
        let mut adapter = GrokAdapter::new(
            ProviderConfig::new("grok", "https://api.x.ai")
                .with_api_key("xai-key")
                .with_model("grok-beta"),
        );
        adapter.initialize().await.unwrap();
        assert!(adapter.has_capability(Capability::Tools));
        assert!(!adapter.has_capability(Capability::Vision));

        let mut vision = GrokAdapter::new(
            ProviderConfig::new("grok", "https://api.x.ai").with_model("grok-2-vision"),
        );
        vision.initialize().await.unwrap();
        assert!(vision.has_capability(Capability::Vision));
    }

    #[test]
    fn falls_back_to_grok_beta() {
        let adapter = GrokAdapter::new(ProviderConfig::new("grok", "https://api.x.ai"));
        let body = adapter
            .prepare_request(&[Message::user("hi")], &RequestOptions::default())
            .unwrap();
        assert_eq!(body["model"], json!("grok-beta"));
    }

    #[test]
    fn model_listing_keeps_only_grok_ids() {
        let adapter = GrokAdapter::new(ProviderConfig::new("grok", "https://api.x.ai"));
        let models = adapter.parse_models_response(json!({
            "data": [{"id": "grok-2"}, {"id": "embed-1"}, {"id": "grok-beta"}]
        }));
        assert_eq!(models, vec!["grok-2", "grok-beta"]);
    }
}
