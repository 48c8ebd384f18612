//! OpenAI adapter
//!
//! Chat completions at `/v1/chat/completions` with bearer auth. Reasoning
//! models (o-series, gpt-5) take their token budget through
//! `max_completion_tokens` and only accept the default temperature, so the
//! caller's temperature is overridden with 1 for them.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::types::{
    Capability, CapabilitySet, ChatResponse, Message, ProviderConfig, RequestOptions, StreamDelta,
};

use super::openai_compat;
use super::{AdapterCore, ProviderAdapter};

pub struct OpenAiAdapter {
    core: AdapterCore,
}

impl OpenAiAdapter {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            core: AdapterCore::new(config),
        }
    }

    /// Reasoning models reject `max_tokens` in favor of
    /// `max_completion_tokens`.
    fn requires_max_completion_tokens(&self, model: &str) -> bool {
        let id = model.to_ascii_lowercase();
        id.starts_with("o1")
            || id.starts_with("o2")
            || id.starts_with("o3")
            || id.starts_with("o-")
            || id.contains("gpt-5")
            || id == "gpt5"
            || id.contains("reasoning")
            || self.has_capability(Capability::Thinking)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
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
        if model.starts_with("o1")
            || model.starts_with("o2")
            || model.starts_with("o3")
            || model.starts_with("o-")
            || model.contains("gpt-5")
            || model == "gpt5"
        {
            capabilities.insert(Capability::Thinking);
        }
        if model.contains("gpt-4") && model.contains("vision") {
            capabilities.insert(Capability::Vision);
        }
        if model.contains("gpt-4") || model.contains("gpt-3.5") || model.contains("gpt-5") {
            capabilities.insert(Capability::Tools);
        }
        Ok(capabilities)
    }

    fn prepare_request(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<Value, LlmError> {
        let model = super::resolve_model(options, &self.core.config, "gpt-3.5-turbo").to_string();

        let images = options
            .images
            .as_deref()
            .filter(|_| self.has_capability(Capability::Vision));
        let rendered = openai_compat::render_messages(messages, images);
        let mut body = openai_compat::chat_body(&model, rendered, options);

        if self.requires_max_completion_tokens(&model) {
            openai_compat::remove(&mut body, "max_tokens");
            openai_compat::insert(
                &mut body,
                "max_completion_tokens",
                json!(options.max_tokens.unwrap_or(1000)),
            );
            openai_compat::insert(&mut body, "temperature", json!(1));
        }

        if options.enable_thinking.unwrap_or(false) && self.has_capability(Capability::Thinking) {
            let effort = options.reasoning_effort.as_deref().unwrap_or("medium");
            openai_compat::insert(&mut body, "reasoning_effort", json!(effort));
        }

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
            .filter(|entry| {
                let id = entry.id.to_ascii_lowercase();
                id.contains("gpt") || id.contains("chat")
            })
            .map(|entry| entry.id)
            .collect();
        models.sort();
        models
    }
}
