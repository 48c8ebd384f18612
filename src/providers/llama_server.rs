//! llama.cpp server adapter
//!
//! A local llama-server speaks the chat-completions dialect without
//! authentication. No capabilities are assumed; the model listing is trimmed
//! to local model families and weight files.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LlmError;
use crate::types::{ChatResponse, Message, ProviderConfig, RequestOptions, StreamDelta};

use super::openai_compat;
use super::{AdapterCore, ProviderAdapter};

pub struct LlamaServerAdapter {
    core: AdapterCore,
}

impl LlamaServerAdapter {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            core: AdapterCore::new(config),
        }
    }
}

#[async_trait]
impl ProviderAdapter for LlamaServerAdapter {
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
        let model = super::resolve_model(options, &self.core.config, "llama2");
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

    fn models_endpoint(&self) -> String {
        format!("{}/v1/models", self.core.config.base_url)
    }

    fn parse_models_response(&self, data: Value) -> Vec<String> {
        let mut models: Vec<String> = openai_compat::model_entries(data)
            .into_iter()
            .filter(|entry| {
                let id = entry.id.to_ascii_lowercase();
                id.contains("mistral")
                    || id.contains("llama")
                    || id.contains("codellama")
                    || id.contains(".gguf")
                    || id.contains(".bin")
            })
            .map(|entry| entry.id)
            .collect();
        models.sort();
        models
    }
}
