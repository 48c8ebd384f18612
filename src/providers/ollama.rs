//! Ollama adapter
//!
//! Local, unauthenticated `/api/chat` speaking newline-delimited JSON: every
//! line is a complete object carrying its own `done` flag, with no sentinel
//! terminator. Capabilities are not guessable from the model id, so
//! initialization probes `/api/show` for the model's advertised capability
//! list; an unreachable daemon degrades to an empty set.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::types::{
    Capability, CapabilitySet, ChatResponse, ContentPart, FinishReason, ImageInput, Message,
    MessageContent, ProviderConfig, RequestOptions, Role, StreamDelta, TokenUsage,
};
use crate::utils::streaming::WireFormat;

use super::{AdapterCore, ProviderAdapter};

#[derive(Debug, Deserialize)]
struct ChatPayload {
    message: Option<ChatMessage>,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    done: bool,
    eval_count: Option<u32>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    #[serde(default)]
    capabilities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

pub struct OllamaAdapter {
    core: AdapterCore,
}

impl OllamaAdapter {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            core: AdapterCore::new(config),
        }
    }

    /// Render messages into Ollama chat shape: textual `content` plus an
    /// optional `images` array of base64 payloads on the final user message.
    fn render_messages(&self, messages: &[Message], images: Option<&[ImageInput]>) -> Vec<Value> {
        let last_user = messages
            .iter()
            .rposition(|message| message.role == Role::User);
        messages
            .iter()
            .enumerate()
            .map(|(index, message)| {
                let mut rendered = json!({
                    "role": message.role.as_str(),
                    "content": message.text(),
                });
                let mut attached: Vec<String> = match &message.content {
                    MessageContent::Parts(parts) => parts
                        .iter()
                        .filter_map(|part| match part {
                            ContentPart::Image { data, .. } => {
                                Some(ImageInput::new(data.clone()).as_base64().to_string())
                            }
                            ContentPart::Text { .. } => None,
                        })
                        .collect(),
                    MessageContent::Text(_) => Vec::new(),
                };
                if Some(index) == last_user
                    && let Some(images) = images
                {
                    attached.extend(images.iter().map(|image| image.as_base64().to_string()));
                }
                if !attached.is_empty() {
                    rendered["images"] = json!(attached);
                }
                rendered
            })
            .collect()
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AdapterCore {
        &mut self.core
    }

    async fn detect_capabilities(&self) -> Result<CapabilitySet, LlmError> {
        let config = &self.core.config;
        if config.model.is_empty() {
            return Ok(CapabilitySet::default());
        }
        let response = self
            .core
            .http
            .post(format!("{}/api/show", config.base_url))
            .json(&json!({"name": config.model}))
            .send()
            .await
            .map_err(|e| LlmError::HttpError(format!("failed to fetch model info: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let info: ModelInfo = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("invalid model info: {e}")))?;

        let mut capabilities = CapabilitySet::default();
        for capability in &info.capabilities {
            match capability.as_str() {
                "thinking" => capabilities.insert(Capability::Thinking),
                "vision" => capabilities.insert(Capability::Vision),
                "tools" => capabilities.insert(Capability::Tools),
                _ => {}
            }
        }
        Ok(capabilities)
    }

    fn prepare_request(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<Value, LlmError> {
        let model = super::resolve_model(options, &self.core.config, "");
        if model.is_empty() {
            return Err(LlmError::ConfigurationError(
                "Model must be specified for Ollama requests".to_string(),
            ));
        }

        let images = options
            .images
            .as_deref()
            .filter(|_| self.has_capability(Capability::Vision));
        let thinking = options.enable_thinking.unwrap_or(false);

        let mut body = json!({
            "model": model,
            "messages": self.render_messages(messages, images),
            "stream": options.stream,
            "think": thinking,
            "options": {
                "temperature": options.temperature.unwrap_or(0.7),
                "num_predict": options.max_tokens.unwrap_or(1000),
            },
        });
        if thinking && self.has_capability(Capability::Thinking) {
            body["options"]["enable_thinking"] = json!(true);
        }
        Ok(body)
    }

    fn process_response(&self, raw: Value) -> Result<ChatResponse, LlmError> {
        let payload: ChatPayload = serde_json::from_value(raw)
            .map_err(|e| LlmError::ParseError(format!("malformed Ollama response: {e}")))?;
        Ok(ChatResponse {
            content: payload
                .message
                .and_then(|message| message.content)
                .unwrap_or_default(),
            thinking: payload.thinking,
            usage: payload.eval_count.map(TokenUsage::completion),
            finish_reason: payload
                .finish_reason
                .as_deref()
                .map(FinishReason::from_vendor),
        })
    }

    fn extract_stream_delta(&self, payload: Value) -> Result<Option<StreamDelta>, LlmError> {
        let payload: ChatPayload = serde_json::from_value(payload)
            .map_err(|e| LlmError::ParseError(format!("malformed Ollama chunk: {e}")))?;
        Ok(Some(StreamDelta {
            content: payload
                .message
                .and_then(|message| message.content)
                .unwrap_or_default(),
            thinking: payload.thinking.unwrap_or_default(),
            done: payload.done,
            usage: payload.eval_count.map(TokenUsage::completion),
            finish_reason: payload
                .finish_reason
                .as_deref()
                .map(FinishReason::from_vendor),
        }))
    }

    fn wire_format(&self) -> WireFormat {
        WireFormat::JsonLines
    }

    fn api_path(&self) -> String {
        "/api/chat".to_string()
    }

    fn models_endpoint(&self) -> String {
        format!("{}/api/tags", self.core.config.base_url)
    }

    fn parse_models_response(&self, data: Value) -> Vec<String> {
        serde_json::from_value::<TagsResponse>(data)
            .map(|tags| tags.models.into_iter().map(|entry| entry.name).collect())
            .unwrap_or_default()
    }
}
