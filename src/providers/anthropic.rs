//! Anthropic adapter
//!
//! Messages API at `/v1/messages`. The system message travels as a top-level
//! `system` field rather than inside `messages`, auth uses `x-api-key` with a
//! pinned `anthropic-version`, and the SSE stream is typed events
//! (`content_block_delta`, `message_delta`, `message_stop`) instead of a
//! `[DONE]` sentinel. In-band `type: "error"` frames abort the stream with
//! the vendor's error code and request-tracing id attached.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::types::{
    Capability, CapabilitySet, ChatResponse, ContentPart, FinishReason, ImageInput, Message,
    MessageContent, ProviderConfig, RequestOptions, Role, StreamDelta, TokenUsage,
};

use super::{AdapterCore, ProviderAdapter};

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[serde(default)]
    block_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<EventDelta>,
    #[serde(default)]
    usage: Option<WireUsage>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    error: Option<ErrorBody>,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventDelta {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

impl From<WireUsage> for TokenUsage {
    fn from(usage: WireUsage) -> Self {
        TokenUsage {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: match (usage.input_tokens, usage.output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            },
        }
    }
}

pub struct AnthropicAdapter {
    core: AdapterCore,
}

impl AnthropicAdapter {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            core: AdapterCore::new(config),
        }
    }

    /// Render non-system messages into Anthropic content blocks, appending
    /// base64 image blocks to the final user message when images were
    /// requested. The caller-owned list is never mutated.
    fn render_messages(&self, messages: &[Message], images: Option<&[ImageInput]>) -> Vec<Value> {
        let last_user = messages
            .iter()
            .rposition(|message| message.role == Role::User);
        messages
            .iter()
            .enumerate()
            .filter(|(_, message)| message.role != Role::System)
            .map(|(index, message)| {
                let images_here = images.filter(|_| Some(index) == last_user);
                json!({
                    "role": message.role.as_str(),
                    "content": render_content(&message.content, images_here),
                })
            })
            .collect()
    }
}

fn render_content(content: &MessageContent, images: Option<&[ImageInput]>) -> Value {
    let mut blocks: Vec<Value> = match content {
        MessageContent::Text(text) => {
            if images.is_none() {
                return json!(text);
            }
            vec![json!({"type": "text", "text": text})]
        }
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => json!({"type": "text", "text": text}),
                ContentPart::Image { media_type, data } => image_block(media_type, data),
            })
            .collect(),
    };
    if let Some(images) = images {
        for image in images {
            blocks.push(image_block(image.media_type_or_default(), image.as_base64()));
        }
    }
    Value::Array(blocks)
}

fn image_block(media_type: &str, data: &str) -> Value {
    json!({
        "type": "image",
        "source": {"type": "base64", "media_type": media_type, "data": data},
    })
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AdapterCore {
        &mut self.core
    }

    async fn detect_capabilities(&self) -> Result<CapabilitySet, LlmError> {
        let mut capabilities = CapabilitySet::default();
        if self.core.config.model.contains("claude-3") {
            capabilities.insert(Capability::Vision);
        }
        Ok(capabilities)
    }

    fn prepare_request(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<Value, LlmError> {
        let model = super::resolve_model(options, &self.core.config, "claude-3-sonnet-20240229");
        let images = options
            .images
            .as_deref()
            .filter(|_| self.has_capability(Capability::Vision));

        let mut body = json!({
            "model": model,
            "max_tokens": options.max_tokens.unwrap_or(1000),
            "temperature": options.temperature.unwrap_or(0.7),
            "messages": self.render_messages(messages, images),
            "stream": options.stream,
        });

        if let Some(system) = messages.iter().find(|m| m.role == Role::System) {
            body["system"] = json!(system.text());
        }
        Ok(body)
    }

    fn process_response(&self, raw: Value) -> Result<ChatResponse, LlmError> {
        let response: MessageResponse = serde_json::from_value(raw)
            .map_err(|e| LlmError::ParseError(format!("malformed Anthropic response: {e}")))?;

        let content: String = response
            .content
            .iter()
            .filter(|block| block.block_type.as_deref() != Some("thinking"))
            .filter_map(|block| block.text.as_deref())
            .collect();
        let thinking: String = response
            .content
            .iter()
            .filter_map(|block| block.thinking.as_deref())
            .collect();

        Ok(ChatResponse {
            content,
            thinking: (!thinking.is_empty()).then_some(thinking),
            usage: response.usage.map(TokenUsage::from),
            finish_reason: response
                .stop_reason
                .as_deref()
                .map(FinishReason::from_vendor),
        })
    }

    fn extract_stream_delta(&self, payload: Value) -> Result<Option<StreamDelta>, LlmError> {
        let event: StreamEvent = serde_json::from_value(payload)
            .map_err(|e| LlmError::ParseError(format!("malformed Anthropic event: {e}")))?;

        match event.event_type.as_str() {
            "error" => {
                let error = event.error.unwrap_or(ErrorBody {
                    error_type: None,
                    message: None,
                });
                Err(LlmError::VendorStream {
                    code: error
                        .error_type
                        .unwrap_or_else(|| "anthropic_error".to_string()),
                    message: error
                        .message
                        .unwrap_or_else(|| "Anthropic streaming error".to_string()),
                    request_id: event.request_id,
                })
            }
            "content_block_delta" => {
                let delta = event.delta.unwrap_or(EventDelta {
                    text: None,
                    thinking: None,
                    stop_reason: None,
                });
                Ok(Some(StreamDelta {
                    content: delta.text.unwrap_or_default(),
                    thinking: delta.thinking.unwrap_or_default(),
                    ..StreamDelta::default()
                }))
            }
            "message_delta" => Ok(Some(StreamDelta {
                usage: event.usage.map(TokenUsage::from),
                finish_reason: event
                    .delta
                    .and_then(|delta| delta.stop_reason)
                    .as_deref()
                    .map(FinishReason::from_vendor),
                ..StreamDelta::default()
            })),
            "message_stop" => Ok(Some(StreamDelta {
                done: true,
                finish_reason: event.stop_reason.as_deref().map(FinishReason::from_vendor),
                ..StreamDelta::default()
            })),
            // message_start, content_block_start, content_block_stop, ping
            _ => Ok(None),
        }
    }

    fn api_path(&self) -> String {
        "/v1/messages".to_string()
    }

    fn requires_auth(&self) -> bool {
        self.core.config.has_api_key()
    }

    fn auth_header(&self) -> Option<(&'static str, String)> {
        let key = self.core.config.expose_api_key()?;
        Some(("x-api-key", key.to_string()))
    }

    fn extra_headers(&self) -> Vec<(&'static str, String)> {
        if !self.requires_auth() {
            return Vec::new();
        }
        vec![
            ("anthropic-version", "2023-06-01".to_string()),
            ("anthropic-dangerous-direct-browser-access", "true".to_string()),
        ]
    }

    fn models_endpoint(&self) -> String {
        format!("{}/v1/models", self.core.config.base_url)
    }

    fn parse_models_response(&self, data: Value) -> Vec<String> {
        data["data"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry["id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new(
            ProviderConfig::new("anthropic", "https://api.anthropic.com")
                .with_api_key("sk-ant")
                .with_model("claude-3-sonnet-20240229"),
        )
    }

    #[test]
    fn system_message_is_extracted_to_top_level() {
        let messages = vec![Message::system("be terse"), Message::user("hi")];
        let body = adapter()
            .prepare_request(&messages, &RequestOptions::default())
            .unwrap();
        assert_eq!(body["system"], json!("be terse"));
        let rendered = body["messages"].as_array().unwrap();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0]["role"], json!("user"));
    }

    #[test]
    fn max_tokens_stop_reason_normalizes_to_length() {
        let response = adapter()
            .process_response(json!({
                "content": [{"type": "text", "text": "cut off"}],
                "stop_reason": "max_tokens",
                "usage": {"input_tokens": 10, "output_tokens": 1000}
            }))
            .unwrap();
        assert_eq!(response.finish_reason, Some(FinishReason::Length));
        assert_eq!(response.usage.unwrap().tokens(), 1010);
    }

    #[test]
    fn error_frame_carries_code_and_request_id() {
        let result = adapter().extract_stream_delta(json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"},
            "request_id": "req_123"
        }));
        match result {
            Err(LlmError::VendorStream {
                code,
                message,
                request_id,
            }) => {
                assert_eq!(code, "overloaded_error");
                assert_eq!(message, "Overloaded");
                assert_eq!(request_id.as_deref(), Some("req_123"));
            }
            other => panic!("expected VendorStream error, got {other:?}"),
        }
    }

    #[test]
    fn content_block_delta_yields_text_and_thinking() {
        let delta = adapter()
            .extract_stream_delta(json!({
                "type": "content_block_delta",
                "index": 0,
                "delta": {"type": "thinking_delta", "thinking": "let me see"}
            }))
            .unwrap()
            .unwrap();
        assert_eq!(delta.thinking, "let me see");
        assert!(!delta.done);
    }

    #[test]
    fn message_delta_reports_usage_without_terminating() {
        let delta = adapter()
            .extract_stream_delta(json!({
                "type": "message_delta",
                "delta": {"stop_reason": "end_turn"},
                "usage": {"output_tokens": 42}
            }))
            .unwrap()
            .unwrap();
        assert!(!delta.done);
        assert_eq!(delta.finish_reason, Some(FinishReason::Stop));
        assert_eq!(delta.usage.unwrap().tokens(), 42);
    }

    #[test]
    fn message_stop_terminates_the_stream() {
        let delta = adapter()
            .extract_stream_delta(json!({"type": "message_stop"}))
            .unwrap()
            .unwrap();
        assert!(delta.done);
    }

    #[test]
    fn ping_frames_are_ignorable() {
        let delta = adapter()
            .extract_stream_delta(json!({"type": "ping"}))
            .unwrap();
        assert!(delta.is_none());
    }

    #[tokio::test]
    async fn claude_3_models_detect_vision() {
        let mut adapter = adapter();
        adapter.initialize().await.unwrap();
        assert!(adapter.has_capability(Capability::Vision));
        assert!(!adapter.has_capability(Capability::Tools));
    }

    #[tokio::test]
    async fn images_become_base64_source_blocks_on_the_last_user_message() {
        let mut adapter = adapter();
        adapter.initialize().await.unwrap();
        let messages = vec![Message::user("what is this?")];
        let options = RequestOptions {
            images: Some(vec![
                ImageInput::new("data:image/png;base64,aGVsbG8=").with_media_type("image/png"),
            ]),
            ..RequestOptions::default()
        };
        let body = adapter.prepare_request(&messages, &options).unwrap();
        let blocks = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1]["source"]["data"], json!("aGVsbG8="));
        assert_eq!(blocks[1]["source"]["media_type"], json!("image/png"));
        // Caller-owned message stays textual.
        assert_eq!(messages[0].content, MessageContent::Text("what is this?".into()));
    }
}
