//! Shared OpenAI wire shape
//!
//! Six of the built-in vendors (OpenAI, Grok, OpenRouter, llama-server,
//! custom endpoints) speak the same chat-completions dialect:
//! `{model, messages, temperature, max_tokens, stream}` in,
//! `{choices: [{message/delta, finish_reason}], usage}` out, streamed as SSE
//! with a `[DONE]` sentinel. The request rendering, response decoding, and
//! delta extraction live here; the adapters layer their vendor quirks
//! (reasoning fields, auth, model filtering) on top.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::types::{
    ChatResponse, ContentPart, FinishReason, ImageInput, Message, MessageContent, RequestOptions,
    Role, StreamDelta, TokenUsage,
};

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<WireUsage>,
    /// Some gateways report reasoning at the top level instead of on the
    /// message.
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<WireMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: Option<ChunkDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

impl From<WireUsage> for TokenUsage {
    fn from(usage: WireUsage) -> Self {
        TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelEntry {
    pub id: String,
    #[serde(default)]
    pub architecture: Option<ModelArchitecture>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelArchitecture {
    pub modality: Option<String>,
}

/// Render messages into chat-completions shape. When `images` is given, the
/// final user message is rewritten into a part array with `image_url` entries
/// appended - the caller-owned message list itself is never touched.
pub(crate) fn render_messages(messages: &[Message], images: Option<&[ImageInput]>) -> Vec<Value> {
    let mut rendered: Vec<Value> = messages.iter().map(render_message).collect();
    if let Some(images) = images
        && !images.is_empty()
        && let Some(last) = messages.last()
        && last.role == Role::User
        && let Some(slot) = rendered.last_mut()
    {
        let mut parts = match &last.content {
            MessageContent::Text(text) => vec![json!({"type": "text", "text": text})],
            MessageContent::Parts(_) => slot["content"].as_array().cloned().unwrap_or_default(),
        };
        for image in images {
            parts.push(json!({"type": "image_url", "image_url": {"url": image.as_url()}}));
        }
        slot["content"] = Value::Array(parts);
    }
    rendered
}

fn render_message(message: &Message) -> Value {
    let content = match &message.content {
        MessageContent::Text(text) => json!(text),
        MessageContent::Parts(parts) => Value::Array(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => json!({"type": "text", "text": text}),
                    ContentPart::Image { media_type, data } => {
                        let image = ImageInput {
                            data: data.clone(),
                            media_type: Some(media_type.clone()),
                        };
                        json!({"type": "image_url", "image_url": {"url": image.as_url()}})
                    }
                })
                .collect(),
        ),
    };
    json!({"role": message.role.as_str(), "content": content})
}

/// The common request body. Vendor quirks (alternate token field names,
/// reasoning toggles, tools) are inserted by the adapters afterwards.
pub(crate) fn chat_body(model: &str, messages: Vec<Value>, options: &RequestOptions) -> Value {
    json!({
        "model": model,
        "messages": messages,
        "temperature": options.temperature.unwrap_or(0.7),
        "max_tokens": options.max_tokens.unwrap_or(1000),
        "stream": options.stream,
    })
}

/// Insert a field into a body produced by [`chat_body`].
pub(crate) fn insert(body: &mut Value, key: &str, value: Value) {
    if let Some(map) = body.as_object_mut() {
        map.insert(key.to_string(), value);
    }
}

/// Remove a field from a body produced by [`chat_body`].
pub(crate) fn remove(body: &mut Value, key: &str) {
    if let Some(map) = body.as_object_mut() {
        map.remove(key);
    }
}

/// Decode a complete chat-completions response.
pub(crate) fn process_chat_response(raw: Value) -> Result<ChatResponse, LlmError> {
    let completion: ChatCompletion = serde_json::from_value(raw)
        .map_err(|e| LlmError::ParseError(format!("malformed chat completion: {e}")))?;
    let choice = completion.choices.into_iter().next();
    let (content, message_reasoning, finish_reason) = match choice {
        Some(choice) => {
            let (content, reasoning) = match choice.message {
                Some(message) => (message.content.unwrap_or_default(), message.reasoning),
                None => (String::new(), None),
            };
            let finish_reason = choice
                .finish_reason
                .as_deref()
                .map(FinishReason::from_vendor);
            (content, reasoning, finish_reason)
        }
        None => (String::new(), None, None),
    };
    Ok(ChatResponse {
        content,
        thinking: message_reasoning.or(completion.reasoning),
        usage: completion.usage.map(TokenUsage::from),
        finish_reason,
    })
}

/// Extract the unified delta from one SSE payload. Every data frame yields a
/// delta; frames without content still flow through so usage and finish
/// reasons reach the caller.
pub(crate) fn extract_chat_delta(payload: Value) -> Result<Option<StreamDelta>, LlmError> {
    let chunk: ChatCompletionChunk = serde_json::from_value(payload)
        .map_err(|e| LlmError::ParseError(format!("malformed chat completion chunk: {e}")))?;
    let choice = chunk.choices.into_iter().next();
    let (content, thinking, finish_reason) = match choice {
        Some(choice) => {
            let (content, thinking) = match choice.delta {
                Some(delta) => (
                    delta.content.unwrap_or_default(),
                    delta.reasoning.unwrap_or_default(),
                ),
                None => (String::new(), String::new()),
            };
            let finish_reason = choice
                .finish_reason
                .as_deref()
                .map(FinishReason::from_vendor);
            (content, thinking, finish_reason)
        }
        None => (String::new(), String::new(), None),
    };
    Ok(Some(StreamDelta {
        content,
        thinking,
        done: false,
        usage: chunk.usage.map(TokenUsage::from),
        finish_reason,
    }))
}

/// Model entries from a `/v1/models` listing.
pub(crate) fn model_entries(data: Value) -> Vec<ModelEntry> {
    serde_json::from_value::<ModelList>(data)
        .map(|list| list.data)
        .unwrap_or_default()
}
