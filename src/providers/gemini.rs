//! Gemini adapter
//!
//! `generateContent` / `streamGenerateContent` under `/v1beta/models/<model>`.
//! The conversation is re-rolled into `contents` (assistant turns become
//! `model`, the system message moves to `systemInstruction`), and streaming
//! is a raw JSON array without delimiters - the engine's bracket-depth
//! scanner carves out each object. Thinking models report only a token count
//! (`thoughtsTokenCount`), which is surfaced as an opaque marker delta.

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
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u32>,
    /// Only thinking models report this, and only as a count.
    #[serde(rename = "thoughtsTokenCount")]
    thoughts_token_count: Option<u32>,
}

impl From<&UsageMetadata> for TokenUsage {
    fn from(usage: &UsageMetadata) -> Self {
        TokenUsage {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelsList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
    #[serde(rename = "supportedGenerationMethods")]
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

pub struct GeminiAdapter {
    core: AdapterCore,
}

impl GeminiAdapter {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            core: AdapterCore::new(config),
        }
    }

    fn model(&self) -> &str {
        let model = self.core.config.model.as_str();
        if model.is_empty() { "gemini-pro" } else { model }
    }

    /// Re-roll the conversation into Gemini `contents`: system turns are
    /// skipped (they travel as `systemInstruction`), assistant turns map to
    /// the `model` role, and requested images land as `inlineData` parts on
    /// the final user turn.
    fn render_contents(&self, messages: &[Message], images: Option<&[ImageInput]>) -> Vec<Value> {
        let last_user = messages
            .iter()
            .rposition(|message| message.role == Role::User);
        messages
            .iter()
            .enumerate()
            .filter(|(_, message)| message.role != Role::System)
            .map(|(index, message)| {
                let role = match message.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                let mut parts = render_parts(&message.content);
                if Some(index) == last_user
                    && let Some(images) = images
                {
                    for image in images {
                        parts.push(json!({
                            "inlineData": {
                                "mimeType": image.media_type_or_default(),
                                "data": image.as_base64(),
                            }
                        }));
                    }
                }
                json!({"role": role, "parts": parts})
            })
            .collect()
    }
}

fn render_parts(content: &MessageContent) -> Vec<Value> {
    match content {
        MessageContent::Text(text) => vec![json!({"text": text})],
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => json!({"text": text}),
                ContentPart::Image { media_type, data } => {
                    json!({"inlineData": {"mimeType": media_type, "data": data}})
                }
            })
            .collect(),
    }
}

fn candidate_text(candidate: &Candidate) -> String {
    candidate
        .content
        .as_ref()
        .and_then(|content| content.parts.as_ref())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AdapterCore {
        &mut self.core
    }

    async fn detect_capabilities(&self) -> Result<CapabilitySet, LlmError> {
        let mut capabilities = CapabilitySet::default();
        let model = &self.core.config.model;
        if model.is_empty() {
            return Ok(capabilities);
        }
        if model.contains("gemini-pro-vision")
            || model.contains("gemini-1.5")
            || model.contains("gemini-2.0")
        {
            capabilities.insert(Capability::Vision);
        }
        if model.contains("gemini-pro")
            || model.contains("gemini-1.5")
            || model.contains("gemini-2.0")
        {
            capabilities.insert(Capability::Tools);
        }
        if model.contains("gemini-2.0") {
            capabilities.insert(Capability::Thinking);
        }
        Ok(capabilities)
    }

    fn prepare_request(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<Value, LlmError> {
        let images = options
            .images
            .as_deref()
            .filter(|_| self.has_capability(Capability::Vision));

        let mut body = json!({
            "contents": self.render_contents(messages, images),
            "generationConfig": {
                "temperature": options.temperature.unwrap_or(self.core.config.temperature),
                "maxOutputTokens": options.max_tokens.unwrap_or(self.core.config.max_tokens),
                "topP": 0.8,
                "topK": 10,
            },
            "safetySettings": [
                {"category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE"},
                {"category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE"},
                {"category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE"},
                {"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE"},
            ],
        });

        if let Some(system) = messages.iter().find(|m| m.role == Role::System) {
            body["systemInstruction"] = json!({"parts": [{"text": system.text()}]});
        }

        if let Some(tools) = &options.tools
            && self.has_capability(Capability::Tools)
        {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "functionDeclarations": [{
                            "name": tool["function"]["name"],
                            "description": tool["function"]["description"],
                            "parameters": tool["function"]["parameters"],
                        }]
                    })
                })
                .collect();
            body["tools"] = Value::Array(declarations);
        }

        Ok(body)
    }

    fn process_response(&self, raw: Value) -> Result<ChatResponse, LlmError> {
        let response: GenerateContentResponse = serde_json::from_value(raw)
            .map_err(|e| LlmError::ParseError(format!("malformed Gemini response: {e}")))?;

        let candidate = response
            .candidates
            .as_ref()
            .and_then(|candidates| candidates.first());
        Ok(ChatResponse {
            content: candidate.map(candidate_text).unwrap_or_default(),
            thinking: None,
            usage: response.usage_metadata.as_ref().map(TokenUsage::from),
            finish_reason: candidate
                .and_then(|c| c.finish_reason.as_deref())
                .map(FinishReason::from_vendor),
        })
    }

    fn extract_stream_delta(&self, payload: Value) -> Result<Option<StreamDelta>, LlmError> {
        let response: GenerateContentResponse = serde_json::from_value(payload)
            .map_err(|e| LlmError::ParseError(format!("malformed Gemini chunk: {e}")))?;

        let Some(candidate) = response
            .candidates
            .as_ref()
            .and_then(|candidates| candidates.first())
        else {
            return Ok(None);
        };

        let finish_reason = candidate.finish_reason.as_deref();
        // Thinking models only report a token count; surface it as an opaque
        // marker so callers can still show progress.
        let thinking = response
            .usage_metadata
            .as_ref()
            .and_then(|usage| usage.thoughts_token_count)
            .filter(|&count| count > 0)
            .map(|count| format!("[Thinking: {count} tokens]"))
            .unwrap_or_default();

        Ok(Some(StreamDelta {
            content: candidate_text(candidate),
            thinking,
            done: finish_reason.is_some(),
            usage: response.usage_metadata.as_ref().map(TokenUsage::from),
            finish_reason: finish_reason.map(FinishReason::from_vendor),
        }))
    }

    fn wire_format(&self) -> WireFormat {
        WireFormat::JsonStream
    }

    fn api_path(&self) -> String {
        format!("/v1beta/models/{}:generateContent", self.model())
    }

    fn streaming_endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent",
            self.core.config.base_url,
            self.model()
        )
    }

    fn requires_auth(&self) -> bool {
        self.core.config.has_api_key()
    }

    fn auth_header(&self) -> Option<(&'static str, String)> {
        let key = self.core.config.expose_api_key()?;
        Some(("x-goog-api-key", key.to_string()))
    }

    fn models_endpoint(&self) -> String {
        format!("{}/v1beta/models", self.core.config.base_url)
    }

    fn parse_models_response(&self, data: Value) -> Vec<String> {
        let mut models: Vec<String> = serde_json::from_value::<ModelsList>(data)
            .map(|list| list.models)
            .unwrap_or_default()
            .into_iter()
            .filter(|model| {
                model.name.to_ascii_lowercase().contains("gemini")
                    && model
                        .supported_generation_methods
                        .iter()
                        .any(|method| method == "generateContent")
            })
            .map(|model| {
                model
                    .name
                    .rsplit('/')
                    .next()
                    .unwrap_or(&model.name)
                    .to_string()
            })
            .collect();
        models.sort();
        models
    }
}
