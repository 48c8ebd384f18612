//! Core data model
//!
//! The unified request/response shapes shared by every provider adapter:
//! configurations, messages, request options, capability flags, normalized
//! responses, and the incremental stream chunk model. Vendor wire formats
//! never leak out of the adapters; everything the caller touches lives here.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// One reachable endpoint plus its default request parameters.
///
/// Configurations are created and edited by the external config store and are
/// read-only to this crate. A configuration is usable once `provider` and
/// `base_url` are both non-empty.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// Store-assigned identifier.
    pub id: String,
    /// Optional human-readable display name.
    pub name: Option<String>,
    /// Provider identifier, e.g. `"openai"` or a runtime-registered id.
    pub provider: String,
    /// Endpoint base URL without a trailing vendor path.
    pub base_url: String,
    /// API key; absent or empty for unauthenticated endpoints.
    pub api_key: Option<SecretString>,
    /// Default model identifier.
    pub model: String,
    /// Default sampling temperature.
    pub temperature: f64,
    /// Default completion token budget.
    pub max_tokens: u32,
    /// Default for extended-reasoning requests when the caller leaves it unset.
    pub enable_thinking: bool,
    /// Disabled configurations are excluded from store lookups.
    pub enabled: bool,
    /// Optional referer URL forwarded by providers that attribute traffic
    /// (OpenRouter's `HTTP-Referer`).
    pub site_url: Option<String>,
    /// Optional application name forwarded alongside `site_url`.
    pub site_name: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: None,
            provider: String::new(),
            base_url: String::new(),
            api_key: None,
            model: String::new(),
            temperature: 0.7,
            max_tokens: 1000,
            enable_thinking: false,
            enabled: true,
            site_url: None,
            site_name: None,
        }
    }
}

impl ProviderConfig {
    /// Create a configuration for the given provider id and base URL.
    pub fn new(provider: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_thinking(mut self, enable_thinking: bool) -> Self {
        self.enable_thinking = enable_thinking;
        self
    }

    /// API key as a plain string, treating an empty key as absent.
    pub fn expose_api_key(&self) -> Option<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .filter(|key| !key.is_empty())
    }

    pub fn has_api_key(&self) -> bool {
        self.expose_api_key().is_some()
    }

    /// A configuration can be dispatched once provider and base URL are set.
    pub fn is_usable(&self) -> bool {
        !self.provider.is_empty() && !self.base_url.is_empty()
    }

    /// Display name used for preset lookup: the explicit name when present,
    /// otherwise `"<provider> (<base_url>)"`.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref()
            && !name.is_empty()
        {
            return name.to_string();
        }
        let provider = if self.provider.is_empty() {
            "provider"
        } else {
            &self.provider
        };
        let base_url = if self.base_url.is_empty() {
            "n/a"
        } else {
            &self.base_url
        };
        format!("{provider} ({base_url})")
    }
}

/// An optional feature a vendor model may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Vision,
    Tools,
    Thinking,
}

/// The capability flags of one provider adapter instance.
///
/// Populated once during `initialize()` and never mutated afterward. A failed
/// capability probe leaves the set empty rather than failing initialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    vision: bool,
    tools: bool,
    thinking: bool,
}

impl CapabilitySet {
    pub fn insert(&mut self, capability: Capability) {
        match capability {
            Capability::Vision => self.vision = true,
            Capability::Tools => self.tools = true,
            Capability::Thinking => self.thinking = true,
        }
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.insert(capability);
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Vision => self.vision,
            Capability::Tools => self.tools,
            Capability::Thinking => self.thinking,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.vision || self.tools || self.thinking)
    }

    /// The supported capabilities as a list, for display purposes.
    pub fn to_vec(&self) -> Vec<Capability> {
        let mut out = Vec::new();
        if self.vision {
            out.push(Capability::Vision);
        }
        if self.tools {
            out.push(Capability::Tools);
        }
        if self.thinking {
            out.push(Capability::Thinking);
        }
        out
    }
}

/// Conversation role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One piece of a multi-part message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { media_type: String, data: String },
}

/// Message body: plain text or an ordered part sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A single conversation message. Caller-owned and immutable once passed in;
/// adapters that inject images build a new message list instead of mutating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// The textual portion of the message (part sequences are joined).
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// Caller-supplied image: an http(s) URL, a `data:` URL, or bare base64.
/// Adapters convert to whichever spelling their vendor expects.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageInput {
    pub data: String,
    #[serde(default)]
    pub media_type: Option<String>,
}

impl ImageInput {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            media_type: None,
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn media_type_or_default(&self) -> &str {
        self.media_type.as_deref().unwrap_or("image/jpeg")
    }

    /// URL form for vendors that take `image_url` entries. Bare base64 is
    /// wrapped into a `data:` URL.
    pub fn as_url(&self) -> String {
        if self.data.starts_with("http://")
            || self.data.starts_with("https://")
            || self.data.starts_with("data:")
        {
            self.data.clone()
        } else {
            format!("data:{};base64,{}", self.media_type_or_default(), self.data)
        }
    }

    /// Base64 payload for vendors that take inline data; a `data:` URL prefix
    /// is stripped.
    pub fn as_base64(&self) -> &str {
        if self.data.starts_with("data:") {
            match self.data.find(',') {
                Some(index) => &self.data[index + 1..],
                None => &self.data,
            }
        } else {
            &self.data
        }
    }
}

/// Caller intent for one request. Validated against the active adapter's
/// `CapabilitySet` before any vendor sees it: unsupported intents are
/// downgraded, never forwarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub enable_thinking: Option<bool>,
    /// Reasoning effort hint for vendors that take one (`low`/`medium`/`high`).
    pub reasoning_effort: Option<String>,
    pub images: Option<Vec<ImageInput>>,
    /// OpenAI-shaped tool definitions, passed through to capable vendors.
    pub tools: Option<Vec<serde_json::Value>>,
    pub tool_choice: Option<serde_json::Value>,
    pub stream: bool,
    pub request_id: Option<String>,
}

/// Advisory token accounting. Vendors report different subsets; absent fields
/// stay `None`. This is not a billing mechanism.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl TokenUsage {
    /// Usage with only a completion-side count (Ollama `eval_count`,
    /// Anthropic `output_tokens`).
    pub fn completion(tokens: u32) -> Self {
        Self {
            completion_tokens: Some(tokens),
            ..Self::default()
        }
    }

    /// Best available token count: the total when reported, otherwise the
    /// completion count.
    pub fn tokens(&self) -> u32 {
        self.total_tokens
            .or(self.completion_tokens)
            .unwrap_or_default()
    }
}

/// Vendor-reported cause of generation stop, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural completion or stop sequence.
    Stop,
    /// Truncated by the token limit, in any vendor spelling
    /// (`length`, `max_tokens`, `MAX_TOKENS`, ...).
    Length,
    /// The model requested tool invocations.
    ToolCalls,
    /// Output suppressed by a safety or policy filter.
    ContentFilter,
    /// Any other vendor-specific reason, lowercased.
    Other(String),
}

impl FinishReason {
    /// Map a raw vendor finish indicator onto the common vocabulary.
    pub fn from_vendor(raw: &str) -> Self {
        let reason = raw.to_ascii_lowercase();
        if reason == "length" || (reason.contains("max") && reason.contains("token")) {
            return FinishReason::Length;
        }
        match reason.as_str() {
            "stop" | "end_turn" | "stop_sequence" => FinishReason::Stop,
            "tool_calls" | "tool_use" | "function_call" => FinishReason::ToolCalls,
            "content_filter" | "safety" | "recitation" | "prohibited_content" | "refusal" => {
                FinishReason::ContentFilter
            }
            _ => FinishReason::Other(reason),
        }
    }
}

/// One incremental unit of a streaming response after normalization.
///
/// Carries both the per-event deltas and the cumulative totals accumulated
/// over the lifetime of the stream call. Exactly one chunk per successful
/// stream has `done == true`, and it is the last one delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    pub content: String,
    pub thinking: String,
    pub full_content: String,
    pub full_thinking: String,
    pub done: bool,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<FinishReason>,
}

/// What a vendor extractor pulled out of one decoded streaming payload,
/// before accumulation. `None` from an extractor means the frame carries
/// nothing for the caller (role announcements, pings).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamDelta {
    pub content: String,
    pub thinking: String,
    pub done: bool,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<FinishReason>,
}

impl StreamDelta {
    /// The terminal delta produced by an explicit end-of-stream sentinel.
    pub fn terminal() -> Self {
        Self {
            done: true,
            ..Self::default()
        }
    }
}

/// Normalized non-streaming result.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    pub thinking: Option<String>,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<FinishReason>,
}
