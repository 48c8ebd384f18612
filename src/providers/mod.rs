//! Provider adapter contract
//!
//! One trait per vendor concern: request construction, response decoding,
//! streaming wire-format parsing, authentication, capability detection, and
//! model discovery. Shared state (configuration, HTTP client, capability set,
//! in-flight request registry) lives in the composed [`AdapterCore`]; shared
//! behavior - the transport operations and the streaming engine that drives a
//! vendor's extractor over one of three wire families - is implemented as
//! provided trait methods. Adapters override only the vendor-shaped surface.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::types::{
    Capability, CapabilitySet, ChatResponse, Message, ProviderConfig, RequestOptions, StreamChunk,
    StreamDelta,
};
use crate::utils::cancel::{RequestGuard, RequestTracker};
use crate::utils::scan::{JsonObjectScanner, LineScanner};
use crate::utils::streaming::{StreamAccumulator, WireFormat};

pub mod anthropic;
pub mod custom;
pub mod gemini;
pub mod grok;
pub mod llama_server;
pub mod ollama;
pub mod openai;
pub(crate) mod openai_compat;
pub mod openrouter;

pub use anthropic::AnthropicAdapter;
pub use custom::CustomAdapter;
pub use gemini::GeminiAdapter;
pub use grok::GrokAdapter;
pub use llama_server::LlamaServerAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
pub use openrouter::OpenRouterAdapter;

/// Callback receiving unified stream chunks, invoked synchronously and never
/// concurrently with itself.
pub type ChunkHandler<'a> = &'a mut (dyn FnMut(StreamChunk) + Send);

/// Default bound for model discovery.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Model precedence shared by every adapter: caller option, configured
/// default, vendor fallback. Empty strings count as unset.
pub(crate) fn resolve_model<'a>(
    options: &'a RequestOptions,
    config: &'a ProviderConfig,
    fallback: &'a str,
) -> &'a str {
    [options.model.as_deref(), Some(config.model.as_str())]
        .into_iter()
        .flatten()
        .find(|model| !model.is_empty())
        .unwrap_or(fallback)
}

/// State every adapter owns, independent of the vendor.
#[derive(Debug)]
pub struct AdapterCore {
    pub config: ProviderConfig,
    pub http: reqwest::Client,
    pub capabilities: CapabilitySet,
    pub requests: RequestTracker,
}

impl AdapterCore {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            capabilities: CapabilitySet::default(),
            requests: RequestTracker::default(),
        }
    }
}

/// The contract every vendor adapter satisfies.
///
/// Required methods cover the vendor-shaped surface; provided methods
/// implement initialization, the transport round trips, the streaming
/// engine, cancellation, and model discovery uniformly on top of them.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn core(&self) -> &AdapterCore;
    fn core_mut(&mut self) -> &mut AdapterCore;

    /// Vendor-specific capability probe. May issue network calls (Ollama
    /// queries model metadata). Errors are handled by `initialize`.
    async fn detect_capabilities(&self) -> Result<CapabilitySet, LlmError> {
        Ok(CapabilitySet::default())
    }

    /// Populate the capability set. A failed probe degrades to an empty set;
    /// initialization itself never fails because of it.
    async fn initialize(&mut self) -> Result<(), LlmError> {
        match self.detect_capabilities().await {
            Ok(capabilities) => self.core_mut().capabilities = capabilities,
            Err(error) => warn!(
                provider = %self.core().config.provider,
                %error,
                "capability detection failed, continuing without optional capabilities"
            ),
        }
        Ok(())
    }

    fn config(&self) -> &ProviderConfig {
        &self.core().config
    }

    fn capabilities(&self) -> CapabilitySet {
        self.core().capabilities
    }

    fn has_capability(&self, capability: Capability) -> bool {
        self.core().capabilities.supports(capability)
    }

    /// Build the vendor-shaped request body. Pure: never mutates the
    /// caller-owned messages or options.
    fn prepare_request(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<Value, LlmError>;

    /// Decode a complete (non-streaming) vendor response into the normalized
    /// shape, mapping the vendor's finish-reason vocabulary onto the common
    /// enum.
    fn process_response(&self, raw: Value) -> Result<ChatResponse, LlmError>;

    /// Map one decoded streaming payload to a unified delta. `Ok(None)`
    /// marks an ignorable frame (role announcements, pings); an error aborts
    /// the stream.
    fn extract_stream_delta(&self, payload: Value) -> Result<Option<StreamDelta>, LlmError>;

    /// Which wire family the vendor's streaming endpoint speaks.
    fn wire_format(&self) -> WireFormat {
        WireFormat::SseLines
    }

    /// Vendor path appended to the configured base URL.
    fn api_path(&self) -> String;

    fn endpoint(&self) -> String {
        format!("{}{}", self.core().config.base_url, self.api_path())
    }

    /// Streaming endpoint; identical to `endpoint()` for every vendor that
    /// selects streaming via a request flag rather than a distinct path.
    fn streaming_endpoint(&self) -> String {
        self.endpoint()
    }

    fn requires_auth(&self) -> bool {
        false
    }

    /// Header name/value pair carrying the credential.
    fn auth_header(&self) -> Option<(&'static str, String)> {
        let key = self.core().config.expose_api_key()?;
        Some(("authorization", format!("Bearer {key}")))
    }

    /// Additional vendor headers (API version pins, attribution).
    fn extra_headers(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn models_endpoint(&self) -> String;

    /// Turn the vendor's model-listing payload into an ordered id list.
    fn parse_models_response(&self, data: Value) -> Vec<String>;

    fn apply_headers(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.requires_auth()
            && let Some((name, value)) = self.auth_header()
        {
            request = request.header(name, value);
        }
        for (name, value) in self.extra_headers() {
            request = request.header(name, value);
        }
        request
    }

    /// Non-streaming round trip: POST the prepared body, surface non-2xx as
    /// `ApiError`, and return the decoded JSON payload. Registered for
    /// cancellation under `request_id` (generated when absent).
    async fn execute_request(
        &self,
        body: &Value,
        request_id: Option<&str>,
    ) -> Result<Value, LlmError> {
        let request_id = request_id
            .map(str::to_owned)
            .unwrap_or_else(crate::utils::generate_request_id);
        let token = self.core().requests.register(&request_id);
        let _guard = RequestGuard::new(&self.core().requests, request_id.as_str());

        let request = self
            .apply_headers(self.core().http.post(self.endpoint()))
            .json(body);

        let round_trip = async {
            let response = request
                .send()
                .await
                .map_err(|e| LlmError::HttpError(format!("request failed: {e}")))?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::ApiError {
                    status: status.as_u16(),
                    body,
                });
            }
            response
                .json::<Value>()
                .await
                .map_err(|e| LlmError::ParseError(format!("invalid JSON response: {e}")))
        };

        tokio::select! {
            _ = token.cancelled() => Err(LlmError::Cancelled),
            result = round_trip => result,
        }
    }

    /// Streaming round trip.
    ///
    /// Drives the vendor's wire family over the response body: each extracted
    /// unit is decoded, handed to `extract_stream_delta`, accumulated, and
    /// delivered to `on_chunk` before the next unit is parsed. The first
    /// delta with `done` terminates the stream and later payloads are not
    /// processed. Returns the accumulated content.
    async fn stream_request(
        &self,
        messages: &[Message],
        options: &RequestOptions,
        on_chunk: ChunkHandler<'_>,
    ) -> Result<String, LlmError> {
        let body = self.prepare_request(messages, options)?;
        let request_id = options
            .request_id
            .clone()
            .unwrap_or_else(crate::utils::generate_request_id);
        let token = self.core().requests.register(&request_id);
        let _guard = RequestGuard::new(&self.core().requests, request_id.as_str());

        debug!(
            provider = %self.core().config.provider,
            request_id = %request_id,
            "starting streaming request"
        );

        let request = self
            .apply_headers(self.core().http.post(self.streaming_endpoint()))
            .json(&body);

        let response = tokio::select! {
            _ = token.cancelled() => return Err(LlmError::Cancelled),
            sent = request.send() => {
                sent.map_err(|e| LlmError::HttpError(format!("request failed: {e}")))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let mut accumulator = StreamAccumulator::default();

        match self.wire_format() {
            WireFormat::SseLines => {
                let mut events = Box::pin(response.bytes_stream().eventsource());
                loop {
                    let event = tokio::select! {
                        _ = token.cancelled() => return Err(LlmError::Cancelled),
                        next = events.next() => match next {
                            Some(Ok(event)) => event,
                            Some(Err(e)) => {
                                return Err(LlmError::HttpError(format!("stream error: {e}")));
                            }
                            None => break,
                        },
                    };
                    let data = event.data.trim();
                    if data.is_empty() {
                        continue;
                    }
                    let delta = if data == "[DONE]" {
                        Some(StreamDelta::terminal())
                    } else {
                        match serde_json::from_str::<Value>(data) {
                            Ok(payload) => self.extract_stream_delta(payload)?,
                            // Comment/keep-alive noise is not an error.
                            Err(_) => None,
                        }
                    };
                    if let Some(delta) = delta
                        && accumulator.emit(delta, on_chunk)
                    {
                        return Ok(accumulator.into_content());
                    }
                }
            }
            WireFormat::JsonLines => {
                let mut scanner = LineScanner::default();
                let mut bytes = Box::pin(response.bytes_stream());
                loop {
                    let chunk = tokio::select! {
                        _ = token.cancelled() => return Err(LlmError::Cancelled),
                        next = bytes.next() => match next {
                            Some(Ok(chunk)) => chunk,
                            Some(Err(e)) => {
                                return Err(LlmError::HttpError(format!("stream error: {e}")));
                            }
                            None => break,
                        },
                    };
                    for line in scanner.push(&chunk) {
                        let Ok(payload) = serde_json::from_str::<Value>(&line) else {
                            continue;
                        };
                        if let Some(delta) = self.extract_stream_delta(payload)?
                            && accumulator.emit(delta, on_chunk)
                        {
                            return Ok(accumulator.into_content());
                        }
                    }
                }
                if let Some(line) = scanner.finish()
                    && let Ok(payload) = serde_json::from_str::<Value>(&line)
                    && let Some(delta) = self.extract_stream_delta(payload)?
                    && accumulator.emit(delta, on_chunk)
                {
                    return Ok(accumulator.into_content());
                }
            }
            WireFormat::JsonStream => {
                let mut scanner = JsonObjectScanner::default();
                let mut bytes = Box::pin(response.bytes_stream());
                loop {
                    let chunk = tokio::select! {
                        _ = token.cancelled() => return Err(LlmError::Cancelled),
                        next = bytes.next() => match next {
                            Some(Ok(chunk)) => chunk,
                            Some(Err(e)) => {
                                return Err(LlmError::HttpError(format!("stream error: {e}")));
                            }
                            None => break,
                        },
                    };
                    for object in scanner.push(&chunk) {
                        let Ok(payload) = serde_json::from_str::<Value>(&object) else {
                            continue;
                        };
                        if let Some(delta) = self.extract_stream_delta(payload)?
                            && accumulator.emit(delta, on_chunk)
                        {
                            return Ok(accumulator.into_content());
                        }
                    }
                }
            }
        }

        Ok(accumulator.into_content())
    }

    /// List the vendor's models within a time bound. Expiry yields
    /// `DiscoveryTimeout`, distinct from transport errors.
    async fn discover_models(&self, timeout: Option<Duration>) -> Result<Vec<String>, LlmError> {
        let bound = timeout.unwrap_or(DEFAULT_DISCOVERY_TIMEOUT);
        let request = self.apply_headers(self.core().http.get(self.models_endpoint()));

        let fetch = async {
            let response = request
                .send()
                .await
                .map_err(|e| LlmError::HttpError(format!("model discovery failed: {e}")))?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::ApiError {
                    status: status.as_u16(),
                    body,
                });
            }
            let data = response
                .json::<Value>()
                .await
                .map_err(|e| LlmError::ParseError(format!("invalid models response: {e}")))?;
            Ok(self.parse_models_response(data))
        };

        match tokio::time::timeout(bound, fetch).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::DiscoveryTimeout(bound)),
        }
    }

    /// Abort one in-flight request. Its pending operation rejects with
    /// `Cancelled`.
    fn cancel_request(&self, request_id: &str) {
        self.core().requests.cancel(request_id);
    }

    /// Abort every in-flight request on this adapter instance.
    fn cancel_all_requests(&self) {
        self.core().requests.cancel_all();
    }
}
