//! Client façade
//!
//! Holds the active configuration and provider adapter, validates caller
//! options against the adapter's capability set before every request, and
//! exposes the unified operations: chat, stream, ping, connection testing,
//! and model discovery. Token accounting is advisory only.
//!
//! The façade is a single logical actor: operations take `&mut self` where
//! they can replace the active adapter. `test_connection`'s save/restore of
//! the active adapter is not safe against a concurrent `initialize` on a
//! shared façade; callers that share one instance must serialize those two
//! operations themselves.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::error::LlmError;
use crate::providers::ProviderAdapter;
use crate::registry::create_provider_flexible;
use crate::store::ConfigStore;
use crate::types::{
    Capability, CapabilitySet, ChatResponse, Message, ProviderConfig, RequestOptions, StreamChunk,
};
use crate::utils::generate_request_id;

/// Advisory usage counters accumulated across requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageStats {
    pub total_tokens: u64,
}

/// Unified LLM client over one active provider adapter.
pub struct LlmClient {
    store: Arc<dyn ConfigStore>,
    config: Option<ProviderConfig>,
    provider: Option<Box<dyn ProviderAdapter>>,
    total_tokens: AtomicU64,
}

impl LlmClient {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            config: None,
            provider: None,
            total_tokens: AtomicU64::new(0),
        }
    }

    /// Resolve a configuration (explicit override, or the store's active
    /// entry), construct its adapter, and initialize it. No resolvable
    /// configuration is a fatal configuration error, not retried.
    pub async fn initialize(
        &mut self,
        override_config: Option<ProviderConfig>,
    ) -> Result<(), LlmError> {
        let config = override_config
            .or_else(|| self.store.active_config())
            .ok_or_else(|| LlmError::ConfigurationError("LLM not configured".to_string()))?;

        debug!(provider = %config.provider, "initializing provider adapter");
        let mut provider = create_provider_flexible(&config.provider, config.clone())?;
        provider.initialize().await?;
        self.config = Some(config);
        self.provider = Some(provider);
        Ok(())
    }

    pub async fn ensure_initialized(&mut self) -> Result<(), LlmError> {
        if self.provider.is_none() {
            self.initialize(None).await?;
        }
        Ok(())
    }

    /// Discard the current adapter and configuration and re-initialize from
    /// the store's active configuration. Used when the active configuration
    /// changed underneath a long-lived client.
    pub async fn refresh(&mut self) -> Result<(), LlmError> {
        self.config = None;
        self.provider = None;
        self.initialize(None).await
    }

    pub fn is_initialized(&self) -> bool {
        self.provider.is_some()
    }

    pub fn active_config(&self) -> Option<&ProviderConfig> {
        self.config.as_ref()
    }

    /// The active adapter, mainly useful for capability inspection.
    pub fn provider(&self) -> Option<&dyn ProviderAdapter> {
        self.provider.as_deref()
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.provider
            .as_ref()
            .map(|provider| provider.capabilities())
            .unwrap_or_default()
    }

    /// Downgrade caller intent to what the active adapter supports: thinking
    /// is forced off, images and tools are dropped, unless the corresponding
    /// capability is present. Identity when no adapter is active, and
    /// idempotent. Runs before every request so vendor APIs never receive
    /// parameters they would reject.
    pub fn validate_options(&self, mut options: RequestOptions) -> RequestOptions {
        let Some(provider) = self.provider.as_ref() else {
            return options;
        };
        let wants_thinking = options.enable_thinking.unwrap_or_else(|| {
            self.config
                .as_ref()
                .map(|config| config.enable_thinking)
                .unwrap_or(false)
        });
        options.enable_thinking =
            Some(wants_thinking && provider.has_capability(Capability::Thinking));
        if !provider.has_capability(Capability::Vision) {
            options.images = None;
        }
        if !provider.has_capability(Capability::Tools) {
            options.tools = None;
        }
        options
    }

    fn merge_defaults(&self, mut options: RequestOptions, stream: bool) -> RequestOptions {
        if let Some(config) = &self.config {
            if options.model.is_none() {
                options.model = Some(config.model.clone());
            }
            if options.temperature.is_none() {
                options.temperature = Some(config.temperature);
            }
            if options.max_tokens.is_none() {
                options.max_tokens = Some(config.max_tokens);
            }
        }
        options.stream = stream;
        if options.request_id.is_none() {
            options.request_id = Some(generate_request_id());
        }
        options
    }

    fn active_provider(&self) -> Result<&dyn ProviderAdapter, LlmError> {
        self.provider
            .as_deref()
            .ok_or_else(|| LlmError::ConfigurationError("LLM not configured".to_string()))
    }

    fn record_usage(&self, tokens: u32) {
        if tokens > 0 {
            self.total_tokens
                .fetch_add(u64::from(tokens), Ordering::Relaxed);
        }
    }

    /// Non-streaming request: validate, prepare, execute, normalize.
    pub async fn chat(
        &mut self,
        messages: &[Message],
        options: RequestOptions,
    ) -> Result<ChatResponse, LlmError> {
        self.ensure_initialized().await?;
        let options = self.validate_options(self.merge_defaults(options, false));
        let provider = self.active_provider()?;
        let body = provider.prepare_request(messages, &options)?;
        let raw = provider
            .execute_request(&body, options.request_id.as_deref())
            .await?;
        let response = provider.process_response(raw)?;
        if let Some(usage) = &response.usage {
            self.record_usage(usage.tokens());
        }
        Ok(response)
    }

    /// Streaming request. `on_chunk` receives every normalized chunk in
    /// order, ending in exactly one `done == true` chunk; the accumulated
    /// content is returned. The call rejects before any terminal chunk on
    /// transport, vendor, or cancellation errors.
    pub async fn stream<F>(
        &mut self,
        messages: &[Message],
        options: RequestOptions,
        mut on_chunk: F,
    ) -> Result<String, LlmError>
    where
        F: FnMut(StreamChunk) + Send,
    {
        self.ensure_initialized().await?;
        let options = self.validate_options(self.merge_defaults(options, true));
        let provider = self.active_provider()?;
        let total_tokens = &self.total_tokens;
        let mut handler = |chunk: StreamChunk| {
            if let Some(usage) = &chunk.usage {
                let tokens = usage.tokens();
                if tokens > 0 {
                    total_tokens.fetch_add(u64::from(tokens), Ordering::Relaxed);
                }
            }
            on_chunk(chunk);
        };
        provider
            .stream_request(messages, &options, &mut handler)
            .await
    }

    async fn probe_active(&self) -> Result<String, LlmError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| LlmError::ConfigurationError("LLM not configured".to_string()))?;
        let messages = [
            Message::system("Respond with exactly \"pong\""),
            Message::user("ping"),
        ];
        let options = self.validate_options(RequestOptions {
            model: Some(config.model.clone()),
            temperature: Some(0.1),
            max_tokens: Some(10),
            enable_thinking: Some(false),
            ..RequestOptions::default()
        });
        let provider = self.active_provider()?;
        let body = provider.prepare_request(&messages, &options)?;
        let raw = provider.execute_request(&body, None).await?;
        let response = provider.process_response(raw)?;
        Ok(response.content.trim().to_string())
    }

    /// Minimal round trip against the active configuration.
    pub async fn ping(&mut self) -> Result<String, LlmError> {
        self.ensure_initialized().await?;
        self.probe_active().await
    }

    /// Probe a candidate configuration with a temporary adapter, then restore
    /// the previously active adapter and configuration exactly as they were -
    /// including when initialization or the probe fails.
    ///
    /// Not safe against a concurrent `initialize` on the same instance.
    pub async fn test_connection(
        &mut self,
        candidate: ProviderConfig,
    ) -> Result<String, LlmError> {
        let saved_config = self.config.take();
        let saved_provider = self.provider.take();

        let result = async {
            self.initialize(Some(candidate)).await?;
            self.probe_active().await
        }
        .await;

        self.config = saved_config;
        self.provider = saved_provider;
        result
    }

    /// Model identifiers offered by the active provider.
    pub async fn discover_models(&mut self) -> Result<Vec<String>, LlmError> {
        self.ensure_initialized().await?;
        self.active_provider()?.discover_models(None).await
    }

    /// Model discovery with an explicit time bound.
    pub async fn discover_models_with_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<String>, LlmError> {
        self.ensure_initialized().await?;
        self.active_provider()?.discover_models(Some(timeout)).await
    }

    /// Abort one in-flight request on the active adapter.
    pub fn cancel_request(&self, request_id: &str) {
        if let Some(provider) = &self.provider {
            provider.cancel_request(request_id);
        }
    }

    /// Abort every in-flight request on the active adapter.
    pub fn cancel_all_requests(&self) {
        if let Some(provider) = &self.provider {
            provider.cancel_all_requests();
        }
    }

    pub fn usage_stats(&self) -> UsageStats {
        UsageStats {
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
        }
    }

    /// Look up an enabled configuration by display name (explicit `name`, or
    /// the `"provider (base_url)"` fallback). An ambiguous name is an error
    /// listing the conflicting ids.
    pub fn config_by_name(&self, display_name: &str) -> Result<Option<ProviderConfig>, LlmError> {
        let name = display_name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let mut matches: Vec<ProviderConfig> = self
            .store
            .enabled_configs()
            .into_iter()
            .filter(|config| {
                config.name.as_deref() == Some(name) || config.display_name() == name
            })
            .collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => {
                let ids: Vec<&str> = matches.iter().map(|config| config.id.as_str()).collect();
                Err(LlmError::ConfigurationError(format!(
                    "Multiple provider presets share the name '{name}'. Conflicting ids: {}",
                    ids.join(", ")
                )))
            }
        }
    }
}
