//! OpenRouter adapter
//!
//! Chat-completions dialect fronting many upstream models. Reasoning is
//! toggled with a `reasoning` flag plus optional `reasoning_effort`, and
//! configured deployments can attribute traffic with `HTTP-Referer` /
//! `X-Title` headers. The model catalog is filtered by architecture
//! modality, since OpenRouter lists embedding and audio models alongside
//! chat ones.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::LlmError;
use crate::types::{
    Capability, CapabilitySet, ChatResponse, Message, ProviderConfig, RequestOptions, StreamDelta,
};

use super::openai_compat;
use super::{AdapterCore, ProviderAdapter};

pub struct OpenRouterAdapter {
    core: AdapterCore,
}

impl OpenRouterAdapter {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            core: AdapterCore::new(config),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenRouterAdapter {
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
        capabilities.insert(Capability::Tools);
        if model.contains("o1") || model.contains("thinking") || model.contains("reasoning") {
            capabilities.insert(Capability::Thinking);
        }
        if model.contains("vision")
            || model.contains("gpt-4")
            || model.contains("claude")
            || model.contains("gemini")
        {
            capabilities.insert(Capability::Vision);
        }
        Ok(capabilities)
    }

    fn prepare_request(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<Value, LlmError> {
        let model = super::resolve_model(options, &self.core.config, "");
        let images = options
            .images
            .as_deref()
            .filter(|_| self.has_capability(Capability::Vision));
        let rendered = openai_compat::render_messages(messages, images);
        let mut body = openai_compat::chat_body(model, rendered, options);

        if options.enable_thinking.unwrap_or(false) && self.has_capability(Capability::Thinking) {
            openai_compat::insert(&mut body, "reasoning", json!(true));
            if let Some(effort) = &options.reasoning_effort {
                openai_compat::insert(&mut body, "reasoning_effort", json!(effort));
            }
        }

        if let Some(tools) = &options.tools
            && self.has_capability(Capability::Tools)
        {
            openai_compat::insert(&mut body, "tools", json!(tools));
            if let Some(choice) = &options.tool_choice {
                openai_compat::insert(&mut body, "tool_choice", choice.clone());
            }
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

    fn extra_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(site_url) = &self.core.config.site_url {
            headers.push(("http-referer", site_url.clone()));
        }
        if let Some(site_name) = &self.core.config.site_name {
            headers.push(("x-title", site_name.clone()));
        }
        headers
    }

    fn models_endpoint(&self) -> String {
        format!("{}/v1/models", self.core.config.base_url)
    }

    fn parse_models_response(&self, data: Value) -> Vec<String> {
        let mut models: Vec<String> = openai_compat::model_entries(data)
            .into_iter()
            .filter(|entry| {
                entry
                    .architecture
                    .as_ref()
                    .and_then(|architecture| architecture.modality.as_deref())
                    .is_some_and(|modality| {
                        modality.contains("text->text") || modality.contains("text+image->text")
                    })
            })
            .map(|entry| entry.id)
            .collect();
        models.sort();
        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn initialized(model: &str) -> OpenRouterAdapter {
        let mut adapter = OpenRouterAdapter::new(
            ProviderConfig::new("openrouter", "https://openrouter.ai/api")
                .with_api_key("or-key")
                .with_model(model),
        );
        adapter.initialize().await.unwrap();
        adapter
    }

    #[tokio::test]
    async fn reasoning_fields_require_thinking_capability() {
        let options = RequestOptions {
            enable_thinking: Some(true),
            reasoning_effort: Some("high".into()),
            ..RequestOptions::default()
        };

        let capable = initialized("openai/o1-mini").await;
        let body = capable
            .prepare_request(&[Message::user("hi")], &options)
            .unwrap();
        assert_eq!(body["reasoning"], json!(true));
        assert_eq!(body["reasoning_effort"], json!("high"));

        let plain = initialized("meta-llama/llama-3-8b").await;
        let body = plain
            .prepare_request(&[Message::user("hi")], &options)
            .unwrap();
        assert!(body.get("reasoning").is_none());
    }

    #[tokio::test]
    async fn tool_choice_rides_along_with_tools() {
        let adapter = initialized("anthropic/claude-3-opus").await;
        let options = RequestOptions {
            tools: Some(vec![json!({"type": "function", "function": {"name": "f"}})]),
            tool_choice: Some(json!("auto")),
            ..RequestOptions::default()
        };
        let body = adapter
            .prepare_request(&[Message::user("hi")], &options)
            .unwrap();
        assert!(body.get("tools").is_some());
        assert_eq!(body["tool_choice"], json!("auto"));
    }

    #[test]
    fn attribution_headers_come_from_config() {
        let mut config = ProviderConfig::new("openrouter", "https://openrouter.ai/api");
        config.site_url = Some("https://myapp.example".into());
        config.site_name = Some("MyApp".into());
        let adapter = OpenRouterAdapter::new(config);
        let headers = adapter.extra_headers();
        assert!(headers.contains(&("http-referer", "https://myapp.example".to_string())));
        assert!(headers.contains(&("x-title", "MyApp".to_string())));
    }

    #[test]
    fn model_listing_filters_by_modality() {
        let adapter = OpenRouterAdapter::new(ProviderConfig::new(
            "openrouter",
            "https://openrouter.ai/api",
        ));
        let models = adapter.parse_models_response(json!({
            "data": [
                {"id": "anthropic/claude-3-opus", "architecture": {"modality": "text+image->text"}},
                {"id": "openai/whisper", "architecture": {"modality": "audio->text"}},
                {"id": "meta-llama/llama-3-8b", "architecture": {"modality": "text->text"}},
                {"id": "mystery/model"}
            ]
        }));
        assert_eq!(models, vec!["anthropic/claude-3-opus", "meta-llama/llama-3-8b"]);
    }
}
