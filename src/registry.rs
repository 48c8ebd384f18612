//! Provider factory and registration
//!
//! The eight built-in vendors form a closed set dispatched by identifier.
//! Open extension happens through explicit runtime registration: a registered
//! constructor under an existing identifier (built-in or not) replaces the
//! prior mapping, and unrecognized identifiers fail construction with a
//! descriptive error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::error::LlmError;
use crate::providers::{
    AnthropicAdapter, CustomAdapter, GeminiAdapter, GrokAdapter, LlamaServerAdapter,
    OllamaAdapter, OpenAiAdapter, OpenRouterAdapter, ProviderAdapter,
};
use crate::types::ProviderConfig;

/// The built-in provider identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Grok,
    Gemini,
    Ollama,
    LlamaServer,
    OpenRouter,
    Custom,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 8] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Grok,
        ProviderKind::Gemini,
        ProviderKind::Ollama,
        ProviderKind::LlamaServer,
        ProviderKind::OpenRouter,
        ProviderKind::Custom,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Grok => "grok",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Ollama => "ollama",
            ProviderKind::LlamaServer => "llama-server",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Custom => "custom",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

/// Connection defaults shown when setting up a provider of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDefaults {
    pub name: &'static str,
    pub base_url: &'static str,
    pub requires_api_key: bool,
}

pub fn provider_defaults(kind: ProviderKind) -> ProviderDefaults {
    match kind {
        ProviderKind::OpenAi => ProviderDefaults {
            name: "OpenAI",
            base_url: "https://api.openai.com",
            requires_api_key: true,
        },
        ProviderKind::Anthropic => ProviderDefaults {
            name: "Anthropic",
            base_url: "https://api.anthropic.com",
            requires_api_key: true,
        },
        ProviderKind::Grok => ProviderDefaults {
            name: "Grok",
            base_url: "https://api.x.ai",
            requires_api_key: true,
        },
        ProviderKind::Gemini => ProviderDefaults {
            name: "Google Gemini",
            base_url: "https://generativelanguage.googleapis.com",
            requires_api_key: true,
        },
        ProviderKind::Ollama => ProviderDefaults {
            name: "Ollama (Native)",
            base_url: "http://localhost:11434",
            requires_api_key: false,
        },
        ProviderKind::LlamaServer => ProviderDefaults {
            name: "Local Llama Server",
            base_url: "http://localhost:8080",
            requires_api_key: false,
        },
        ProviderKind::OpenRouter => ProviderDefaults {
            name: "OpenRouter",
            base_url: "https://openrouter.ai/api",
            requires_api_key: true,
        },
        ProviderKind::Custom => ProviderDefaults {
            name: "Custom OpenAI Compatible",
            base_url: "",
            requires_api_key: false,
        },
    }
}

/// Constructor stored for a runtime-registered provider identifier.
pub type ProviderConstructor =
    Arc<dyn Fn(ProviderConfig) -> Box<dyn ProviderAdapter> + Send + Sync>;

fn registered() -> &'static Mutex<HashMap<String, ProviderConstructor>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, ProviderConstructor>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock() -> MutexGuard<'static, HashMap<String, ProviderConstructor>> {
    registered().lock().unwrap_or_else(PoisonError::into_inner)
}

/// Register (or replace) a constructor for a provider identifier. Reusing a
/// built-in identifier overrides the built-in adapter.
pub fn register_provider<F>(id: impl Into<String>, constructor: F)
where
    F: Fn(ProviderConfig) -> Box<dyn ProviderAdapter> + Send + Sync + 'static,
{
    lock().insert(id.into(), Arc::new(constructor));
}

/// Construct a built-in adapter directly.
pub fn create_provider(kind: ProviderKind, config: ProviderConfig) -> Box<dyn ProviderAdapter> {
    match kind {
        ProviderKind::OpenAi => Box::new(OpenAiAdapter::new(config)),
        ProviderKind::Anthropic => Box::new(AnthropicAdapter::new(config)),
        ProviderKind::Grok => Box::new(GrokAdapter::new(config)),
        ProviderKind::Gemini => Box::new(GeminiAdapter::new(config)),
        ProviderKind::Ollama => Box::new(OllamaAdapter::new(config)),
        ProviderKind::LlamaServer => Box::new(LlamaServerAdapter::new(config)),
        ProviderKind::OpenRouter => Box::new(OpenRouterAdapter::new(config)),
        ProviderKind::Custom => Box::new(CustomAdapter::new(config)),
    }
}

/// Construct an adapter by identifier: runtime registrations first, then the
/// built-in set.
pub fn create_provider_flexible(
    id: &str,
    config: ProviderConfig,
) -> Result<Box<dyn ProviderAdapter>, LlmError> {
    let custom = lock().get(id).cloned();
    if let Some(constructor) = custom {
        return Ok(constructor(config));
    }
    ProviderKind::from_id(id)
        .map(|kind| create_provider(kind, config))
        .ok_or_else(|| LlmError::UnknownProvider(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_ids_round_trip() {
        for kind in ProviderKind::ALL {
            assert_eq!(ProviderKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(ProviderKind::from_id("nope"), None);
    }

    #[test]
    fn unknown_identifier_names_itself_in_the_error() {
        let error = create_provider_flexible("definitely-not-registered", ProviderConfig::default())
            .err()
            .unwrap();
        match error {
            LlmError::UnknownProvider(id) => assert_eq!(id, "definitely-not-registered"),
            other => panic!("expected UnknownProvider, got {other:?}"),
        }
    }

    #[test]
    fn builtin_identifiers_construct_without_registration() {
        let config = ProviderConfig::new("ollama", "http://localhost:11434");
        let adapter = create_provider_flexible("ollama", config).unwrap();
        assert_eq!(adapter.api_path(), "/api/chat");
    }

    #[test]
    fn registration_and_override_take_effect() {
        register_provider("registry-test-x", |config| {
            Box::new(CustomAdapter::new(config))
        });
        let adapter = create_provider_flexible(
            "registry-test-x",
            ProviderConfig::new("registry-test-x", "http://one"),
        )
        .unwrap();
        assert_eq!(adapter.api_path(), "/v1/chat/completions");

        // Re-registering the same identifier replaces the mapping.
        register_provider("registry-test-x", |config| {
            Box::new(OllamaAdapter::new(config))
        });
        let replaced = create_provider_flexible(
            "registry-test-x",
            ProviderConfig::new("registry-test-x", "http://two"),
        )
        .unwrap();
        assert_eq!(replaced.api_path(), "/api/chat");
    }

    #[test]
    fn defaults_table_matches_vendor_endpoints() {
        assert_eq!(
            provider_defaults(ProviderKind::Ollama).base_url,
            "http://localhost:11434"
        );
        assert!(!provider_defaults(ProviderKind::Ollama).requires_api_key);
        assert!(provider_defaults(ProviderKind::Anthropic).requires_api_key);
        assert_eq!(provider_defaults(ProviderKind::Custom).base_url, "");
    }
}
