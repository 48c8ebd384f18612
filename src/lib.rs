//! # unichat
//!
//! A unified chat-completion interface over incompatible LLM vendor HTTP
//! APIs. Callers issue one request shape and receive one normalized
//! response/stream shape; adapters handle each vendor's request schema,
//! authentication headers, streaming wire format, and capability set.
//!
//! ## Key pieces
//!
//! - **[`LlmClient`]**: the façade - validates options against the active
//!   adapter's capabilities, then dispatches chat/stream/ping/discovery.
//! - **[`ProviderAdapter`]**: the per-vendor contract. Eight built-ins
//!   (OpenAI, Anthropic, Gemini, Ollama, OpenRouter, Grok, llama-server,
//!   custom endpoints) plus runtime registration for more.
//! - **Streaming engine**: normalizes three wire families - SSE `data:`
//!   lines, newline-delimited JSON, and Gemini's undelimited JSON stream
//!   (bracket-depth scanning) - into one incremental [`StreamChunk`] model
//!   with correct accumulation, cancellation, and error semantics.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use unichat::{LlmClient, Message, MemoryConfigStore, ProviderConfig, RequestOptions};
//!
//! # async fn run() -> Result<(), unichat::LlmError> {
//! let store = MemoryConfigStore::new();
//! store.save_config(
//!     ProviderConfig::new("ollama", "http://localhost:11434")
//!         .with_id("local")
//!         .with_model("llama3.2"),
//! );
//! store.set_active(Some("local"));
//!
//! let mut client = LlmClient::new(Arc::new(store));
//! let reply = client
//!     .stream(
//!         &[Message::user("Say hello.")],
//!         RequestOptions::default(),
//!         |chunk| print!("{}", chunk.content),
//!     )
//!     .await?;
//! println!("\n--\n{reply}");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod providers;
pub mod registry;
pub mod store;
pub mod types;
pub mod utils;

pub use client::{LlmClient, UsageStats};
pub use error::LlmError;
pub use providers::{AdapterCore, ChunkHandler, DEFAULT_DISCOVERY_TIMEOUT, ProviderAdapter};
pub use registry::{
    ProviderDefaults, ProviderKind, create_provider, create_provider_flexible, provider_defaults,
    register_provider,
};
pub use store::{ConfigStore, MemoryConfigStore};
pub use types::{
    Capability, CapabilitySet, ChatResponse, ContentPart, FinishReason, ImageInput, Message,
    MessageContent, ProviderConfig, RequestOptions, Role, StreamChunk, StreamDelta, TokenUsage,
};
