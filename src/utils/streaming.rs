//! Streaming normalization support
//!
//! The pieces of the streaming engine that are identical across vendors: the
//! wire-format selector and the accumulator that turns per-event deltas into
//! unified chunks with running totals. The engine loop itself lives in the
//! provider contract (`ProviderAdapter::stream_request`), which drives one of
//! three wire families through a vendor's `extract_stream_delta`.

use crate::types::{StreamChunk, StreamDelta};

/// How a vendor frames incremental payloads on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Server-sent events: `data: ` prefixed lines, `[DONE]` sentinel
    /// (OpenAI-compatible family, Anthropic).
    SseLines,
    /// One JSON object per line, each carrying its own `done` flag (Ollama).
    JsonLines,
    /// Raw JSON streamed without delimiters; object boundaries found by
    /// bracket-depth scanning (Gemini).
    JsonStream,
}

/// Per-stream accumulation state.
///
/// Owns the running `full_content`/`full_thinking` strings for the lifetime
/// of one stream call and builds each outgoing chunk. Chunks are emitted
/// synchronously, in order, and never concurrently.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    content: String,
    thinking: String,
}

impl StreamAccumulator {
    /// Fold one delta into the running totals, hand the resulting chunk to
    /// the caller, and report whether the stream just terminated.
    pub fn emit(
        &mut self,
        delta: StreamDelta,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
    ) -> bool {
        if !delta.content.is_empty() {
            self.content.push_str(&delta.content);
        }
        if !delta.thinking.is_empty() {
            self.thinking.push_str(&delta.thinking);
        }
        let done = delta.done;
        on_chunk(StreamChunk {
            content: delta.content,
            thinking: delta.thinking,
            full_content: self.content.clone(),
            full_thinking: self.thinking.clone(),
            done,
            usage: delta.usage,
            finish_reason: delta.finish_reason,
        });
        done
    }

    /// The accumulated content, returned to the caller when the stream ends.
    pub fn into_content(self) -> String {
        self.content
    }
}
