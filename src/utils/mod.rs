//! Shared utilities: cancellation tracking, wire-format scanners, and
//! streaming accumulation.

pub mod cancel;
pub mod scan;
pub mod streaming;

/// Generate a request identifier for callers that did not supply one.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
