//! Cancellation tracking
//!
//! Every adapter instance owns one `RequestTracker`: a map from request id to
//! a cooperative cancellation token. Entries are added when a request starts
//! and removed when it completes, fails, or is cancelled - an entry never
//! outlives its request. Cancellation only affects requests registered on the
//! owning instance.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

/// Registry of in-flight requests for one adapter instance.
#[derive(Debug, Default)]
pub struct RequestTracker {
    active: Mutex<HashMap<String, CancellationToken>>,
}

impl RequestTracker {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a request and return the token its transport operations must
    /// observe at every suspension point.
    pub fn register(&self, request_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.lock().insert(request_id.to_string(), token.clone());
        token
    }

    /// Remove a completed or failed request.
    pub fn finish(&self, request_id: &str) {
        self.lock().remove(request_id);
    }

    /// Cancel one request and drop it from the registry.
    pub fn cancel(&self, request_id: &str) {
        if let Some(token) = self.lock().remove(request_id) {
            token.cancel();
        }
    }

    /// Cancel every in-flight request on this instance.
    pub fn cancel_all(&self) {
        for (_, token) in self.lock().drain() {
            token.cancel();
        }
    }

    /// Number of requests currently registered.
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }
}

/// Removes a tracker entry when dropped, so early returns and errors cannot
/// leak registrations.
pub struct RequestGuard<'a> {
    tracker: &'a RequestTracker,
    request_id: String,
}

impl<'a> RequestGuard<'a> {
    pub fn new(tracker: &'a RequestTracker, request_id: impl Into<String>) -> Self {
        Self {
            tracker,
            request_id: request_id.into(),
        }
    }
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.tracker.finish(&self.request_id);
    }
}
