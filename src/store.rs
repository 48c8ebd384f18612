//! Configuration store boundary
//!
//! Persistence of provider configurations and API keys is an external
//! concern; the core only reads through this narrow trait. An in-memory
//! implementation ships for tests and embedding without a real store.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::ProviderConfig;

/// Read-only view of stored provider configurations.
pub trait ConfigStore: Send + Sync {
    /// The configuration the user currently points at, if any.
    fn active_config(&self) -> Option<ProviderConfig>;

    /// Look up one configuration by its store id.
    fn config(&self, id: &str) -> Option<ProviderConfig>;

    /// Every usable configuration, in store order: non-empty provider and
    /// base URL, not explicitly disabled.
    fn enabled_configs(&self) -> Vec<ProviderConfig>;
}

#[derive(Debug, Default)]
struct MemoryState {
    configs: Vec<ProviderConfig>,
    active_id: Option<String>,
}

/// In-memory [`ConfigStore`].
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    state: Mutex<MemoryState>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a configuration keyed by its `id`.
    pub fn save_config(&self, config: ProviderConfig) {
        let mut state = self.lock();
        if let Some(existing) = state.configs.iter_mut().find(|c| c.id == config.id) {
            *existing = config;
        } else {
            state.configs.push(config);
        }
    }

    /// Mark one configuration as active; `None` clears the selection.
    pub fn set_active(&self, id: Option<&str>) {
        self.lock().active_id = id.map(str::to_string);
    }
}

impl ConfigStore for MemoryConfigStore {
    fn active_config(&self) -> Option<ProviderConfig> {
        let state = self.lock();
        let id = state.active_id.as_deref()?;
        state.configs.iter().find(|c| c.id == id).cloned()
    }

    fn config(&self, id: &str) -> Option<ProviderConfig> {
        self.lock().configs.iter().find(|c| c.id == id).cloned()
    }

    fn enabled_configs(&self) -> Vec<ProviderConfig> {
        self.lock()
            .configs
            .iter()
            .filter(|c| c.enabled && c.is_usable())
            .cloned()
            .collect()
    }
}
