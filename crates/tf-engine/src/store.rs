//! Persistent settings store interface
//!
//! The browser side of this is `chrome.storage.local`: an async key-value
//! store with change notifications. The engine only depends on the
//! `SettingsStore` trait; `MemoryStore` backs tests and the CLI.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::broadcast;

/// Store keys the engine reads and writes.
pub mod keys {
    /// Master switch for website blocking (settings gate input).
    pub const ENABLE_WEBSITE_BLOCKING: &str = "enable_website_blocking";
    /// Ordered list of `BlockedWebsite` entries.
    pub const BLOCKED_WEBSITES: &str = "blockedWebsites";
    /// Ordered list of `BlockedChannel` entries.
    pub const BLOCKED_CHANNELS: &str = "blockedChannels";
    /// Diagnostics snapshot of the rule IDs last installed by the engine.
    /// Observability only, never read back for correctness.
    pub const INSTALLED_BLOCK_RULE_IDS: &str = "installed_block_rule_ids";

    pub const EXTENSION_ON: &str = "extension_on";
    pub const REDIRECT_HOME: &str = "redirect_home";
    pub const HIDE_SHORTS: &str = "hide_shorts";
    pub const MINIMAL_HOMEPAGE: &str = "minimal_homepage";
    pub const BLOCK_CHANNELS: &str = "block_channels";
    pub const HIDE_SIDEBAR_RECOMMENDATIONS: &str = "hide_sidebar_recommendations";

    /// Removed in a previous release; dropped from the store at startup.
    pub const LEGACY_ENABLE_CHANNEL_BLOCKING: &str = "enable_channel_blocking";
}

/// Error type for settings store access.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("malformed value under '{key}': {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

/// A change notification: the key whose value changed.
#[derive(Debug, Clone)]
pub struct StoreChange {
    pub key: String,
}

/// Async key-value settings store with change notifications.
pub trait SettingsStore: Send + Sync + 'static {
    fn get_value(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    fn set_value(
        &self,
        key: &str,
        value: Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn remove_value(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Subscribe to change notifications. Every `set_value` that changes a
    /// value fans out one `StoreChange` to all live receivers.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

// =============================================================================
// In-memory store
// =============================================================================

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// In-memory `SettingsStore` used by tests and the CLI.
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: Mutex::new(HashMap::new()),
            changes,
        }
    }

    /// Seed the store from a JSON object, without emitting change events.
    pub fn from_object(object: serde_json::Map<String, Value>) -> Self {
        let store = Self::new();
        {
            let mut values = store.values.lock().unwrap();
            for (key, value) in object {
                values.insert(key, value);
            }
        }
        store
    }

    /// Export the full store contents as a JSON object.
    pub fn to_object(&self) -> serde_json::Map<String, Value> {
        let values = self.values.lock().unwrap();
        let mut object = serde_json::Map::new();
        for (key, value) in values.iter() {
            object.insert(key.clone(), value.clone());
        }
        object
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for MemoryStore {
    async fn get_value(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let changed = {
            let mut values = self.values.lock().unwrap();
            match values.get(key) {
                Some(existing) if *existing == value => false,
                _ => {
                    values.insert(key.to_string(), value);
                    true
                }
            }
        };
        if changed {
            let _ = self.changes.send(StoreChange {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    async fn remove_value(&self, key: &str) -> Result<(), StoreError> {
        let removed = self.values.lock().unwrap().remove(key).is_some();
        if removed {
            let _ = self.changes.send(StoreChange {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
