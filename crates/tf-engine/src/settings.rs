//! Typed settings access and mode presets
//!
//! The settings gate lives here: `website_blocking_enabled` is read fresh
//! from the store inside every reconcile pass, never cached, so the gate
//! and the block list stay two independent reactive inputs.

use serde_json::{json, Value};

use tf_core::{BlockedChannel, BlockedWebsite};

use crate::store::{keys, SettingsStore, StoreError};

/// Flat view of the toggles the extension persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub extension_on: bool,
    pub redirect_home: bool,
    pub hide_shorts: bool,
    pub minimal_homepage: bool,
    pub enable_website_blocking: bool,
    pub block_channels: bool,
    pub hide_sidebar_recommendations: bool,
}

/// User-facing mode presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Off,
    Minimal,
    HighFocus,
}

impl Mode {
    pub fn preset(self) -> Settings {
        match self {
            Mode::Off => Settings {
                extension_on: false,
                redirect_home: false,
                hide_shorts: false,
                minimal_homepage: false,
                enable_website_blocking: false,
                block_channels: false,
                hide_sidebar_recommendations: false,
            },
            Mode::Minimal => Settings {
                extension_on: true,
                redirect_home: false,
                hide_shorts: true,
                minimal_homepage: true,
                enable_website_blocking: true,
                block_channels: true,
                hide_sidebar_recommendations: false,
            },
            Mode::HighFocus => Settings {
                extension_on: true,
                redirect_home: false,
                hide_shorts: true,
                minimal_homepage: true,
                enable_website_blocking: true,
                block_channels: true,
                hide_sidebar_recommendations: true,
            },
        }
    }
}

impl Settings {
    fn entries(&self) -> [(&'static str, bool); 7] {
        [
            (keys::EXTENSION_ON, self.extension_on),
            (keys::REDIRECT_HOME, self.redirect_home),
            (keys::HIDE_SHORTS, self.hide_shorts),
            (keys::MINIMAL_HOMEPAGE, self.minimal_homepage),
            (keys::ENABLE_WEBSITE_BLOCKING, self.enable_website_blocking),
            (keys::BLOCK_CHANNELS, self.block_channels),
            (
                keys::HIDE_SIDEBAR_RECOMMENDATIONS,
                self.hide_sidebar_recommendations,
            ),
        ]
    }
}

/// Seed missing settings with the minimal preset and drop legacy keys.
/// Existing values always win; runs once at engine startup.
pub async fn apply_defaults<S: SettingsStore>(store: &S) -> Result<(), StoreError> {
    store
        .remove_value(keys::LEGACY_ENABLE_CHANNEL_BLOCKING)
        .await?;

    for (key, default) in Mode::Minimal.preset().entries() {
        if store.get_value(key).await?.is_none() {
            store.set_value(key, json!(default)).await?;
        }
    }
    Ok(())
}

/// Settings gate: website blocking is on unless the flag is explicitly
/// `false`, mirroring an absent key being treated as enabled.
pub async fn website_blocking_enabled<S: SettingsStore>(store: &S) -> Result<bool, StoreError> {
    Ok(store.get_value(keys::ENABLE_WEBSITE_BLOCKING).await? != Some(Value::Bool(false)))
}

/// Read the blocked-website list. A malformed element is skipped with a
/// warning rather than failing the whole list.
pub async fn read_blocked_websites<S: SettingsStore>(
    store: &S,
) -> Result<Vec<BlockedWebsite>, StoreError> {
    read_entry_list(store, keys::BLOCKED_WEBSITES).await
}

/// Read the blocked-channel list, same skip semantics.
pub async fn read_blocked_channels<S: SettingsStore>(
    store: &S,
) -> Result<Vec<BlockedChannel>, StoreError> {
    read_entry_list(store, keys::BLOCKED_CHANNELS).await
}

async fn read_entry_list<S, T>(store: &S, key: &str) -> Result<Vec<T>, StoreError>
where
    S: SettingsStore,
    T: serde::de::DeserializeOwned,
{
    let raw = match store.get_value(key).await? {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(StoreError::Malformed {
                key: key.to_string(),
                source: serde::de::Error::custom(format!("expected an array, got {other}")),
            })
        }
        None => return Ok(Vec::new()),
    };

    let mut entries = Vec::with_capacity(raw.len());
    for item in raw {
        match serde_json::from_value(item) {
            Ok(entry) => entries.push(entry),
            Err(err) => log::warn!(target: "store", "skipping malformed '{key}' entry: {err}"),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn defaults_fill_gaps_but_keep_existing_values() {
        let store = MemoryStore::new();
        store
            .set_value(keys::ENABLE_WEBSITE_BLOCKING, json!(false))
            .await
            .unwrap();
        store
            .set_value(keys::LEGACY_ENABLE_CHANNEL_BLOCKING, json!(true))
            .await
            .unwrap();

        apply_defaults(&store).await.unwrap();

        assert_eq!(
            store.get_value(keys::ENABLE_WEBSITE_BLOCKING).await.unwrap(),
            Some(json!(false))
        );
        assert_eq!(
            store.get_value(keys::HIDE_SHORTS).await.unwrap(),
            Some(json!(true))
        );
        assert_eq!(
            store
                .get_value(keys::LEGACY_ENABLE_CHANNEL_BLOCKING)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn blocking_defaults_to_enabled_when_key_is_absent() {
        let store = MemoryStore::new();
        assert!(website_blocking_enabled(&store).await.unwrap());

        store
            .set_value(keys::ENABLE_WEBSITE_BLOCKING, json!(false))
            .await
            .unwrap();
        assert!(!website_blocking_enabled(&store).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_list_entries_are_skipped() {
        let store = MemoryStore::new();
        store
            .set_value(
                keys::BLOCKED_WEBSITES,
                json!([
                    {"url": "foo.com", "addedAt": 1},
                    {"nope": true},
                    {"url": "bar.com", "addedAt": 2},
                ]),
            )
            .await
            .unwrap();

        let entries = read_blocked_websites(&store).await.unwrap();
        let urls: Vec<_> = entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["foo.com", "bar.com"]);
    }

    #[tokio::test]
    async fn non_array_list_value_is_a_store_error() {
        let store = MemoryStore::new();
        store
            .set_value(keys::BLOCKED_WEBSITES, json!("oops"))
            .await
            .unwrap();
        assert!(read_blocked_websites(&store).await.is_err());
    }
}
