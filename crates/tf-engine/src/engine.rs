//! Sync engine: serialized, debounced reconciliation
//!
//! The rule host has no cross-call isolation, so at most one reconcile
//! pass may be in flight at a time. That single-flight guarantee is an
//! explicit `tokio::sync::Mutex` around every host-mutating path, and a
//! `watch` channel carries the dirty flag: its latest-value semantics
//! collapse any burst of triggers that lands while a pass is in flight
//! into exactly one trailing pass over the newest store state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use tf_core::{channel_names, home_redirect_rules, shorts_redirect_rules, Rule, RuleId};

use crate::host::{RuleHost, UpdateRequest};
use crate::reconcile::{reconcile, ReconcileOutcome, SyncError};
use crate::settings::{apply_defaults, read_blocked_channels};
use crate::store::{keys, SettingsStore, StoreChange};

/// Trailing delay before a pass queued behind an in-flight one runs,
/// absorbing trigger bursts. An idle engine reconciles immediately.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

struct Inner<S, H> {
    store: S,
    host: H,
    /// Single-flight gate for every host mutation. Mandatory, not
    /// advisory: concurrent full-replace calls race non-deterministically.
    gate: Mutex<()>,
    dirty: watch::Sender<u64>,
}

/// Handle to the rule synchronization engine. Cheap to clone.
pub struct SyncEngine<S, H> {
    inner: Arc<Inner<S, H>>,
}

impl<S, H> Clone for SyncEngine<S, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, H> SyncEngine<S, H>
where
    S: SettingsStore,
    H: RuleHost,
{
    pub fn new(store: S, host: H) -> Self {
        let (dirty, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                store,
                host,
                gate: Mutex::new(()),
                dirty,
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    /// Seed setting defaults, run the unconditional startup reconcile,
    /// then watch the store for block-list and gate changes.
    pub async fn start(&self) -> Result<(), SyncError> {
        apply_defaults(&self.inner.store).await?;

        let outcome = self.sync_now().await?;
        log::info!(
            target: "startup",
            "initial reconcile: {} block rules installed",
            outcome.installed
        );

        let engine = self.clone();
        let mut changes = self.inner.store.subscribe();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(StoreChange { key })
                        if key == keys::BLOCKED_WEBSITES
                            || key == keys::ENABLE_WEBSITE_BLOCKING =>
                    {
                        log::debug!(target: "storage", "'{key}' changed, queueing reconcile");
                        engine.trigger();
                    }
                    Ok(_) => {}
                    // Dropped notifications are indistinguishable from a
                    // relevant change; reconcile to be safe.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => engine.trigger(),
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let engine = self.clone();
        let mut dirty = self.inner.dirty.subscribe();
        tokio::spawn(async move {
            while dirty.changed().await.is_ok() {
                dirty.borrow_and_update();
                if let Err(err) = engine.sync_now().await {
                    log::error!(target: "blocks", "reconcile failed: {err}");
                }
                // Triggers that landed during the pass get one trailing
                // pass after a short delay, folding any further burst
                // into the same fresh store read.
                if dirty.has_changed().unwrap_or(false) {
                    tokio::time::sleep(DEBOUNCE).await;
                }
            }
        });

        Ok(())
    }

    /// Queue a reconcile. Coalesces with any already-queued trigger.
    pub fn trigger(&self) {
        self.inner.dirty.send_modify(|generation| *generation += 1);
    }

    /// Run one reconcile pass now, behind the single-flight gate.
    pub async fn sync_now(&self) -> Result<ReconcileOutcome, SyncError> {
        let _guard = self.inner.gate.lock().await;
        reconcile(&self.inner.store, &self.inner.host).await
    }

    /// Install or remove the built-in home-feed redirect group.
    pub async fn set_home_redirects(&self, enabled: bool) -> Result<(), SyncError> {
        self.set_builtin_group(home_redirect_rules(), enabled).await
    }

    /// Install or remove the built-in shorts redirect group.
    pub async fn set_shorts_redirects(&self, enabled: bool) -> Result<(), SyncError> {
        self.set_builtin_group(shorts_redirect_rules(), enabled).await
    }

    /// Replace one built-in rule group behind the same gate as block
    /// reconciles; built-in and block updates share the host table.
    async fn set_builtin_group(&self, rules: Vec<Rule>, enabled: bool) -> Result<(), SyncError> {
        let _guard = self.inner.gate.lock().await;
        let remove_rule_ids: Vec<RuleId> = rules.iter().map(|rule| rule.id).collect();
        let add_rules = if enabled { rules } else { Vec::new() };
        self.inner
            .host
            .update_rules(UpdateRequest {
                add_rules,
                remove_rule_ids,
            })
            .await?;
        Ok(())
    }

    /// Read-only export for the page-side channel blocker.
    pub async fn blocked_channel_names(&self) -> Result<Vec<String>, SyncError> {
        let channels = read_blocked_channels(&self.inner.store).await?;
        Ok(channel_names(&channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::store::MemoryStore;
    use serde_json::json;
    use tf_core::is_block_rule_id;

    fn site_list(urls: &[&str]) -> serde_json::Value {
        json!(urls
            .iter()
            .enumerate()
            .map(|(i, url)| json!({"url": url, "addedAt": i as u64}))
            .collect::<Vec<_>>())
    }

    async fn engine_with(
        urls: &[&str],
        latency: Duration,
    ) -> SyncEngine<MemoryStore, MemoryHost> {
        let store = MemoryStore::new();
        store
            .set_value(keys::BLOCKED_WEBSITES, site_list(urls))
            .await
            .unwrap();
        SyncEngine::new(store, MemoryHost::with_latency(latency))
    }

    #[tokio::test(start_paused = true)]
    async fn startup_reconciles_unconditionally() {
        let engine = engine_with(&["foo.com"], Duration::ZERO).await;
        engine.start().await.unwrap();

        let ids: Vec<_> = engine.host().rules_sorted().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1000, 1001]);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_while_in_flight_coalesces_into_one_trailing_pass() {
        let engine = engine_with(&["seed.com"], Duration::from_millis(50)).await;
        engine.start().await.unwrap();
        assert_eq!(engine.host().update_calls(), 1);

        // First edit; its pass starts immediately and is held in flight
        // by the host latency.
        engine
            .store()
            .set_value(keys::BLOCKED_WEBSITES, site_list(&["a.com"]))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Five rapid edits land while that pass awaits the host.
        for url in ["b.com", "c.com", "d.com", "e.com", "f.com"] {
            engine
                .store()
                .set_value(keys::BLOCKED_WEBSITES, site_list(&[url]))
                .await
                .unwrap();
        }

        tokio::time::sleep(Duration::from_secs(2)).await;

        // Startup + in-flight pass + exactly one trailing pass.
        assert_eq!(engine.host().update_calls(), 3);
        assert_eq!(engine.host().overlapping_updates(), 0);

        // The trailing pass used the last snapshot, not an intermediate one.
        let rules = engine.host().rules_sorted();
        assert_eq!(rules.len(), 2);
        assert!(rules[0]
            .condition
            .regex_filter
            .as_deref()
            .unwrap()
            .contains("f\\.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_trigger_reconciles_without_trailing_delay() {
        let engine = engine_with(&["foo.com"], Duration::ZERO).await;
        engine.start().await.unwrap();
        assert_eq!(engine.host().update_calls(), 1);

        engine
            .store()
            .set_value(keys::BLOCKED_WEBSITES, site_list(&["bar.com"]))
            .await
            .unwrap();

        // Well under the trailing delay: an idle engine runs right away.
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(engine.host().update_calls(), 2);
        assert!(engine.host().rules_sorted()[0]
            .condition
            .regex_filter
            .as_deref()
            .unwrap()
            .contains("bar\\.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn gate_toggle_events_queue_a_reconcile() {
        let engine = engine_with(&["foo.com"], Duration::ZERO).await;
        engine.start().await.unwrap();

        engine
            .store()
            .set_value(keys::ENABLE_WEBSITE_BLOCKING, json!(false))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(engine.host().rules_sorted().is_empty());

        engine
            .store()
            .set_value(keys::ENABLE_WEBSITE_BLOCKING, json!(true))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(engine.host().rules_sorted().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn diagnostics_writes_do_not_retrigger_reconciles() {
        let engine = engine_with(&["foo.com"], Duration::ZERO).await;
        engine.start().await.unwrap();
        let updates = engine.host().update_calls();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(engine.host().update_calls(), updates);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_sync_now_calls_never_overlap() {
        let engine = engine_with(&["foo.com"], Duration::from_millis(30)).await;

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let engine = engine.clone();
            tasks.push(tokio::spawn(async move { engine.sync_now().await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(engine.host().overlapping_updates(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn builtin_groups_toggle_without_touching_the_block_band() {
        let engine = engine_with(&["foo.com"], Duration::ZERO).await;
        engine.start().await.unwrap();

        engine.set_home_redirects(true).await.unwrap();
        engine.set_shorts_redirects(true).await.unwrap();
        let ids: Vec<_> = engine.host().rules_sorted().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 1000, 1001]);

        engine.set_home_redirects(false).await.unwrap();
        let ids: Vec<_> = engine.host().rules_sorted().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 1000, 1001]);
        assert!(ids.iter().filter(|&&id| is_block_rule_id(id)).count() == 2);
    }

    #[tokio::test]
    async fn channel_export_reads_the_store() {
        let engine = engine_with(&[], Duration::ZERO).await;
        engine
            .store()
            .set_value(
                keys::BLOCKED_CHANNELS,
                json!([{"name": "SomeChannel", "addedAt": 1}, {"name": " ", "addedAt": 2}]),
            )
            .await
            .unwrap();

        assert_eq!(
            engine.blocked_channel_names().await.unwrap(),
            vec!["SomeChannel".to_string()]
        );
    }
}
