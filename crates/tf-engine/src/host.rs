//! External rule-matching host interface
//!
//! The browser side is `chrome.declarativeNetRequest`: a flat table of
//! declarative rules updated through add/remove batches that the host
//! applies atomically. The host offers no read-modify-write isolation
//! across calls; serializing whole updates is the engine's job.
//!
//! `MemoryHost` reproduces the host's observable contract closely enough
//! to catch the failure modes the reconciler has to survive: duplicate
//! IDs, the dynamic-rule quota, and regex patterns the host rejects.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tf_core::{Rule, RuleId};

/// The host's cap on dynamic rules.
pub const DYNAMIC_RULE_QUOTA: usize = 5000;

/// Error type for rule host operations.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("rule quota exceeded: table would hold {requested} of {limit} rules")]
    QuotaExceeded { requested: usize, limit: usize },
    #[error("duplicate rule id {0}")]
    DuplicateId(RuleId),
    #[error("rule {id} rejected: {reason}")]
    RejectedRule { id: RuleId, reason: String },
    #[error("rule host unavailable: {0}")]
    Unavailable(String),
}

/// One atomic batch update: removals apply before additions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub add_rules: Vec<Rule>,
    pub remove_rule_ids: Vec<RuleId>,
}

/// The external rule-matching host.
pub trait RuleHost: Send + Sync + 'static {
    fn get_installed_rules(&self) -> impl Future<Output = Result<Vec<Rule>, HostError>> + Send;

    /// Apply one batch atomically: on error the table is left untouched.
    fn update_rules(
        &self,
        request: UpdateRequest,
    ) -> impl Future<Output = Result<(), HostError>> + Send;
}

// =============================================================================
// In-memory host
// =============================================================================

/// In-memory `RuleHost` used by tests and the CLI.
pub struct MemoryHost {
    rules: Mutex<HashMap<RuleId, Rule>>,
    fail_next_update: Mutex<Option<HostError>>,
    latency: Duration,
    quota: usize,
    update_calls: AtomicUsize,
    in_flight: AtomicBool,
    overlaps: AtomicUsize,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// Host whose `update_rules` takes `latency` to complete, for
    /// exercising in-flight trigger behavior.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            rules: Mutex::new(HashMap::new()),
            fail_next_update: Mutex::new(None),
            latency,
            quota: DYNAMIC_RULE_QUOTA,
            update_calls: AtomicUsize::new(0),
            in_flight: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
        }
    }

    /// Seed the table, bypassing validation (models leftovers from a
    /// crashed prior run).
    pub fn seed(&self, rules: Vec<Rule>) {
        let mut table = self.rules.lock().unwrap();
        for rule in rules {
            table.insert(rule.id, rule);
        }
    }

    /// Shrink the quota, for exercising `QuotaExceeded`.
    pub fn set_quota(&mut self, quota: usize) {
        self.quota = quota;
    }

    /// Make the next `update_rules` call fail with `error`.
    pub fn fail_next_update(&self, error: HostError) {
        *self.fail_next_update.lock().unwrap() = Some(error);
    }

    /// Installed rules, sorted by ID.
    pub fn rules_sorted(&self) -> Vec<Rule> {
        let table = self.rules.lock().unwrap();
        let mut rules: Vec<_> = table.values().cloned().collect();
        rules.sort_by_key(|rule| rule.id);
        rules
    }

    /// Number of `update_rules` calls observed so far.
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Number of `update_rules` calls that overlapped another in-flight
    /// update. Must stay zero under a correctly serialized engine.
    pub fn overlapping_updates(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    fn validate_and_apply(&self, request: UpdateRequest) -> Result<(), HostError> {
        if let Some(error) = self.fail_next_update.lock().unwrap().take() {
            return Err(error);
        }

        for rule in &request.add_rules {
            if let Some(pattern) = &rule.condition.regex_filter {
                if let Err(err) = regex::Regex::new(pattern) {
                    return Err(HostError::RejectedRule {
                        id: rule.id,
                        reason: format!("invalid regexFilter: {err}"),
                    });
                }
            }
            if rule.condition.regex_filter.is_some() && rule.condition.url_filter.is_some() {
                return Err(HostError::RejectedRule {
                    id: rule.id,
                    reason: "both urlFilter and regexFilter set".to_string(),
                });
            }
        }

        // Stage the whole batch before committing so a failed update
        // leaves the table untouched.
        let mut table = self.rules.lock().unwrap();
        let mut staged = table.clone();
        for id in &request.remove_rule_ids {
            staged.remove(id);
        }
        for rule in request.add_rules {
            if staged.contains_key(&rule.id) {
                return Err(HostError::DuplicateId(rule.id));
            }
            staged.insert(rule.id, rule);
        }
        if staged.len() > self.quota {
            return Err(HostError::QuotaExceeded {
                requested: staged.len(),
                limit: self.quota,
            });
        }

        *table = staged;
        Ok(())
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleHost for MemoryHost {
    async fn get_installed_rules(&self) -> Result<Vec<Rule>, HostError> {
        Ok(self.rules_sorted())
    }

    async fn update_rules(&self, request: UpdateRequest) -> Result<(), HostError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = self.validate_and_apply(request);
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_core::{ResourceTypeSet, Rule};

    fn rule(id: RuleId) -> Rule {
        Rule::regex_redirect(
            id,
            1,
            "^https?://example\\.com",
            ResourceTypeSet::NAVIGATION,
            "https://www.google.com/",
        )
    }

    #[tokio::test]
    async fn batch_applies_removes_before_adds() {
        let host = MemoryHost::new();
        host.seed(vec![rule(1000), rule(1001)]);

        host.update_rules(UpdateRequest {
            add_rules: vec![rule(1000)],
            remove_rule_ids: vec![1000, 1001],
        })
        .await
        .unwrap();

        let ids: Vec<_> = host.rules_sorted().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1000]);
    }

    #[tokio::test]
    async fn duplicate_id_rejects_whole_batch() {
        let host = MemoryHost::new();
        host.seed(vec![rule(1000)]);

        let err = host
            .update_rules(UpdateRequest {
                add_rules: vec![rule(1001), rule(1000)],
                remove_rule_ids: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::DuplicateId(1000)));

        // Nothing committed.
        let ids: Vec<_> = host.rules_sorted().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1000]);
    }

    #[tokio::test]
    async fn invalid_regex_is_rejected() {
        let host = MemoryHost::new();
        let mut bad = rule(1000);
        bad.condition.regex_filter = Some("(".to_string());

        let err = host
            .update_rules(UpdateRequest {
                add_rules: vec![bad],
                remove_rule_ids: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::RejectedRule { id: 1000, .. }));
    }

    #[tokio::test]
    async fn quota_is_enforced() {
        let mut host = MemoryHost::new();
        host.set_quota(1);

        let err = host
            .update_rules(UpdateRequest {
                add_rules: vec![rule(1000), rule(1001)],
                remove_rule_ids: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::QuotaExceeded { .. }));
        assert!(host.rules_sorted().is_empty());
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let host = MemoryHost::new();
        host.fail_next_update(HostError::Unavailable("gone".to_string()));

        let request = UpdateRequest {
            add_rules: vec![rule(1000)],
            remove_rule_ids: vec![],
        };
        assert!(host.update_rules(request.clone()).await.is_err());
        assert!(host.update_rules(request).await.is_ok());
    }
}
