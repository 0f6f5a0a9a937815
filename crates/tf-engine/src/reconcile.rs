//! Rule table reconciliation
//!
//! One reconcile pass drives the host's block band to match the desired
//! rule set derived from the store. The host is the single source of
//! truth for what is installed: every pass re-reads the live table, never
//! a locally cached ID list, so leftovers from a crashed prior run are
//! swept up too.
//!
//! A pass is full-replace: one atomic update that removes every installed
//! block-band ID and adds every desired rule. Interleaved incremental
//! patches are exactly the partial-state failure mode this avoids. The
//! only shortcut is skipping the update when the live band already equals
//! the desired set.

use serde_json::json;

use tf_core::{build_block_rules, is_block_rule_id, Rule, RuleId};

use crate::host::{HostError, RuleHost, UpdateRequest};
use crate::settings::{read_blocked_websites, website_blocking_enabled};
use crate::store::{keys, SettingsStore, StoreError};

/// Error type for a reconcile pass.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a reconcile pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Settings-gate state the pass ran under.
    pub enabled: bool,
    /// Block-band rules removed from the host.
    pub removed: usize,
    /// Block-band rules installed after the pass.
    pub installed: usize,
    /// Whether the post-update read showed the expected band count.
    /// A mismatch is recoverable; the next pass re-synchronizes.
    pub verified: bool,
}

/// Run one reconcile pass. Callers must serialize passes; see
/// [`crate::engine::SyncEngine`].
pub async fn reconcile<S, H>(store: &S, host: &H) -> Result<ReconcileOutcome, SyncError>
where
    S: SettingsStore,
    H: RuleHost,
{
    let enabled = website_blocking_enabled(store).await?;

    // Live table, not the persisted snapshot: a crashed prior pass may
    // have left rules the snapshot never recorded.
    let mut installed_block: Vec<Rule> = host
        .get_installed_rules()
        .await?
        .into_iter()
        .filter(|rule| is_block_rule_id(rule.id))
        .collect();
    installed_block.sort_by_key(|rule| rule.id);
    let installed_ids: Vec<RuleId> = installed_block.iter().map(|rule| rule.id).collect();

    if !enabled {
        if !installed_ids.is_empty() {
            host.update_rules(UpdateRequest {
                add_rules: Vec::new(),
                remove_rule_ids: installed_ids.clone(),
            })
            .await?;
            log::info!(
                target: "blocks",
                "website blocking disabled, removed {} rules",
                installed_ids.len()
            );
        }
        persist_installed_ids(store, &[]).await?;
        return Ok(ReconcileOutcome {
            enabled: false,
            removed: installed_ids.len(),
            installed: 0,
            verified: true,
        });
    }

    let websites = read_blocked_websites(store).await?;
    let desired = build_block_rules(&websites);
    let desired_ids: Vec<RuleId> = desired.iter().map(|rule| rule.id).collect();

    if installed_block == desired {
        log::debug!(target: "blocks", "rule table already in sync ({} rules)", desired.len());
        persist_installed_ids(store, &desired_ids).await?;
        return Ok(ReconcileOutcome {
            enabled: true,
            removed: 0,
            installed: desired.len(),
            verified: true,
        });
    }

    host.update_rules(UpdateRequest {
        add_rules: desired.clone(),
        remove_rule_ids: installed_ids.clone(),
    })
    .await?;

    let live_count = host
        .get_installed_rules()
        .await?
        .iter()
        .filter(|rule| is_block_rule_id(rule.id))
        .count();
    let verified = live_count == desired.len();
    if !verified {
        log::warn!(
            target: "blocks",
            "verification mismatch: {} block rules live, expected {}",
            live_count,
            desired.len()
        );
    }

    persist_installed_ids(store, &desired_ids).await?;
    log::info!(
        target: "blocks",
        "applied {} block rules (removed {})",
        desired.len(),
        installed_ids.len()
    );

    Ok(ReconcileOutcome {
        enabled: true,
        removed: installed_ids.len(),
        installed: desired.len(),
        verified,
    })
}

/// Write the diagnostics snapshot of installed block-rule IDs.
async fn persist_installed_ids<S: SettingsStore>(
    store: &S,
    ids: &[RuleId],
) -> Result<(), StoreError> {
    store
        .set_value(keys::INSTALLED_BLOCK_RULE_IDS, json!(ids))
        .await
}
