//! Desired-rule-set synthesis
//!
//! Builds the full set of rules the host *should* have installed for a
//! given block list, plus the built-in redirect rule groups. Synthesis is
//! deterministic: the same ordered entry list always produces the same
//! rules with the same IDs, which keeps reconcile diffs minimal.

use crate::ids::{IdAllocator, HOME_REDIRECT_IDS, SHORTS_REDIRECT_ID};
use crate::pattern::{channel_key, website_pattern};
use crate::types::{BlockedChannel, BlockedWebsite, ResourceTypeSet, Rule};

/// Where blocked navigations are sent.
pub const BLOCK_REDIRECT_TARGET: &str = "https://www.google.com/";

/// Where built-in home/shorts redirects are sent.
pub const SUBSCRIPTIONS_FEED: &str = "https://www.youtube.com/feed/subscriptions";

/// Priority of the main-frame tier of a block rule. Must stay above the
/// catch-all tier so the top-level navigation redirect wins.
pub const NAVIGATION_PRIORITY: u32 = 2;

/// Priority of the subresource catch-all tier.
pub const SUBRESOURCE_PRIORITY: u32 = 1;

/// Build the user-block band rules for an ordered website list.
///
/// Each usable entry yields two rules sharing one pattern: a high-priority
/// main-frame redirect and a lower-priority catch-all over the remaining
/// resource types. Entries whose key normalizes to nothing are skipped.
/// Entries staged for deletion stay enforced until the deletion commits.
pub fn build_block_rules(websites: &[BlockedWebsite]) -> Vec<Rule> {
    let mut alloc = IdAllocator::new();
    let mut rules = Vec::with_capacity(websites.len() * 2);

    for entry in websites {
        let pattern = match website_pattern(&entry.url) {
            Some(pattern) => pattern,
            None => {
                log::debug!(target: "blocks", "skipping unusable block entry {:?}", entry.url);
                continue;
            }
        };

        rules.push(Rule::regex_redirect(
            alloc.allocate(),
            NAVIGATION_PRIORITY,
            pattern.clone(),
            ResourceTypeSet::NAVIGATION,
            BLOCK_REDIRECT_TARGET,
        ));
        rules.push(Rule::regex_redirect(
            alloc.allocate(),
            SUBRESOURCE_PRIORITY,
            pattern,
            ResourceTypeSet::SUBRESOURCES,
            BLOCK_REDIRECT_TARGET,
        ));
    }

    rules
}

/// Normalized channel names for the page-side blocker. Read-only export,
/// never installed in the rule host.
pub fn channel_names(channels: &[BlockedChannel]) -> Vec<String> {
    channels
        .iter()
        .filter_map(|entry| channel_key(&entry.name))
        .collect()
}

/// Built-in home-feed redirect rules: trending page and the bare homepage
/// are sent to the subscriptions feed.
pub fn home_redirect_rules() -> Vec<Rule> {
    vec![
        Rule::url_redirect(
            HOME_REDIRECT_IDS[0],
            1,
            "youtube.com/feed/trending",
            ResourceTypeSet::NAVIGATION,
            SUBSCRIPTIONS_FEED,
        ),
        Rule::url_redirect(
            HOME_REDIRECT_IDS[1],
            1,
            "youtube.com/shorts",
            ResourceTypeSet::NAVIGATION,
            SUBSCRIPTIONS_FEED,
        ),
        Rule::regex_redirect(
            HOME_REDIRECT_IDS[2],
            1,
            "^https://(www\\.)?youtube\\.com/?$",
            ResourceTypeSet::NAVIGATION,
            SUBSCRIPTIONS_FEED,
        ),
    ]
}

/// Built-in shorts redirect rule.
pub fn shorts_redirect_rules() -> Vec<Rule> {
    vec![Rule::url_redirect(
        SHORTS_REDIRECT_ID,
        1,
        "youtube.com/shorts",
        ResourceTypeSet::NAVIGATION,
        SUBSCRIPTIONS_FEED,
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{is_block_rule_id, BLOCK_RULE_BASE_ID};
    use std::collections::HashSet;

    fn site(url: &str) -> BlockedWebsite {
        BlockedWebsite::new(url, 1_700_000_000_000)
    }

    #[test]
    fn single_entry_yields_two_tiers_at_the_band_base() {
        let rules = build_block_rules(&[site("foo.com")]);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].id, BLOCK_RULE_BASE_ID);
        assert_eq!(rules[1].id, BLOCK_RULE_BASE_ID + 1);
        assert!(rules[0].priority > rules[1].priority);
        assert_eq!(
            rules[0].condition.regex_filter,
            rules[1].condition.regex_filter
        );
        assert_eq!(
            rules[0].condition.resource_types,
            ResourceTypeSet::NAVIGATION.to_resource_types()
        );
        assert_eq!(
            rules[1].condition.resource_types,
            ResourceTypeSet::SUBRESOURCES.to_resource_types()
        );
    }

    #[test]
    fn unusable_entries_are_skipped_without_gaps_in_rule_count() {
        let rules = build_block_rules(&[site("foo.com"), site("   "), site("bar.com")]);
        assert_eq!(rules.len(), 4);
        let ids: Vec<_> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1000, 1001, 1002, 1003]);
    }

    #[test]
    fn ids_are_unique_and_stay_in_the_block_band() {
        let sites: Vec<_> = (0..50).map(|i| site(&format!("site{i}.com"))).collect();
        let rules = build_block_rules(&sites);
        assert_eq!(rules.len(), 100);
        let ids: HashSet<_> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 100);
        assert!(ids.iter().all(|&id| is_block_rule_id(id)));
    }

    #[test]
    fn synthesis_is_a_pure_function_of_the_entry_list() {
        let sites = vec![site("a.com"), site("b.com/path")];
        assert_eq!(build_block_rules(&sites), build_block_rules(&sites));
    }

    #[test]
    fn pending_delete_entries_stay_enforced() {
        let mut entry = site("foo.com");
        entry.pending_delete = true;
        assert_eq!(build_block_rules(&[entry]).len(), 2);
    }

    #[test]
    fn channel_names_skip_blank_entries() {
        let channels = vec![
            BlockedChannel::new("SomeChannel", 1),
            BlockedChannel::new("   ", 2),
        ];
        assert_eq!(channel_names(&channels), vec!["SomeChannel".to_string()]);
    }

    #[test]
    fn builtin_rules_stay_below_the_block_band() {
        for rule in home_redirect_rules().iter().chain(shorts_redirect_rules().iter()) {
            assert!(!is_block_rule_id(rule.id));
        }
    }
}
