//! TubeFocus Core Library
//!
//! Pure rule-synthesis core for the TubeFocus extension engine: turns the
//! user's block list into the declarative redirect rules the browser's
//! rule-matching host should have installed. No I/O lives here; the async
//! engine in `tf-engine` drives these functions against the real store and
//! host.
//!
//! # Modules
//!
//! - `types`: wire shapes for rules and block entries
//! - `pattern`: regex synthesis from user-entered block strings
//! - `ids`: rule ID bands and the block-band allocator
//! - `rules`: desired-rule-set building and built-in redirect groups

pub mod ids;
pub mod pattern;
pub mod rules;
pub mod types;

// Re-export commonly used items
pub use ids::{is_block_rule_id, IdAllocator, BLOCK_RULE_BASE_ID};
pub use pattern::{normalize_key, website_pattern};
pub use rules::{build_block_rules, channel_names, home_redirect_rules, shorts_redirect_rules};
pub use types::{
    BlockedChannel, BlockedWebsite, ResourceType, ResourceTypeSet, Rule, RuleAction,
    RuleCondition, RuleId,
};
