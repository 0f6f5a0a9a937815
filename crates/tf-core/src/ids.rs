//! Rule ID bands and allocation
//!
//! The host's rule table is one flat integer ID space. We carve it into
//! two reserved bands: a handful of fixed low IDs for built-in redirect
//! rules, and everything from `BLOCK_RULE_BASE_ID` upward for rules derived
//! from the user's block list. Installed IDs at or above the base are owned
//! exclusively by the reconciler and may be removed wholesale.

use crate::types::RuleId;

/// First ID of the user-block band. Everything below is built-in territory.
pub const BLOCK_RULE_BASE_ID: RuleId = 1000;

/// Fixed IDs of the built-in home-feed redirect rules.
pub const HOME_REDIRECT_IDS: [RuleId; 3] = [1, 2, 3];

/// Fixed ID of the built-in shorts redirect rule.
pub const SHORTS_REDIRECT_ID: RuleId = 4;

/// Returns true when `id` belongs to the user-block band.
#[inline]
pub fn is_block_rule_id(id: RuleId) -> bool {
    id >= BLOCK_RULE_BASE_ID
}

/// Dense sequential allocator over the user-block band.
///
/// Allocation order is a pure function of the caller's iteration order, so
/// rebuilding from the same entry list yields the same IDs. Determinism
/// keeps diffs minimal; correctness never depends on it because the
/// reconciler always diffs against the live table.
#[derive(Debug)]
pub struct IdAllocator {
    next: RuleId,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: BLOCK_RULE_BASE_ID,
        }
    }

    /// Hand out the next free ID in the band.
    pub fn allocate(&mut self) -> RuleId {
        let id = self.next;
        debug_assert!(is_block_rule_id(id));
        self.next += 1;
        id
    }

    /// Number of IDs handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next - BLOCK_RULE_BASE_ID
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn allocates_dense_ids_from_base() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.allocate(), 1000);
        assert_eq!(alloc.allocate(), 1001);
        assert_eq!(alloc.allocate(), 1002);
        assert_eq!(alloc.allocated(), 3);
    }

    #[test]
    fn never_collides_within_a_pass_or_with_builtins() {
        let mut alloc = IdAllocator::new();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let id = alloc.allocate();
            assert!(is_block_rule_id(id));
            assert!(!HOME_REDIRECT_IDS.contains(&id));
            assert_ne!(id, SHORTS_REDIRECT_ID);
            assert!(seen.insert(id));
        }
    }
}
