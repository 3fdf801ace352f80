//! Successful mutation outcome

use crate::models::ItemId;
use crate::policy::Transition;

/// Result of a successful transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub transition: Transition,
    /// Ids the remote call was issued for
    pub affected: Vec<ItemId>,
    /// Ids excluded by item-level policy
    pub skipped: Vec<ItemId>,
    /// Rows removed from the originating folder's cache entries
    pub removed: usize,
}

impl ActionOutcome {
    pub fn affected_count(&self) -> usize {
        self.affected.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }

    /// Notification text, e.g. "3 items archived, 1 skipped"
    pub fn message(&self) -> String {
        let count = self.affected_count();
        let noun = if count == 1 { "item" } else { "items" };
        let mut message = format!("{} {} {}", count, noun, self.transition.past_tense());
        if self.is_partial() {
            message.push_str(&format!(", {} skipped", self.skipped_count()));
        }
        message
    }
}
