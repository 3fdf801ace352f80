//! Error types surfaced by the engine
//!
//! Policy refusals and empty batches are detected before any network
//! activity. Remote failures come back through the same result channel as
//! successes. Stale feed responses are discarded and never shown to the user.

use crate::cache::CacheKey;
use crate::policy::{PolicyRefusal, Transition};

/// Failure of a user-facing mutation entry point
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The transition is disallowed for the current folder; no call was made
    #[error(transparent)]
    PolicyViolation(#[from] PolicyRefusal),

    /// Every targeted item was ineligible; no call was made
    #[error("No eligible items to {}: {skipped} skipped", .transition.verb())]
    EmptyBatch {
        transition: Transition,
        skipped: usize,
    },

    /// The transport reported failure; local state was not touched
    #[error("Error {operation} selected items")]
    RemoteFailure {
        operation: &'static str,
        detail: String,
    },

    #[error("No items selected")]
    NothingSelected,

    /// No session or connection handle is available
    #[error("Not signed in")]
    Unauthenticated,
}

impl ActionError {
    pub(crate) fn remote(operation: &'static str, err: &anyhow::Error) -> Self {
        Self::RemoteFailure {
            operation,
            detail: format!("{:#}", err),
        }
    }

    /// Whether the error was raised before any remote call
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::RemoteFailure { .. })
    }
}

/// Failure of a feed page load
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The response belongs to a feed that is no longer active
    #[error("Discarded stale page response for {key}")]
    StaleResponse { key: CacheKey },

    #[error("No feed is open")]
    NotOpen,

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Failed to load page for {key}: {detail}")]
    Fetch { key: CacheKey, detail: String },
}

impl FeedError {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleResponse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ActionError::from(PolicyRefusal::ArchiveFromSpam);
        assert_eq!(err.to_string(), "Cannot archive emails from the spam folder");
        assert!(err.is_local());

        let err = ActionError::EmptyBatch {
            transition: Transition::MarkSpam,
            skipped: 2,
        };
        assert_eq!(err.to_string(), "No eligible items to mark as spam: 2 skipped");

        let err = ActionError::remote("archiving", &anyhow::anyhow!("503"));
        assert_eq!(err.to_string(), "Error archiving selected items");
        assert!(!err.is_local());
    }
}
