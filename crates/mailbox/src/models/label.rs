//! Labels, label sets and label deltas

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Well-known system label names
pub mod labels {
    // Archive has no label: it is the absence of INBOX.
    pub const INBOX: &str = "INBOX";
    pub const SENT: &str = "SENT";
    pub const SPAM: &str = "SPAM";
    pub const TRASH: &str = "TRASH";
    pub const DRAFTS: &str = "DRAFT";
    pub const UNREAD: &str = "UNREAD";
}

/// Unordered set of unique label names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeSet<String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    pub fn insert(&mut self, label: impl Into<String>) -> bool {
        self.0.insert(label.into())
    }

    pub fn remove(&mut self, label: &str) -> bool {
        self.0.remove(label)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for LabelSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Labels to add and remove in one remote call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDelta {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl LabelDelta {
    pub fn new(add: &[&str], remove: &[&str]) -> Self {
        Self {
            add: add.iter().map(|s| s.to_string()).collect(),
            remove: remove.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Apply the delta to a label set. Removing an absent label is a no-op.
    pub fn apply(&self, labels: &mut LabelSet) {
        for label in &self.remove {
            labels.remove(label);
        }
        for label in &self.add {
            labels.insert(label.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_set_is_unique() {
        let mut labels: LabelSet = ["INBOX", "UNREAD"].into_iter().collect();
        assert!(!labels.insert("INBOX"));
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_delta_apply() {
        let mut labels: LabelSet = ["SPAM"].into_iter().collect();
        LabelDelta::new(&[labels::INBOX], &[labels::SPAM]).apply(&mut labels);
        assert!(labels.contains(labels::INBOX));
        assert!(!labels.contains(labels::SPAM));

        // Removing an absent label leaves the set unchanged
        LabelDelta::new(&[labels::INBOX], &[labels::SPAM]).apply(&mut labels);
        assert_eq!(labels.len(), 1);
    }
}
