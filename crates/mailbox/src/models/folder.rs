//! Folder identity
//!
//! A folder is a virtual view over label predicates, not a storage location.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::{LabelSet, labels};

/// A mailbox folder
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Folder {
    Inbox,
    Archive,
    Spam,
    Sent,
    Trash,
    Drafts,
    /// A user label shown as a folder
    Custom(String),
}

impl Folder {
    /// Parse a folder from its route name (case-insensitive for system folders)
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "inbox" => Self::Inbox,
            "archive" => Self::Archive,
            "spam" => Self::Spam,
            "sent" => Self::Sent,
            "trash" => Self::Trash,
            "drafts" | "draft" => Self::Drafts,
            _ => Self::Custom(name.trim().to_string()),
        }
    }

    /// Route name of the folder
    pub fn name(&self) -> &str {
        match self {
            Self::Inbox => "inbox",
            Self::Archive => "archive",
            Self::Spam => "spam",
            Self::Sent => "sent",
            Self::Trash => "trash",
            Self::Drafts => "drafts",
            Self::Custom(name) => name,
        }
    }

    /// Whether an item with the given labels belongs to this folder
    pub fn contains(&self, labels: &LabelSet) -> bool {
        match self {
            Self::Inbox => labels.contains(labels::INBOX),
            Self::Spam => labels.contains(labels::SPAM),
            Self::Sent => labels.contains(labels::SENT),
            Self::Trash => labels.contains(labels::TRASH),
            Self::Drafts => labels.contains(labels::DRAFTS),
            Self::Archive => {
                !labels.contains(labels::INBOX)
                    && !labels.contains(labels::SPAM)
                    && !labels.contains(labels::TRASH)
            }
            Self::Custom(label) => labels.contains(label),
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Folder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Folder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}
