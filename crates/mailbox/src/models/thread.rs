//! Thread summary model shown as one row of the mailbox list

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ItemId, LabelSet};

/// Summary information for displaying a thread in a list
///
/// Immutable once fetched, except for `labels` and `is_unread`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    /// Item id (bare, never carries the thread marker)
    pub id: ItemId,
    /// Distinct thread id when this row is a single message inside a thread
    #[serde(default)]
    pub thread_id: Option<ItemId>,
    /// Subject line
    #[serde(default)]
    pub subject: String,
    /// Preview snippet
    #[serde(default)]
    pub snippet: String,
    /// Display name of the sender
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Email address of the sender
    #[serde(default)]
    pub sender_email: String,
    /// Ordering timestamp
    pub received_at: DateTime<Utc>,
    /// Number of messages in the thread
    #[serde(default = "default_message_count")]
    pub message_count: usize,
    /// Labels carried by the item
    #[serde(default)]
    pub labels: LabelSet,
    /// Whether the item has unread messages
    #[serde(default)]
    pub is_unread: bool,
}

fn default_message_count() -> usize {
    1
}

impl ThreadSummary {
    /// Create a summary with the given id and timestamp
    pub fn new(id: impl Into<ItemId>, received_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            thread_id: None,
            subject: String::new(),
            snippet: String::new(),
            sender_name: None,
            sender_email: String::new(),
            received_at,
            message_count: 1,
            labels: LabelSet::new(),
            is_unread: false,
        }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<ItemId>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_sender(mut self, name: Option<&str>, email: impl Into<String>) -> Self {
        self.sender_name = name.map(str::to_string);
        self.sender_email = email.into();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().collect();
        self
    }

    pub fn unread(mut self, is_unread: bool) -> Self {
        self.is_unread = is_unread;
        self
    }

    /// Id used when the item is opened: its thread as a thread target if it
    /// has a distinct thread id, else the item id
    pub fn open_id(&self) -> ItemId {
        match &self.thread_id {
            Some(thread_id) => ItemId::thread(thread_id.bare()),
            None => self.id.clone(),
        }
    }

    /// Whether `id` addresses this row.
    ///
    /// A bare id names the row by its own id. A thread-marked id also names
    /// every row carrying that thread id.
    pub fn is_named_by(&self, id: &ItemId) -> bool {
        self.id.same_item(id)
            || (id.is_thread() && self.thread_id.as_ref().is_some_and(|t| t.same_item(id)))
    }
}
