//! Item identity and the thread-marker convention
//!
//! An id prefixed with `thread:` targets a whole thread; a bare id targets a
//! single message. Cached summaries are always stored under their bare id.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a list item (message or thread)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub String);

/// What a mutation call should address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    /// A single message, addressed by its bare id
    Message(&'a str),
    /// A whole thread, addressed by the marked id
    Thread(&'a str),
}

impl ItemId {
    /// Prefix marking a thread-level target
    pub const THREAD_MARKER: &'static str = "thread:";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build a thread-level id from a bare thread id
    pub fn thread(id: &str) -> Self {
        if id.starts_with(Self::THREAD_MARKER) {
            Self(id.to_string())
        } else {
            Self(format!("{}{}", Self::THREAD_MARKER, id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id carries the thread marker
    pub fn is_thread(&self) -> bool {
        self.0.starts_with(Self::THREAD_MARKER)
    }

    /// The id with any thread marker stripped
    pub fn bare(&self) -> &str {
        self.0
            .strip_prefix(Self::THREAD_MARKER)
            .unwrap_or(&self.0)
    }

    /// Owned copy of the id with any thread marker stripped
    pub fn bare_id(&self) -> ItemId {
        Self(self.bare().to_string())
    }

    /// Classify this id for transport dispatch
    pub fn target(&self) -> Target<'_> {
        if self.is_thread() {
            Target::Thread(&self.0)
        } else {
            Target::Message(&self.0)
        }
    }

    /// Whether two ids name the same item, ignoring the thread marker
    pub fn same_item(&self, other: &ItemId) -> bool {
        self.bare() == other.bare()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Sets of bare ids can be looked up by `&str`
impl Borrow<str> for ItemId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
