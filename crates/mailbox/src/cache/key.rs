//! Cache key

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Folder;

/// Identity of one cached feed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub user_id: String,
    pub folder: Folder,
    /// Label filter, sorted; empty means unfiltered
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub query: Option<String>,
}

impl CacheKey {
    pub fn new(user_id: impl Into<String>, folder: Folder) -> Self {
        Self {
            user_id: user_id.into(),
            folder,
            labels: Vec::new(),
            query: None,
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        labels.sort();
        labels.dedup();
        self.labels = labels;
        self
    }

    /// Set the search query; blank queries are treated as none
    pub fn with_query(mut self, query: Option<&str>) -> Self {
        self.query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);
        self
    }

    /// Whether this key belongs to `user_id` and shows `folder`
    pub fn is_folder_of(&self, user_id: &str, folder: &Folder) -> bool {
        self.user_id == user_id && &self.folder == folder
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.folder)?;
        if !self.labels.is_empty() {
            write!(f, "[{}]", self.labels.join(","))?;
        }
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}
