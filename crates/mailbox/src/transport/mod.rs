//! Remote transport seam
//!
//! The engine never talks to a mail provider directly. Everything remote goes
//! through [`MailTransport`], an async RPC surface that reports success or
//! failure per call.

mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;
use crate::models::{Folder, LabelDelta, ThreadSummary};

pub use memory::{InMemoryTransport, TransportCall};

/// Request for one page of a folder feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub folder: Folder,
    /// Label filter; empty means no filter
    pub labels: Vec<String>,
    pub query: Option<String>,
    pub page_size: usize,
    /// Continuation cursor from the previous page
    pub cursor: Option<String>,
}

impl PageRequest {
    /// Build a request for the feed identified by `key`
    pub fn for_key(key: &CacheKey, page_size: usize, cursor: Option<String>) -> Self {
        Self {
            folder: key.folder.clone(),
            labels: key.labels.clone(),
            query: key.query.clone(),
            page_size,
            cursor,
        }
    }
}

/// One page of thread summaries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<ThreadSummary>,
    /// Cursor for the next page; `None` when this is the last page
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn new(items: Vec<ThreadSummary>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }
}

/// Remote mail provider operations consumed by the engine
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Change labels of a single message
    async fn update_labels(&self, item_id: &str, delta: &LabelDelta) -> Result<()>;

    /// Change labels of every message in a thread
    async fn update_thread_labels(&self, thread_id: &str, delta: &LabelDelta) -> Result<()>;

    /// Change labels of many items in one request
    async fn batch_update_labels(&self, item_ids: &[String], delta: &LabelDelta) -> Result<()>;

    async fn mark_read(&self, item_ids: &[String]) -> Result<()>;

    async fn mark_unread(&self, item_ids: &[String]) -> Result<()>;

    /// Fetch one page of a folder feed
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page>;
}
