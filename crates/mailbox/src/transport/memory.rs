//! In-memory transport implementation
//!
//! Backs the replay tool and the test suite. Holds a mailbox in memory,
//! records every call it receives and can be told to fail.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use super::{MailTransport, Page, PageRequest};
use crate::models::{ItemId, LabelDelta, ThreadSummary, labels};

/// A call received by the in-memory transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    UpdateLabels { item_id: String, delta: LabelDelta },
    UpdateThreadLabels { thread_id: String, delta: LabelDelta },
    BatchUpdateLabels { item_ids: Vec<String>, delta: LabelDelta },
    MarkRead(Vec<String>),
    MarkUnread(Vec<String>),
    FetchPage(PageRequest),
}

impl TransportCall {
    /// Whether this call mutates remote state
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::FetchPage(_))
    }
}

/// In-memory implementation of MailTransport
pub struct InMemoryTransport {
    /// Items by bare id
    items: RwLock<HashMap<String, ThreadSummary>>,
    calls: Mutex<Vec<TransportCall>>,
    /// Pages returned ahead of the computed ones, in order
    scripted_pages: Mutex<VecDeque<Result<Page>>>,
    /// Bare ids whose label/read updates are rejected
    failing: RwLock<HashSet<String>>,
    fail_all: AtomicBool,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            scripted_pages: Mutex::new(VecDeque::new()),
            failing: RwLock::new(HashSet::new()),
            fail_all: AtomicBool::new(false),
        }
    }

    /// Create a transport holding the given items
    pub fn with_items(items: impl IntoIterator<Item = ThreadSummary>) -> Self {
        let transport = Self::new();
        for item in items {
            transport.insert(item);
        }
        transport
    }

    pub fn insert(&self, item: ThreadSummary) {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        items.insert(item.id.bare().to_string(), item);
    }

    /// Current remote copy of an item
    pub fn item(&self, id: &str) -> Option<ThreadSummary> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        items.get(ItemId::new(id).bare()).cloned()
    }

    /// Queue a page to be returned by the next `fetch_page` call
    pub fn script_page(&self, page: Page) {
        self.scripted().push_back(Ok(page));
    }

    /// Queue a fetch failure for the next `fetch_page` call
    pub fn script_fetch_error(&self, message: &str) {
        self.scripted().push_back(Err(anyhow::anyhow!(message.to_string())));
    }

    /// Reject updates touching this id
    pub fn fail_for(&self, id: &str) {
        let mut failing = self.failing.write().unwrap_or_else(PoisonError::into_inner);
        failing.insert(ItemId::new(id).bare().to_string());
    }

    /// Reject every mutating call
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// All calls received so far
    pub fn calls(&self) -> Vec<TransportCall> {
        self.lock_calls().clone()
    }

    /// Number of calls that mutate remote state
    pub fn mutation_count(&self) -> usize {
        self.lock_calls().iter().filter(|c| c.is_mutation()).count()
    }

    pub fn clear_calls(&self) {
        self.lock_calls().clear();
    }

    fn lock_calls(&self) -> MutexGuard<'_, Vec<TransportCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scripted(&self) -> MutexGuard<'_, VecDeque<Result<Page>>> {
        self.scripted_pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: TransportCall) {
        self.lock_calls().push(call);
    }

    fn check_writable(&self, ids: &[String]) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            bail!("Transport rejected the request");
        }
        let failing = self.failing.read().unwrap_or_else(PoisonError::into_inner);
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        for id in ids {
            let target = ItemId::new(id.as_str());
            if failing.contains(target.bare()) {
                bail!("Update rejected for {}", id);
            }
            let known = items.contains_key(target.bare())
                || items.values().any(|item| item.is_named_by(&target));
            if !known {
                bail!("Message not found: {}", id);
            }
        }
        Ok(())
    }

    /// Apply `f` to every item named by `id`. Thread-marked ids reach every
    /// member of the thread.
    fn update_matching(&self, id: &str, mut f: impl FnMut(&mut ThreadSummary)) {
        let target = ItemId::new(id);
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        for item in items.values_mut() {
            if item.is_named_by(&target) {
                f(item);
            }
        }
    }

    fn apply_delta(&self, ids: &[String], delta: &LabelDelta) -> Result<()> {
        self.check_writable(ids)?;
        for id in ids {
            self.update_matching(id, |item| delta.apply(&mut item.labels));
        }
        Ok(())
    }

    fn set_unread(&self, ids: &[String], unread: bool) -> Result<()> {
        self.check_writable(ids)?;
        for id in ids {
            self.update_matching(id, |item| item.is_unread = unread);
        }
        Ok(())
    }

    fn compute_page(&self, request: &PageRequest) -> Result<Page> {
        let offset = match &request.cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .with_context(|| format!("Invalid page cursor: {}", cursor))?,
            None => 0,
        };
        let query = request.query.as_ref().map(|q| q.to_lowercase());

        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        let mut matching: Vec<&ThreadSummary> = items
            .values()
            .filter(|item| request.folder.contains(&item.labels))
            .filter(|item| {
                request.labels.iter().all(|label| {
                    if label == labels::UNREAD {
                        item.is_unread
                    } else {
                        item.labels.contains(label)
                    }
                })
            })
            .filter(|item| match &query {
                Some(q) => {
                    item.subject.to_lowercase().contains(q)
                        || item.snippet.to_lowercase().contains(q)
                        || item.sender_email.to_lowercase().contains(q)
                }
                None => true,
            })
            .collect();

        // Newest first, id as tie-breaker for a stable order
        matching.sort_by(|a, b| {
            b.received_at
                .cmp(&a.received_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let page_size = request.page_size.max(1);
        let end = (offset + page_size).min(matching.len());
        let page_items: Vec<ThreadSummary> = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|item| (*item).clone())
            .collect();
        let next_cursor = (end < matching.len()).then(|| end.to_string());

        Ok(Page::new(page_items, next_cursor))
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailTransport for InMemoryTransport {
    async fn update_labels(&self, item_id: &str, delta: &LabelDelta) -> Result<()> {
        self.record(TransportCall::UpdateLabels {
            item_id: item_id.to_string(),
            delta: delta.clone(),
        });
        self.apply_delta(&[item_id.to_string()], delta)
    }

    async fn update_thread_labels(&self, thread_id: &str, delta: &LabelDelta) -> Result<()> {
        self.record(TransportCall::UpdateThreadLabels {
            thread_id: thread_id.to_string(),
            delta: delta.clone(),
        });
        self.apply_delta(&[thread_id.to_string()], delta)
    }

    async fn batch_update_labels(&self, item_ids: &[String], delta: &LabelDelta) -> Result<()> {
        self.record(TransportCall::BatchUpdateLabels {
            item_ids: item_ids.to_vec(),
            delta: delta.clone(),
        });
        self.apply_delta(item_ids, delta)
    }

    async fn mark_read(&self, item_ids: &[String]) -> Result<()> {
        self.record(TransportCall::MarkRead(item_ids.to_vec()));
        self.set_unread(item_ids, false)
    }

    async fn mark_unread(&self, item_ids: &[String]) -> Result<()> {
        self.record(TransportCall::MarkUnread(item_ids.to_vec()));
        self.set_unread(item_ids, true)
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page> {
        self.record(TransportCall::FetchPage(request.clone()));
        if let Some(scripted) = self.scripted().pop_front() {
            return scripted;
        }
        self.compute_page(request)
    }
}
