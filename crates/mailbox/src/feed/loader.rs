//! Feed paging state machine

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::{CacheEntry, CacheKey, PageCache};
use crate::error::FeedError;
use crate::models::ThreadSummary;
use crate::transport::{MailTransport, Page, PageRequest};

/// Paging phase of the active feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedPhase {
    #[default]
    Idle,
    LoadingFirstPage,
    Ready,
    LoadingNextPage,
}

/// Viewport geometry reported by the rendering layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    /// Distance between the bottom of the viewport and the end of the list
    pub fn remaining(&self) -> f64 {
        (self.scroll_height - (self.scroll_top + self.client_height)).max(0.0)
    }
}

/// A page load in flight.
///
/// Carries the originating key and generation so a response arriving after a
/// folder switch or refresh can be recognised and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTicket {
    key: CacheKey,
    generation: u64,
    cursor: Option<String>,
}

impl PageTicket {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn is_first_page(&self) -> bool {
        self.cursor.is_none()
    }

    pub fn request(&self, page_size: usize) -> PageRequest {
        PageRequest::for_key(&self.key, page_size, self.cursor.clone())
    }
}

pub struct FeedLoader {
    cache: Arc<PageCache>,
    key: Option<CacheKey>,
    phase: FeedPhase,
    generation: u64,
    page_size: usize,
}

impl FeedLoader {
    pub fn new(cache: Arc<PageCache>, page_size: usize) -> Self {
        Self {
            cache,
            key: None,
            phase: FeedPhase::Idle,
            generation: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn key(&self) -> Option<&CacheKey> {
        self.key.as_ref()
    }

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Make `key` the active feed.
    ///
    /// Any response still in flight for the previous feed becomes stale.
    /// Returns a first-page ticket when the cache has nothing usable for `key`.
    pub fn open(&mut self, key: CacheKey) -> Option<PageTicket> {
        debug!("Opening feed {}", key);
        self.generation += 1;
        self.key = Some(key);
        self.phase = FeedPhase::Ready;
        self.refresh_if_stale()
    }

    /// Start a first-page reload if the active entry is missing or stale
    pub fn refresh_if_stale(&mut self) -> Option<PageTicket> {
        let key = self.key.clone()?;
        if self.phase == FeedPhase::LoadingFirstPage || !self.cache.needs_refresh(&key) {
            return None;
        }
        // A reload supersedes an in-flight continuation
        self.generation += 1;
        self.phase = FeedPhase::LoadingFirstPage;
        Some(PageTicket {
            key,
            generation: self.generation,
            cursor: None,
        })
    }

    /// Drop the active feed, e.g. when the view is torn down
    pub fn close(&mut self) -> Option<CacheKey> {
        self.generation += 1;
        self.phase = FeedPhase::Idle;
        self.key.take()
    }

    /// Whether the viewport is close enough to the end to request another page
    pub fn should_load_more(&self, metrics: &ScrollMetrics, row_height: f64, threshold_rows: f64) -> bool {
        self.phase == FeedPhase::Ready
            && self.has_more()
            && metrics.remaining() < row_height * threshold_rows
    }

    /// Start loading the next page if one exists and nothing is in flight
    pub fn begin_next_page(&mut self) -> Option<PageTicket> {
        if self.phase != FeedPhase::Ready {
            return None;
        }
        let key = self.key.clone()?;
        let cursor = self.cache.with_entry(&key, |entry| {
            if entry.has_more() {
                entry.next_cursor().map(str::to_string)
            } else {
                None
            }
        })?;
        self.phase = FeedPhase::LoadingNextPage;
        Some(PageTicket {
            key,
            generation: self.generation,
            cursor: Some(cursor),
        })
    }

    /// Apply the result of a page load.
    ///
    /// Returns the number of items added to the list. A failed load stops
    /// paging for the feed rather than retrying.
    pub fn complete(&mut self, ticket: PageTicket, result: anyhow::Result<Page>) -> Result<usize, FeedError> {
        if self.key.as_ref() != Some(&ticket.key) || self.generation != ticket.generation {
            debug!("Discarding stale page response for {}", ticket.key);
            return Err(FeedError::StaleResponse { key: ticket.key });
        }
        self.phase = FeedPhase::Ready;

        match result {
            Ok(page) => {
                let count = page.items.len();
                let added = if ticket.is_first_page() {
                    self.cache.store_first_page(&ticket.key, page)
                } else {
                    self.cache.append_page(&ticket.key, page)
                };
                info!(
                    "Merged page for {}: {} received, {} added",
                    ticket.key, count, added
                );
                Ok(added)
            }
            Err(e) => {
                warn!("Failed to load page for {}: {:#}", ticket.key, e);
                self.cache.stop_paging(&ticket.key);
                Err(FeedError::Fetch {
                    key: ticket.key,
                    detail: format!("{:#}", e),
                })
            }
        }
    }

    /// Fetch the page for `ticket` and apply it
    pub async fn load(&mut self, transport: &dyn MailTransport, ticket: PageTicket) -> Result<usize, FeedError> {
        let request = ticket.request(self.page_size);
        let result = transport.fetch_page(&request).await;
        self.complete(ticket, result)
    }

    /// Snapshot of the active entry
    pub fn entry(&self) -> Option<CacheEntry> {
        self.key.as_ref().and_then(|key| self.cache.snapshot(key))
    }

    pub fn items(&self) -> Vec<ThreadSummary> {
        self.entry()
            .map(|entry| entry.items().to_vec())
            .unwrap_or_default()
    }

    pub fn has_more(&self) -> bool {
        match self.entry() {
            Some(entry) => entry.is_loaded() && entry.has_more(),
            None => false,
        }
    }

    pub fn is_loading_more(&self) -> bool {
        self.phase == FeedPhase::LoadingNextPage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Folder, ItemId};
    use chrono::{TimeZone, Utc};

    fn summary(id: &str) -> ThreadSummary {
        ThreadSummary::new(ItemId::new(id), Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    fn page(ids: &[&str], cursor: Option<&str>) -> Page {
        Page::new(ids.iter().map(|id| summary(id)).collect(), cursor.map(str::to_string))
    }

    fn inbox() -> CacheKey {
        CacheKey::new("u1", Folder::Inbox)
    }

    fn ids(loader: &FeedLoader) -> Vec<String> {
        loader.items().iter().map(|i| i.id.as_str().to_string()).collect()
    }

    #[test]
    fn test_first_page_then_next() {
        let mut loader = FeedLoader::new(Arc::new(PageCache::new()), 3);
        let ticket = loader.open(inbox()).unwrap();
        assert!(ticket.is_first_page());
        assert_eq!(loader.phase(), FeedPhase::LoadingFirstPage);
        assert!(loader.begin_next_page().is_none());

        loader.complete(ticket, Ok(page(&["A", "B", "C"], Some("3")))).unwrap();
        assert_eq!(loader.phase(), FeedPhase::Ready);
        assert!(loader.has_more());

        let ticket = loader.begin_next_page().unwrap();
        assert!(loader.is_loading_more());
        assert!(loader.begin_next_page().is_none());
        assert_eq!(ticket.request(3).cursor.as_deref(), Some("3"));

        let added = loader.complete(ticket, Ok(page(&["C", "D", "E"], None))).unwrap();
        assert_eq!(added, 2);
        assert_eq!(ids(&loader), vec!["A", "B", "C", "D", "E"]);
        assert!(!loader.has_more());
        assert!(loader.begin_next_page().is_none());
    }

    #[test]
    fn test_stale_response_after_switch() {
        let cache = Arc::new(PageCache::new());
        let mut loader = FeedLoader::new(cache.clone(), 20);
        let inbox_ticket = loader.open(inbox()).unwrap();
        let spam = CacheKey::new("u1", Folder::Spam);
        let _spam_ticket = loader.open(spam.clone()).unwrap();

        let err = loader
            .complete(inbox_ticket, Ok(page(&["A"], None)))
            .unwrap_err();
        assert!(err.is_stale());
        assert!(cache.snapshot(&inbox()).is_none());
        assert_eq!(loader.key(), Some(&spam));
    }

    #[test]
    fn test_reopen_same_key_discards_old_ticket() {
        let mut loader = FeedLoader::new(Arc::new(PageCache::new()), 20);
        let first = loader.open(inbox()).unwrap();
        let second = loader.open(inbox()).unwrap();
        assert!(loader.complete(first, Ok(page(&["A"], None))).unwrap_err().is_stale());
        assert_eq!(loader.complete(second, Ok(page(&["B"], None))).unwrap(), 1);
        assert_eq!(ids(&loader), vec!["B"]);
    }

    #[test]
    fn test_error_stops_paging() {
        let mut loader = FeedLoader::new(Arc::new(PageCache::new()), 2);
        let ticket = loader.open(inbox()).unwrap();
        loader.complete(ticket, Ok(page(&["A", "B"], Some("2")))).unwrap();

        let ticket = loader.begin_next_page().unwrap();
        let err = loader
            .complete(ticket, Err(anyhow::anyhow!("timeout")))
            .unwrap_err();
        assert!(matches!(err, FeedError::Fetch { .. }));
        assert!(!loader.is_loading_more());
        assert!(!loader.has_more());
        assert!(loader.begin_next_page().is_none());
        assert_eq!(ids(&loader), vec!["A", "B"]);
    }

    #[test]
    fn test_should_load_more_threshold() {
        let mut loader = FeedLoader::new(Arc::new(PageCache::new()), 2);
        let ticket = loader.open(inbox()).unwrap();
        loader.complete(ticket, Ok(page(&["A", "B"], Some("2")))).unwrap();

        let near = ScrollMetrics {
            scroll_top: 500.0,
            scroll_height: 1000.0,
            client_height: 400.0,
        };
        let far = ScrollMetrics {
            scroll_top: 0.0,
            scroll_height: 1000.0,
            client_height: 400.0,
        };
        assert!(loader.should_load_more(&near, 96.0, 2.0));
        assert!(!loader.should_load_more(&far, 96.0, 2.0));

        let _ticket = loader.begin_next_page().unwrap();
        assert!(!loader.should_load_more(&near, 96.0, 2.0));
    }

    #[test]
    fn test_open_uses_fresh_cache() {
        let cache = Arc::new(PageCache::new());
        cache.store_first_page(&inbox(), page(&["A"], None));
        let mut loader = FeedLoader::new(cache.clone(), 20);
        assert!(loader.open(inbox()).is_none());
        assert_eq!(loader.phase(), FeedPhase::Ready);

        cache.invalidate("u1", &[Folder::Inbox]);
        let ticket = loader.refresh_if_stale().unwrap();
        assert!(ticket.is_first_page());
        assert!(loader.refresh_if_stale().is_none());
    }

    #[test]
    fn test_load_through_transport() {
        let transport = crate::transport::InMemoryTransport::new();
        transport.script_page(page(&["A", "B"], Some("2")));
        let mut loader = FeedLoader::new(Arc::new(PageCache::new()), 2);
        let ticket = loader.open(inbox()).unwrap();
        let added = tokio_test::block_on(loader.load(&transport, ticket)).unwrap();
        assert_eq!(added, 2);
    }
}
