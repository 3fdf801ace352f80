//! One cached feed

use std::collections::{HashMap, HashSet};

use crate::models::{ItemId, LabelSet, ThreadSummary};
use crate::transport::Page;

/// Ids of one mutation split by target kind, for hashed row matching
struct Targets<'a> {
    messages: HashSet<&'a str>,
    threads: HashSet<&'a str>,
}

impl<'a> Targets<'a> {
    fn new(ids: &'a [ItemId]) -> Self {
        let (threads, messages) = ids.iter().partition::<Vec<_>, _>(|id| id.is_thread());
        Self {
            messages: messages.into_iter().map(ItemId::bare).collect(),
            threads: threads.into_iter().map(ItemId::bare).collect(),
        }
    }

    /// Same rule as [`ThreadSummary::is_named_by`]
    fn matches(&self, item: &ThreadSummary) -> bool {
        let id = item.id.bare();
        self.messages.contains(id)
            || self.threads.contains(id)
            || item
                .thread_id
                .as_ref()
                .is_some_and(|t| self.threads.contains(t.bare()))
    }
}

/// Ordered, de-duplicated list of summaries plus paging state
#[derive(Debug, Clone)]
pub struct CacheEntry {
    items: Vec<ThreadSummary>,
    next_cursor: Option<String>,
    has_more: bool,
    stale: bool,
    loaded: bool,
    /// Bare row ids removed by mutations since the last first-page load
    removed: HashSet<String>,
    /// Bare thread ids removed as whole threads since the last first-page load
    removed_threads: HashSet<String>,
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: true,
            stale: false,
            loaded: false,
            removed: HashSet::new(),
            removed_threads: HashSet::new(),
        }
    }
}

impl CacheEntry {
    pub fn items(&self) -> &[ThreadSummary] {
        &self.items
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|i| i.id.clone()).collect()
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Known to be outdated; the next read should refetch
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// At least one page has arrived since creation
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Whether any row is named by `id`
    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.iter().any(|item| item.is_named_by(id))
    }

    /// Labels of the row named by each id, in order. `None` for ids not cached.
    pub fn labels_of_each(&self, ids: &[ItemId]) -> Vec<Option<LabelSet>> {
        let mut by_row: HashMap<&str, &ThreadSummary> = HashMap::with_capacity(self.items.len());
        let mut by_thread: HashMap<&str, &ThreadSummary> = HashMap::new();
        for item in &self.items {
            by_row.entry(item.id.bare()).or_insert(item);
            if let Some(thread_id) = &item.thread_id {
                by_thread.entry(thread_id.bare()).or_insert(item);
            }
        }
        ids.iter()
            .map(|id| {
                let row = by_row.get(id.bare()).or_else(|| {
                    id.is_thread()
                        .then(|| by_thread.get(id.bare()))
                        .flatten()
                });
                row.map(|item| item.labels.clone())
            })
            .collect()
    }

    /// Replace the whole list with a fresh first page
    pub fn reset_with(&mut self, page: Page) {
        self.items.clear();
        self.removed.clear();
        self.removed_threads.clear();
        self.next_cursor = None;
        self.merge(page);
        self.stale = false;
        self.loaded = true;
    }

    /// Append a page, skipping ids already present or removed by a mutation.
    ///
    /// First arrival keeps its position. Returns the number of items added.
    pub fn merge(&mut self, page: Page) -> usize {
        let mut seen: HashSet<String> = self
            .items
            .iter()
            .map(|i| i.id.bare().to_string())
            .collect();
        let before = self.items.len();
        for item in page.items {
            if self.is_tombstoned(&item) || !seen.insert(item.id.bare().to_string()) {
                continue;
            }
            self.items.push(item);
        }
        self.has_more = page.next_cursor.is_some();
        self.next_cursor = page.next_cursor;
        self.loaded = true;
        self.items.len() - before
    }

    /// Remove rows named by `ids`. A thread target removes every row of the
    /// thread. Removing an absent id is a no-op.
    pub fn remove(&mut self, ids: &[ItemId]) -> usize {
        let targets = Targets::new(ids);
        let before = self.items.len();
        let removed = &mut self.removed;
        self.items.retain(|item| {
            let hit = targets.matches(item);
            if hit {
                removed.insert(item.id.bare().to_string());
            }
            !hit
        });
        removed.extend(targets.messages.iter().map(|id| id.to_string()));
        self.removed_threads
            .extend(targets.threads.iter().map(|id| id.to_string()));
        before - self.items.len()
    }

    /// Run `f` on every row named by `ids`. Returns the number of rows updated.
    pub fn update(&mut self, ids: &[ItemId], mut f: impl FnMut(&mut ThreadSummary)) -> usize {
        let targets = Targets::new(ids);
        let mut updated = 0;
        for item in self.items.iter_mut().filter(|item| targets.matches(item)) {
            f(item);
            updated += 1;
        }
        updated
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Stop paging after a failed load
    pub fn stop_paging(&mut self) {
        self.has_more = false;
    }

    fn is_tombstoned(&self, item: &ThreadSummary) -> bool {
        let id = item.id.bare();
        self.removed.contains(id)
            || self.removed_threads.contains(id)
            || item
                .thread_id
                .as_ref()
                .is_some_and(|t| self.removed_threads.contains(t.bare()))
    }
}
