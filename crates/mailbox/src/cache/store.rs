//! Shared page cache

use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use super::{CacheEntry, CacheKey};
use crate::models::{Folder, ItemId, LabelDelta, LabelSet, ThreadSummary};
use crate::transport::Page;

type SharedEntry = Arc<Mutex<CacheEntry>>;

/// Page cache keyed by [`CacheKey`], one mutex per entry
#[derive(Default)]
pub struct PageCache {
    entries: RwLock<HashMap<CacheKey, SharedEntry>>,
}

fn lock(entry: &Mutex<CacheEntry>) -> MutexGuard<'_, CacheEntry> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the entry for `key`, creating it if needed
    pub fn with_entry<R>(&self, key: &CacheKey, f: impl FnOnce(&mut CacheEntry) -> R) -> R {
        let entry = self.entry(key);
        let mut guard = lock(&entry);
        f(&mut guard)
    }

    /// Copy of the entry for `key`, if one exists
    pub fn snapshot(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.existing(key)?;
        let snapshot = lock(&entry).clone();
        Some(snapshot)
    }

    /// Whether reading `key` should trigger a first-page fetch
    pub fn needs_refresh(&self, key: &CacheKey) -> bool {
        match self.existing(key) {
            Some(entry) => {
                let entry = lock(&entry);
                !entry.is_loaded() || entry.is_stale()
            }
            None => true,
        }
    }

    /// Replace the entry's list with a fresh first page
    pub fn store_first_page(&self, key: &CacheKey, page: Page) -> usize {
        self.with_entry(key, |entry| {
            entry.reset_with(page);
            entry.items().len()
        })
    }

    /// Merge a continuation page into the entry. Returns items added.
    pub fn append_page(&self, key: &CacheKey, page: Page) -> usize {
        self.with_entry(key, |entry| entry.merge(page))
    }

    pub fn stop_paging(&self, key: &CacheKey) {
        self.with_entry(key, CacheEntry::stop_paging);
    }

    /// Labels of each id under `key`, in order
    pub fn labels_of_each(&self, key: &CacheKey, ids: &[ItemId]) -> Vec<Option<LabelSet>> {
        match self.existing(key) {
            Some(entry) => lock(&entry).labels_of_each(ids),
            None => vec![None; ids.len()],
        }
    }

    /// Remove ids from every entry showing `folder` for `user_id`.
    ///
    /// Returns the number of rows removed across entries.
    pub fn remove_items(&self, user_id: &str, folder: &Folder, ids: &[ItemId]) -> usize {
        self.matching(|key| key.is_folder_of(user_id, folder))
            .iter()
            .map(|entry| lock(entry).remove(ids))
            .sum()
    }

    /// Mark every entry of the given folders stale. Returns entries touched.
    pub fn invalidate(&self, user_id: &str, folders: &[Folder]) -> usize {
        let entries =
            self.matching(|key| folders.iter().any(|folder| key.is_folder_of(user_id, folder)));
        for entry in &entries {
            lock(entry).mark_stale();
        }
        debug!(
            "Invalidated {} cache entries for folders {:?}",
            entries.len(),
            folders.iter().map(Folder::name).collect::<Vec<_>>()
        );
        entries.len()
    }

    /// Set the unread flag of cached copies of `ids` across the user's entries
    pub fn set_unread(&self, user_id: &str, ids: &[ItemId], unread: bool) -> usize {
        self.update_items(user_id, ids, |item| item.is_unread = unread)
    }

    /// Apply a label delta to cached copies of `ids` across the user's entries
    pub fn apply_labels(&self, user_id: &str, ids: &[ItemId], delta: &LabelDelta) -> usize {
        self.update_items(user_id, ids, |item| delta.apply(&mut item.labels))
    }

    /// Drop the entry for a torn-down view
    pub fn evict(&self, key: &CacheKey) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update_items(
        &self,
        user_id: &str,
        ids: &[ItemId],
        mut f: impl FnMut(&mut ThreadSummary),
    ) -> usize {
        self.matching(|key| key.user_id == user_id)
            .iter()
            .map(|entry| lock(entry).update(ids, &mut f))
            .sum()
    }

    fn entry(&self, key: &CacheKey) -> SharedEntry {
        if let Some(entry) = self.existing(key) {
            return entry;
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.entry(key.clone()).or_default().clone()
    }

    fn existing(&self, key: &CacheKey) -> Option<SharedEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    fn matching(&self, pred: impl Fn(&CacheKey) -> bool) -> Vec<SharedEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter(|(key, _)| pred(key))
            .map(|(_, entry)| entry.clone())
            .collect()
    }
}
