//! Action handler for label transitions and read state
//!
//! Mutations are performed in two steps:
//! 1. Call the transport to update remote state
//! 2. On success, reconcile the shared page cache
//!
//! Nothing local changes before the remote call is confirmed, with one
//! exception: marking an item read when it is opened, which is applied first
//! and sent without waiting.

use futures::future::{BoxFuture, FutureExt, join_all};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::slice;
use std::sync::Arc;

use super::ActionOutcome;
use crate::cache::{CacheKey, PageCache};
use crate::config::{BatchStrategy, EngineConfig};
use crate::error::ActionError;
use crate::models::{ItemId, LabelDelta, Target};
use crate::policy::{self, Transition};
use crate::transport::MailTransport;

/// Remote failure of a dispatch, with the targets that did go through
struct DispatchFailure {
    succeeded: Vec<ItemId>,
    error: anyhow::Error,
}

impl DispatchFailure {
    fn total(error: anyhow::Error) -> Self {
        Self {
            succeeded: Vec::new(),
            error,
        }
    }
}

/// Handler for archive, spam and inbox transitions plus read/unread
///
/// Cheap to clone; overlapping calls on clones (or on one handler through
/// `&self`) reconcile independently in arrival order.
#[derive(Clone)]
pub struct ActionHandler {
    transport: Arc<dyn MailTransport>,
    cache: Arc<PageCache>,
    strategy: BatchStrategy,
    reconcile_partial_success: bool,
    rollback_failed_mark_read: bool,
}

impl ActionHandler {
    pub fn new(transport: Arc<dyn MailTransport>, cache: Arc<PageCache>, config: &EngineConfig) -> Self {
        Self {
            transport,
            cache,
            strategy: config.batch_strategy,
            reconcile_partial_success: config.reconcile_partial_success,
            rollback_failed_mark_read: config.rollback_failed_mark_read,
        }
    }

    pub fn cache(&self) -> &Arc<PageCache> {
        &self.cache
    }

    pub fn transport(&self) -> &Arc<dyn MailTransport> {
        &self.transport
    }

    /// Archive items (remove INBOX). Items carrying SPAM are skipped.
    pub async fn archive(&self, scope: &CacheKey, targets: &[ItemId]) -> Result<ActionOutcome, ActionError> {
        self.apply(Transition::Archive, scope, targets).await
    }

    /// Mark items as spam. Only allowed from the inbox; sent items are skipped.
    pub async fn mark_spam(&self, scope: &CacheKey, targets: &[ItemId]) -> Result<ActionOutcome, ActionError> {
        self.apply(Transition::MarkSpam, scope, targets).await
    }

    /// Move items back to the inbox (add INBOX, remove SPAM)
    pub async fn move_to_inbox(&self, scope: &CacheKey, targets: &[ItemId]) -> Result<ActionOutcome, ActionError> {
        self.apply(Transition::MoveToInbox, scope, targets).await
    }

    /// Run a transition against `targets` as seen from the feed `scope`.
    ///
    /// Policy refusals and empty batches return before any remote call.
    pub async fn apply(
        &self,
        transition: Transition,
        scope: &CacheKey,
        targets: &[ItemId],
    ) -> Result<ActionOutcome, ActionError> {
        let targets = dedup(targets);
        if targets.is_empty() {
            return Err(ActionError::NothingSelected);
        }
        if let Err(refusal) = policy::check_folder(transition, &scope.folder) {
            warn!("Refused to {} in {}: {}", transition.verb(), scope.folder, refusal);
            return Err(refusal.into());
        }

        let (eligible, skipped) = self.partition(transition, scope, targets);
        if eligible.is_empty() {
            info!(
                "No eligible items to {} ({} skipped)",
                transition.verb(),
                skipped.len()
            );
            return Err(ActionError::EmptyBatch {
                transition,
                skipped: skipped.len(),
            });
        }
        if !skipped.is_empty() {
            info!(
                "Filtered out {} ineligible items from {} operation",
                skipped.len(),
                transition.verb()
            );
        }

        info!(
            "Starting {} of {} items in {}",
            transition.verb(),
            eligible.len(),
            scope
        );
        match self.dispatch(&transition.delta(), &eligible).await {
            Ok(()) => {
                let removed = self.reconcile(transition, scope, &eligible);
                info!(
                    "{} {} items ({} rows removed from {})",
                    capitalize(transition.past_tense()),
                    eligible.len(),
                    removed,
                    scope.folder
                );
                Ok(ActionOutcome {
                    transition,
                    affected: eligible,
                    skipped,
                    removed,
                })
            }
            Err(failure) => {
                error!(
                    "Error {} {} items: {:#}",
                    transition.progressive(),
                    eligible.len(),
                    failure.error
                );
                if self.reconcile_partial_success && !failure.succeeded.is_empty() {
                    let removed = self.reconcile(transition, scope, &failure.succeeded);
                    warn!(
                        "Reconciled {} of {} items after partial failure ({} rows removed)",
                        failure.succeeded.len(),
                        eligible.len(),
                        removed
                    );
                }
                Err(ActionError::remote(transition.progressive(), &failure.error))
            }
        }
    }

    /// Mark items read remotely, then clear their unread flags locally
    pub async fn mark_read(&self, user_id: &str, ids: &[ItemId]) -> Result<usize, ActionError> {
        self.set_read_state(user_id, ids, false).await
    }

    /// Mark items unread remotely, then set their unread flags locally
    pub async fn mark_unread(&self, user_id: &str, ids: &[ItemId]) -> Result<usize, ActionError> {
        self.set_read_state(user_id, ids, true).await
    }

    /// Clear the unread flag of an opened item and return the remote call.
    ///
    /// The local flag is cleared before this returns. The returned future is
    /// meant to be spawned and forgotten: failures are logged, not surfaced,
    /// and the flag stays cleared unless rollback is enabled. It resolves to
    /// whether the remote call succeeded.
    pub fn mark_read_on_open(&self, user_id: &str, id: &ItemId) -> BoxFuture<'static, bool> {
        self.cache.set_unread(user_id, slice::from_ref(id), false);
        let handler = self.clone();
        let user_id = user_id.to_string();
        let id = id.clone();
        async move {
            match handler.transport.mark_read(&[id.as_str().to_string()]).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to mark {} as read: {:#}", id, e);
                    if handler.rollback_failed_mark_read {
                        handler.cache.set_unread(&user_id, slice::from_ref(&id), true);
                    }
                    false
                }
            }
        }
        .boxed()
    }

    async fn set_read_state(&self, user_id: &str, ids: &[ItemId], unread: bool) -> Result<usize, ActionError> {
        let ids = dedup(ids);
        if ids.is_empty() {
            return Err(ActionError::NothingSelected);
        }
        let raw: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
        let (result, operation) = if unread {
            (self.transport.mark_unread(&raw).await, "marking as unread")
        } else {
            (self.transport.mark_read(&raw).await, "marking as read")
        };

        match result {
            Ok(()) => {
                let updated = self.cache.set_unread(user_id, &ids, unread);
                info!(
                    "Marked {} items as {} ({} cached rows updated)",
                    ids.len(),
                    if unread { "unread" } else { "read" },
                    updated
                );
                Ok(ids.len())
            }
            Err(e) => {
                error!("Error {} {} items: {:#}", operation, ids.len(), e);
                Err(ActionError::remote(operation, &e))
            }
        }
    }

    /// Split targets into eligible and skipped by item-level policy.
    ///
    /// Labels come from the scope's cached copy; uncached items are judged by
    /// the labels the folder implies.
    fn partition(&self, transition: Transition, scope: &CacheKey, targets: Vec<ItemId>) -> (Vec<ItemId>, Vec<ItemId>) {
        let implied = policy::labels_implied_by(&scope.folder);
        let cached = self.cache.labels_of_each(scope, &targets);
        let (eligible, skipped): (Vec<_>, Vec<_>) =
            targets.into_iter().zip(cached).partition(|(_, labels)| {
                let labels = labels.as_ref().unwrap_or(&implied);
                policy::is_eligible(transition, &scope.folder, labels)
            });
        (
            eligible.into_iter().map(|(id, _)| id).collect(),
            skipped.into_iter().map(|(id, _)| id).collect(),
        )
    }

    async fn dispatch(&self, delta: &LabelDelta, targets: &[ItemId]) -> Result<(), DispatchFailure> {
        match (targets, self.strategy) {
            ([single], _) => self.send_one(single, delta).await.map_err(DispatchFailure::total),
            (_, BatchStrategy::Batched) => {
                let ids: Vec<String> = targets.iter().map(|id| id.as_str().to_string()).collect();
                self.transport
                    .batch_update_labels(&ids, delta)
                    .await
                    .map_err(DispatchFailure::total)
            }
            (_, BatchStrategy::PerItem) => {
                let results = join_all(targets.iter().map(|id| self.send_one(id, delta))).await;
                let mut succeeded = Vec::new();
                let mut first_error = None;
                for (id, result) in targets.iter().zip(results) {
                    match result {
                        Ok(()) => succeeded.push(id.clone()),
                        Err(e) => {
                            warn!("Label update failed for {}: {:#}", id, e);
                            if first_error.is_none() {
                                first_error = Some(e);
                            }
                        }
                    }
                }
                match first_error {
                    None => Ok(()),
                    Some(error) => Err(DispatchFailure { succeeded, error }),
                }
            }
        }
    }

    /// Thread-marked ids go through the thread endpoint
    async fn send_one(&self, id: &ItemId, delta: &LabelDelta) -> anyhow::Result<()> {
        match id.target() {
            Target::Message(message_id) => self.transport.update_labels(message_id, delta).await,
            Target::Thread(thread_id) => self.transport.update_thread_labels(thread_id, delta).await,
        }
    }

    /// Apply the label change to every cached copy, remove ids from the
    /// originating folder and mark related folders stale
    fn reconcile(&self, transition: Transition, scope: &CacheKey, ids: &[ItemId]) -> usize {
        let relabeled = self.cache.apply_labels(&scope.user_id, ids, &transition.delta());
        let removed = self.cache.remove_items(&scope.user_id, &scope.folder, ids);
        self.cache.invalidate(&scope.user_id, &transition.invalidates());
        debug!("Relabeled {} cached rows after {}", relabeled, transition.verb());
        removed
    }
}

/// Drop repeated targets, keeping first occurrence
fn dedup(ids: &[ItemId]) -> Vec<ItemId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().filter(|id| seen.insert(id.bare())).cloned().collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Folder, ThreadSummary, labels};
    use crate::transport::{InMemoryTransport, Page, TransportCall};
    use chrono::{TimeZone, Utc};
    use tokio_test::block_on;

    fn item(id: &str, labels: &[&str]) -> ThreadSummary {
        ThreadSummary::new(ItemId::new(id), Utc.timestamp_opt(1_700_000_000, 0).unwrap())
            .with_labels(labels.iter().copied())
    }

    fn ids(raw: &[&str]) -> Vec<ItemId> {
        raw.iter().map(|id| ItemId::new(*id)).collect()
    }

    fn setup(items: Vec<ThreadSummary>, config: EngineConfig) -> (Arc<InMemoryTransport>, ActionHandler, CacheKey) {
        let transport = Arc::new(InMemoryTransport::with_items(items.clone()));
        let cache = Arc::new(PageCache::new());
        let scope = CacheKey::new("u1", Folder::Inbox);
        cache.store_first_page(&scope, Page::new(items, None));
        let handler = ActionHandler::new(transport.clone(), cache, &config);
        (transport, handler, scope)
    }

    fn inbox_items() -> Vec<ThreadSummary> {
        vec![
            item("a", &[labels::INBOX]),
            item("b", &[labels::INBOX]),
            item("c", &[labels::INBOX, labels::SENT]),
            item("d", &[labels::INBOX]),
        ]
    }

    fn cached_ids(handler: &ActionHandler, key: &CacheKey) -> Vec<String> {
        handler
            .cache()
            .snapshot(key)
            .map(|e| e.items().iter().map(|i| i.id.as_str().to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_archive_single_uses_update_labels() {
        let (transport, handler, scope) = setup(inbox_items(), EngineConfig::default());
        let outcome = block_on(handler.archive(&scope, &ids(&["a"]))).unwrap();
        assert_eq!(outcome.affected_count(), 1);
        assert_eq!(outcome.removed, 1);
        assert!(matches!(
            transport.calls().as_slice(),
            [TransportCall::UpdateLabels { item_id, .. }] if item_id == "a"
        ));
        assert_eq!(cached_ids(&handler, &scope), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_thread_marker_uses_thread_endpoint() {
        let (transport, handler, scope) = setup(inbox_items(), EngineConfig::default());
        block_on(handler.archive(&scope, &[ItemId::thread("b")])).unwrap();
        assert!(matches!(
            transport.calls().as_slice(),
            [TransportCall::UpdateThreadLabels { thread_id, .. }] if thread_id == "thread:b"
        ));
        assert_eq!(cached_ids(&handler, &scope), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_mark_spam_skips_sent() {
        let (transport, handler, scope) = setup(inbox_items(), EngineConfig::default());
        let outcome = block_on(handler.mark_spam(&scope, &ids(&["a", "b", "c", "d"]))).unwrap();
        assert_eq!(outcome.affected_count(), 3);
        assert_eq!(outcome.skipped, ids(&["c"]));
        assert_eq!(outcome.message(), "3 items marked as spam, 1 skipped");

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            TransportCall::BatchUpdateLabels { item_ids, .. } => {
                assert_eq!(item_ids, &vec!["a".to_string(), "b".into(), "d".into()]);
            }
            other => panic!("unexpected call {:?}", other),
        }
        assert_eq!(cached_ids(&handler, &scope), vec!["c"]);
    }

    #[test]
    fn test_mark_spam_all_sent_is_empty_batch() {
        let (transport, handler, scope) = setup(inbox_items(), EngineConfig::default());
        let err = block_on(handler.mark_spam(&scope, &ids(&["c"]))).unwrap_err();
        assert!(matches!(err, ActionError::EmptyBatch { skipped: 1, .. }));
        assert_eq!(transport.mutation_count(), 0);
    }

    #[test]
    fn test_refused_in_wrong_folder() {
        let (transport, handler, _) = setup(inbox_items(), EngineConfig::default());
        let spam = CacheKey::new("u1", Folder::Spam);
        let err = block_on(handler.archive(&spam, &ids(&["a"]))).unwrap_err();
        assert!(matches!(err, ActionError::PolicyViolation(_)));
        let err = block_on(handler.mark_spam(&CacheKey::new("u1", Folder::Archive), &ids(&["a"])))
            .unwrap_err();
        assert!(matches!(err, ActionError::PolicyViolation(_)));
        assert_eq!(transport.mutation_count(), 0);
    }

    #[test]
    fn test_remote_failure_leaves_cache() {
        let (transport, handler, scope) = setup(inbox_items(), EngineConfig::default());
        transport.set_fail_all(true);
        let err = block_on(handler.archive(&scope, &ids(&["a", "b"]))).unwrap_err();
        assert_eq!(err.to_string(), "Error archiving selected items");
        assert_eq!(cached_ids(&handler, &scope), vec!["a", "b", "c", "d"]);
        assert!(!handler.cache().snapshot(&scope).unwrap().is_stale());
    }

    #[test]
    fn test_per_item_every_reduction() {
        let config = EngineConfig {
            batch_strategy: BatchStrategy::PerItem,
            ..Default::default()
        };
        let (transport, handler, scope) = setup(inbox_items(), config);
        transport.fail_for("b");
        let err = block_on(handler.archive(&scope, &ids(&["a", "b", "d"]))).unwrap_err();
        assert!(matches!(err, ActionError::RemoteFailure { .. }));
        assert_eq!(transport.mutation_count(), 3);
        // "a" and "d" changed remotely but the view is untouched
        assert!(!transport.item("a").unwrap().labels.contains(labels::INBOX));
        assert_eq!(cached_ids(&handler, &scope), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_per_item_partial_reconcile() {
        let config = EngineConfig {
            batch_strategy: BatchStrategy::PerItem,
            reconcile_partial_success: true,
            ..Default::default()
        };
        let (transport, handler, scope) = setup(inbox_items(), config);
        transport.fail_for("b");
        assert!(block_on(handler.archive(&scope, &ids(&["a", "b"]))).is_err());
        assert_eq!(cached_ids(&handler, &scope), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_invalidates_related_folders() {
        let (_, handler, scope) = setup(inbox_items(), EngineConfig::default());
        let archive = CacheKey::new("u1", Folder::Archive);
        let spam = CacheKey::new("u1", Folder::Spam);
        handler.cache().store_first_page(&archive, Page::default());
        handler.cache().store_first_page(&spam, Page::default());

        block_on(handler.archive(&scope, &ids(&["a"]))).unwrap();
        assert!(handler.cache().needs_refresh(&archive));
        assert!(!handler.cache().needs_refresh(&spam));
    }

    #[test]
    fn test_mark_read_and_unread() {
        let items = vec![item("a", &[labels::INBOX]).unread(true)];
        let (transport, handler, scope) = setup(items, EngineConfig::default());
        assert_eq!(block_on(handler.mark_read("u1", &ids(&["a"]))).unwrap(), 1);
        assert!(!handler.cache().snapshot(&scope).unwrap().items()[0].is_unread);

        transport.set_fail_all(true);
        let err = block_on(handler.mark_unread("u1", &ids(&["a"]))).unwrap_err();
        assert_eq!(err.to_string(), "Error marking as unread selected items");
        assert!(!handler.cache().snapshot(&scope).unwrap().items()[0].is_unread);
    }

    #[test]
    fn test_mark_read_on_open_keeps_flag_on_failure() {
        let items = vec![item("a", &[labels::INBOX]).unread(true)];
        let (transport, handler, scope) = setup(items.clone(), EngineConfig::default());
        transport.set_fail_all(true);
        assert!(!block_on(handler.mark_read_on_open("u1", &ItemId::new("a"))));
        assert!(!handler.cache().snapshot(&scope).unwrap().items()[0].is_unread);

        let config = EngineConfig {
            rollback_failed_mark_read: true,
            ..Default::default()
        };
        let (transport, handler, scope) = setup(items, config);
        transport.set_fail_all(true);
        assert!(!block_on(handler.mark_read_on_open("u1", &ItemId::new("a"))));
        assert!(handler.cache().snapshot(&scope).unwrap().items()[0].is_unread);
    }

    #[test]
    fn test_thread_row_archive_uses_thread_endpoint() {
        let mut items = inbox_items();
        items.push(item("b2", &[labels::INBOX]).with_thread_id("t-b"));
        items[1] = item("b", &[labels::INBOX]).with_thread_id("t-b");
        let (transport, handler, scope) = setup(items, EngineConfig::default());

        let outcome = block_on(handler.archive(&scope, &[ItemId::thread("t-b")])).unwrap();
        assert_eq!(outcome.removed, 2);
        assert!(matches!(
            transport.calls().as_slice(),
            [TransportCall::UpdateThreadLabels { thread_id, .. }] if thread_id == "thread:t-b"
        ));
        assert_eq!(cached_ids(&handler, &scope), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_reconcile_relabels_other_views() {
        let x = item("x", &[labels::SPAM, "Work"]);
        let transport = Arc::new(InMemoryTransport::with_items(vec![x.clone()]));
        let cache = Arc::new(PageCache::new());
        let spam = CacheKey::new("u1", Folder::Spam);
        let work = CacheKey::new("u1", Folder::Custom("Work".into()));
        cache.store_first_page(&spam, Page::new(vec![x.clone()], None));
        cache.store_first_page(&work, Page::new(vec![x], None));
        let handler = ActionHandler::new(transport.clone(), cache, &EngineConfig::default());

        block_on(handler.move_to_inbox(&spam, &ids(&["x"]))).unwrap();
        let cached = handler.cache().labels_of_each(&work, &ids(&["x"]));
        assert_eq!(cached, vec![Some(transport.item("x").unwrap().labels)]);

        // The refreshed labels make the item archivable from the custom folder
        let outcome = block_on(handler.archive(&work, &ids(&["x"]))).unwrap();
        assert_eq!(outcome.affected_count(), 1);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_dedup_targets() {
        let (transport, handler, scope) = setup(inbox_items(), EngineConfig::default());
        let outcome = block_on(handler.archive(&scope, &[ItemId::new("a"), ItemId::thread("a")])).unwrap();
        assert_eq!(outcome.affected_count(), 1);
        assert_eq!(transport.mutation_count(), 1);
    }
}
