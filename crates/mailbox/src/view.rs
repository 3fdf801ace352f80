//! Mailbox view: the context object the rendering layer drives
//!
//! Owns the selection state and feed loader of one open view and routes
//! user intents through the action handler. Every entry point resolves to an
//! outcome value and reports it to the notification sink.

use futures::future::BoxFuture;
use log::debug;
use std::sync::Arc;

use crate::actions::{ActionHandler, ActionOutcome};
use crate::cache::{CacheKey, PageCache};
use crate::config::EngineConfig;
use crate::error::{ActionError, FeedError};
use crate::feed::{FeedLoader, ScrollMetrics};
use crate::models::{Folder, ItemId, ThreadSummary};
use crate::notify::Notifier;
use crate::policy::{self, Transition};
use crate::selection::{Activation, InputEvent, SelectAllResult, SelectMode, SelectionState, Shortcut};
use crate::session::Session;
use crate::transport::MailTransport;

/// Result of activating a row
pub struct Activated {
    pub activation: Activation,
    /// Remote mark-read for an opened unread item. Spawn it or drop it;
    /// the local flag is already cleared.
    pub mark_read: Option<BoxFuture<'static, bool>>,
}

/// A mutation that has passed local checks and is ready to be sent.
///
/// Carries its originating feed so its result reconciles against that feed
/// even if the view has moved on by the time it completes.
pub struct PendingAction {
    actions: ActionHandler,
    transition: Transition,
    scope: CacheKey,
    targets: Vec<ItemId>,
    from_bulk: bool,
}

impl PendingAction {
    pub fn transition(&self) -> Transition {
        self.transition
    }

    pub fn targets(&self) -> &[ItemId] {
        &self.targets
    }

    pub async fn run(self) -> ActionCompletion {
        let result = self
            .actions
            .apply(self.transition, &self.scope, &self.targets)
            .await;
        ActionCompletion {
            result,
            scope: self.scope,
            from_bulk: self.from_bulk,
        }
    }
}

/// A finished mutation, to be handed back to [`MailboxView::finish`]
pub struct ActionCompletion {
    pub result: Result<ActionOutcome, ActionError>,
    scope: CacheKey,
    from_bulk: bool,
}

pub struct MailboxView {
    session: Session,
    config: EngineConfig,
    transport: Arc<dyn MailTransport>,
    actions: ActionHandler,
    feed: FeedLoader,
    selection: SelectionState,
    notifier: Arc<dyn Notifier>,
}

impl MailboxView {
    pub fn new(
        session: Session,
        transport: Arc<dyn MailTransport>,
        cache: Arc<PageCache>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        let actions = ActionHandler::new(transport.clone(), cache.clone(), &config);
        let feed = FeedLoader::new(cache, config.page_size);
        Self {
            session,
            config,
            transport,
            actions,
            feed,
            selection: SelectionState::new(),
            notifier,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn feed(&self) -> &FeedLoader {
        &self.feed
    }

    pub fn actions(&self) -> &ActionHandler {
        &self.actions
    }

    pub fn folder(&self) -> Option<&Folder> {
        self.feed.key().map(|key| &key.folder)
    }

    // -- Feed --

    /// Open a folder with no filter. Resets selection.
    pub async fn open_folder(&mut self, folder: Folder) -> Result<usize, FeedError> {
        let key = CacheKey::new(self.session.user_id.clone(), folder);
        self.open(key).await
    }

    /// Open a feed by key. Resets selection; fetches the first page if the
    /// cache has nothing usable.
    pub async fn open(&mut self, key: CacheKey) -> Result<usize, FeedError> {
        if self.session.require_connection().is_err() {
            return Err(FeedError::Unauthenticated);
        }
        self.selection.reset();
        match self.feed.open(key) {
            Some(ticket) => self.feed.load(self.transport.as_ref(), ticket).await,
            None => Ok(0),
        }
    }

    /// Refetch the first page if the active feed was invalidated
    pub async fn refresh(&mut self) -> Result<usize, FeedError> {
        if self.feed.key().is_none() {
            return Err(FeedError::NotOpen);
        }
        match self.feed.refresh_if_stale() {
            Some(ticket) => self.feed.load(self.transport.as_ref(), ticket).await,
            None => Ok(0),
        }
    }

    /// Load the next page when the viewport nears the end of the list
    pub async fn on_scroll(&mut self, metrics: ScrollMetrics) -> Result<usize, FeedError> {
        let row_height = self.row_height();
        if !self
            .feed
            .should_load_more(&metrics, row_height, self.config.load_threshold_rows)
        {
            return Ok(0);
        }
        match self.feed.begin_next_page() {
            Some(ticket) => self.feed.load(self.transport.as_ref(), ticket).await,
            None => Ok(0),
        }
    }

    /// Tear the view down and drop its cache entry
    pub fn close(&mut self) {
        self.selection.reset();
        if let Some(key) = self.feed.close() {
            debug!("Closing view for {}", key);
            self.actions.cache().evict(&key);
        }
    }

    /// Rows to render: loaded items passing the folder's display filter
    pub fn rows(&self) -> Vec<ThreadSummary> {
        let items = self.feed.items();
        match self.folder() {
            Some(folder) => items
                .into_iter()
                .filter(|item| policy::is_visible_in(folder, &item.labels))
                .collect(),
            None => items,
        }
    }

    pub fn visible_ids(&self) -> Vec<ItemId> {
        self.rows().into_iter().map(|item| item.id).collect()
    }

    pub fn loaded_ids(&self) -> Vec<ItemId> {
        self.feed.items().into_iter().map(|item| item.id).collect()
    }

    pub fn has_more(&self) -> bool {
        self.feed.has_more()
    }

    pub fn is_loading_more(&self) -> bool {
        self.feed.is_loading_more()
    }

    pub fn row_height(&self) -> f64 {
        self.config.effective_row_height()
    }

    // -- Selection --

    pub fn set_mode(&mut self, mode: SelectMode) {
        self.selection.set_mode(mode);
    }

    /// Feed an input event and run any bulk shortcut it triggers
    pub async fn handle_input(&mut self, event: &InputEvent) -> Option<Shortcut> {
        let shortcut = self.selection.handle(event)?;
        debug!("Shortcut {:?}", shortcut);
        match shortcut {
            Shortcut::SelectAll => {
                self.select_all();
            }
            Shortcut::MarkRead => {
                let _ = self.mark_read_selected().await;
            }
            Shortcut::MarkUnread => {
                let _ = self.mark_unread_selected().await;
            }
        }
        Some(shortcut)
    }

    /// Activate (click) a row under the current mode.
    ///
    /// Rows inside a thread open as a thread target. Opening an unread item
    /// clears its unread flag locally and returns the remote mark-read call.
    pub fn activate(&mut self, id: &ItemId) -> Activated {
        let rows = self.rows();
        let item = rows.iter().find(|row| row.is_named_by(id));
        let open_id = item.map(ThreadSummary::open_id);
        let visible: Vec<ItemId> = rows.iter().map(|row| row.id.clone()).collect();

        let activation = self.selection.activate(id, open_id.as_ref(), &visible);
        let mark_read = match (&activation, item) {
            (Activation::Opened(_), Some(row))
                if row.is_unread && self.session.require_connection().is_ok() =>
            {
                Some(
                    self.actions
                        .mark_read_on_open(&self.session.user_id, &row.id),
                )
            }
            _ => None,
        };
        Activated {
            activation,
            mark_read,
        }
    }

    /// Select every loaded row, or deselect all if anything is selected
    pub fn select_all(&mut self) -> SelectAllResult {
        self.selection.reset_mode();
        let result = self.selection.select_all(&self.loaded_ids());
        match result {
            SelectAllResult::Selected(count) => {
                self.notifier.info(&format!("Selected {} emails", count));
            }
            SelectAllResult::Deselected => self.notifier.info("Deselected all emails"),
            SelectAllResult::NothingToSelect => self.notifier.info("No emails to select"),
        }
        result
    }

    // -- Mutations --

    pub async fn archive_selected(&mut self) -> Result<ActionOutcome, ActionError> {
        self.run_transition(Transition::Archive).await
    }

    pub async fn mark_spam_selected(&mut self) -> Result<ActionOutcome, ActionError> {
        self.run_transition(Transition::MarkSpam).await
    }

    pub async fn move_to_inbox_selected(&mut self) -> Result<ActionOutcome, ActionError> {
        self.run_transition(Transition::MoveToInbox).await
    }

    /// Check preconditions and capture the current targets.
    ///
    /// Targets are the bulk selection when non-empty, else the open item.
    /// The returned action can be run concurrently with others.
    pub fn begin(&self, transition: Transition) -> Result<PendingAction, ActionError> {
        self.session.require_connection()?;
        let scope = self.feed.key().cloned().ok_or(ActionError::NothingSelected)?;
        let from_bulk = !self.selection.bulk_selected().is_empty();
        let targets = if from_bulk {
            self.selection.bulk_ids()
        } else {
            self.selection.selected().cloned().into_iter().collect()
        };
        if targets.is_empty() {
            return Err(ActionError::NothingSelected);
        }
        Ok(PendingAction {
            actions: self.actions.clone(),
            transition,
            scope,
            targets,
            from_bulk,
        })
    }

    /// Apply a finished mutation to the selection and notify
    pub fn finish(&mut self, completion: ActionCompletion) -> Result<ActionOutcome, ActionError> {
        match &completion.result {
            Ok(outcome) => {
                if self.feed.key() == Some(&completion.scope) {
                    self.selection
                        .forget(&outcome.affected, self.config.close_selected_on_mutation);
                    if completion.from_bulk {
                        self.selection.clear_bulk();
                    }
                }
                self.notifier.success(&outcome.message());
            }
            Err(e) => self.notifier.error(&e.to_string()),
        }
        completion.result
    }

    async fn run_transition(&mut self, transition: Transition) -> Result<ActionOutcome, ActionError> {
        let pending = match self.begin(transition) {
            Ok(pending) => pending,
            Err(e) => {
                self.notifier.error(&e.to_string());
                return Err(e);
            }
        };
        let completion = pending.run().await;
        self.finish(completion)
    }

    pub async fn mark_read_selected(&mut self) -> Result<usize, ActionError> {
        self.set_read_selected(false).await
    }

    pub async fn mark_unread_selected(&mut self) -> Result<usize, ActionError> {
        self.set_read_selected(true).await
    }

    async fn set_read_selected(&mut self, unread: bool) -> Result<usize, ActionError> {
        let state = if unread { "unread" } else { "read" };
        let result = self.try_set_read_selected(unread).await;
        match &result {
            Ok(_) => {
                self.selection.clear_bulk();
                self.notifier.success(&format!("Marked as {}", state));
            }
            Err(ActionError::NothingSelected) => {}
            Err(_) => self.notifier.error(&format!("Failed to mark as {}", state)),
        }
        result
    }

    async fn try_set_read_selected(&self, unread: bool) -> Result<usize, ActionError> {
        self.session.require_connection()?;
        let ids = self.selection.bulk_ids();
        if ids.is_empty() {
            return Err(ActionError::NothingSelected);
        }
        let user_id = &self.session.user_id;
        if unread {
            self.actions.mark_unread(user_id, &ids).await
        } else {
            self.actions.mark_read(user_id, &ids).await
        }
    }
}
