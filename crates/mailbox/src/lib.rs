//! Mailbox crate - Client state engine for a paginated mail view
//!
//! This crate keeps an in-memory, paginated view of email threads consistent
//! with user actions under optimistic updates:
//! - Domain models (ThreadSummary, ItemId, LabelSet, Folder)
//! - Folder policy for archive/spam/inbox transitions
//! - Selection state machine driven by an input-event stream
//! - Shared page cache with per-key locking
//! - Paginated feed loader with stale-response detection
//! - Action handler that reconciles the cache after remote confirmation
//!
//! The remote mail provider, notifications and the session are consumed
//! through traits and plain values; this crate has no UI dependencies.

pub mod actions;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod notify;
pub mod policy;
pub mod selection;
pub mod session;
pub mod transport;
pub mod view;

pub use actions::{ActionHandler, ActionOutcome};
pub use cache::{CacheEntry, CacheKey, PageCache};
pub use crate::config::{BatchStrategy, EngineConfig};
pub use error::{ActionError, FeedError};
pub use feed::{FeedLoader, FeedPhase, PageTicket, ScrollMetrics};
pub use models::{Folder, ItemId, LabelDelta, LabelSet, Target, ThreadSummary, labels};
pub use notify::{LogNotifier, Notice, NoticeLevel, Notifier, RecordingNotifier};
pub use policy::{PolicyRefusal, Transition};
pub use selection::{
    Activation, InputEvent, Key, KeyChord, Modifiers, SelectAllResult, SelectMode, SelectionState,
    Shortcut,
};
pub use session::Session;
pub use transport::{InMemoryTransport, MailTransport, Page, PageRequest, TransportCall};
pub use view::{ActionCompletion, Activated, MailboxView, PendingAction};
