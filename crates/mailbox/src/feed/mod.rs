//! Paginated feed loading
//!
//! A [`FeedLoader`] owns the paging state machine for the active feed and
//! writes fetched pages into the shared [`PageCache`](crate::cache::PageCache).

mod loader;

pub use loader::{FeedLoader, FeedPhase, PageTicket, ScrollMetrics};
