//! Page cache shared by every view of a folder
//!
//! Entries are keyed by (user, folder, label filter, query). Each entry sits
//! behind its own mutex so concurrent writers on a multi-threaded runtime are
//! serialised per key. The feed loader appends pages; the action handler only
//! removes ids and marks entries stale.

mod entry;
mod key;
mod store;

pub use entry::CacheEntry;
pub use key::CacheKey;
pub use store::PageCache;
