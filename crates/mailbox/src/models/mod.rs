//! Domain models for mailbox entities

mod folder;
mod item;
mod label;
mod thread;

pub use folder::Folder;
pub use item::{ItemId, Target};
pub use label::{LabelDelta, LabelSet, labels};
pub use thread::ThreadSummary;
