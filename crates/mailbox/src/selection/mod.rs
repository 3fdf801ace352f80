//! Selection state machine
//!
//! Tracks the open item, the bulk selection and the active selection mode.
//! Modifier keys arrive as an explicit input-event stream so the machine can
//! be driven without a window or event loop.

mod keys;
mod state;

pub use keys::{ChordParseError, InputEvent, Key, KeyChord, Modifiers, Shortcut};
pub use state::{Activation, SelectAllResult, SelectMode, SelectionState};
