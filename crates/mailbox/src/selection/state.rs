//! Selection state and its transitions

use indexmap::IndexSet;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::keys::{InputEvent, Key, KeyChord, Shortcut};
use crate::models::ItemId;

/// Active selection mode. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectMode {
    /// No modifier held: clicking opens an item
    #[default]
    Single,
    /// Ctrl/Cmd held: clicking toggles bulk membership
    Mass,
    /// Shift held: clicking selects a contiguous range
    Range,
    /// Alt+Shift held: clicking selects everything below
    SelectAllBelow,
}

/// Result of activating an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// Mass mode toggled the item; `selected` is its new membership
    Toggled { selected: bool },
    /// Range or select-all-below replaced the bulk selection with `count` ids
    BulkReplaced { count: usize },
    /// Anchor or target was not in the ordered list; nothing changed
    NotFound,
    /// Single mode opened the item under this id
    Opened(ItemId),
    /// Single mode closed the already-open item
    Closed,
}

/// Result of the select-all command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectAllResult {
    Selected(usize),
    Deselected,
    NothingToSelect,
}

/// The open item: the row that was clicked and the id it was opened under
#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenItem {
    row: ItemId,
    id: ItemId,
}

/// Selection state of one mailbox view
///
/// Bulk membership is keyed by bare row id.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    open: Option<OpenItem>,
    bulk: IndexSet<ItemId>,
    mode: SelectMode,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the open item was opened under; thread-marked for thread rows
    pub fn selected(&self) -> Option<&ItemId> {
        self.open.as_ref().map(|open| &open.id)
    }

    /// Row id of the open item
    pub fn selected_row(&self) -> Option<&ItemId> {
        self.open.as_ref().map(|open| &open.row)
    }

    /// Bulk-selected ids in insertion order
    pub fn bulk_selected(&self) -> &IndexSet<ItemId> {
        &self.bulk
    }

    pub fn bulk_ids(&self) -> Vec<ItemId> {
        self.bulk.iter().cloned().collect()
    }

    pub fn is_bulk_selected(&self, id: &ItemId) -> bool {
        self.bulk.contains(id.bare())
    }

    pub fn mode(&self) -> SelectMode {
        self.mode
    }

    /// Enter a mode. The last mode entered wins.
    pub fn set_mode(&mut self, mode: SelectMode) {
        if self.mode != mode {
            debug!("Selection mode {:?} -> {:?}", self.mode, mode);
        }
        self.mode = mode;
    }

    /// Return to single mode
    pub fn reset_mode(&mut self) {
        self.set_mode(SelectMode::Single);
    }

    /// Feed one input event. Returns a shortcut the caller should execute.
    pub fn handle(&mut self, event: &InputEvent) -> Option<Shortcut> {
        match event {
            InputEvent::KeyDown(chord) => self.on_key_down(chord),
            InputEvent::KeyUp(key) => {
                self.on_key_up(key);
                None
            }
            InputEvent::Blur => {
                self.on_blur();
                None
            }
        }
    }

    /// Key pressed: enter a mode, or recognise a bulk shortcut.
    ///
    /// Shortcuts reset the mode to single before they are returned.
    pub fn on_key_down(&mut self, chord: &KeyChord) -> Option<Shortcut> {
        let held = chord.modifiers;
        match &chord.key {
            Key::Control | Key::Meta => {
                self.set_mode(SelectMode::Mass);
                None
            }
            Key::Shift if held.alt => {
                self.set_mode(SelectMode::SelectAllBelow);
                None
            }
            Key::Shift => {
                self.set_mode(SelectMode::Range);
                None
            }
            Key::Alt if held.shift => {
                self.set_mode(SelectMode::SelectAllBelow);
                None
            }
            Key::Char(c) if held.command() => {
                let shortcut = match (c, held.shift) {
                    ('a' | 'n', false) => Shortcut::SelectAll,
                    ('i', true) => Shortcut::MarkRead,
                    ('u', true) => Shortcut::MarkUnread,
                    _ => return None,
                };
                self.reset_mode();
                Some(shortcut)
            }
            _ => None,
        }
    }

    /// Key released: leave the mode owned by that modifier
    pub fn on_key_up(&mut self, key: &Key) {
        let owned = match key {
            Key::Control | Key::Meta => self.mode == SelectMode::Mass,
            Key::Shift => matches!(self.mode, SelectMode::Range | SelectMode::SelectAllBelow),
            Key::Alt => self.mode == SelectMode::SelectAllBelow,
            _ => false,
        };
        if owned {
            self.reset_mode();
        }
    }

    /// Window lost focus: no modifier can still be held
    pub fn on_blur(&mut self) {
        self.reset_mode();
    }

    /// Activate (click) a row under the current mode.
    ///
    /// `ordered` is the visible feed in display order. In single mode the row
    /// is opened under `open_id` when given, else under its own id.
    pub fn activate(
        &mut self,
        id: &ItemId,
        open_id: Option<&ItemId>,
        ordered: &[ItemId],
    ) -> Activation {
        match self.mode {
            SelectMode::Mass => {
                let selected = self.toggle(id);
                Activation::Toggled { selected }
            }
            SelectMode::Range => {
                let anchor = self
                    .bulk
                    .last()
                    .or(self.selected_row())
                    .unwrap_or(id)
                    .clone();
                let (Some(start), Some(end)) = (position(ordered, &anchor), position(ordered, id))
                else {
                    return Activation::NotFound;
                };
                let (lo, hi) = (start.min(end), start.max(end));
                self.bulk = ordered[lo..=hi].iter().map(ItemId::bare_id).collect();
                Activation::BulkReplaced {
                    count: self.bulk.len(),
                }
            }
            SelectMode::SelectAllBelow => {
                let Some(start) = position(ordered, id) else {
                    return Activation::NotFound;
                };
                self.bulk = ordered[start..].iter().map(ItemId::bare_id).collect();
                Activation::BulkReplaced {
                    count: self.bulk.len(),
                }
            }
            SelectMode::Single => {
                let row = id.bare_id();
                let open_id = open_id.cloned().unwrap_or_else(|| row.clone());
                let already_open = self
                    .open
                    .as_ref()
                    .is_some_and(|current| current.row == row || current.id == open_id);
                self.bulk.clear();
                if already_open {
                    self.open = None;
                    Activation::Closed
                } else {
                    self.open = Some(OpenItem {
                        row,
                        id: open_id.clone(),
                    });
                    Activation::Opened(open_id)
                }
            }
        }
    }

    /// Select every loaded id, or deselect all if anything is bulk-selected
    pub fn select_all(&mut self, loaded: &[ItemId]) -> SelectAllResult {
        if !self.bulk.is_empty() {
            self.bulk.clear();
            SelectAllResult::Deselected
        } else if loaded.is_empty() {
            SelectAllResult::NothingToSelect
        } else {
            self.bulk = loaded.iter().map(ItemId::bare_id).collect();
            SelectAllResult::Selected(self.bulk.len())
        }
    }

    pub fn clear_bulk(&mut self) {
        self.bulk.clear();
    }

    /// Close the open item
    pub fn close(&mut self) {
        self.open = None;
    }

    /// Drop ids that left the view. Closes the open item if it was among them.
    pub fn forget(&mut self, ids: &[ItemId], close_selected: bool) {
        let gone: HashSet<&str> = ids.iter().map(ItemId::bare).collect();
        self.bulk.retain(|b| !gone.contains(b.bare()));
        if close_selected
            && self
                .open
                .as_ref()
                .is_some_and(|open| gone.contains(open.row.bare()) || gone.contains(open.id.bare()))
        {
            self.open = None;
        }
    }

    /// Full reset, used on folder change
    pub fn reset(&mut self) {
        self.open = None;
        self.bulk.clear();
        self.mode = SelectMode::Single;
    }

    fn toggle(&mut self, id: &ItemId) -> bool {
        if self.bulk.shift_remove(id.bare()) {
            false
        } else {
            self.bulk.insert(id.bare_id());
            true
        }
    }
}

fn position(ordered: &[ItemId], id: &ItemId) -> Option<usize> {
    ordered.iter().position(|o| o.same_item(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Modifiers;

    fn ids(names: &[&str]) -> Vec<ItemId> {
        names.iter().map(|n| ItemId::new(*n)).collect()
    }

    fn chord(s: &str) -> KeyChord {
        s.parse().unwrap()
    }

    #[test]
    fn test_mass_toggle_keeps_odd_activations() {
        let list = ids(&["a", "b", "c", "d"]);
        let mut state = SelectionState::new();
        state.set_mode(SelectMode::Mass);

        for name in ["a", "b", "a", "c", "b", "b"] {
            state.activate(&ItemId::new(name), None, &list);
        }

        // a: 2x, b: 3x, c: 1x
        assert_eq!(state.bulk_ids(), ids(&["c", "b"]));
        assert!(state.selected().is_none());
    }

    #[test]
    fn test_range_is_order_independent() {
        let list = ids(&["a", "b", "c", "d", "e"]);

        let mut forward = SelectionState::new();
        forward.set_mode(SelectMode::Mass);
        forward.activate(&ItemId::new("b"), None, &list);
        forward.set_mode(SelectMode::Range);
        forward.activate(&ItemId::new("d"), None, &list);
        assert_eq!(forward.bulk_ids(), ids(&["b", "c", "d"]));

        let mut backward = SelectionState::new();
        backward.set_mode(SelectMode::Mass);
        backward.activate(&ItemId::new("d"), None, &list);
        backward.set_mode(SelectMode::Range);
        backward.activate(&ItemId::new("b"), None, &list);
        assert_eq!(backward.bulk_ids(), ids(&["b", "c", "d"]));
    }

    #[test]
    fn test_range_anchors_on_open_item() {
        let list = ids(&["a", "b", "c", "d"]);
        let mut state = SelectionState::new();
        state.activate(&ItemId::new("d"), None, &list);
        state.set_mode(SelectMode::Range);

        let result = state.activate(&ItemId::new("b"), None, &list);
        assert_eq!(result, Activation::BulkReplaced { count: 3 });
        assert_eq!(state.bulk_ids(), ids(&["b", "c", "d"]));
    }

    #[test]
    fn test_range_without_anchor_selects_target() {
        let list = ids(&["a", "b", "c"]);
        let mut state = SelectionState::new();
        state.set_mode(SelectMode::Range);
        state.activate(&ItemId::new("b"), None, &list);
        assert_eq!(state.bulk_ids(), ids(&["b"]));
    }

    #[test]
    fn test_range_with_missing_anchor_is_noop() {
        let list = ids(&["a", "b", "c"]);
        let mut state = SelectionState::new();
        state.set_mode(SelectMode::Mass);
        state.activate(&ItemId::new("gone"), None, &list);
        state.set_mode(SelectMode::Range);

        assert_eq!(
            state.activate(&ItemId::new("c"), None, &list),
            Activation::NotFound
        );
        assert_eq!(state.bulk_ids(), ids(&["gone"]));
    }

    #[test]
    fn test_select_all_below() {
        let list = ids(&["a", "b", "c", "d"]);
        let mut state = SelectionState::new();
        state.set_mode(SelectMode::SelectAllBelow);
        state.activate(&ItemId::new("b"), None, &list);
        assert_eq!(state.bulk_ids(), ids(&["b", "c", "d"]));
    }

    #[test]
    fn test_single_opens_thread_id_and_clears_bulk() {
        let list = ids(&["a", "b"]);
        let mut state = SelectionState::new();
        state.set_mode(SelectMode::Mass);
        state.activate(&ItemId::new("a"), None, &list);
        state.reset_mode();

        let thread = ItemId::thread("t-b");
        let result = state.activate(&ItemId::new("b"), Some(&thread), &list);
        assert_eq!(result, Activation::Opened(ItemId::thread("t-b")));
        assert_eq!(state.selected(), Some(&ItemId::thread("t-b")));
        assert_eq!(state.selected_row(), Some(&ItemId::new("b")));
        assert!(state.bulk_selected().is_empty());

        // Activating the open item again closes it
        assert_eq!(
            state.activate(&ItemId::new("b"), Some(&thread), &list),
            Activation::Closed
        );
        assert!(state.selected().is_none());
    }

    #[test]
    fn test_range_anchors_on_row_of_open_thread() {
        let list = ids(&["a", "b", "c", "d"]);
        let mut state = SelectionState::new();
        state.activate(&ItemId::new("b"), Some(&ItemId::thread("t-b")), &list);
        state.set_mode(SelectMode::Range);

        let result = state.activate(&ItemId::new("d"), None, &list);
        assert_eq!(result, Activation::BulkReplaced { count: 3 });
        assert_eq!(state.bulk_ids(), ids(&["b", "c", "d"]));
    }

    #[test]
    fn test_bulk_is_keyed_by_bare_id() {
        let list = ids(&["a", "b"]);
        let mut state = SelectionState::new();
        state.set_mode(SelectMode::Mass);
        state.activate(&ItemId::new("a"), None, &list);

        assert!(state.is_bulk_selected(&ItemId::thread("a")));
        assert_eq!(
            state.activate(&ItemId::thread("a"), None, &list),
            Activation::Toggled { selected: false }
        );
        assert!(!state.is_bulk_selected(&ItemId::new("a")));
    }

    #[test]
    fn test_forget_closes_open_thread() {
        let list = ids(&["a", "b"]);
        let mut state = SelectionState::new();
        state.activate(&ItemId::new("b"), Some(&ItemId::thread("t-b")), &list);

        state.forget(&[ItemId::thread("t-b")], true);
        assert!(state.selected().is_none());
    }

    #[test]
    fn test_select_all_toggles() {
        let list = ids(&["a", "b", "c"]);
        let mut state = SelectionState::new();
        assert_eq!(state.select_all(&list), SelectAllResult::Selected(3));
        assert_eq!(state.select_all(&list), SelectAllResult::Deselected);
        assert!(state.bulk_selected().is_empty());
        assert_eq!(state.select_all(&[]), SelectAllResult::NothingToSelect);
    }

    #[test]
    fn test_modifier_transitions_last_pressed_wins() {
        let mut state = SelectionState::new();
        state.on_key_down(&chord("Control"));
        assert_eq!(state.mode(), SelectMode::Mass);

        state.on_key_down(&chord("Shift"));
        assert_eq!(state.mode(), SelectMode::Range);

        state.on_key_down(&chord("Alt+Shift"));
        assert_eq!(state.mode(), SelectMode::SelectAllBelow);

        // Releasing Control does not leave a mode it no longer owns
        state.on_key_up(&Key::Control);
        assert_eq!(state.mode(), SelectMode::SelectAllBelow);

        state.on_key_up(&Key::Alt);
        assert_eq!(state.mode(), SelectMode::Single);
    }

    #[test]
    fn test_blur_returns_to_single() {
        let mut state = SelectionState::new();
        state.handle(&InputEvent::KeyDown(chord("Meta")));
        assert_eq!(state.mode(), SelectMode::Mass);
        state.handle(&InputEvent::Blur);
        assert_eq!(state.mode(), SelectMode::Single);
    }

    #[test]
    fn test_shortcuts_reset_mode() {
        let mut state = SelectionState::new();
        state.on_key_down(&chord("Control"));

        let modifiers = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        let shortcut = state.on_key_down(&KeyChord::new(Key::Char('a'), modifiers));
        assert_eq!(shortcut, Some(Shortcut::SelectAll));
        assert_eq!(state.mode(), SelectMode::Single);

        assert_eq!(
            state.on_key_down(&chord("Meta+Shift+i")),
            Some(Shortcut::MarkRead)
        );
        assert_eq!(
            state.on_key_down(&chord("Control+Shift+u")),
            Some(Shortcut::MarkUnread)
        );
        assert_eq!(state.on_key_down(&chord("Control+x")), None);
    }

    #[test]
    fn test_forget_closes_affected_open_item() {
        let list = ids(&["a", "b", "c"]);
        let mut state = SelectionState::new();
        state.activate(&ItemId::new("a"), None, &list);
        state.set_mode(SelectMode::Mass);
        state.activate(&ItemId::new("b"), None, &list);
        state.activate(&ItemId::new("c"), None, &list);

        state.forget(&ids(&["thread:a", "b"]), true);
        assert!(state.selected().is_none());
        assert_eq!(state.bulk_ids(), ids(&["c"]));
    }
}
