//! Folder policy
//!
//! Pure rules mapping a folder to the labels it implies and deciding which
//! label transitions are legal. Consulted by the action handler before any
//! remote call is issued.

mod rules;

pub use rules::{
    PolicyRefusal, Transition, can_archive, can_mark_spam, can_move_to_inbox, check_folder,
    is_eligible, is_visible_in, labels_implied_by,
};
