//! Label transition rules

use crate::models::{Folder, LabelDelta, LabelSet, labels};

/// A label-mutating transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Archive,
    MarkSpam,
    MoveToInbox,
}

/// Typed refusal of a transition by folder policy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyRefusal {
    #[error("Cannot archive emails from the spam folder")]
    ArchiveFromSpam,
    #[error("Can only mark emails as spam from the inbox")]
    SpamOutsideInbox,
}

impl Transition {
    /// The label delta sent to the transport
    pub fn delta(self) -> LabelDelta {
        match self {
            Self::Archive => LabelDelta::new(&[], &[labels::INBOX]),
            Self::MarkSpam => LabelDelta::new(&[labels::SPAM], &[labels::INBOX]),
            Self::MoveToInbox => LabelDelta::new(&[labels::INBOX], &[labels::SPAM]),
        }
    }

    /// Folders whose cached pages become stale after this transition succeeds
    pub fn invalidates(self) -> Vec<Folder> {
        match self {
            Self::Archive => vec![Folder::Inbox, Folder::Archive],
            Self::MarkSpam => vec![Folder::Inbox, Folder::Spam],
            Self::MoveToInbox => vec![Folder::Inbox, Folder::Spam, Folder::Archive],
        }
    }

    /// Past-tense phrase used in notifications
    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Archive => "archived",
            Self::MarkSpam => "marked as spam",
            Self::MoveToInbox => "moved to inbox",
        }
    }

    /// Infinitive phrase used in refusal messages
    pub fn verb(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::MarkSpam => "mark as spam",
            Self::MoveToInbox => "move to inbox",
        }
    }

    /// Progressive phrase used in failure notifications
    pub fn progressive(self) -> &'static str {
        match self {
            Self::Archive => "archiving",
            Self::MarkSpam => "marking as spam",
            Self::MoveToInbox => "moving to inbox",
        }
    }
}

/// Labels implied by viewing a folder
pub fn labels_implied_by(folder: &Folder) -> LabelSet {
    let mut labels = LabelSet::new();
    match folder {
        Folder::Inbox => {
            labels.insert(labels::INBOX);
        }
        Folder::Spam => {
            labels.insert(labels::SPAM);
        }
        Folder::Sent => {
            labels.insert(labels::SENT);
        }
        Folder::Trash => {
            labels.insert(labels::TRASH);
        }
        Folder::Drafts => {
            labels.insert(labels::DRAFTS);
        }
        Folder::Archive => {}
        Folder::Custom(label) => {
            labels.insert(label.clone());
        }
    }
    labels
}

/// False iff SPAM is present
pub fn can_archive(labels: &LabelSet) -> bool {
    !labels.contains(labels::SPAM)
}

/// True only from the inbox, and never for sent items
pub fn can_mark_spam(folder: &Folder, labels: &LabelSet) -> bool {
    *folder == Folder::Inbox && !labels.contains(labels::SENT)
}

/// The recovery path has no restriction
pub fn can_move_to_inbox(_labels: &LabelSet) -> bool {
    true
}

/// Folder-level check. A refusal rejects a whole batch.
pub fn check_folder(transition: Transition, folder: &Folder) -> Result<(), PolicyRefusal> {
    let implied = labels_implied_by(folder);
    match transition {
        Transition::Archive if !can_archive(&implied) => Err(PolicyRefusal::ArchiveFromSpam),
        Transition::MarkSpam if *folder != Folder::Inbox => Err(PolicyRefusal::SpamOutsideInbox),
        _ => Ok(()),
    }
}

/// Item-level check against the item's own labels.
///
/// Items failing this check are skipped from a batch rather than failing it.
pub fn is_eligible(transition: Transition, folder: &Folder, labels: &LabelSet) -> bool {
    match transition {
        Transition::Archive => can_archive(labels),
        Transition::MarkSpam => can_mark_spam(folder, labels),
        Transition::MoveToInbox => can_move_to_inbox(labels),
    }
}

/// Display filter: the inbox hides sent items, the sent view shows only them
pub fn is_visible_in(folder: &Folder, labels: &LabelSet) -> bool {
    match folder {
        Folder::Inbox => !labels.contains(labels::SENT),
        Folder::Sent => labels.contains(labels::SENT),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_set(items: &[&str]) -> LabelSet {
        items.iter().copied().collect()
    }

    #[test]
    fn test_labels_implied_by() {
        assert!(labels_implied_by(&Folder::Inbox).contains(labels::INBOX));
        assert!(labels_implied_by(&Folder::Spam).contains(labels::SPAM));
        assert!(labels_implied_by(&Folder::Archive).is_empty());
        assert!(labels_implied_by(&Folder::Custom("Work".into())).contains("Work"));
    }

    #[test]
    fn test_can_archive() {
        assert!(can_archive(&label_set(&["INBOX"])));
        assert!(!can_archive(&label_set(&["SPAM"])));
    }

    #[test]
    fn test_can_mark_spam() {
        assert!(can_mark_spam(&Folder::Inbox, &label_set(&["INBOX"])));
        assert!(!can_mark_spam(&Folder::Inbox, &label_set(&["INBOX", "SENT"])));
        assert!(!can_mark_spam(&Folder::Archive, &label_set(&[])));
        assert!(!can_mark_spam(&Folder::Sent, &label_set(&["SENT"])));
    }

    #[test]
    fn test_move_to_inbox_always_allowed() {
        assert!(can_move_to_inbox(&label_set(&["SPAM"])));
        for folder in [Folder::Spam, Folder::Archive, Folder::Inbox, Folder::Trash] {
            assert_eq!(check_folder(Transition::MoveToInbox, &folder), Ok(()));
        }
    }

    #[test]
    fn test_check_folder_refusals() {
        assert_eq!(
            check_folder(Transition::Archive, &Folder::Spam),
            Err(PolicyRefusal::ArchiveFromSpam)
        );
        assert_eq!(check_folder(Transition::Archive, &Folder::Inbox), Ok(()));
        assert_eq!(
            check_folder(Transition::MarkSpam, &Folder::Archive),
            Err(PolicyRefusal::SpamOutsideInbox)
        );
        assert_eq!(check_folder(Transition::MarkSpam, &Folder::Inbox), Ok(()));
    }

    #[test]
    fn test_display_filter() {
        let sent = label_set(&["SENT"]);
        let received = label_set(&["INBOX"]);
        assert!(!is_visible_in(&Folder::Inbox, &sent));
        assert!(is_visible_in(&Folder::Inbox, &received));
        assert!(is_visible_in(&Folder::Sent, &sent));
        assert!(!is_visible_in(&Folder::Sent, &received));
        assert!(is_visible_in(&Folder::Archive, &sent));
    }

    #[test]
    fn test_invalidated_folders() {
        assert_eq!(
            Transition::Archive.invalidates(),
            vec![Folder::Inbox, Folder::Archive]
        );
        assert_eq!(
            Transition::MarkSpam.invalidates(),
            vec![Folder::Inbox, Folder::Spam]
        );
        assert_eq!(Transition::MoveToInbox.invalidates().len(), 3);
    }
}
