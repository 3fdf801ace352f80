//! Keyboard input events and chord parsing

use std::str::FromStr;

/// A physical key relevant to selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Control,
    Meta,
    Shift,
    Alt,
    /// A printable key, lowercased
    Char(char),
    /// Any other named key (Escape, Enter, ...)
    Named(String),
}

impl Key {
    /// Parse a key name such as `Control`, `Cmd`, `Shift`, `a`
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        match name.to_lowercase().as_str() {
            "control" | "ctrl" => Self::Control,
            "meta" | "cmd" | "command" | "super" => Self::Meta,
            "shift" => Self::Shift,
            "alt" | "option" => Self::Alt,
            lower => {
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Self::Char(c),
                    _ => Self::Named(name.to_string()),
                }
            }
        }
    }

    fn is_modifier(&self) -> bool {
        matches!(self, Self::Control | Self::Meta | Self::Shift | Self::Alt)
    }
}

/// Modifier keys held while a key is pressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    /// Ctrl on Linux/Windows, Cmd on macOS
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }

    fn set(&mut self, key: &Key) {
        match key {
            Key::Control => self.ctrl = true,
            Key::Meta => self.meta = true,
            Key::Shift => self.shift = true,
            Key::Alt => self.alt = true,
            _ => {}
        }
    }
}

/// A key press together with the modifiers held at the time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyChord {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        let mut modifiers = modifiers;
        modifiers.set(&key);
        Self { key, modifiers }
    }
}

/// Error returned for an unparseable chord string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid key chord: {0:?}")]
pub struct ChordParseError(pub String);

impl FromStr for KeyChord {
    type Err = ChordParseError;

    /// Parse hotkey notation such as `Meta+Shift+u` or `Alt+Shift`.
    ///
    /// The last segment is the pressed key; earlier segments must be modifiers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let Some((last, held)) = parts.split_last() else {
            return Err(ChordParseError(s.to_string()));
        };
        if last.is_empty() {
            return Err(ChordParseError(s.to_string()));
        }

        let mut modifiers = Modifiers::default();
        for name in held {
            let key = Key::parse(name);
            if !key.is_modifier() {
                return Err(ChordParseError(s.to_string()));
            }
            modifiers.set(&key);
        }

        Ok(Self::new(Key::parse(last), modifiers))
    }
}

/// One event of the input stream consumed by the selection machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(KeyChord),
    KeyUp(Key),
    /// The window lost focus
    Blur,
}

/// Bulk keyboard commands recognised by the selection machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Ctrl/Cmd+A or Ctrl/Cmd+N
    SelectAll,
    /// Ctrl/Cmd+Shift+I
    MarkRead,
    /// Ctrl/Cmd+Shift+U
    MarkUnread,
}
