// Modifier-aware key chord map.

use std::collections::HashMap;

use vela_core::{Command, Key, KeyBindingOverride, Modifiers};

/// Maps `Key` + `Modifiers` to a `Command`.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    map: HashMap<(Key, Modifiers), Command>,
}

impl KeyBindings {
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Tab traversal plus the clipboard chords on the platform's primary
    /// modifier (Cmd on macOS, Ctrl elsewhere).
    pub fn defaults() -> Self {
        let primary = Modifiers::primary();
        let mut bindings = Self::empty();
        bindings.bind(Key::Tab, Modifiers::NONE, Command::FocusNext);
        bindings.bind(Key::Tab, Modifiers::SHIFT, Command::FocusPrevious);
        bindings.bind(Key::Char('c'), primary, Command::Copy);
        bindings.bind(Key::Char('x'), primary, Command::Cut);
        bindings.bind(Key::Char('v'), primary, Command::Paste);
        bindings.bind(Key::Char('a'), primary, Command::SelectAll);
        bindings
    }

    /// Defaults with `overrides` applied. An override replaces every
    /// default chord of its command.
    pub fn with_overrides(overrides: &[KeyBindingOverride]) -> Self {
        let mut bindings = Self::defaults();
        for o in overrides {
            bindings.unbind_command(o.command);
        }
        for o in overrides {
            log::debug!("key binding {:?}+{:?} -> {:?}", o.modifiers, o.key, o.command);
            bindings.bind(o.key, o.modifiers, o.command);
        }
        bindings
    }

    pub fn bind(&mut self, key: Key, modifiers: Modifiers, command: Command) {
        self.map.insert((normalize(key), modifiers), command);
    }

    pub fn unbind(&mut self, key: Key, modifiers: Modifiers) -> Option<Command> {
        self.map.remove(&(normalize(key), modifiers))
    }

    pub fn unbind_command(&mut self, command: Command) {
        self.map.retain(|_, c| *c != command);
    }

    pub fn lookup(&self, key: Key, modifiers: Modifiers) -> Option<Command> {
        self.map.get(&(normalize(key), modifiers)).copied()
    }

    /// Chords bound to `command`, in no particular order.
    pub fn chords_for(&self, command: Command) -> Vec<(Key, Modifiers)> {
        self.map
            .iter()
            .filter(|(_, c)| **c == command)
            .map(|(chord, _)| *chord)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Letters match regardless of case; Shift is carried by the modifiers.
fn normalize(key: Key) -> Key {
    match key {
        Key::Char(c) => Key::Char(c.to_ascii_lowercase()),
        other => other,
    }
}
