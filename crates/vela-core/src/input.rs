// Input event types delivered by the host and routed by the dispatcher.

use serde::{Deserialize, Serialize};

use crate::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Tab,
    Escape,
    Delete,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
    Insert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Self = Self {
        shift: true,
        ..Self::NONE
    };

    pub const CTRL: Self = Self {
        ctrl: true,
        ..Self::NONE
    };

    pub const META: Self = Self {
        meta: true,
        ..Self::NONE
    };

    /// Ctrl on most platforms, Cmd on macOS.
    pub const fn primary() -> Self {
        if cfg!(target_os = "macos") {
            Self::META
        } else {
            Self::CTRL
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Pressed-buttons mask carried by every mouse event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MouseButtons {
    pub left: bool,
    pub right: bool,
    pub middle: bool,
}

impl MouseButtons {
    pub fn with(mut self, button: MouseButton, down: bool) -> Self {
        match button {
            MouseButton::Left => self.left = down,
            MouseButton::Right => self.right = down,
            MouseButton::Middle => self.middle = down,
        }
        self
    }

    pub fn any(&self) -> bool {
        self.left || self.right || self.middle
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MouseEventKind {
    Move,
    Down(MouseButton),
    Up(MouseButton),
    Wheel(Vec2),
    /// Pointer entered the widget; synthesised by the dispatcher.
    Enter,
    /// Pointer left the widget; synthesised by the dispatcher.
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub position: Vec2,
    pub buttons: MouseButtons,
    pub modifiers: Modifiers,
    /// 1 for a single click, 2 for a double click, ... Only set on `Down`.
    pub click_count: u32,
}

impl MouseEvent {
    pub fn new(kind: MouseEventKind, position: Vec2) -> Self {
        Self {
            kind,
            position,
            buttons: MouseButtons::default(),
            modifiers: Modifiers::NONE,
            click_count: 0,
        }
    }

    pub fn is_down(&self) -> bool {
        matches!(self.kind, MouseEventKind::Down(_))
    }

    pub fn is_up(&self) -> bool {
        matches!(self.kind, MouseEventKind::Up(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardEvent {
    pub state: KeyState,
    pub key: Key,
    pub modifiers: Modifiers,
    /// Set on auto-repeated presses.
    pub repeat: bool,
}

impl KeyboardEvent {
    pub fn down(key: Key, modifiers: Modifiers) -> Self {
        Self {
            state: KeyState::Down,
            key,
            modifiers,
            repeat: false,
        }
    }

    pub fn up(key: Key, modifiers: Modifiers) -> Self {
        Self {
            state: KeyState::Up,
            key,
            modifiers,
            repeat: false,
        }
    }

    pub fn is_down(&self) -> bool {
        self.state == KeyState::Down
    }
}

/// Committed or composing text, one or more grapheme clusters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEvent {
    pub text: String,
    pub composing: bool,
}

/// Actions bound to key chords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    FocusNext,
    FocusPrevious,
    Copy,
    Cut,
    Paste,
    SelectAll,
}

/// Semantic type of the region under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HitBoxKind {
    #[default]
    Interior,
    BottomResizeBorder,
    TopResizeBorder,
    LeftResizeBorder,
    RightResizeBorder,
    BottomLeftResizeCorner,
    BottomRightResizeCorner,
    TopLeftResizeCorner,
    TopRightResizeCorner,
    ApplicationIcon,
    MoveArea,
}

impl HitBoxKind {
    /// Cursor shape the host should show over this region.
    pub fn cursor(self) -> CursorIcon {
        match self {
            HitBoxKind::Interior | HitBoxKind::ApplicationIcon => CursorIcon::Default,
            HitBoxKind::MoveArea => CursorIcon::Move,
            HitBoxKind::TopResizeBorder | HitBoxKind::BottomResizeBorder => CursorIcon::ResizeNS,
            HitBoxKind::LeftResizeBorder | HitBoxKind::RightResizeBorder => CursorIcon::ResizeEW,
            HitBoxKind::TopLeftResizeCorner | HitBoxKind::BottomRightResizeCorner => {
                CursorIcon::ResizeNWSE
            }
            HitBoxKind::TopRightResizeCorner | HitBoxKind::BottomLeftResizeCorner => {
                CursorIcon::ResizeNESW
            }
        }
    }

    /// Regions whose presses belong to the OS window frame, not to widgets.
    pub fn is_window_frame(self) -> bool {
        !matches!(self, HitBoxKind::Interior)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CursorIcon {
    #[default]
    Default,
    Text,
    Pointer,
    Move,
    ResizeNS,
    ResizeEW,
    ResizeNWSE,
    ResizeNESW,
}

/// Text clipboard offered by the host.
pub trait Clipboard {
    fn get_text(&mut self) -> Option<String>;
    fn set_text(&mut self, text: &str);
}

/// In-process clipboard for hosts without one, and for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    text: Option<String>,
}

impl Clipboard for MemoryClipboard {
    fn get_text(&mut self) -> Option<String> {
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        self.text = Some(text.to_string());
    }
}
