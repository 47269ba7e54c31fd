// Winit ↔ vela event conversion utilities.

use winit::event::{MouseButton as WinitMouseButton, MouseScrollDelta};
use winit::keyboard::{Key as WinitKey, ModifiersState, NamedKey};
use winit::window::{CursorIcon as WinitCursor, ResizeDirection};

use vela_core::{CursorIcon, HitBoxKind, Key, Modifiers, MouseButton, Vec2};

/// Pixels scrolled per wheel line.
const LINE_HEIGHT: f32 = 20.0;

pub fn winit_key_to_vela(key: &WinitKey) -> Option<Key> {
    match key {
        WinitKey::Named(named) => match named {
            NamedKey::Enter => Some(Key::Enter),
            NamedKey::Backspace => Some(Key::Backspace),
            NamedKey::Tab => Some(Key::Tab),
            NamedKey::Escape => Some(Key::Escape),
            NamedKey::Delete => Some(Key::Delete),
            NamedKey::ArrowUp => Some(Key::Up),
            NamedKey::ArrowDown => Some(Key::Down),
            NamedKey::ArrowLeft => Some(Key::Left),
            NamedKey::ArrowRight => Some(Key::Right),
            NamedKey::Home => Some(Key::Home),
            NamedKey::End => Some(Key::End),
            NamedKey::PageUp => Some(Key::PageUp),
            NamedKey::PageDown => Some(Key::PageDown),
            NamedKey::Insert => Some(Key::Insert),
            NamedKey::Space => Some(Key::Char(' ')),
            NamedKey::F1 => Some(Key::F(1)),
            NamedKey::F2 => Some(Key::F(2)),
            NamedKey::F3 => Some(Key::F(3)),
            NamedKey::F4 => Some(Key::F(4)),
            NamedKey::F5 => Some(Key::F(5)),
            NamedKey::F6 => Some(Key::F(6)),
            NamedKey::F7 => Some(Key::F(7)),
            NamedKey::F8 => Some(Key::F(8)),
            NamedKey::F9 => Some(Key::F(9)),
            NamedKey::F10 => Some(Key::F(10)),
            NamedKey::F11 => Some(Key::F(11)),
            NamedKey::F12 => Some(Key::F(12)),
            _ => None,
        },
        WinitKey::Character(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Key::Char(c)),
                _ => None,
            }
        }
        _ => None,
    }
}

pub fn winit_modifiers_to_vela(modifiers: ModifiersState) -> Modifiers {
    Modifiers {
        shift: modifiers.shift_key(),
        ctrl: modifiers.control_key(),
        alt: modifiers.alt_key(),
        meta: modifiers.super_key(),
    }
}

pub fn winit_button_to_vela(button: WinitMouseButton) -> Option<MouseButton> {
    match button {
        WinitMouseButton::Left => Some(MouseButton::Left),
        WinitMouseButton::Right => Some(MouseButton::Right),
        WinitMouseButton::Middle => Some(MouseButton::Middle),
        _ => None,
    }
}

/// Wheel delta in pixels; positive y scrolls content down.
pub fn scroll_delta(delta: MouseScrollDelta) -> Vec2 {
    match delta {
        MouseScrollDelta::LineDelta(x, y) => Vec2::new(x * LINE_HEIGHT, y * LINE_HEIGHT),
        MouseScrollDelta::PixelDelta(p) => Vec2::new(p.x as f32, p.y as f32),
    }
}

pub fn vela_cursor_to_winit(icon: CursorIcon) -> WinitCursor {
    match icon {
        CursorIcon::Default => WinitCursor::Default,
        CursorIcon::Text => WinitCursor::Text,
        CursorIcon::Pointer => WinitCursor::Pointer,
        CursorIcon::Move => WinitCursor::Move,
        CursorIcon::ResizeNS => WinitCursor::NsResize,
        CursorIcon::ResizeEW => WinitCursor::EwResize,
        CursorIcon::ResizeNWSE => WinitCursor::NwseResize,
        CursorIcon::ResizeNESW => WinitCursor::NeswResize,
    }
}

pub fn resize_direction(kind: HitBoxKind) -> Option<ResizeDirection> {
    match kind {
        HitBoxKind::TopResizeBorder => Some(ResizeDirection::North),
        HitBoxKind::BottomResizeBorder => Some(ResizeDirection::South),
        HitBoxKind::LeftResizeBorder => Some(ResizeDirection::West),
        HitBoxKind::RightResizeBorder => Some(ResizeDirection::East),
        HitBoxKind::TopLeftResizeCorner => Some(ResizeDirection::NorthWest),
        HitBoxKind::TopRightResizeCorner => Some(ResizeDirection::NorthEast),
        HitBoxKind::BottomLeftResizeCorner => Some(ResizeDirection::SouthWest),
        HitBoxKind::BottomRightResizeCorner => Some(ResizeDirection::SouthEast),
        HitBoxKind::Interior | HitBoxKind::ApplicationIcon | HitBoxKind::MoveArea => None,
    }
}
