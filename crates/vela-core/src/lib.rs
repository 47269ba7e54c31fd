// Vela core: shared types and contracts of the rendering core.
// No GPU types live here; every other crate builds on these.

mod color;
mod config;
mod draw;
mod error;
mod font;
mod geometry;
mod input;
mod path;
pub mod pixel;
mod widget;

pub use color::Color;
pub use config::{
    load_config, load_config_from, save_config, save_config_to, Config, KeyBindingOverride,
    SubpixelOrientation, SurfaceColorSpace, ThemeMode,
};
pub use draw::{Canvas, DrawContext};
pub use error::{ErrorInfo, RenderError, ResultExt, Severity};
pub use font::{layout_line, BoxFace, FontBook, FontFace, FontGlyph, FontId, GlyphId};
pub use geometry::{Mat4, Rect, Size, Vec2};
pub use input::{
    Clipboard, Command, CursorIcon, HitBoxKind, Key, KeyState, KeyboardEvent, MemoryClipboard,
    Modifiers, MouseButton, MouseButtons, MouseEvent, MouseEventKind, TextEvent,
};
pub use path::{winding_number, BezierPath, Contour, LineSegment, PathCommand};
pub use pixel::{ImageKey, PixelBuffer};
pub use widget::{
    clear_tree_dirty, draw_child, find, find_mut, focus_order, hit_test, layout_tree,
    tree_capabilities, tree_dirty, Capabilities, DirtyFlags, HitBox, LayoutContext, SizeHints, Widget, WidgetId,
};

/// Number of nanoseconds in one millisecond.
pub const NANOS_PER_MILLI: u64 = 1_000_000;
