// Runtime configuration, stored as JSON in the platform config dir:
// ~/.config/vela/config.json on Linux,
// ~/Library/Application Support/vela/config.json on macOS.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Color, Command, Key, Modifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubpixelOrientation {
    Unknown,
    BlueRight,
    BlueLeft,
    BlueTop,
    BlueBottom,
}

impl SubpixelOrientation {
    /// Compile-time default; only Windows reports a reliable stripe order.
    pub const fn platform_default() -> Self {
        if cfg!(target_os = "windows") {
            SubpixelOrientation::BlueRight
        } else {
            SubpixelOrientation::Unknown
        }
    }

    /// Shader selector: 0 none, 1 horizontal RGB, 2 horizontal BGR,
    /// 3 vertical RGB, 4 vertical BGR.
    pub fn shader_mode(self) -> u32 {
        match self {
            SubpixelOrientation::Unknown => 0,
            SubpixelOrientation::BlueRight => 1,
            SubpixelOrientation::BlueLeft => 2,
            SubpixelOrientation::BlueBottom => 3,
            SubpixelOrientation::BlueTop => 4,
        }
    }
}

impl Default for SubpixelOrientation {
    fn default() -> Self {
        Self::platform_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
    LightAccessible,
    DarkAccessible,
}

impl ThemeMode {
    /// Clear color of the off-screen target.
    pub fn background(self) -> Color {
        match self {
            ThemeMode::Light => Color::from_srgb8(0xf4, 0xf4, 0xf2, 0xff),
            ThemeMode::Dark => Color::from_srgb8(0x1e, 0x1f, 0x22, 0xff),
            ThemeMode::LightAccessible => Color::WHITE,
            ThemeMode::DarkAccessible => Color::BLACK,
        }
    }

    pub fn foreground(self) -> Color {
        match self {
            ThemeMode::Light | ThemeMode::LightAccessible => Color::BLACK,
            ThemeMode::Dark | ThemeMode::DarkAccessible => Color::WHITE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SurfaceColorSpace {
    #[default]
    Srgb,
    Rec709,
    Rec2020Pq,
}

impl SurfaceColorSpace {
    /// Value of the tone-mapper's transfer-function override constant.
    pub fn transfer_function(self) -> f64 {
        match self {
            SurfaceColorSpace::Srgb => 0.0,
            SurfaceColorSpace::Rec709 => 1.0,
            SurfaceColorSpace::Rec2020Pq => 2.0,
        }
    }
}

/// A key chord bound to a command, overriding the built-in map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBindingOverride {
    pub command: Command,
    pub key: Key,
    #[serde(default)]
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub atlas_tiles_per_layer: u32,
    pub atlas_layers: u32,
    pub tile_pixels: u32,
    pub tile_border: u32,
    pub sdf_em_pixels: u32,
    pub sdf_range_pixels: f32,
    pub frames_in_flight: u32,
    pub subpixel_orientation: SubpixelOrientation,
    pub theme_mode: ThemeMode,
    pub surface_color_space: SurfaceColorSpace,
    pub double_click_interval_ms: u64,
    pub key_repeat_delay_ms: u64,
    pub key_repeat_rate_hz: u32,
    pub layout_budget_ms: u64,
    pub keybindings: Vec<KeyBindingOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            atlas_tiles_per_layer: 128,
            atlas_layers: 4,
            tile_pixels: 64,
            tile_border: 1,
            sdf_em_pixels: 32,
            sdf_range_pixels: 4.0,
            frames_in_flight: 2,
            subpixel_orientation: SubpixelOrientation::platform_default(),
            theme_mode: ThemeMode::default(),
            surface_color_space: SurfaceColorSpace::default(),
            double_click_interval_ms: 500,
            key_repeat_delay_ms: 500,
            key_repeat_rate_hz: 30,
            layout_budget_ms: 16,
            keybindings: Vec::new(),
        }
    }
}

impl Config {
    /// Clamp values into the ranges the renderer supports.
    pub fn validated(mut self) -> Self {
        self.tile_border = 1;
        self.tile_pixels = self.tile_pixels.clamp(8, 256);
        self.atlas_tiles_per_layer = self.atlas_tiles_per_layer.clamp(1, 256);
        self.atlas_layers = self.atlas_layers.clamp(1, 256);
        self.frames_in_flight = self.frames_in_flight.clamp(1, 4);
        self.sdf_em_pixels = self.sdf_em_pixels.clamp(8, self.tile_pixels);
        let max_range = (self.tile_pixels / 2) as f32 - 1.0;
        if !self.sdf_range_pixels.is_finite() {
            self.sdf_range_pixels = 4.0;
        }
        self.sdf_range_pixels = self.sdf_range_pixels.clamp(1.0, max_range);
        self.key_repeat_rate_hz = self.key_repeat_rate_hz.clamp(1, 120);
        self.layout_budget_ms = self.layout_budget_ms.max(1);
        self
    }

    /// Edge length of one tile including its border on both sides.
    pub fn padded_tile_pixels(&self) -> u32 {
        self.tile_pixels + 2 * self.tile_border
    }
}

fn config_path() -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("vela").join("config.json"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => Config::default(),
    }
}

pub fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str::<Config>(&data) {
            Ok(config) => config.validated(),
            Err(e) => {
                log::warn!("Failed to parse {}: {}", path.display(), e);
                Config::default()
            }
        },
        Err(_) => Config::default(),
    }
}

pub fn save_config(config: &Config) {
    match config_path() {
        Some(path) => save_config_to(&path, config),
        None => log::warn!("Cannot determine config path"),
    }
}

pub fn save_config_to(path: &Path, config: &Config) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::error!("Failed to create config dir {}: {}", parent.display(), e);
            return;
        }
    }

    match serde_json::to_string_pretty(config) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                log::error!("Failed to write {}: {}", path.display(), e);
            }
        }
        Err(e) => log::error!("Failed to serialize config: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("nope.json"));
        assert_eq!(config, Config::default());
        assert_eq!(config.padded_tile_pixels(), 66);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "atlas_layers": 2, "theme_mode": "Light" }"#).unwrap();
        let config = load_config_from(&path);
        assert_eq!(config.atlas_layers, 2);
        assert_eq!(config.theme_mode, ThemeMode::Light);
        assert_eq!(config.sdf_em_pixels, 32);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config_from(&path), Config::default());
    }

    #[test]
    fn save_then_load_preserves_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            frames_in_flight: 3,
            subpixel_orientation: SubpixelOrientation::BlueLeft,
            keybindings: vec![KeyBindingOverride {
                command: Command::Paste,
                key: Key::Insert,
                modifiers: Modifiers::SHIFT,
            }],
            ..Config::default()
        };
        save_config_to(&path, &config);
        assert_eq!(load_config_from(&path), config);
    }

    #[test]
    fn validation_clamps_out_of_range() {
        let config = Config {
            tile_border: 3,
            frames_in_flight: 9,
            sdf_range_pixels: 100.0,
            ..Config::default()
        }
        .validated();
        assert_eq!(config.tile_border, 1);
        assert_eq!(config.frames_in_flight, 4);
        assert_eq!(config.sdf_range_pixels, 31.0);
    }
}
