//! Editor configuration, loaded from TOML.
//!
//! Lookup order: the `FOLIO_CONFIG` environment variable, then `config.toml` in the
//! platform config directory. A missing file yields the defaults; a file that exists
//! but cannot be read or parsed is an error.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::history::DEFAULT_CAPACITY;
use crate::model::Color;

pub const CONFIG_ENV: &str = "FOLIO_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub hit: HitConfig,
    #[serde(default)]
    pub text: TextConfig,
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub shape: ShapeConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EditorConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads `path` when it exists, otherwise returns the defaults.
    pub fn from_file_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }
        match default_config_path() {
            Some(path) => Self::from_file_or_default(path),
            None => Ok(Self::default()),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "folio", "folio").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "HistoryConfig::default_capacity")]
    pub capacity: usize,
}

impl HistoryConfig {
    fn default_capacity() -> usize {
        DEFAULT_CAPACITY
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HitConfig {
    /// Body hit tolerance in pixels; divided by the scale before testing.
    #[serde(default = "HitConfig::default_tolerance_px")]
    pub tolerance_px: f64,
}

impl HitConfig {
    fn default_tolerance_px() -> f64 {
        4.0
    }
}

impl Default for HitConfig {
    fn default() -> Self {
        Self {
            tolerance_px: Self::default_tolerance_px(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextConfig {
    #[serde(default = "TextConfig::default_font_size")]
    pub font_size: f64,
    #[serde(default = "TextConfig::default_color")]
    pub color: Color,
    #[serde(default = "TextConfig::default_placeholder")]
    pub placeholder: String,
    /// Average glyph width as a fraction of the font size.
    #[serde(default = "TextConfig::default_char_width_ratio")]
    pub char_width_ratio: f64,
}

impl TextConfig {
    fn default_font_size() -> f64 {
        16.0
    }

    fn default_color() -> Color {
        Color::BLACK
    }

    fn default_placeholder() -> String {
        "Text".to_string()
    }

    fn default_char_width_ratio() -> f64 {
        0.6
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            font_size: Self::default_font_size(),
            color: Self::default_color(),
            placeholder: Self::default_placeholder(),
            char_width_ratio: Self::default_char_width_ratio(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HighlightConfig {
    #[serde(default = "HighlightConfig::default_color")]
    pub color: Color,
    /// Smallest committed width and height, in document units.
    #[serde(default = "HighlightConfig::default_min_size")]
    pub min_size: f64,
}

impl HighlightConfig {
    fn default_color() -> Color {
        Color::rgba(255, 235, 59, 102)
    }

    fn default_min_size() -> f64 {
        5.0
    }
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            color: Self::default_color(),
            min_size: Self::default_min_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShapeConfig {
    #[serde(default = "ShapeConfig::default_stroke_color")]
    pub stroke_color: Color,
    #[serde(default = "ShapeConfig::default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default)]
    pub fill_color: Option<Color>,
}

impl ShapeConfig {
    fn default_stroke_color() -> Color {
        Color::RED
    }

    fn default_stroke_width() -> f64 {
        2.0
    }
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            stroke_color: Self::default_stroke_color(),
            stroke_width: Self::default_stroke_width(),
            fill_color: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "ViewConfig::default_scale")]
    pub scale: f64,
    #[serde(default = "ViewConfig::default_min_scale")]
    pub min_scale: f64,
    #[serde(default = "ViewConfig::default_max_scale")]
    pub max_scale: f64,
    #[serde(default)]
    pub dark_mode: bool,
    /// Size of pages created by "add blank page" when no page is selected.
    #[serde(default = "ViewConfig::default_page_size")]
    pub blank_page_size: (f64, f64),
}

impl ViewConfig {
    fn default_scale() -> f64 {
        1.0
    }

    fn default_min_scale() -> f64 {
        0.25
    }

    fn default_max_scale() -> f64 {
        4.0
    }

    fn default_page_size() -> (f64, f64) {
        (612.0, 792.0)
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            scale: Self::default_scale(),
            min_scale: Self::default_min_scale(),
            max_scale: Self::default_max_scale(),
            dark_mode: false,
            blank_page_size: Self::default_page_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
