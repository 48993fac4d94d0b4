//! Colors, gradients and palettes for base point colors.
//!
//! Base colors are derived once per point cloud from either a category
//! palette or a six-stop time gradient; see [`BaseColors`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ColorConfig, ColorMode};
use crate::dataset::Dataset;

fn opaque() -> f32 {
    1.0
}

/// RGBA color with f32 components in [0, 1] range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "opaque")]
    pub a: f32,
}

impl Color {
    /// Create a new color from RGB values (alpha defaults to 1.0)
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create color from u8 RGB values (0-255)
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// Create color from hex string (e.g., "#FF5500" or "FF5500")
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(hex.get(0..2)?, 16).ok()?;
        let g = u8::from_str_radix(hex.get(2..4)?, 16).ok()?;
        let b = u8::from_str_radix(hex.get(4..6)?, 16).ok()?;
        Some(Self::from_u8(r, g, b))
    }

    /// Convert to [r, g, b] array (ignoring alpha)
    pub fn to_rgb_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    /// Multiply the RGB channels by `factor`, keeping alpha.
    pub fn scaled(&self, factor: f32) -> Color {
        Color {
            r: self.r * factor,
            g: self.g * factor,
            b: self.b * factor,
            a: self.a,
        }
    }

    /// Linear interpolation between two colors
    pub fn lerp(&self, other: &Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        Color {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const CYAN: Color = Color::rgb(0.0, 1.0, 1.0);
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Piecewise-linear gradient over control points in [0, 1].
#[derive(Debug, Clone)]
pub struct Colormap {
    pub name: &'static str,
    control_points: Vec<(f32, Color)>,
}

impl Colormap {
    /// Create a new colormap from control points sorted by value.
    pub fn new(name: &'static str, points: Vec<(f32, Color)>) -> Self {
        Self {
            name,
            control_points: points,
        }
    }

    /// Map a scalar value [0, 1] to a color
    pub fn map(&self, value: f32) -> Color {
        let value = value.clamp(0.0, 1.0);

        let (first, last) = match (self.control_points.first(), self.control_points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Color::WHITE,
        };

        for pair in self.control_points.windows(2) {
            let (v0, c0) = pair[0];
            let (v1, c1) = pair[1];
            if value >= v0 && value <= v1 {
                let t = if (v1 - v0).abs() < 1e-6 {
                    0.0
                } else {
                    (value - v0) / (v1 - v0)
                };
                return c0.lerp(&c1, t);
            }
        }

        if value <= first.0 {
            first.1
        } else {
            last.1
        }
    }

    /// Map a value from an arbitrary range to a color; a collapsed range maps to the midpoint.
    pub fn map_range(&self, value: f64, min: f64, max: f64) -> Color {
        if (max - min).abs() < 1e-10 {
            return self.map(0.5);
        }
        self.map(((value - min) / (max - min)) as f32)
    }
}

/// Six-stop gradient from oldest (cool) to newest (warm).
pub fn time_gradient() -> Colormap {
    let stop = |t: f32, hex: &str| (t, Color::from_hex(hex).unwrap_or(Color::WHITE));
    Colormap::new(
        "time",
        vec![
            stop(0.0, "#3B4CC0"),
            stop(0.2, "#2C7FB8"),
            stop(0.4, "#41B6C4"),
            stop(0.6, "#7FCD4B"),
            stop(0.8, "#FDAE61"),
            stop(1.0, "#F46D43"),
        ],
    )
}

/// Stable palette keyed by category name.
#[derive(Debug, Clone)]
pub struct CategoricalPalette {
    colors: BTreeMap<String, Color>,
    fallback: Color,
}

impl CategoricalPalette {
    pub fn new(colors: BTreeMap<String, Color>, fallback: Color) -> Self {
        Self { colors, fallback }
    }

    /// Color for a category; unknown names get the fallback gray.
    pub fn get(&self, category: &str) -> Color {
        self.colors.get(category).copied().unwrap_or(self.fallback)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// One base color per document, fixed when a point cloud is created.
#[derive(Debug, Clone, Default)]
pub struct BaseColors {
    colors: Vec<Color>,
    mode: Option<ColorMode>,
}

impl BaseColors {
    /// Derive base colors for every document of `dataset`.
    pub fn from_dataset(dataset: &Dataset, config: &ColorConfig) -> Self {
        let mode = match config.mode {
            ColorMode::Auto => {
                let has_category = dataset
                    .documents
                    .iter()
                    .any(|doc| doc.category(&config.category_key).is_some());
                if has_category {
                    ColorMode::Category
                } else {
                    ColorMode::Time
                }
            }
            explicit => explicit,
        };

        let colors = match mode {
            ColorMode::Category => {
                let palette =
                    CategoricalPalette::new(config.category_palette.clone(), config.default_gray);
                dataset
                    .documents
                    .iter()
                    .map(|doc| match doc.category(&config.category_key) {
                        Some(category) => palette.get(category),
                        None => config.default_gray,
                    })
                    .collect()
            }
            _ => Self::time_colors(dataset, config),
        };

        debug!(count = dataset.len(), ?mode, "derived base colors");
        Self {
            colors,
            mode: Some(mode),
        }
    }

    fn time_colors(dataset: &Dataset, config: &ColorConfig) -> Vec<Color> {
        let stamps: Vec<Option<f64>> = dataset
            .documents
            .iter()
            .map(|doc| {
                doc.timestamp(&config.timestamp_key)
                    .map(|t| t.timestamp_millis() as f64)
            })
            .collect();

        let (min, max) = stamps
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| {
                (lo.min(t), hi.max(t))
            });

        let gradient = time_gradient();
        stamps
            .into_iter()
            .map(|stamp| match stamp {
                Some(t) => gradient.map_range(t, min, max),
                None => config.default_gray,
            })
            .collect()
    }

    /// Base color of a document; out-of-range indices get black.
    pub fn get(&self, index: usize) -> Color {
        self.colors.get(index).copied().unwrap_or(Color::BLACK)
    }

    /// Source the colors were derived from.
    pub fn mode(&self) -> Option<ColorMode> {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}
