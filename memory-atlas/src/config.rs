//! Configuration types for the atlas engine.
//!
//! Every tunable constant of the engine lives here with its reference default:
//! - [`ProjectionConfig`]: layout normalization and inline reduction parameters
//! - [`AnimationConfig`]: layout transition speed
//! - [`SelectionConfig`]: box-selection and hit-test tolerances
//! - [`SearchConfig`]: relevance threshold and result caps
//! - [`ColorConfig`]: highlight colors, dimming, and base-color sources
//! - [`EmbedderConfig`]: HTTP embedding provider endpoint
//!
//! [`AtlasConfig`] aggregates them and can be loaded from a JSON file.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::colors::Color;
use crate::error::{AtlasError, Result};

/// Layout normalization and inline reduction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Edge length of the normalized cube; points land in `[-scale/2, scale/2]`.
    pub scale: f32,
    /// UMAP neighborhood size.
    pub umap_neighbors: usize,
    /// UMAP minimum distance between embedded points.
    pub umap_min_dist: f32,
    /// UMAP optimization epochs.
    pub umap_epochs: usize,
    /// Seed for the inline reducers.
    pub seed: u64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            scale: 40.0,
            umap_neighbors: 15,
            umap_min_dist: 0.1,
            umap_epochs: 200,
            seed: 42,
        }
    }
}

impl ProjectionConfig {
    /// Set the normalization scale.
    #[must_use]
    pub const fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Set the UMAP neighborhood size.
    #[must_use]
    pub const fn with_umap_neighbors(mut self, n: usize) -> Self {
        self.umap_neighbors = n;
        self
    }

    /// Set the UMAP epoch count.
    #[must_use]
    pub const fn with_umap_epochs(mut self, n: usize) -> Self {
        self.umap_epochs = n;
        self
    }

    /// Set the reducer seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Layout transition speed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Progress added per rendering tick.
    pub step: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self { step: 0.02 }
    }
}

impl AnimationConfig {
    /// Set the per-tick step.
    #[must_use]
    pub const fn with_step(mut self, step: f32) -> Self {
        self.step = step;
        self
    }

    /// Number of ticks a full transition takes.
    pub fn ticks_to_settle(&self) -> usize {
        (1.0 / self.step).ceil() as usize
    }
}

/// Box-selection and hit-test tolerances, in pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Rectangles narrower and shorter than this are ignored.
    pub min_box_px: f32,
    /// Screen-space radius for hover/click hit tests.
    pub pick_tolerance_px: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_box_px: 10.0,
            pick_tolerance_px: 8.0,
        }
    }
}

impl SelectionConfig {
    /// Set the minimum box size.
    #[must_use]
    pub const fn with_min_box_px(mut self, px: f32) -> Self {
        self.min_box_px = px;
        self
    }

    /// Set the hit-test tolerance.
    #[must_use]
    pub const fn with_pick_tolerance_px(mut self, px: f32) -> Self {
        self.pick_tolerance_px = px;
        self
    }
}

/// Relevance threshold and result caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Datasets with fewer embedding dimensions always use lexical search.
    pub min_semantic_dim: usize,
    /// Absolute similarity floor.
    pub score_floor: f32,
    /// Fraction of the best score a match must reach.
    pub relative_band: f32,
    /// Maximum number of retained semantic matches.
    pub max_results: usize,
    /// Number of matches shown as text previews.
    pub preview_count: usize,
    /// Occurrence count at which a lexical score saturates at 1.
    pub lexical_saturation: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_semantic_dim: 100,
            score_floor: 0.3,
            relative_band: 0.7,
            max_results: 20,
            preview_count: 8,
            lexical_saturation: 10.0,
        }
    }
}

impl SearchConfig {
    /// Set the result cap.
    #[must_use]
    pub const fn with_max_results(mut self, n: usize) -> Self {
        self.max_results = n;
        self
    }

    /// Set the semantic dimensionality threshold.
    #[must_use]
    pub const fn with_min_semantic_dim(mut self, dim: usize) -> Self {
        self.min_semantic_dim = dim;
        self
    }

    /// Similarity a match must reach given the best score.
    pub fn threshold(&self, best_score: f32) -> f32 {
        self.score_floor.max(best_score * self.relative_band)
    }
}

/// Where base colors come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Category palette when any document carries a category, time gradient otherwise.
    #[default]
    Auto,
    /// Stable palette keyed by the category string.
    Category,
    /// Gradient over the observed timestamp range.
    Time,
}

/// Highlight colors, dimming and base-color sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    /// Multiplier applied to points outside the active selection or match set.
    pub dim_factor: f32,
    /// Color of the single click-selected point.
    pub selected: Color,
    /// Color of box-selected points.
    pub box_highlight: Color,
    /// Base color of search matches, scaled by score.
    pub search_highlight: Color,
    /// Fallback for unknown categories and unparseable timestamps.
    pub default_gray: Color,
    /// Metadata key holding the category string.
    pub category_key: String,
    /// Metadata key holding the timestamp.
    pub timestamp_key: String,
    /// Base-color source.
    pub mode: ColorMode,
    /// Category name to color.
    pub category_palette: BTreeMap<String, Color>,
}

impl Default for ColorConfig {
    fn default() -> Self {
        let category_palette = [
            ("conversation", "#1F77B4"),
            ("code", "#FF7F0E"),
            ("decision", "#2CA02C"),
            ("error", "#D62728"),
            ("research", "#9467BD"),
            ("documentation", "#8C564B"),
            ("task", "#E377C2"),
            ("note", "#BCBD22"),
        ]
        .into_iter()
        .filter_map(|(name, hex)| Some((name.to_string(), Color::from_hex(hex)?)))
        .collect();

        Self {
            dim_factor: 0.15,
            selected: Color::GREEN,
            box_highlight: Color::CYAN,
            search_highlight: Color::WHITE,
            default_gray: Color::rgb(0.5, 0.5, 0.5),
            category_key: "category".to_string(),
            timestamp_key: "timestamp".to_string(),
            mode: ColorMode::Auto,
            category_palette,
        }
    }
}

impl ColorConfig {
    /// Set the base-color source.
    #[must_use]
    pub fn with_mode(mut self, mode: ColorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Add or replace a category color.
    #[must_use]
    pub fn with_category(mut self, name: impl Into<String>, color: Color) -> Self {
        self.category_palette.insert(name.into(), color);
        self
    }
}

/// HTTP embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    /// Endpoint accepting `POST {"text": ...}`.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            endpoint: std::env::var("ATLAS_EMBED_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:5001".to_string()),
            timeout_secs: std::env::var("ATLAS_EMBED_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}

impl EmbedderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Set the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    pub projection: ProjectionConfig,
    pub animation: AnimationConfig,
    pub selection: SelectionConfig,
    pub search: SearchConfig,
    pub colors: ColorConfig,
    pub embedder: EmbedderConfig,
}

impl AtlasConfig {
    /// Load a config from a JSON file; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is in a usable range.
    pub fn validate(&self) -> Result<()> {
        if !(self.projection.scale > 0.0) {
            return Err(AtlasError::InvalidConfig("projection.scale must be > 0".into()));
        }
        if !(self.animation.step > 0.0 && self.animation.step <= 1.0) {
            return Err(AtlasError::InvalidConfig(
                "animation.step must be in (0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.colors.dim_factor) {
            return Err(AtlasError::InvalidConfig(
                "colors.dim_factor must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.search.relative_band) {
            return Err(AtlasError::InvalidConfig(
                "search.relative_band must be in [0, 1]".into(),
            ));
        }
        if self.search.lexical_saturation <= 0.0 {
            return Err(AtlasError::InvalidConfig(
                "search.lexical_saturation must be > 0".into(),
            ));
        }
        if self.selection.min_box_px < 0.0 || self.selection.pick_tolerance_px < 0.0 {
            return Err(AtlasError::InvalidConfig(
                "selection tolerances must be non-negative".into(),
            ));
        }
        Ok(())
    }
}
