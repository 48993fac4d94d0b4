//! Final per-point colors from base colors, selection and search matches.
//!
//! Precedence, first rule that applies wins:
//!
//! 1. the click-selected point takes the `selected` color
//! 2. while a box selection exists, its members take `box_highlight` and
//!    every other point is dimmed
//! 3. while search matches exist, matches take `search_highlight` scaled by
//!    `0.5 + score * 0.5` and every other point is dimmed
//! 4. otherwise the base color
//!
//! Hover never changes colors.

use std::collections::HashMap;

use crate::colors::{BaseColors, Color};
use crate::config::ColorConfig;
use crate::selection::SelectionState;

/// Derives display colors; recomputed on selection, search or layout change.
#[derive(Debug, Clone, Default)]
pub struct ColorComposer {
    config: ColorConfig,
}

impl ColorComposer {
    pub fn new(config: ColorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ColorConfig {
        &self.config
    }

    pub fn color_for(
        &self,
        index: usize,
        base: &BaseColors,
        selection: &SelectionState,
        matches: &HashMap<usize, f32>,
    ) -> Color {
        if selection.clicked() == Some(index) {
            return self.config.selected;
        }

        let boxed = selection.box_selected();
        if !boxed.is_empty() {
            return if boxed.contains(&index) {
                self.config.box_highlight
            } else {
                base.get(index).scaled(self.config.dim_factor)
            };
        }

        if !matches.is_empty() {
            return match matches.get(&index) {
                Some(&score) => self
                    .config
                    .search_highlight
                    .scaled(0.5 + score.clamp(0.0, 1.0) * 0.5),
                None => base.get(index).scaled(self.config.dim_factor),
            };
        }

        base.get(index)
    }

    /// Colors for indices `0..count`.
    pub fn compose(
        &self,
        count: usize,
        base: &BaseColors,
        selection: &SelectionState,
        matches: &HashMap<usize, f32>,
    ) -> Vec<Color> {
        (0..count)
            .map(|index| self.color_for(index, base, selection, matches))
            .collect()
    }
}
