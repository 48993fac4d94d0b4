//! Hover, click and rectangular selection.
//!
//! Click and hover resolve through a [`PointPicker`]; box selection projects
//! every displayed point through a [`ScreenProjector`] and keeps those that
//! land inside the rectangle and face the camera.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::camera::{Projected, ScreenProjector, Viewport};
use crate::config::{ColorConfig, SelectionConfig};
use crate::dataset::Dataset;

/// Interactive selection state.
///
/// Click and box selection are tracked independently; box selection does not
/// clear the clicked index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionState {
    hovered: Option<usize>,
    clicked: Option<usize>,
    box_selected: BTreeSet<usize>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn clicked(&self) -> Option<usize> {
        self.clicked
    }

    pub fn box_selected(&self) -> &BTreeSet<usize> {
        &self.box_selected
    }

    /// Whether a click or box selection is active.
    pub fn has_explicit_selection(&self) -> bool {
        self.clicked.is_some() || !self.box_selected.is_empty()
    }

    /// Toggle the clicked index; a miss clears it.
    pub fn click(&mut self, hit: Option<usize>) {
        self.clicked = match hit {
            Some(index) if self.clicked == Some(index) => None,
            other => other,
        };
    }

    /// Update the hover preview. Ignored while an explicit selection is active.
    ///
    /// Returns whether the hovered index was updated.
    pub fn hover(&mut self, hit: Option<usize>) -> bool {
        if self.has_explicit_selection() {
            return false;
        }
        self.hovered = hit;
        true
    }

    /// Replace the box-selected set.
    pub fn set_box(&mut self, indices: BTreeSet<usize>) {
        self.box_selected = indices;
    }

    /// Drop click and box selection, keeping the hover preview.
    pub fn clear_selection(&mut self) {
        self.clicked = None;
        self.box_selected.clear();
    }

    /// Reset everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Pixel-space rectangle with `y` growing downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScreenRect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl ScreenRect {
    /// Rectangle spanned by two drag corners in any order.
    pub fn from_corners(a: [f32; 2], b: [f32; 2]) -> Self {
        Self {
            min_x: a[0].min(b[0]),
            min_y: a[1].min(b[1]),
            max_x: a[0].max(b[0]),
            max_y: a[1].max(b[1]),
        }
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// Smaller than `min_px` in both dimensions.
    pub fn is_degenerate(&self, min_px: f32) -> bool {
        self.width() < min_px && self.height() < min_px
    }
}

/// Result of a box-selection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoxSelection {
    /// Rectangle below the size threshold; nothing changes.
    Ignored,
    /// Indices inside the rectangle, possibly empty.
    Resolved(BTreeSet<usize>),
}

/// Maps screen rectangles back onto displayed points.
#[derive(Debug, Clone, Default)]
pub struct SelectionEngine {
    config: SelectionConfig,
}

impl SelectionEngine {
    pub fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Indices whose projection falls inside `rect` and faces the camera.
    pub fn box_select(
        &self,
        rect: ScreenRect,
        viewport: Viewport,
        projector: &dyn ScreenProjector,
        positions: &[[f32; 3]],
    ) -> BoxSelection {
        if rect.is_degenerate(self.config.min_box_px) {
            debug!(
                width = rect.width(),
                height = rect.height(),
                "selection rectangle below threshold"
            );
            return BoxSelection::Ignored;
        }

        let [left, top] = viewport.pixel_to_ndc(rect.min_x, rect.min_y);
        let [right, bottom] = viewport.pixel_to_ndc(rect.max_x, rect.max_y);

        let selected: BTreeSet<usize> = positions
            .iter()
            .enumerate()
            .filter_map(|(index, &point)| match projector.project_to_ndc(point) {
                Projected::Ndc { x, y, .. }
                    if x >= left && x <= right && y >= bottom && y <= top =>
                {
                    Some(index)
                }
                _ => None,
            })
            .collect();

        debug!(selected = selected.len(), "box selection resolved");
        BoxSelection::Resolved(selected)
    }
}

/// Aggregate description of a selected document set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionSummary {
    /// Selected indices, ascending.
    pub indices: Vec<usize>,
    pub count: usize,
    /// Documents per category; uncategorized documents are not counted.
    pub categories: BTreeMap<String, usize>,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl SelectionSummary {
    pub fn from_indices<'a>(
        dataset: &Dataset,
        indices: impl IntoIterator<Item = &'a usize>,
        config: &ColorConfig,
    ) -> Self {
        let indices: Vec<usize> = indices
            .into_iter()
            .copied()
            .filter(|&i| i < dataset.len())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut categories = BTreeMap::new();
        let mut earliest: Option<DateTime<Utc>> = None;
        let mut latest: Option<DateTime<Utc>> = None;

        for doc in indices.iter().map(|&i| &dataset.documents[i]) {
            if let Some(category) = doc.category(&config.category_key) {
                *categories.entry(category.to_string()).or_insert(0) += 1;
            }
            if let Some(ts) = doc.timestamp(&config.timestamp_key) {
                earliest = Some(earliest.map_or(ts, |e| e.min(ts)));
                latest = Some(latest.map_or(ts, |l| l.max(ts)));
            }
        }

        Self {
            count: indices.len(),
            indices,
            categories,
            earliest,
            latest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DatasetMetadata, Document};

    /// World x/y are already NDC; z > 1 is behind the camera.
    struct IdentityProjector;

    impl ScreenProjector for IdentityProjector {
        fn project_to_ndc(&self, point: [f32; 3]) -> Projected {
            if point[2] > 1.0 {
                Projected::BehindCamera
            } else {
                Projected::Ndc {
                    x: point[0],
                    y: point[1],
                    depth: point[2],
                }
            }
        }
    }

    fn positions() -> Vec<[f32; 3]> {
        vec![
            [-0.5, 0.5, 0.0],
            [0.5, 0.5, 0.0],
            [0.0, 0.0, 0.0],
            [0.5, -0.5, 2.0],
        ]
    }

    #[test]
    fn test_full_screen_selects_camera_facing_points() {
        let engine = SelectionEngine::default();
        let viewport = Viewport::new(100.0, 100.0);
        let rect = ScreenRect::from_corners([0.0, 0.0], [100.0, 100.0]);

        let result = engine.box_select(rect, viewport, &IdentityProjector, &positions());
        assert_eq!(result, BoxSelection::Resolved(BTreeSet::from([0, 1, 2])));
    }

    #[test]
    fn test_tiny_rectangle_is_ignored() {
        let engine = SelectionEngine::default();
        let viewport = Viewport::new(100.0, 100.0);
        let rect = ScreenRect::from_corners([48.0, 48.0], [53.0, 53.0]);

        let result = engine.box_select(rect, viewport, &IdentityProjector, &positions());
        assert_eq!(result, BoxSelection::Ignored);
    }

    #[test]
    fn test_top_left_quadrant_accounts_for_y_flip() {
        let engine = SelectionEngine::default();
        let viewport = Viewport::new(100.0, 100.0);
        // Reversed drag: bottom-right corner first.
        let rect = ScreenRect::from_corners([45.0, 45.0], [0.0, 0.0]);

        let result = engine.box_select(rect, viewport, &IdentityProjector, &positions());
        assert_eq!(result, BoxSelection::Resolved(BTreeSet::from([0])));
    }

    #[test]
    fn test_thin_but_long_rectangle_is_not_degenerate() {
        let rect = ScreenRect::from_corners([0.0, 10.0], [100.0, 12.0]);
        assert!(!rect.is_degenerate(10.0));
        assert!(ScreenRect::from_corners([0.0, 0.0], [9.0, 9.0]).is_degenerate(10.0));
    }

    #[test]
    fn test_click_toggles_and_miss_clears() {
        let mut state = SelectionState::new();
        state.click(Some(3));
        assert_eq!(state.clicked(), Some(3));
        state.click(Some(3));
        assert_eq!(state.clicked(), None);
        state.click(Some(4));
        state.click(Some(5));
        assert_eq!(state.clicked(), Some(5));
        state.click(None);
        assert_eq!(state.clicked(), None);
    }

    #[test]
    fn test_hover_suppressed_by_explicit_selection() {
        let mut state = SelectionState::new();
        assert!(state.hover(Some(1)));
        assert_eq!(state.hovered(), Some(1));

        state.click(Some(2));
        assert!(!state.hover(Some(7)));
        assert_eq!(state.hovered(), Some(1));

        state.clear_selection();
        state.set_box(BTreeSet::from([0]));
        assert!(!state.hover(None));

        state.clear_selection();
        assert!(state.hover(None));
        assert_eq!(state.hovered(), None);
    }

    #[test]
    fn test_box_does_not_clear_click() {
        let mut state = SelectionState::new();
        state.click(Some(2));
        state.set_box(BTreeSet::from([0, 1]));
        assert_eq!(state.clicked(), Some(2));
        assert_eq!(state.box_selected().len(), 2);
    }

    #[test]
    fn test_summary_counts_categories_and_time_range() {
        let make = |id: &str, category: &str, ts: &str| Document {
            id: id.to_string(),
            text: id.to_string(),
            embedding: vec![0.0; 2],
            metadata: serde_json::json!({ "category": category, "timestamp": ts })
                .as_object()
                .cloned()
                .unwrap(),
        };
        let dataset = Dataset::new(
            DatasetMetadata::new("summary", 2),
            vec![
                make("a", "code", "2024-01-01T00:00:00Z"),
                make("b", "code", "2024-03-01T00:00:00Z"),
                make("c", "note", "2024-02-01T00:00:00Z"),
            ],
        );

        let summary =
            SelectionSummary::from_indices(&dataset, &[2, 0, 1, 9], &ColorConfig::default());
        assert_eq!(summary.indices, vec![0, 1, 2]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.categories.get("code"), Some(&2));
        assert_eq!(summary.categories.get("note"), Some(&1));
        assert_eq!(
            summary.earliest.map(|t| t.to_rfc3339()),
            Some("2024-01-01T00:00:00+00:00".to_string())
        );
        assert_eq!(
            summary.latest.map(|t| t.to_rfc3339()),
            Some("2024-03-01T00:00:00+00:00".to_string())
        );
    }
}
