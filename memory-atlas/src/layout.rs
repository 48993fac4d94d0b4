//! Layout storage and normalization.
//!
//! A layout is one 3D point per document, in document order. The store keeps
//! the current layout, the layout being animated away from, and the positions
//! the renderer should draw this frame.

use tracing::debug;

/// One 3D position per document index.
pub type Layout = Vec<[f32; 3]>;

/// Per-axis bounds of a layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    /// Bounds of `points`, or `None` when empty.
    pub fn of(points: &[[f32; 3]]) -> Option<Self> {
        let first = *points.first()?;
        let mut bounds = Bounds {
            min: first,
            max: first,
        };
        for p in points {
            for axis in 0..3 {
                bounds.min[axis] = bounds.min[axis].min(p[axis]);
                bounds.max[axis] = bounds.max[axis].max(p[axis]);
            }
        }
        Some(bounds)
    }

    /// Extent along each axis.
    pub fn range(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Radius of the bounding sphere around the box center.
    pub fn radius(&self) -> f32 {
        let [dx, dy, dz] = self.range();
        (dx * dx + dy * dy + dz * dz).sqrt() / 2.0
    }
}

/// Center `points` at the origin and fit each axis to `[-scale/2, scale/2]`.
///
/// Each axis maps through `((v - min) / range - 0.5) * scale`; a collapsed axis
/// uses a range of 1 so every point sits at `-scale/2` on it.
pub fn normalize(points: &[[f32; 3]], scale: f32) -> Layout {
    let Some(bounds) = Bounds::of(points) else {
        return Vec::new();
    };
    let range = bounds.range().map(|r| if r == 0.0 { 1.0 } else { r });

    points
        .iter()
        .map(|p| {
            let mut out = [0.0f32; 3];
            for axis in 0..3 {
                out[axis] = ((p[axis] - bounds.min[axis]) / range[axis] - 0.5) * scale;
            }
            out
        })
        .collect()
}

/// Result of installing a layout into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Same document count: animate from the on-screen positions.
    Transition,
    /// First layout or a different document count: snap, and rebuild geometry and base colors.
    NewPointCloud,
}

/// Current, previous and displayed positions plus animation progress.
#[derive(Debug, Clone)]
pub struct LayoutStore {
    current: Option<Layout>,
    previous: Option<Layout>,
    displayed: Layout,
    progress: f32,
}

impl Default for LayoutStore {
    fn default() -> Self {
        Self {
            current: None,
            previous: None,
            displayed: Vec::new(),
            progress: 1.0,
        }
    }
}

impl LayoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current layout.
    ///
    /// The positions on screen become the previous layout when the point count
    /// is unchanged; otherwise the new layout is shown immediately.
    pub fn install(&mut self, layout: Layout) -> InstallOutcome {
        let same_count = self
            .current
            .as_ref()
            .is_some_and(|current| current.len() == layout.len());

        if same_count {
            self.previous = Some(std::mem::take(&mut self.displayed));
            self.displayed = self.previous.clone().unwrap_or_default();
            self.current = Some(layout);
            self.progress = 0.0;
            debug!(points = self.displayed.len(), "layout transition started");
            InstallOutcome::Transition
        } else {
            self.displayed = layout.clone();
            self.current = Some(layout);
            self.previous = None;
            self.progress = 1.0;
            debug!(points = self.displayed.len(), "new point cloud installed");
            InstallOutcome::NewPointCloud
        }
    }

    /// Drop every layout, e.g. before loading a different dataset.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn current(&self) -> Option<&[[f32; 3]]> {
        self.current.as_deref()
    }

    pub fn previous(&self) -> Option<&[[f32; 3]]> {
        self.previous.as_deref()
    }

    /// Positions the renderer should draw now.
    pub fn displayed(&self) -> &[[f32; 3]] {
        &self.displayed
    }

    /// Animation progress in `[0, 1]`; 1 means settled.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn is_settled(&self) -> bool {
        self.progress >= 1.0
    }

    pub fn len(&self) -> usize {
        self.current.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Previous, current and displayed buffers together with the progress, when
    /// an interpolation between them is valid for `document_count` points.
    pub(crate) fn transition_parts(
        &mut self,
        document_count: usize,
    ) -> Option<(&[[f32; 3]], &[[f32; 3]], &mut Layout, &mut f32)> {
        let previous = self.previous.as_deref()?;
        let current = self.current.as_deref()?;
        if previous.len() != current.len()
            || current.len() != document_count
            || self.displayed.len() != current.len()
        {
            return None;
        }
        Some((previous, current, &mut self.displayed, &mut self.progress))
    }
}
