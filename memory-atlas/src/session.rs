//! The session aggregate: one loaded dataset with its layouts, selection,
//! search matches and display colors.
//!
//! All state lives in [`Session`] and changes only through its methods.
//! Projection and search are split into `begin_*` / `apply_*` halves so the
//! asynchronous part can run without borrowing the session; every `begin_*`
//! bumps a per-kind generation counter and an `apply_*` carrying an older
//! generation is discarded.
//!
//! ```no_run
//! # async fn demo(dataset: memory_atlas::Dataset) {
//! use memory_atlas::{Algorithm, LocalReducer, NullEmbedder, Session};
//!
//! let mut session = Session::default();
//! session.open(dataset, &LocalReducer::default()).await;
//! session.set_algorithm(Algorithm::Pca, &LocalReducer::default()).await;
//! while !session.layout().is_settled() {
//!     session.tick();
//! }
//! session.search("deployment failures", &NullEmbedder).await;
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::animation::{TickOutcome, TransitionAnimator};
use crate::camera::{PointPicker, ProjectedPicker, ScreenProjector, Viewport};
use crate::colors::{BaseColors, Color};
use crate::compose::ColorComposer;
use crate::config::AtlasConfig;
use crate::dataset::{Algorithm, Dataset};
use crate::embed::Embedder;
use crate::error::Result;
use crate::layout::{InstallOutcome, Layout, LayoutStore};
use crate::projection::{LayoutSource, ProjectionController};
use crate::reduce::Reducer;
use crate::search::{SearchEngine, SearchMode, SearchOutcome};
use crate::selection::{
    BoxSelection, ScreenRect, SelectionEngine, SelectionState, SelectionSummary,
};

/// Progress of an asynchronous operation, suitable for a status line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum OperationStatus {
    /// Never requested.
    #[default]
    Idle,
    Loading,
    Ready,
    /// Completed through a fallback path.
    Degraded(String),
    /// Did not complete; previous state kept.
    Failed(String),
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Idle => f.write_str("idle"),
            OperationStatus::Loading => f.write_str("loading"),
            OperationStatus::Ready => f.write_str("ready"),
            OperationStatus::Degraded(reason) => write!(f, "degraded: {reason}"),
            OperationStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// A projection request in flight.
#[derive(Debug, Clone)]
pub struct ProjectionTicket {
    generation: u64,
    algorithm: Algorithm,
    dataset: Arc<Dataset>,
}

impl ProjectionTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }
}

/// A search request in flight.
#[derive(Debug, Clone)]
pub struct SearchTicket {
    generation: u64,
    query: String,
    dataset: Arc<Dataset>,
}

impl SearchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }
}

/// What applying a projection result did.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionReport {
    Installed {
        outcome: InstallOutcome,
        source: LayoutSource,
    },
    /// Layout left unchanged.
    Failed(String),
    /// Superseded by a newer request or a dataset change; ignored.
    Stale,
    /// No dataset is loaded.
    NoDataset,
}

/// What applying a search result did.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchReport {
    Completed {
        mode: SearchMode,
        matches: usize,
        status: OperationStatus,
    },
    Stale,
    NoDataset,
}

/// Owns everything an interactive view of one dataset needs.
#[derive(Debug)]
pub struct Session {
    config: AtlasConfig,
    dataset: Option<Arc<Dataset>>,
    algorithm: Algorithm,
    layout: LayoutStore,
    animator: TransitionAnimator,
    projection: ProjectionController,
    search_engine: SearchEngine,
    selection_engine: SelectionEngine,
    composer: ColorComposer,
    base_colors: BaseColors,
    selection: SelectionState,
    search: SearchOutcome,
    matches: HashMap<usize, f32>,
    colors: Vec<Color>,
    projection_generation: u64,
    search_generation: u64,
    projection_status: OperationStatus,
    search_status: OperationStatus,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(AtlasConfig::default())
    }
}

impl Session {
    pub fn new(config: AtlasConfig) -> Self {
        Self {
            dataset: None,
            algorithm: Algorithm::Umap,
            layout: LayoutStore::new(),
            animator: TransitionAnimator::new(&config.animation),
            projection: ProjectionController::new(config.projection.clone()),
            search_engine: SearchEngine::new(config.search.clone()),
            selection_engine: SelectionEngine::new(config.selection.clone()),
            composer: ColorComposer::new(config.colors.clone()),
            base_colors: BaseColors::default(),
            selection: SelectionState::new(),
            search: SearchOutcome::cleared(),
            matches: HashMap::new(),
            colors: Vec::new(),
            projection_generation: 0,
            search_generation: 0,
            projection_status: OperationStatus::Idle,
            search_status: OperationStatus::Idle,
            config,
        }
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    /// Algorithm of the installed layout.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn layout(&self) -> &LayoutStore {
        &self.layout
    }

    /// Positions to draw this frame.
    pub fn positions(&self) -> &[[f32; 3]] {
        self.layout.displayed()
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn search_outcome(&self) -> &SearchOutcome {
        &self.search
    }

    pub fn matches(&self) -> &HashMap<usize, f32> {
        &self.matches
    }

    /// Display colors, one per document.
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn base_colors(&self) -> &BaseColors {
        &self.base_colors
    }

    pub fn projection_controller(&self) -> &ProjectionController {
        &self.projection
    }

    pub fn search_engine(&self) -> &SearchEngine {
        &self.search_engine
    }

    pub fn projection_status(&self) -> &OperationStatus {
        &self.projection_status
    }

    pub fn search_status(&self) -> &OperationStatus {
        &self.search_status
    }

    /// Replace the dataset wholesale.
    ///
    /// Layouts, selection and search are cleared and in-flight requests become
    /// stale. No layout is computed; see [`Session::open`].
    pub fn load_dataset(&mut self, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        info!(
            name = %dataset.metadata.name,
            documents = dataset.len(),
            "dataset loaded into session"
        );

        self.layout.clear();
        self.base_colors = BaseColors::default();
        self.selection.reset();
        self.search = SearchOutcome::cleared();
        self.matches.clear();
        self.projection_generation += 1;
        self.search_generation += 1;
        self.projection_status = OperationStatus::Idle;
        self.search_status = OperationStatus::Idle;
        self.dataset = Some(Arc::clone(&dataset));
        self.recompose();
        dataset
    }

    /// Load `dataset` and compute its first layout.
    ///
    /// Keeps the current algorithm unless it needs a precomputed layout the
    /// dataset lacks, in which case PCA is used.
    pub async fn open(&mut self, dataset: Dataset, reducer: &dyn Reducer) -> ProjectionReport {
        let dataset = self.load_dataset(dataset);
        let algorithm = if self.algorithm.requires_precomputation()
            && dataset.precomputed_layout(self.algorithm).is_none()
        {
            Algorithm::Pca
        } else {
            self.algorithm
        };
        self.set_algorithm(algorithm, reducer).await
    }

    /// Start a projection request.
    pub fn begin_projection(&mut self, algorithm: Algorithm) -> Option<ProjectionTicket> {
        let dataset = Arc::clone(self.dataset.as_ref()?);
        self.projection_generation += 1;
        self.projection_status = OperationStatus::Loading;
        debug!(%algorithm, generation = self.projection_generation, "projection requested");
        Some(ProjectionTicket {
            generation: self.projection_generation,
            algorithm,
            dataset,
        })
    }

    /// Install a projection result unless a newer request superseded it.
    pub fn apply_projection(
        &mut self,
        ticket: ProjectionTicket,
        result: Result<(Layout, LayoutSource)>,
    ) -> ProjectionReport {
        if ticket.generation != self.projection_generation {
            debug!(
                generation = ticket.generation,
                current = self.projection_generation,
                "discarding stale projection"
            );
            return ProjectionReport::Stale;
        }

        match result {
            Ok((layout, source)) => {
                let outcome = self.layout.install(layout);
                if outcome == InstallOutcome::NewPointCloud {
                    self.base_colors =
                        BaseColors::from_dataset(&ticket.dataset, self.composer.config());
                }
                self.algorithm = ticket.algorithm;
                self.projection_status = OperationStatus::Ready;
                self.recompose();
                info!(algorithm = %ticket.algorithm, ?outcome, ?source, "layout installed");
                ProjectionReport::Installed { outcome, source }
            }
            Err(e) => {
                warn!(algorithm = %ticket.algorithm, error = %e, "projection failed");
                let reason = e.to_string();
                self.projection_status = OperationStatus::Failed(reason.clone());
                ProjectionReport::Failed(reason)
            }
        }
    }

    /// Switch to `algorithm`, computing its layout.
    pub async fn set_algorithm(
        &mut self,
        algorithm: Algorithm,
        reducer: &dyn Reducer,
    ) -> ProjectionReport {
        let Some(ticket) = self.begin_projection(algorithm) else {
            return ProjectionReport::NoDataset;
        };
        let result = self
            .projection
            .compute(ticket.algorithm, &ticket.dataset, reducer)
            .await;
        self.apply_projection(ticket, result)
    }

    /// Start a search request.
    pub fn begin_search(&mut self, query: &str) -> Option<SearchTicket> {
        let dataset = Arc::clone(self.dataset.as_ref()?);
        self.search_generation += 1;
        self.search_status = OperationStatus::Loading;
        Some(SearchTicket {
            generation: self.search_generation,
            query: query.to_string(),
            dataset,
        })
    }

    /// Install a search outcome unless a newer request superseded it.
    pub fn apply_search(&mut self, ticket: SearchTicket, outcome: SearchOutcome) -> SearchReport {
        if ticket.generation != self.search_generation {
            debug!(
                query = %ticket.query,
                generation = ticket.generation,
                current = self.search_generation,
                "discarding stale search"
            );
            return SearchReport::Stale;
        }

        let status = match &outcome.fallback_reason {
            Some(reason) => OperationStatus::Degraded(reason.clone()),
            None => OperationStatus::Ready,
        };
        let report = SearchReport::Completed {
            mode: outcome.mode,
            matches: outcome.len(),
            status: status.clone(),
        };

        self.matches = outcome.matches();
        self.search = outcome;
        self.search_status = status;
        self.recompose();
        report
    }

    /// Search the loaded dataset. An empty query clears the matches.
    pub async fn search(&mut self, query: &str, embedder: &dyn Embedder) -> SearchReport {
        let Some(ticket) = self.begin_search(query) else {
            return SearchReport::NoDataset;
        };
        let outcome = self
            .search_engine
            .search(&ticket.query, &ticket.dataset, embedder)
            .await;
        self.apply_search(ticket, outcome)
    }

    /// Advance the layout transition by one frame.
    pub fn tick(&mut self) -> TickOutcome {
        let count = self.dataset.as_ref().map_or(0, |d| d.len());
        self.animator.tick(&mut self.layout, count)
    }

    /// Apply a click that resolved to `hit`.
    pub fn click(&mut self, hit: Option<usize>) {
        self.selection.click(hit);
        self.recompose();
    }

    /// Resolve a click at `cursor` with a picker.
    pub fn click_with(&mut self, picker: &dyn PointPicker, cursor: [f32; 2]) -> Option<usize> {
        let hit = picker.pick_nearest(cursor, self.config.selection.pick_tolerance_px);
        self.click(hit);
        self.selection.clicked()
    }

    /// Resolve a click at `cursor` against the displayed positions.
    pub fn click_at(
        &mut self,
        cursor: [f32; 2],
        projector: &dyn ScreenProjector,
        viewport: Viewport,
    ) -> Option<usize> {
        let hit = self.pick(cursor, projector, viewport);
        self.click(hit);
        self.selection.clicked()
    }

    /// Apply a hover that resolved to `hit`. Colors are unaffected.
    pub fn hover(&mut self, hit: Option<usize>) -> bool {
        self.selection.hover(hit)
    }

    pub fn hover_with(&mut self, picker: &dyn PointPicker, cursor: [f32; 2]) -> bool {
        let hit = picker.pick_nearest(cursor, self.config.selection.pick_tolerance_px);
        self.hover(hit)
    }

    pub fn hover_at(
        &mut self,
        cursor: [f32; 2],
        projector: &dyn ScreenProjector,
        viewport: Viewport,
    ) -> bool {
        let hit = self.pick(cursor, projector, viewport);
        self.hover(hit)
    }

    fn pick(
        &self,
        cursor: [f32; 2],
        projector: &dyn ScreenProjector,
        viewport: Viewport,
    ) -> Option<usize> {
        ProjectedPicker::new(projector, viewport, self.layout.displayed())
            .pick_nearest(cursor, self.config.selection.pick_tolerance_px)
    }

    /// Select the displayed points inside `rect`.
    ///
    /// A rectangle below the size threshold changes nothing. Otherwise the box
    /// set is replaced, and a summary is returned when it is non-empty.
    pub fn box_select(
        &mut self,
        rect: ScreenRect,
        viewport: Viewport,
        projector: &dyn ScreenProjector,
    ) -> Option<SelectionSummary> {
        let dataset = Arc::clone(self.dataset.as_ref()?);
        let BoxSelection::Resolved(indices) =
            self.selection_engine
                .box_select(rect, viewport, projector, self.layout.displayed())
        else {
            return None;
        };

        let summary = (!indices.is_empty()).then(|| {
            SelectionSummary::from_indices(&dataset, &indices, self.composer.config())
        });
        self.selection.set_box(indices);
        self.recompose();
        summary
    }

    /// Drop click and box selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear_selection();
        self.recompose();
    }

    fn recompose(&mut self) {
        let count = self.dataset.as_ref().map_or(0, |d| d.len());
        self.colors = self
            .composer
            .compose(count, &self.base_colors, &self.selection, &self.matches);
    }
}
