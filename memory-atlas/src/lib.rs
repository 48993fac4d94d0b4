//! Memory Atlas: projection, search and selection engine for 3D document maps
//!
//! This crate provides:
//! - Dataset loading for exported document embeddings with precomputed layouts
//! - Inline PCA and UMAP reduction with normalization to a fixed visual footprint
//! - Eased transitions between layouts of the same dataset
//! - Semantic search with a dynamic relevance threshold and lexical fallback
//! - Click, hover and rectangle selection through screen-space projection
//! - Per-point color composition from base colors, selection and matches
//!
//! Rendering, embedding providers and reducers are collaborators reached
//! through traits: [`ScreenProjector`], [`PointPicker`], [`Embedder`] and
//! [`Reducer`]. [`Session`] ties the pieces together.
//!
//! # Binaries
//!
//! - `atlas` - inspect a dataset, compute a layout, or run a search from the shell

pub mod animation;
pub mod camera;
pub mod colors;
pub mod compose;
pub mod config;
pub mod dataset;
pub mod embed;
pub mod error;
pub mod layout;
pub mod projection;
pub mod reduce;
pub mod search;
pub mod selection;
pub mod session;

pub use animation::{ease_out_cubic, TickOutcome, TransitionAnimator};
pub use camera::{Camera, PointPicker, ProjectedPicker, Projected, ScreenProjector, Viewport};
pub use colors::{BaseColors, Color};
pub use compose::ColorComposer;
pub use config::{
    AnimationConfig, AtlasConfig, ColorConfig, ColorMode, EmbedderConfig, ProjectionConfig,
    SearchConfig, SelectionConfig,
};
pub use dataset::{Algorithm, Dataset, DatasetMetadata, Document};
pub use embed::{Embedder, EmbedderChain, HttpEmbedder, NullEmbedder, StaticEmbedder};
pub use error::{AtlasError, Result};
pub use layout::{normalize, Bounds, InstallOutcome, Layout, LayoutStore};
pub use projection::{LayoutSource, ProjectionController};
pub use reduce::{LocalReducer, Reducer};
pub use search::{
    cosine_similarity, SearchEngine, SearchMatch, SearchMode, SearchOutcome, SearchPreview,
};
pub use selection::{BoxSelection, ScreenRect, SelectionEngine, SelectionState, SelectionSummary};
pub use session::{
    OperationStatus, ProjectionReport, ProjectionTicket, SearchReport, SearchTicket, Session,
};
