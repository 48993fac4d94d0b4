//! Chooses where a layout comes from: the dataset's precomputed projection
//! when present, otherwise the reduction capability followed by
//! normalization.

use tracing::{debug, info};

use crate::config::ProjectionConfig;
use crate::dataset::{Algorithm, Dataset};
use crate::error::{AtlasError, Result};
use crate::layout::{normalize, Layout};
use crate::reduce::Reducer;

/// Where a computed layout came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutSource {
    Precomputed,
    Reduced,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectionController {
    config: ProjectionConfig,
}

impl ProjectionController {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Layout of `dataset` under `algorithm`.
    ///
    /// Precomputed layouts are used as-is. Otherwise the reducer runs and its
    /// output is normalized to `[-scale/2, scale/2]` per axis. Algorithms that
    /// cannot run inline fail with `UnsupportedInlineComputation` when no
    /// precomputed layout exists.
    pub async fn compute(
        &self,
        algorithm: Algorithm,
        dataset: &Dataset,
        reducer: &dyn Reducer,
    ) -> Result<(Layout, LayoutSource)> {
        if let Some(layout) = dataset.precomputed_layout(algorithm) {
            debug!(%algorithm, points = layout.len(), "using precomputed layout");
            return Ok((layout, LayoutSource::Precomputed));
        }
        let layout = self.reduce(algorithm, dataset, reducer).await?;
        Ok((layout, LayoutSource::Reduced))
    }

    /// Run the reducer for `algorithm` and normalize its output, ignoring any
    /// precomputed layout. An empty dataset yields an empty layout.
    pub async fn reduce(
        &self,
        algorithm: Algorithm,
        dataset: &Dataset,
        reducer: &dyn Reducer,
    ) -> Result<Layout> {
        if algorithm.requires_precomputation() {
            return Err(AtlasError::UnsupportedInlineComputation { algorithm });
        }
        if dataset.is_empty() {
            debug!(%algorithm, "empty dataset, nothing to reduce");
            return Ok(Vec::new());
        }

        let vectors = uniform_embeddings(dataset);
        let rows = reducer.reduce(&vectors, algorithm, 3).await?;
        let raw = to_points(rows, dataset.len())?;
        let layout = normalize(&raw, self.config.scale);

        info!(%algorithm, points = layout.len(), "computed layout");
        Ok(layout)
    }

    /// Copy of `dataset` with freshly reduced layouts for `algorithms` stored
    /// as precomputed projections, ready to be written back to disk.
    ///
    /// Layouts already present for other algorithms are kept.
    pub async fn precompute(
        &self,
        dataset: &Dataset,
        algorithms: &[Algorithm],
        reducer: &dyn Reducer,
    ) -> Result<Dataset> {
        let mut output = dataset.clone();
        for &algorithm in algorithms {
            let layout = self.reduce(algorithm, dataset, reducer).await?;
            output = output.with_precomputed(algorithm, &layout);
        }
        output.metadata.count = Some(output.len());
        info!(
            name = %output.metadata.name,
            algorithms = ?algorithms,
            "precomputed layouts"
        );
        Ok(output)
    }
}

/// Embeddings cut or zero-padded to the dataset's dimension.
fn uniform_embeddings(dataset: &Dataset) -> Vec<Vec<f32>> {
    let dim = dataset.effective_dim();
    dataset
        .documents
        .iter()
        .map(|doc| {
            let mut v = doc.embedding.clone();
            v.resize(dim, 0.0);
            v
        })
        .collect()
}

/// Reducer rows as 3D points; missing coordinates become 0.
fn to_points(rows: Vec<Vec<f32>>, expected: usize) -> Result<Layout> {
    if rows.len() != expected {
        return Err(AtlasError::Reduction(format!(
            "reducer returned {} points for {expected} documents",
            rows.len()
        )));
    }
    Ok(rows
        .into_iter()
        .map(|row| {
            let at = |axis: usize| {
                row.get(axis)
                    .copied()
                    .filter(|v| v.is_finite())
                    .unwrap_or(0.0)
            };
            [at(0), at(1), at(2)]
        })
        .collect())
}
