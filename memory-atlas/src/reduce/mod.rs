//! Dimensionality reduction capability.
//!
//! The projection controller only sees the [`Reducer`] trait: N vectors of
//! equal dimension in, N low-dimensional points out. [`LocalReducer`] is the
//! in-process implementation:
//!
//! - **PCA**: power-iteration principal components, fast and linear
//! - **UMAP**: fuzzy k-NN graph over cosine distance, optimized with
//!   negative-sampling SGD
//!
//! t-SNE is never computed inline; it is only read from precomputed layouts.

mod pca;
mod umap;

pub use pca::Pca;
pub use umap::Umap;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::ProjectionConfig;
use crate::dataset::Algorithm;
use crate::error::{AtlasError, Result};

/// Reduces high-dimensional vectors to `dims` coordinates each.
#[async_trait]
pub trait Reducer: Send + Sync {
    /// Return one point of `dims` coordinates per input vector, in input order.
    async fn reduce(
        &self,
        vectors: &[Vec<f32>],
        algorithm: Algorithm,
        dims: usize,
    ) -> Result<Vec<Vec<f32>>>;
}

/// In-process PCA and UMAP, run on the blocking thread pool.
#[derive(Debug, Clone, Default)]
pub struct LocalReducer {
    config: ProjectionConfig,
}

impl LocalReducer {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    /// Run the reduction on the calling thread.
    pub fn reduce_blocking(
        config: &ProjectionConfig,
        vectors: &[Vec<f32>],
        algorithm: Algorithm,
        dims: usize,
    ) -> Result<Vec<Vec<f32>>> {
        validate_input(vectors)?;

        match algorithm {
            Algorithm::Pca => Pca::new(dims).fit_transform(vectors),
            Algorithm::Umap => {
                let min_points = config.umap_neighbors + 1;
                if vectors.len() < min_points {
                    warn!(
                        points = vectors.len(),
                        min_points, "too few points for UMAP, falling back to PCA"
                    );
                    return Pca::new(dims).fit_transform(vectors);
                }
                Umap::new(dims)
                    .with_neighbors(config.umap_neighbors)
                    .with_min_dist(config.umap_min_dist)
                    .with_epochs(config.umap_epochs)
                    .with_seed(config.seed)
                    .fit_transform(vectors)
            }
            Algorithm::Tsne => Err(AtlasError::UnsupportedInlineComputation { algorithm }),
        }
    }
}

#[async_trait]
impl Reducer for LocalReducer {
    async fn reduce(
        &self,
        vectors: &[Vec<f32>],
        algorithm: Algorithm,
        dims: usize,
    ) -> Result<Vec<Vec<f32>>> {
        if algorithm.requires_precomputation() {
            return Err(AtlasError::UnsupportedInlineComputation { algorithm });
        }

        debug!(points = vectors.len(), %algorithm, dims, "starting inline reduction");
        let config = self.config.clone();
        let vectors = vectors.to_vec();
        tokio::task::spawn_blocking(move || {
            Self::reduce_blocking(&config, &vectors, algorithm, dims)
        })
        .await
        .map_err(|e| AtlasError::Reduction(format!("reduction task failed: {e}")))?
    }
}

/// Reject empty, ragged, or non-finite input.
fn validate_input(vectors: &[Vec<f32>]) -> Result<()> {
    let first = vectors.first().ok_or(AtlasError::EmptyInput)?;
    let dim = first.len();
    for (i, row) in vectors.iter().enumerate() {
        if row.len() != dim {
            return Err(AtlasError::DimensionMismatch {
                expected: dim,
                got: row.len(),
            });
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(AtlasError::Reduction(format!(
                "non-finite value in vector {i}"
            )));
        }
    }
    Ok(())
}

pub(crate) mod linalg {
    #[inline]
    pub fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[inline]
    pub fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    /// Scale `v` to unit length; near-zero vectors are left alone.
    pub fn normalize(v: &mut [f32]) {
        let norm = dot(v, v).sqrt();
        if norm > 1e-10 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
    }

    /// Per-column mean of `data`.
    pub fn column_mean(data: &[Vec<f32>]) -> Vec<f32> {
        let dim = data.first().map_or(0, Vec::len);
        let mut mean = vec![0.0f32; dim];
        for row in data {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        let n = data.len().max(1) as f32;
        mean.iter_mut().for_each(|m| *m /= n);
        mean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn generate_test_data(n: usize, dim: usize) -> Vec<Vec<f32>> {
        let mut seed = 42u64;
        (0..n)
            .map(|_| {
                (0..dim)
                    .map(|_| {
                        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
                        ((seed >> 33) as f32) / (u32::MAX as f32)
                    })
                    .collect()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_local_reducer_pca() {
        let data = generate_test_data(30, 12);
        let reducer = LocalReducer::default();
        let points = reducer.reduce(&data, Algorithm::Pca, 3).await.unwrap();
        assert_eq!(points.len(), 30);
        assert!(points.iter().all(|p| p.len() == 3 && p.iter().all(|v| v.is_finite())));
    }

    #[tokio::test]
    async fn test_local_reducer_rejects_tsne() {
        let data = generate_test_data(10, 4);
        let reducer = LocalReducer::default();
        let err = reducer.reduce(&data, Algorithm::Tsne, 3).await.unwrap_err();
        assert!(matches!(
            err,
            AtlasError::UnsupportedInlineComputation {
                algorithm: Algorithm::Tsne
            }
        ));
    }

    #[test]
    fn test_umap_small_input_falls_back_to_pca() {
        let data = generate_test_data(5, 6);
        let points = LocalReducer::reduce_blocking(
            &ProjectionConfig::default(),
            &data,
            Algorithm::Umap,
            3,
        )
        .unwrap();
        assert_eq!(points.len(), 5);
    }

    #[test]
    fn test_validate_input() {
        assert!(matches!(validate_input(&[]), Err(AtlasError::EmptyInput)));
        assert!(matches!(
            validate_input(&[vec![1.0, 2.0], vec![1.0]]),
            Err(AtlasError::DimensionMismatch { expected: 2, got: 1 })
        ));
        assert!(validate_input(&[vec![f32::NAN]]).is_err());
    }
}
