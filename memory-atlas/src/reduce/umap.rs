//! Compact UMAP: fuzzy k-NN graph over cosine distance, PCA initialization,
//! and negative-sampling SGD on the low-dimensional layout.

use std::collections::HashMap;

use tracing::debug;

use super::{linalg, Pca};
use crate::error::{AtlasError, Result};
use crate::search::cosine_similarity;

/// Weighted, symmetric k-NN graph.
#[derive(Debug, Clone)]
struct FuzzyGraph {
    n_points: usize,
    /// Directed edge list; each undirected edge appears in both directions.
    edges: Vec<(usize, usize, f32)>,
}

/// Uniform Manifold Approximation and Projection.
#[derive(Debug, Clone)]
pub struct Umap {
    n_components: usize,
    n_neighbors: usize,
    min_dist: f32,
    spread: f32,
    n_epochs: usize,
    learning_rate: f32,
    negative_sample_rate: usize,
    seed: u64,
}

impl Umap {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            n_epochs: 200,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            seed: 42,
        }
    }

    #[must_use]
    pub fn with_neighbors(mut self, n: usize) -> Self {
        self.n_neighbors = n.max(1);
        self
    }

    #[must_use]
    pub fn with_min_dist(mut self, d: f32) -> Self {
        self.min_dist = d;
        self
    }

    #[must_use]
    pub fn with_epochs(mut self, n: usize) -> Self {
        self.n_epochs = n;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Embed `data` into `n_components` dimensions.
    pub fn fit_transform(&self, data: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let n = data.len();
        if n == 0 {
            return Err(AtlasError::EmptyInput);
        }
        if n < self.n_neighbors + 1 {
            return Err(AtlasError::InsufficientData {
                min: self.n_neighbors + 1,
                got: n,
            });
        }

        let graph = self.build_fuzzy_graph(data);
        let mut embedding = self.initialize(data)?;
        let (a, b) = self.curve_params();
        self.optimize(&mut embedding, &graph, a, b);

        debug!(points = n, edges = graph.edges.len(), "UMAP layout optimized");
        Ok(embedding)
    }

    fn build_fuzzy_graph(&self, data: &[Vec<f32>]) -> FuzzyGraph {
        let n = data.len();
        let k = self.n_neighbors;
        let target = (k as f32).log2();
        let mut directed: HashMap<(usize, usize), f32> = HashMap::new();

        for i in 0..n {
            let mut dists: Vec<(usize, f32)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (j, 1.0 - cosine_similarity(&data[i], &data[j])))
                .collect();
            dists.sort_by(|a, b| a.1.total_cmp(&b.1));
            dists.truncate(k);

            let rho = dists.first().map_or(0.0, |d| d.1);
            let sigma = find_sigma(&dists, rho, target);

            for &(j, d) in &dists {
                let membership = if d <= rho {
                    1.0
                } else {
                    (-(d - rho) / sigma).exp()
                };
                if membership > 1e-10 {
                    directed.insert((i, j), membership);
                }
            }
        }

        // Fuzzy union: w(i,j) + w(j,i) - w(i,j) * w(j,i)
        let mut edges = Vec::with_capacity(directed.len() * 2);
        for (&(i, j), &w_ij) in &directed {
            let w_ji = directed.get(&(j, i)).copied().unwrap_or(0.0);
            if w_ji > 0.0 && j < i {
                continue;
            }
            let combined = w_ij + w_ji - w_ij * w_ji;
            if combined > 1e-10 {
                edges.push((i, j, combined));
                edges.push((j, i, combined));
            }
        }
        edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        FuzzyGraph { n_points: n, edges }
    }

    /// PCA layout rescaled to roughly [-10, 10] per axis.
    fn initialize(&self, data: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let mut init = Pca::new(self.n_components).fit_transform(data)?;
        let mut rng = self.seed;

        for point in &mut init {
            point.resize(self.n_components, 0.0);
        }
        for axis in 0..self.n_components {
            let max_abs = init
                .iter()
                .map(|p| p[axis].abs())
                .fold(0.0f32, f32::max)
                .max(1e-6);
            for point in &mut init {
                // Small jitter separates duplicates, which would otherwise never move apart.
                rng = lcg(rng);
                let jitter = ((rng >> 33) as f32 / u32::MAX as f32 - 0.5) * 1e-3;
                point[axis] = point[axis] / max_abs * 10.0 + jitter;
            }
        }
        Ok(init)
    }

    /// `a`, `b` of the membership curve `1 / (1 + a * d^(2b))`.
    fn curve_params(&self) -> (f32, f32) {
        let b = 1.0f32;
        let a = ((self.spread / self.min_dist).powf(b) - 1.0) / self.spread.powf(2.0 * b);
        (a.max(0.001), b)
    }

    fn optimize(&self, embedding: &mut [Vec<f32>], graph: &FuzzyGraph, a: f32, b: f32) {
        if graph.edges.is_empty() || self.n_epochs == 0 {
            return;
        }

        let max_w = graph.edges.iter().map(|e| e.2).fold(0.0f32, f32::max);
        let epochs_per_sample: Vec<f32> = graph.edges.iter().map(|e| max_w / e.2).collect();
        let epochs_per_negative: Vec<f32> = epochs_per_sample
            .iter()
            .map(|e| e / self.negative_sample_rate as f32)
            .collect();
        let mut next_sample = epochs_per_sample.clone();
        let mut next_negative = epochs_per_negative.clone();
        let mut rng = self.seed;
        let dims = self.n_components;

        for epoch in 0..self.n_epochs {
            let alpha = self.learning_rate * (1.0 - epoch as f32 / self.n_epochs as f32);
            let now = epoch as f32;

            for (e, &(i, j, _)) in graph.edges.iter().enumerate() {
                if next_sample[e] > now {
                    continue;
                }

                let dist_sq = linalg::squared_distance(&embedding[i], &embedding[j]);
                if dist_sq > 0.0 {
                    let coeff = -2.0 * a * b * dist_sq.powf(b - 1.0) / (1.0 + a * dist_sq.powf(b));
                    for d in 0..dims {
                        let grad = (coeff * (embedding[i][d] - embedding[j][d])).clamp(-4.0, 4.0);
                        embedding[i][d] += alpha * grad;
                        embedding[j][d] -= alpha * grad;
                    }
                }
                next_sample[e] += epochs_per_sample[e];

                while next_negative[e] <= now {
                    rng = lcg(rng);
                    let k = (rng >> 33) as usize % graph.n_points;
                    next_negative[e] += epochs_per_negative[e];
                    if k == i {
                        continue;
                    }

                    let dist_sq = linalg::squared_distance(&embedding[i], &embedding[k]);
                    let coeff = 2.0 * b / ((0.001 + dist_sq) * (1.0 + a * dist_sq.powf(b)));
                    for d in 0..dims {
                        let grad = (coeff * (embedding[i][d] - embedding[k][d])).clamp(-4.0, 4.0);
                        embedding[i][d] += alpha * grad;
                    }
                }
            }
        }
    }
}

/// Binary search for the bandwidth whose membership sum matches `target`.
fn find_sigma(dists: &[(usize, f32)], rho: f32, target: f32) -> f32 {
    let (mut lo, mut hi) = (1e-10f32, f32::INFINITY);
    let mut sigma = 1.0f32;

    for _ in 0..64 {
        let sum: f32 = dists
            .iter()
            .map(|&(_, d)| if d > rho { (-(d - rho) / sigma).exp() } else { 1.0 })
            .sum();
        if (sum - target).abs() < 1e-5 {
            break;
        }
        if sum > target {
            hi = sigma;
            sigma = (lo + hi) / 2.0;
        } else {
            lo = sigma;
            sigma = if hi.is_finite() { (lo + hi) / 2.0 } else { sigma * 2.0 };
        }
    }
    sigma.max(1e-6)
}

#[inline]
fn lcg(state: u64) -> u64 {
    state.wrapping_mul(6364136223846793005).wrapping_add(1)
}
