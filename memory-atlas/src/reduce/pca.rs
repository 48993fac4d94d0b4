//! Principal Component Analysis via power iteration with deflation.

use super::linalg;
use crate::error::{AtlasError, Result};

/// Principal Component Analysis for dimensionality reduction.
#[derive(Debug, Clone)]
pub struct Pca {
    n_components: usize,
    max_iter: usize,
    tolerance: f32,
    components: Option<Vec<Vec<f32>>>,
    mean: Option<Vec<f32>>,
    explained_variance: Option<Vec<f32>>,
    total_variance: Option<f32>,
}

impl Pca {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            max_iter: 100,
            tolerance: 1e-6,
            components: None,
            mean: None,
            explained_variance: None,
            total_variance: None,
        }
    }

    /// Set maximum iterations for power iteration.
    #[must_use]
    pub fn with_max_iter(mut self, n: usize) -> Self {
        self.max_iter = n;
        self
    }

    /// Fit principal components to `data` (n_samples x n_features).
    pub fn fit(&mut self, data: &[Vec<f32>]) -> Result<()> {
        let n_features = data.first().ok_or(AtlasError::EmptyInput)?.len();
        if let Some(row) = data.iter().find(|r| r.len() != n_features) {
            return Err(AtlasError::DimensionMismatch {
                expected: n_features,
                got: row.len(),
            });
        }

        let mean = linalg::column_mean(data);
        let centered: Vec<Vec<f32>> = data
            .iter()
            .map(|row| row.iter().zip(&mean).map(|(x, m)| x - m).collect())
            .collect();

        let cov = covariance(&centered, n_features);
        self.total_variance = Some((0..n_features).map(|i| cov[i][i]).sum());

        let k = self.n_components.min(n_features).min(data.len());
        let (components, eigenvalues) = self.power_iteration(cov, k);

        self.mean = Some(mean);
        self.components = Some(components);
        self.explained_variance = Some(eigenvalues);
        Ok(())
    }

    /// Project `data` onto the fitted components.
    ///
    /// Rows have `min(n_components, n_features, n_samples)` entries.
    pub fn transform(&self, data: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let components = self.components.as_ref().ok_or_else(not_fitted)?;
        let mean = self.mean.as_ref().ok_or_else(not_fitted)?;

        data.iter()
            .map(|row| {
                if row.len() != mean.len() {
                    return Err(AtlasError::DimensionMismatch {
                        expected: mean.len(),
                        got: row.len(),
                    });
                }
                let centered: Vec<f32> = row.iter().zip(mean).map(|(x, m)| x - m).collect();
                Ok(components
                    .iter()
                    .map(|pc| linalg::dot(&centered, pc))
                    .collect())
            })
            .collect()
    }

    pub fn fit_transform(&mut self, data: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        self.fit(data)?;
        self.transform(data)
    }

    /// Share of total variance captured by each component.
    pub fn explained_variance_ratio(&self) -> Option<Vec<f32>> {
        let explained = self.explained_variance.as_ref()?;
        let total = self.total_variance?;
        if total < 1e-10 {
            return None;
        }
        Some(explained.iter().map(|v| v / total).collect())
    }

    fn power_iteration(&self, mut mat: Vec<Vec<f32>>, k: usize) -> (Vec<Vec<f32>>, Vec<f32>) {
        let n = mat.len();
        let mut components = Vec::with_capacity(k);
        let mut eigenvalues = Vec::with_capacity(k);

        for c in 0..k {
            // Deterministic start vector; varies per component so deflated matrices do not stall.
            let mut v: Vec<f32> = (0..n)
                .map(|i| ((i * 7 + 13 + c * 31) % 100) as f32 / 100.0 + 0.01)
                .collect();
            linalg::normalize(&mut v);
            let mut eigenvalue = 0.0f32;

            for _ in 0..self.max_iter {
                let mut next: Vec<f32> = mat.iter().map(|row| linalg::dot(row, &v)).collect();
                eigenvalue = linalg::dot(&next, &v);
                linalg::normalize(&mut next);

                let diff: f32 = v.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
                v = next;
                if diff < self.tolerance {
                    break;
                }
            }

            for i in 0..n {
                for j in 0..n {
                    mat[i][j] -= eigenvalue * v[i] * v[j];
                }
            }
            components.push(v);
            eigenvalues.push(eigenvalue.max(0.0));
        }

        (components, eigenvalues)
    }
}

fn not_fitted() -> AtlasError {
    AtlasError::Reduction("PCA used before fit".to_string())
}

/// Sample covariance of already-centered rows.
fn covariance(centered: &[Vec<f32>], n_features: usize) -> Vec<Vec<f32>> {
    let mut cov = vec![vec![0.0f32; n_features]; n_features];
    let scale = 1.0 / (centered.len() as f32 - 1.0).max(1.0);

    for i in 0..n_features {
        for j in i..n_features {
            let sum: f32 = centered.iter().map(|row| row[i] * row[j]).sum();
            cov[i][j] = sum * scale;
            cov[j][i] = sum * scale;
        }
    }
    cov
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduce::tests::generate_test_data;

    #[test]
    fn test_pca_dominant_direction() {
        let data = vec![
            vec![1.0, 2.0],
            vec![2.0, 4.0],
            vec![3.0, 6.0],
            vec![4.0, 8.0],
            vec![5.0, 10.0],
        ];

        let mut pca = Pca::new(2);
        let result = pca.fit_transform(&data).unwrap();
        assert_eq!(result.len(), 5);
        assert_eq!(result[0].len(), 2);

        let ratios = pca.explained_variance_ratio().unwrap();
        assert!(ratios[0] > 0.99);
    }

    #[test]
    fn test_pca_three_components() {
        let data = generate_test_data(40, 10);
        let points = Pca::new(3).fit_transform(&data).unwrap();
        assert_eq!(points.len(), 40);
        assert!(points.iter().all(|p| p.len() == 3));
    }

    #[test]
    fn test_pca_caps_components_at_feature_count() {
        let data = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![2.0, 2.0]];
        let points = Pca::new(3).fit_transform(&data).unwrap();
        assert!(points.iter().all(|p| p.len() == 2));
    }

    #[test]
    fn test_pca_empty_input() {
        assert!(matches!(Pca::new(3).fit(&[]), Err(AtlasError::EmptyInput)));
    }

    #[test]
    fn test_transform_before_fit() {
        assert!(Pca::new(3).transform(&[vec![1.0]]).is_err());
    }
}
