//! Dataset model: documents, embeddings and precomputed layouts.
//!
//! Datasets are read from the JSON format written by the offline exporter:
//!
//! ```json
//! {
//!   "metadata": { "name": "...", "embedding_model": "...", "embedding_dim": 768, "count": 2 },
//!   "documents": [ { "id": "a", "text": "...", "embedding": [...], "metadata": {...} } ],
//!   "projections": { "umap": [[x, y, z], ...], "tsne": [...], "pca": [...] }
//! }
//! ```
//!
//! A dataset is immutable once loaded. Document identity is the position in
//! `documents`; `id` is kept for external reference.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{AtlasError, Result};

/// Dimensionality reduction algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Principal Component Analysis - fast, linear
    Pca,
    /// UMAP - preserves local and global structure
    Umap,
    /// t-SNE - only available when precomputed
    #[serde(alias = "t-sne")]
    Tsne,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::Pca, Algorithm::Umap, Algorithm::Tsne];

    /// Lowercase name used as the key in dataset files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Pca => "pca",
            Algorithm::Umap => "umap",
            Algorithm::Tsne => "tsne",
        }
    }

    /// Whether the algorithm is too slow to run at interactive latency.
    pub fn requires_precomputation(&self) -> bool {
        matches!(self, Algorithm::Tsne)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pca" => Ok(Algorithm::Pca),
            "umap" => Ok(Algorithm::Umap),
            "tsne" | "t-sne" => Ok(Algorithm::Tsne),
            other => Err(AtlasError::InvalidDataset(format!(
                "unknown projection algorithm '{other}'"
            ))),
        }
    }
}

/// Dataset-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub name: String,
    #[serde(default)]
    pub embedding_model: String,
    #[serde(default)]
    pub embedding_dim: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl DatasetMetadata {
    pub fn new(name: impl Into<String>, embedding_dim: usize) -> Self {
        Self {
            name: name.into(),
            embedding_model: String::new(),
            embedding_dim,
            count: None,
        }
    }
}

/// A single document with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    /// Non-empty category string stored under `key`.
    pub fn category(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Timestamp stored under `key`, if it parses.
    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.metadata.get(key).and_then(parse_timestamp)
    }
}

/// Parse a metadata timestamp: RFC 3339, `YYYY-MM-DD HH:MM:SS`, a bare date,
/// or epoch seconds/milliseconds as a number or numeric string.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
            }
            s.parse::<f64>().ok().and_then(from_epoch)
        }
        _ => None,
    }
}

fn from_epoch(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    // Anything past year ~5000 in seconds is taken to be milliseconds.
    let millis = if raw > 1e11 { raw } else { raw * 1000.0 };
    DateTime::from_timestamp_millis(millis as i64)
}

/// One raw precomputed point: entries may be null or short.
type RawPoint = Option<Vec<Option<f32>>>;

/// A loaded dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub metadata: DatasetMetadata,
    pub documents: Vec<Document>,
    #[serde(
        default,
        rename = "projections",
        alias = "precomputed_projections",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub precomputed_projections: BTreeMap<String, Vec<RawPoint>>,
}

impl Dataset {
    pub fn new(metadata: DatasetMetadata, documents: Vec<Document>) -> Self {
        Self {
            metadata,
            documents,
            precomputed_projections: BTreeMap::new(),
        }
    }

    /// Attach a precomputed layout for `algorithm`.
    #[must_use]
    pub fn with_precomputed(mut self, algorithm: Algorithm, points: &[[f32; 3]]) -> Self {
        let raw = points
            .iter()
            .map(|p| Some(p.iter().copied().map(Some).collect()))
            .collect();
        self.precomputed_projections
            .insert(algorithm.as_str().to_string(), raw);
        self
    }

    /// Parse a dataset from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let dataset: Self = serde_json::from_str(text)?;
        for note in dataset.validate() {
            warn!(dataset = %dataset.metadata.name, "{note}");
        }
        Ok(dataset)
    }

    /// Read and parse a dataset file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let dataset = Self::from_json_str(&text)?;
        info!(
            path = %path.display(),
            name = %dataset.metadata.name,
            documents = dataset.len(),
            dim = dataset.effective_dim(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Write the dataset as pretty-printed JSON in the exporter's layout.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), documents = self.len(), "saved dataset");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Declared embedding dimension, or the first embedding's length when undeclared.
    pub fn effective_dim(&self) -> usize {
        if self.metadata.embedding_dim > 0 {
            self.metadata.embedding_dim
        } else {
            self.documents.first().map_or(0, |d| d.embedding.len())
        }
    }

    /// Embedding vectors in document order.
    pub fn embeddings(&self) -> Vec<Vec<f32>> {
        self.documents.iter().map(|d| d.embedding.clone()).collect()
    }

    /// Algorithms with a precomputed layout in this dataset.
    pub fn precomputed_algorithms(&self) -> Vec<Algorithm> {
        let mut algorithms: Vec<Algorithm> = self
            .precomputed_projections
            .keys()
            .filter_map(|k| k.parse().ok())
            .collect();
        algorithms.sort();
        algorithms.dedup();
        algorithms
    }

    /// Precomputed layout for `algorithm`, one point per document.
    ///
    /// Null or short coordinate entries become 0, and a layout shorter than the
    /// document list is padded with the origin.
    pub fn precomputed_layout(&self, algorithm: Algorithm) -> Option<Vec<[f32; 3]>> {
        let raw = self
            .precomputed_projections
            .iter()
            .find(|(key, _)| key.parse::<Algorithm>().ok() == Some(algorithm))
            .map(|(_, points)| points)?;

        let coord = |point: &RawPoint, axis: usize| -> f32 {
            point
                .as_ref()
                .and_then(|p| p.get(axis).copied().flatten())
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
        };

        let mut layout: Vec<[f32; 3]> = raw
            .iter()
            .take(self.len())
            .map(|p| [coord(p, 0), coord(p, 1), coord(p, 2)])
            .collect();
        layout.resize(self.len(), [0.0; 3]);
        Some(layout)
    }

    /// Non-fatal consistency notes about the dataset.
    pub fn validate(&self) -> Vec<String> {
        let mut notes = Vec::new();
        let dim = self.effective_dim();

        let mismatched = self
            .documents
            .iter()
            .filter(|d| d.embedding.len() != dim)
            .count();
        if mismatched > 0 {
            notes.push(format!(
                "{mismatched} document(s) have an embedding length different from {dim}"
            ));
        }

        if let Some(count) = self.metadata.count {
            if count != self.len() {
                notes.push(format!(
                    "metadata count {count} differs from {} documents",
                    self.len()
                ));
            }
        }

        for (name, points) in &self.precomputed_projections {
            if name.parse::<Algorithm>().is_err() {
                notes.push(format!("ignoring projection with unknown algorithm '{name}'"));
            } else if points.len() != self.len() {
                notes.push(format!(
                    "projection '{name}' has {} points for {} documents",
                    points.len(),
                    self.len()
                ));
            }
        }

        notes
    }
}
