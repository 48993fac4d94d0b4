//! Semantic and lexical document search.
//!
//! Semantic search embeds the query through an [`Embedder`] and ranks every
//! document by cosine similarity, keeping matches within a dynamic relevance
//! band of the best score. It degrades to conjunctive lexical matching when
//! the dataset's embeddings are too low-dimensional to be meaningful or the
//! embedder is unavailable; a degraded search still returns results.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::dataset::Dataset;
use crate::embed::Embedder;

/// Cosine similarity over the shorter of the two vectors.
///
/// Zero-length or zero-norm input scores 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

/// A ranked document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchMatch {
    pub index: usize,
    pub score: f32,
}

/// How a search was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Empty query: match state reset.
    Cleared,
    /// Substring matching on document text.
    Lexical,
    /// Embedding similarity.
    Semantic,
}

/// Text preview of a match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPreview {
    pub index: usize,
    pub id: String,
    pub score: f32,
    pub snippet: String,
}

const SNIPPET_CHARS: usize = 200;

/// Result of a search request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub mode: SearchMode,
    /// Retained matches, best first.
    pub ranked: Vec<SearchMatch>,
    /// Score of the top-ranked document before thresholding, or 0.
    pub best_score: f32,
    /// Why semantic search was not used, when it was wanted.
    pub fallback_reason: Option<String>,
}

impl SearchOutcome {
    /// The reset outcome of an empty query.
    pub fn cleared() -> Self {
        Self {
            query: String::new(),
            mode: SearchMode::Cleared,
            ranked: Vec::new(),
            best_score: 0.0,
            fallback_reason: None,
        }
    }

    /// Index-to-score mapping that drives highlighting.
    pub fn matches(&self) -> HashMap<usize, f32> {
        self.ranked.iter().map(|m| (m.index, m.score)).collect()
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Whether the search fell back from semantic to lexical matching.
    pub fn is_degraded(&self) -> bool {
        self.fallback_reason.is_some()
    }

    /// Text previews of the top `limit` matches.
    pub fn previews(&self, dataset: &Dataset, limit: usize) -> Vec<SearchPreview> {
        self.ranked
            .iter()
            .take(limit)
            .filter_map(|m| {
                let doc = dataset.documents.get(m.index)?;
                Some(SearchPreview {
                    index: m.index,
                    id: doc.id.clone(),
                    score: m.score,
                    snippet: snippet(&doc.text, SNIPPET_CHARS),
                })
            })
            .collect()
    }
}

/// First `max_chars` characters of `text` with whitespace collapsed.
fn snippet(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &collapsed[..cut]),
        None => collapsed,
    }
}

/// Sort `scored` best first, then keep entries within the relevance band of
/// the best score, capped at `config.max_results`.
///
/// Returns the retained matches and the best score (0 when empty).
pub fn apply_relevance_threshold(
    mut scored: Vec<SearchMatch>,
    config: &SearchConfig,
) -> (Vec<SearchMatch>, f32) {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    let best = scored.first().map_or(0.0, |m| m.score);
    let threshold = config.threshold(best);

    scored.retain(|m| m.score >= threshold);
    scored.truncate(config.max_results);
    (scored, best)
}

/// Ranks documents against a query.
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search `dataset` for `query`.
    ///
    /// Never fails: an unavailable embedder or low-dimensional dataset yields a
    /// lexical result with `fallback_reason` set.
    pub async fn search(
        &self,
        query: &str,
        dataset: &Dataset,
        embedder: &dyn Embedder,
    ) -> SearchOutcome {
        let query = query.trim();
        if query.is_empty() {
            return SearchOutcome::cleared();
        }

        let dim = dataset.effective_dim();
        if dim < self.config.min_semantic_dim {
            debug!(dim, "embeddings too low-dimensional for semantic search");
            return self.lexical_outcome(query, dataset, None);
        }

        match embedder.embed(query).await {
            Some(vector) => {
                let (ranked, best_score) = self.semantic(&vector, dataset);
                info!(
                    query,
                    matches = ranked.len(),
                    best_score,
                    "semantic search complete"
                );
                SearchOutcome {
                    query: query.to_string(),
                    mode: SearchMode::Semantic,
                    ranked,
                    best_score,
                    fallback_reason: None,
                }
            }
            None => {
                warn!(query, "embedding unavailable, using text matching");
                self.lexical_outcome(
                    query,
                    dataset,
                    Some("embedding provider unavailable; showing text matches".to_string()),
                )
            }
        }
    }

    fn lexical_outcome(
        &self,
        query: &str,
        dataset: &Dataset,
        fallback_reason: Option<String>,
    ) -> SearchOutcome {
        let ranked = self.lexical(query, dataset);
        let best_score = ranked.first().map_or(0.0, |m| m.score);
        info!(query, matches = ranked.len(), "text search complete");
        SearchOutcome {
            query: query.to_string(),
            mode: SearchMode::Lexical,
            ranked,
            best_score,
            fallback_reason,
        }
    }

    /// Conjunctive substring matching, best first.
    ///
    /// A document matches when every lowercased whitespace-separated term of
    /// the query occurs in its lowercased text. The score is the summed count
    /// of non-overlapping occurrences over `lexical_saturation`, capped at 1.
    pub fn lexical(&self, query: &str, dataset: &Dataset) -> Vec<SearchMatch> {
        let lowered = query.to_lowercase();
        let terms: Vec<&str> = lowered.split_whitespace().collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<SearchMatch> = dataset
            .documents
            .iter()
            .enumerate()
            .filter_map(|(index, doc)| {
                let text = doc.text.to_lowercase();
                let mut occurrences = 0usize;
                for term in &terms {
                    let count = text.matches(term).count();
                    if count == 0 {
                        return None;
                    }
                    occurrences += count;
                }
                let score = (occurrences as f32 / self.config.lexical_saturation).min(1.0);
                Some(SearchMatch { index, score })
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
        ranked
    }

    /// Cosine ranking of every document against `query_vector`, thresholded.
    pub fn semantic(&self, query_vector: &[f32], dataset: &Dataset) -> (Vec<SearchMatch>, f32) {
        let scored = dataset
            .documents
            .iter()
            .enumerate()
            .map(|(index, doc)| SearchMatch {
                index,
                score: cosine_similarity(query_vector, &doc.embedding),
            })
            .collect();
        apply_relevance_threshold(scored, &self.config)
    }
}
