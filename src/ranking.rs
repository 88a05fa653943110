//! Top-k similarity ranking of catalog entries against a query vector.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::catalog::Catalog;
use crate::error::FinderError;

/// How a query vector is compared against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMode {
    /// The query is a probability distribution; entry `i` scores `query[i]`.
    Probability,
    /// Cosine similarity between the query and each reference vector.
    Cosine,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMatch {
    pub label: String,
    pub score: f32,
}

pub type RankedResult = Vec<RankedMatch>;

const DISTRIBUTION_TOLERANCE: f32 = 1e-3;

/// Orders catalog entries by descending score and keeps the first `top_k`.
///
/// Ties keep catalog order. An empty catalog ranks to an empty result.
pub fn rank(
    query: &[f32],
    catalog: &Catalog,
    top_k: usize,
    mode: ScoreMode,
) -> Result<RankedResult, FinderError> {
    if top_k == 0 {
        return Err(FinderError::InvalidTopK);
    }
    if catalog.is_empty() {
        return Ok(Vec::new());
    }

    let scores = match mode {
        ScoreMode::Probability => probability_scores(query, catalog)?,
        ScoreMode::Cosine => cosine_scores(query, catalog)?,
    };

    let mut ranked = catalog
        .entries()
        .iter()
        .zip(scores)
        .map(|(entry, score)| RankedMatch {
            label: entry.label.clone(),
            score,
        })
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| descending(a.score, b.score));
    ranked.truncate(top_k);
    Ok(ranked)
}

fn probability_scores(query: &[f32], catalog: &Catalog) -> Result<Vec<f32>, FinderError> {
    if query.len() != catalog.len() {
        return Err(FinderError::VectorLengthMismatch {
            label: "<distribution>".to_string(),
            expected: catalog.len(),
            actual: query.len(),
        });
    }
    let total = query.iter().sum::<f32>();
    if (total - 1.0).abs() > DISTRIBUTION_TOLERANCE {
        tracing::warn!(total, "query distribution does not sum to 1");
    }
    Ok(query.to_vec())
}

fn cosine_scores(query: &[f32], catalog: &Catalog) -> Result<Vec<f32>, FinderError> {
    let query_norm = norm(query);
    catalog
        .entries()
        .iter()
        .map(|entry| {
            if entry.reference.len() != query.len() {
                return Err(FinderError::VectorLengthMismatch {
                    label: entry.label.clone(),
                    expected: entry.reference.len(),
                    actual: query.len(),
                });
            }
            Ok(cosine(query, query_norm, &entry.reference))
        })
        .collect()
}

/// Cosine similarity; zero when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, FinderError> {
    if a.len() != b.len() {
        return Err(FinderError::VectorLengthMismatch {
            label: "<vector>".to_string(),
            expected: b.len(),
            actual: a.len(),
        });
    }
    Ok(cosine(a, norm(a), b))
}

fn cosine(query: &[f32], query_norm: f64, reference: &[f32]) -> f32 {
    let reference_norm = norm(reference);
    if query_norm == 0.0 || reference_norm == 0.0 {
        return 0.0;
    }
    let dot = query
        .iter()
        .zip(reference)
        .map(|(a, b)| *a as f64 * *b as f64)
        .sum::<f64>();
    (dot / (query_norm * reference_norm)).clamp(-1.0, 1.0) as f32
}

fn norm(values: &[f32]) -> f64 {
    values
        .iter()
        .map(|value| *value as f64 * *value as f64)
        .sum::<f64>()
        .sqrt()
}

// NaN sorts after every number.
fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let Some(max) = logits.iter().copied().reduce(f32::max) else {
        return Vec::new();
    };
    let exps = logits
        .iter()
        .map(|value| ((*value - max) as f64).exp())
        .collect::<Vec<_>>();
    let sum = exps.iter().sum::<f64>();
    exps.into_iter().map(|value| (value / sum) as f32).collect()
}
