//! Cosine similarity ranking over session-local fragments.
//!
//! Corpora here are a few thousand fragments at most, so search is a
//! linear scan with a stable sort.

use serde::Serialize;

use crate::session::Source;

/// Added to the norm product so zero vectors score 0 instead of NaN.
const NORM_EPSILON: f32 = 1e-10;

/// A candidate fragment to be ranked.
#[derive(Debug, Clone)]
pub struct SearchItem {
    pub text: String,
    pub embedding: Vec<f32>,
    pub source: Source,
}

/// A ranked fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    pub text: String,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
    pub source: Source,
}

/// Cosine of the angle between `a` and `b`.
///
/// Vectors are expected to have equal length; extra trailing components of
/// the longer one are ignored.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt() + NORM_EPSILON)
}

/// Rank `items` against `query` and return the best `top_k`.
///
/// Results are ordered by score descending; equal scores keep input order.
/// Items whose dimensionality differs from the query are skipped.
pub fn search(query: &[f32], items: &[SearchItem], top_k: usize) -> Vec<ScoredItem> {
    if top_k == 0 {
        return vec![];
    }

    let mut results: Vec<ScoredItem> = items
        .iter()
        .filter(|item| {
            let matches = item.embedding.len() == query.len();
            if !matches {
                log::warn!(
                    "skipping {} fragment with {} dims (query has {})",
                    item.source,
                    item.embedding.len(),
                    query.len()
                );
            }
            matches
        })
        .map(|item| ScoredItem {
            text: item.text.clone(),
            score: cosine_similarity(query, &item.embedding),
            source: item.source,
        })
        .collect();

    // sort_by is stable, so ties keep their input order
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(top_k);

    results
}
