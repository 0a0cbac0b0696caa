//! Vector similarity for intent ranking
//!
//! Similarity is computed client-side against candidate intent embeddings;
//! the graph store is never asked to rank.

use ordered_float::OrderedFloat;

/// Compute cosine similarity between two vectors.
///
/// Mismatched dimensions or zero vectors score 0.0 rather than erroring;
/// a non-matchable candidate is just a non-match.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Score candidates against a query vector, drop those below `floor`,
/// and return the top `k` in descending score order.
///
/// Equal scores keep their enumeration order (stable sort).
pub fn rank_candidates<T>(
    query: &[f32],
    candidates: Vec<(Vec<f32>, T)>,
    floor: f32,
    k: usize,
) -> Vec<(f32, T)> {
    let mut scored: Vec<(OrderedFloat<f32>, T)> = candidates
        .into_iter()
        .filter_map(|(vec, item)| {
            let score = cosine_similarity(query, &vec);
            (score > floor).then_some((OrderedFloat(score), item))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(k)
        .map(|(score, item)| (score.0, item))
        .collect()
}

/// Round a score to 3 decimals for client responses.
#[inline]
pub fn round_score(score: f32) -> f32 {
    (score * 1000.0).round() / 1000.0
}
