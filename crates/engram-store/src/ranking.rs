//! Pure ranking helpers shared by the vector and fallback paths

use std::collections::HashSet;

use crate::schema::SearchHit;

/// Order hits by score descending, ties broken by `created_at`
/// descending (most recent first).
pub fn order_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.memory.created_at.cmp(&a.memory.created_at))
    });
}

/// Term-overlap score in [0, 1]: fraction of query tokens present in
/// the candidate text. Zero when nothing overlaps.
pub fn term_overlap(query: &str, text: &str) -> f32 {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return 0.0;
    }
    let text_tokens = tokenize(text);
    let matched = query_tokens.intersection(&text_tokens).count();
    matched as f32 / query_tokens.len() as f32
}

/// Exact cosine similarity. Returns 0.0 for zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MemoryMetadata, StoredMemory};
    use chrono::{Duration, Utc};

    fn hit(score: f32, age_secs: i64) -> SearchHit {
        let mut memory =
            StoredMemory::new("text", vec![1.0], MemoryMetadata::new(), "fake-bow");
        memory.created_at = Utc::now() - Duration::seconds(age_secs);
        SearchHit { memory, score }
    }

    #[test]
    fn orders_by_score_descending() {
        let mut hits = vec![hit(0.2, 0), hit(0.9, 0), hit(0.5, 0)];
        order_hits(&mut hits);
        let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
        assert_eq!(scores, vec![0.9, 0.5, 0.2]);
    }

    #[test]
    fn ties_break_most_recent_first() {
        let mut hits = vec![hit(0.5, 100), hit(0.5, 10)];
        order_hits(&mut hits);
        assert!(hits[0].memory.created_at > hits[1].memory.created_at);
    }

    #[test]
    fn term_overlap_fraction() {
        let score = term_overlap("quantum finance", "Discussed quantum computing in finance.");
        assert!((score - 1.0).abs() < 1e-6);
        let partial = term_overlap("quantum biology", "Discussed quantum computing in finance.");
        assert!((partial - 0.5).abs() < 1e-6);
        assert_eq!(term_overlap("unrelated words", "something else entirely"), 0.0);
    }

    #[test]
    fn term_overlap_ignores_case_and_punctuation() {
        assert!((term_overlap("Quantum!", "quantum") - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_identical_unit_vectors_is_one() {
        let v = vec![0.6, 0.8];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
