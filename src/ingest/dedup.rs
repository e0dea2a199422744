// src/ingest/dedup.rs
//! Near-duplicate headline filter.
//!
//! - Similarity is `1 - levenshtein / max_len` (`strsim::normalized_levenshtein`), measured
//!   in chars so multi-byte titles score the same as their ASCII look-alikes.
//! - An article is dropped when its title is at least `threshold` similar to any title
//!   that was already kept. The first article of a cluster wins.

use strsim::normalized_levenshtein;

use crate::ingest::types::Article;

/// Reference threshold for headline clustering.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;

/// Normalized edit-distance similarity in `[0.0, 1.0]`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

/// Drop later articles whose titles are near-duplicates of an earlier kept one.
pub fn dedupe(articles: Vec<Article>, threshold: f64) -> Vec<Article> {
    dedupe_with_stats(articles, threshold).0
}

/// Same as [`dedupe`], also returning how many articles were dropped.
pub fn dedupe_with_stats(articles: Vec<Article>, threshold: f64) -> (Vec<Article>, usize) {
    let mut kept: Vec<Article> = Vec::with_capacity(articles.len());
    let mut dropped = 0usize;

    for candidate in articles {
        let duplicate_of = kept
            .iter()
            .find(|k| similarity(&k.title, &candidate.title) >= threshold);

        match duplicate_of {
            Some(original) => {
                tracing::debug!(
                    target: "ingest",
                    dropped = %candidate.title,
                    kept = %original.title,
                    "near-duplicate headline"
                );
                dropped += 1;
            }
            None => kept.push(candidate),
        }
    }

    (kept, dropped)
}
