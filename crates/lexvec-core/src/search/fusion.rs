//! Score fusion for hybrid retrieval.
//!
//! Combines the keyword pass (discrete hit counts) with the semantic pass
//! (inner-product similarity) into one ranking:
//!
//! ```text
//! keyword_component  = min(hits * 0.1, 1.0)
//! semantic_component = similarity, or 0.0 if absent from the semantic pass
//! final = semantic_component + 10.0                        if exact match
//!       = semantic_component + keyword_component * 2.0     otherwise
//! ```
//!
//! The exact-match bonus pushes every keyword hit above every record that
//! lacks one. Candidates are keyed by ordinal, so a record found by both
//! passes appears once.

use super::types::Ordinal;
use crate::config::{EXACT_MATCH_BONUS, KEYWORD_SCORE_CAP, KEYWORD_SCORE_SCALE, KEYWORD_WEIGHT};
use std::collections::BTreeMap;

/// One fused candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedHit {
    pub ordinal: Ordinal,
    /// Final fused score
    pub score: f32,
    /// Similarity from the semantic pass, if present there
    pub semantic_score: Option<f32>,
    /// Scaled keyword component, if present in the keyword pass
    pub keyword_score: Option<f32>,
    pub exact_match: bool,
}

#[derive(Default)]
struct Candidate {
    semantic: Option<f32>,
    keyword: Option<f32>,
}

/// Scales a raw keyword hit count into `[0, KEYWORD_SCORE_CAP]`.
pub fn keyword_component(hits: f32) -> f32 {
    (hits * KEYWORD_SCORE_SCALE).min(KEYWORD_SCORE_CAP)
}

/// Fuses both passes and returns the top `k` hits.
///
/// Output is sorted by final score descending, ties by ascending ordinal.
pub fn fuse(
    keyword_hits: &[(Ordinal, f32)],
    semantic_hits: &[(Ordinal, f32)],
    k: usize,
) -> Vec<FusedHit> {
    let mut candidates: BTreeMap<Ordinal, Candidate> = BTreeMap::new();

    for &(ordinal, hits) in keyword_hits {
        candidates.entry(ordinal).or_default().keyword = Some(keyword_component(hits));
    }
    for &(ordinal, similarity) in semantic_hits {
        candidates.entry(ordinal).or_default().semantic = Some(similarity);
    }

    let mut fused: Vec<FusedHit> = candidates
        .into_iter()
        .map(|(ordinal, candidate)| {
            let semantic = candidate.semantic.unwrap_or(0.0);
            let exact_match = candidate.keyword.is_some();
            let score = if exact_match {
                semantic + EXACT_MATCH_BONUS
            } else {
                semantic + candidate.keyword.unwrap_or(0.0) * KEYWORD_WEIGHT
            };
            FusedHit {
                ordinal,
                score,
                semantic_score: candidate.semantic,
                keyword_score: candidate.keyword,
                exact_match,
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.ordinal.cmp(&b.ordinal))
    });
    fused.truncate(k);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ord(i: usize) -> Ordinal {
        Ordinal::from_index(i)
    }

    #[test]
    fn test_keyword_component_caps() {
        assert!((keyword_component(3.0) - 0.3).abs() < 1e-6);
        assert_eq!(keyword_component(10.0), 1.0);
        assert_eq!(keyword_component(25.0), 1.0);
    }

    #[test]
    fn test_exact_match_outranks_semantic_only() {
        let keyword = vec![(ord(2), 1.0)];
        let semantic = vec![(ord(0), 0.99), (ord(1), 0.95), (ord(2), -0.2)];

        let fused = fuse(&keyword, &semantic, 3);
        assert_eq!(fused[0].ordinal, ord(2));
        assert!(fused[0].exact_match);
        assert!((fused[0].score - 9.8).abs() < 1e-5);
        assert_eq!(fused[1].ordinal, ord(0));
        assert_eq!(fused[2].ordinal, ord(1));
    }

    #[test]
    fn test_keyword_only_hit_gets_zero_semantic() {
        let fused = fuse(&[(ord(4), 2.0)], &[], 5);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].semantic_score, None);
        assert_eq!(fused[0].keyword_score, Some(0.2));
        assert_eq!(fused[0].score, EXACT_MATCH_BONUS);
    }

    #[test]
    fn test_dedup_by_ordinal() {
        let fused = fuse(&[(ord(1), 1.0)], &[(ord(1), 0.5)], 10);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].semantic_score, Some(0.5));
        assert_eq!(fused[0].keyword_score, Some(0.1));
    }

    #[test]
    fn test_ties_break_by_ordinal() {
        let semantic = vec![(ord(3), 0.5), (ord(1), 0.5), (ord(2), 0.5)];
        let fused = fuse(&[], &semantic, 3);
        let order: Vec<Ordinal> = fused.iter().map(|h| h.ordinal).collect();
        assert_eq!(order, vec![ord(1), ord(2), ord(3)]);
    }

    #[test]
    fn test_truncates_to_k() {
        let semantic = vec![(ord(0), 0.9), (ord(1), 0.8), (ord(2), 0.7)];
        assert_eq!(fuse(&[], &semantic, 2).len(), 2);
        assert!(fuse(&[], &semantic, 0).is_empty());
    }
}
