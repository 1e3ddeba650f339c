use serde::{Deserialize, Serialize};

use crate::document::{DocumentPassage, SourceLocator};

/// A passage judged relevant to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePassage {
    pub text: String,

    /// Ranking score; only comparable within one evidence set
    pub score: f64,

    pub locator: SourceLocator,
}

/// Ranked evidence for one iteration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceSet(Vec<EvidencePassage>);

impl EvidenceSet {
    /// Empty evidence set
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rank scored passages: descending score, ties by document order, keep `top_k`
    pub fn ranked<'a, I>(scored: I, top_k: usize) -> Self
    where
        I: IntoIterator<Item = (&'a DocumentPassage, f64)>,
    {
        let mut candidates: Vec<(&DocumentPassage, f64)> = scored.into_iter().collect();
        candidates.sort_by(|(a, score_a), (b, score_b)| {
            score_b
                .total_cmp(score_a)
                .then(a.locator.passage.cmp(&b.locator.passage))
        });
        candidates.truncate(top_k);

        Self(
            candidates
                .into_iter()
                .map(|(passage, score)| EvidencePassage {
                    text: passage.text.clone(),
                    score,
                    locator: passage.locator,
                })
                .collect(),
        )
    }

    pub fn passages(&self) -> &[EvidencePassage] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<EvidencePassage>> for EvidenceSet {
    fn from(passages: Vec<EvidencePassage>) -> Self {
        Self(passages)
    }
}

/// Cosine similarity of two vectors; 0.0 when either is zero or lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(index: usize, text: &str) -> DocumentPassage {
        DocumentPassage {
            locator: SourceLocator {
                passage: index,
                start: index * 100,
                end: index * 100 + text.len(),
            },
            text: text.to_string(),
        }
    }

    #[test]
    fn test_ranked_orders_by_score_then_position() {
        let passages = vec![passage(0, "a"), passage(1, "b"), passage(2, "c"), passage(3, "d")];
        let scored = vec![
            (&passages[3], 0.5),
            (&passages[0], 0.2),
            (&passages[2], 0.9),
            (&passages[1], 0.5),
        ];

        let set = EvidenceSet::ranked(scored, 10);
        let order: Vec<usize> = set.passages().iter().map(|p| p.locator.passage).collect();
        assert_eq!(order, vec![2, 1, 3, 0]);
    }

    #[test]
    fn test_ranked_truncates_to_top_k() {
        let passages = vec![passage(0, "a"), passage(1, "b"), passage(2, "c")];
        let set = EvidenceSet::ranked(passages.iter().map(|p| (p, 1.0)), 2);
        assert_eq!(set.len(), 2);
        assert_eq!(set.passages()[0].locator.passage, 0);
        assert_eq!(set.passages()[1].locator.passage, 1);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }
}
