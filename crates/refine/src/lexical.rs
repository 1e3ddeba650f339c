use async_trait::async_trait;
use qfs_common::{QfsError, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::delegates::EvidenceExtractor;
use crate::document::DocumentView;
use crate::evidence::EvidenceSet;

const K1: f64 = 1.2;
const B: f64 = 0.75;
const GUIDANCE_WEIGHT: f64 = 0.5;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "has",
    "have", "how", "in", "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was",
    "were", "what", "when", "where", "which", "who", "why", "with",
];

/// BM25-style term matching between the query (plus guidance) and each passage
///
/// Needs no model; identical inputs always give identical evidence.
pub struct LexicalExtractor {
    top_k: usize,
    word: Regex,
}

impl LexicalExtractor {
    pub fn new(top_k: usize) -> Result<Self> {
        let word = Regex::new(r"[\p{L}\p{N}]+")
            .map_err(|e| QfsError::config(format!("Invalid token pattern: {}", e)))?;
        Ok(Self { top_k, word })
    }

    fn tokens(&self, text: &str) -> Vec<String> {
        self.word
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|t| t.chars().count() > 1 && !STOPWORDS.contains(&t.as_str()))
            .collect()
    }

    /// Query terms at full weight, guidance-only terms at reduced weight
    fn weighted_terms(&self, query: &str, guidance: Option<&str>) -> Vec<(String, f64)> {
        let mut seen = HashSet::new();
        let mut terms = Vec::new();

        for token in self.tokens(query) {
            if seen.insert(token.clone()) {
                terms.push((token, 1.0));
            }
        }
        for token in guidance.map(|g| self.tokens(g)).unwrap_or_default() {
            if seen.insert(token.clone()) {
                terms.push((token, GUIDANCE_WEIGHT));
            }
        }

        terms
    }
}

#[async_trait]
impl EvidenceExtractor for LexicalExtractor {
    async fn extract(
        &self,
        document: &DocumentView,
        query: &str,
        guidance: Option<&str>,
    ) -> Result<EvidenceSet> {
        let terms = self.weighted_terms(query, guidance);
        let passages = document.passages();
        if terms.is_empty() || passages.is_empty() {
            return Ok(EvidenceSet::empty());
        }

        let frequencies: Vec<HashMap<String, usize>> = passages
            .iter()
            .map(|p| {
                let mut tf = HashMap::new();
                for token in self.tokens(&p.text) {
                    *tf.entry(token).or_insert(0) += 1;
                }
                tf
            })
            .collect();
        let lengths: Vec<f64> = frequencies
            .iter()
            .map(|tf| tf.values().sum::<usize>() as f64)
            .collect();

        let n = passages.len() as f64;
        let avg_len = (lengths.iter().sum::<f64>() / n).max(1.0);

        let idf: Vec<f64> = terms
            .iter()
            .map(|(term, _)| {
                let df = frequencies.iter().filter(|tf| tf.contains_key(term)).count() as f64;
                (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
            })
            .collect();

        let scored = passages.iter().enumerate().filter_map(|(i, passage)| {
            let score: f64 = terms
                .iter()
                .zip(&idf)
                .map(|((term, weight), idf)| {
                    let tf = frequencies[i].get(term).copied().unwrap_or(0) as f64;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let norm = K1 * (1.0 - B + B * lengths[i] / avg_len);
                    weight * idf * tf * (K1 + 1.0) / (tf + norm)
                })
                .sum();
            (score > 0.0).then_some((passage, score))
        });

        let evidence = EvidenceSet::ranked(scored, self.top_k);
        debug!(
            "Lexical extraction - Terms: {}, Candidates: {}, Selected: {}",
            terms.len(),
            passages.len(),
            evidence.len()
        );
        Ok(evidence)
    }
}
