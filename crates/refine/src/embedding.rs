use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use qfs_common::{QfsError, Result};
use qfs_llm::LlmClient;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::delegates::EvidenceExtractor;
use crate::document::DocumentView;
use crate::evidence::{cosine_similarity, EvidenceSet};

/// Passage embedding requests in flight at once
const EMBED_CONCURRENCY: usize = 4;

/// Ranks passages by cosine similarity to the embedded query (plus guidance)
///
/// Passage embeddings are requested once and cached by passage text, so later
/// iterations only embed the query.
pub struct EmbeddingExtractor {
    client: Arc<dyn LlmClient>,
    model: String,
    top_k: usize,
    cache: Mutex<HashMap<String, Arc<Vec<f32>>>>,
}

impl EmbeddingExtractor {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, top_k: usize) -> Self {
        Self {
            client,
            model: model.into(),
            top_k,
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.client.embed(&self.model, text).await?;
        if vector.is_empty() {
            return Err(QfsError::malformed(format!(
                "Embedding model '{}' returned an empty vector",
                self.model
            )));
        }
        Ok(vector)
    }

    /// Embeddings for every passage, in document order
    ///
    /// Each vector is cached as soon as it arrives, so an interrupted call
    /// leaves its finished work behind for the next attempt.
    async fn passage_embeddings(&self, document: &DocumentView) -> Result<Vec<Arc<Vec<f32>>>> {
        let mut cache = self.cache.lock().await;

        let mut missing: Vec<String> = Vec::new();
        for passage in document.passages() {
            if !cache.contains_key(&passage.text) && !missing.contains(&passage.text) {
                missing.push(passage.text.clone());
            }
        }

        if !missing.is_empty() {
            info!(
                "Embedding {} passages with '{}' (concurrency {})",
                missing.len(),
                self.model,
                EMBED_CONCURRENCY
            );
            let fresh = stream::iter(missing)
                .map(|text| async move {
                    let vector = self.embed(&text).await?;
                    Ok::<_, QfsError>((text, vector))
                })
                .buffered(EMBED_CONCURRENCY);
            futures::pin_mut!(fresh);

            while let Some((text, vector)) = fresh.try_next().await? {
                cache.insert(text, Arc::new(vector));
            }
        }

        document
            .passages()
            .iter()
            .map(|p| {
                cache.get(&p.text).cloned().ok_or_else(|| {
                    QfsError::llm(format!("No embedding cached for passage {}", p.locator.passage))
                })
            })
            .collect()
    }
}

#[async_trait]
impl EvidenceExtractor for EmbeddingExtractor {
    async fn extract(
        &self,
        document: &DocumentView,
        query: &str,
        guidance: Option<&str>,
    ) -> Result<EvidenceSet> {
        if document.passages().is_empty() {
            return Ok(EvidenceSet::empty());
        }

        let passage_vectors = self.passage_embeddings(document).await?;

        let target = match guidance {
            Some(g) if !g.trim().is_empty() => format!("{}\n{}", query, g),
            _ => query.to_string(),
        };
        let query_vector = self.embed(&target).await?;

        let scored = document
            .passages()
            .iter()
            .zip(&passage_vectors)
            .map(|(passage, vector)| (passage, cosine_similarity(&query_vector, vector)));

        let evidence = EvidenceSet::ranked(scored, self.top_k);
        debug!(
            "Embedding extraction - Candidates: {}, Selected: {}",
            passage_vectors.len(),
            evidence.len()
        );
        Ok(evidence)
    }
}
