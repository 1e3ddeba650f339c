//! Capabilities the iteration controller depends on
//!
//! Each role is a one-method trait so deployments and tests can swap
//! implementations independently.

use async_trait::async_trait;
use qfs_common::Result;

use crate::document::DocumentView;
use crate::evidence::EvidenceSet;
use crate::types::Critique;

/// Selects query-relevant passages from the document
#[async_trait]
pub trait EvidenceExtractor: Send + Sync {
    /// Passages ordered by descending score, ties in document order.
    /// `guidance` is the previous critique's hint; absent on the first round.
    async fn extract(
        &self,
        document: &DocumentView,
        query: &str,
        guidance: Option<&str>,
    ) -> Result<EvidenceSet>;
}

/// Produces the next candidate summary
#[async_trait]
pub trait DraftSynthesizer: Send + Sync {
    /// Returns a complete replacement summary. With empty evidence the prior
    /// summary may come back unchanged.
    async fn synthesize(
        &self,
        query: &str,
        prior_summary: &str,
        evidence: &EvidenceSet,
    ) -> Result<String>;
}

/// Judges whether a summary answers the query
#[async_trait]
pub trait AdequacyCritic: Send + Sync {
    async fn critique(&self, query: &str, summary: &str) -> Result<Critique>;
}
