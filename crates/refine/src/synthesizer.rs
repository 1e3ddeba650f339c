use async_trait::async_trait;
use qfs_common::{QfsError, Result};
use qfs_llm::{synthesis_prompt, EvidenceLine, GenerateOptions, GenerateRequest, LlmClient};
use std::sync::Arc;
use tracing::debug;

use crate::delegates::DraftSynthesizer;
use crate::evidence::EvidenceSet;

/// Drafts the query-focused summary with a text generation model
pub struct LlmSynthesizer {
    client: Arc<dyn LlmClient>,
    model: String,
    options: GenerateOptions,
}

impl LlmSynthesizer {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            options: GenerateOptions {
                temperature: Some(0.3),
                ..Default::default()
            },
        }
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl DraftSynthesizer for LlmSynthesizer {
    async fn synthesize(
        &self,
        query: &str,
        prior_summary: &str,
        evidence: &EvidenceSet,
    ) -> Result<String> {
        if evidence.is_empty() && !prior_summary.trim().is_empty() {
            debug!("No new evidence, keeping prior summary");
            return Ok(prior_summary.to_string());
        }

        let lines: Vec<EvidenceLine<'_>> = evidence
            .passages()
            .iter()
            .map(|p| EvidenceLine {
                locator: p.locator.to_string(),
                text: &p.text,
            })
            .collect();

        let prompt = synthesis_prompt(query, prior_summary, &lines);
        let request = GenerateRequest::text(&self.model, prompt, self.options.clone());
        let response = self.client.generate(request).await?;

        let summary = response.trim();
        if summary.is_empty() {
            return Err(QfsError::malformed(format!(
                "Model '{}' returned an empty summary",
                self.model
            )));
        }

        debug!("Drafted summary: {} chars from {} passages", summary.len(), lines.len());
        Ok(summary.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentView;
    use std::sync::Mutex;

    /// Records prompts and replies with a fixed text
    struct Scripted {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for Scripted {
        async fn generate(&self, request: GenerateRequest) -> Result<String> {
            self.prompts.lock().unwrap().push(request.prompt);
            Ok(self.reply.clone())
        }

        async fn embed(&self, _model: &str, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }

        async fn test_connection(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn evidence() -> EvidenceSet {
        let doc = DocumentView::new("Alpha facts.\n\nBeta facts.");
        EvidenceSet::ranked(doc.passages().iter().map(|p| (p, 1.0)), 8)
    }

    #[tokio::test]
    async fn test_prompt_carries_query_and_located_evidence() {
        let client = Scripted::new("  SUMMARY: alpha and beta.\n");
        let synthesizer = LlmSynthesizer::new(client.clone(), "llama3.2");

        let summary = synthesizer
            .synthesize("what facts?", "", &evidence())
            .await
            .unwrap();
        assert_eq!(summary, "SUMMARY: alpha and beta.");

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("what facts?"));
        assert!(prompts[0].contains("[1] (passage 0 @ 0..12)\nAlpha facts."));
    }

    #[tokio::test]
    async fn test_empty_evidence_keeps_prior_without_model_call() {
        let client = Scripted::new("should not be used");
        let synthesizer = LlmSynthesizer::new(client.clone(), "llama3.2");

        let summary = synthesizer
            .synthesize("q", "existing summary", &EvidenceSet::empty())
            .await
            .unwrap();
        assert_eq!(summary, "existing summary");
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_draft_without_evidence_still_calls_model() {
        let client = Scripted::new("Nothing relevant found.");
        let synthesizer = LlmSynthesizer::new(client.clone(), "llama3.2");

        let summary = synthesizer.synthesize("q", "", &EvidenceSet::empty()).await.unwrap();
        assert_eq!(summary, "Nothing relevant found.");
        assert_eq!(client.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_reply_is_malformed() {
        let synthesizer = LlmSynthesizer::new(Scripted::new("  \n"), "llama3.2");
        let err = synthesizer.synthesize("q", "", &evidence()).await.unwrap_err();
        assert!(err.is_malformed());
    }
}
