use qfs_common::{QfsError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::delegates::{AdequacyCritic, DraftSynthesizer, EvidenceExtractor};
use crate::document::DocumentView;
use crate::policy::RetryPolicy;
use crate::state::RunState;
use crate::types::{IterationRecord, RunFailure, RunResult, Stage};

/// Drives the extract → draft → critique loop for one query over one document
///
/// The controller holds no per-run state; every call to [`run`](Self::run)
/// owns its own summary and history, so one controller can serve independent
/// runs concurrently.
pub struct IterationController {
    extractor: Arc<dyn EvidenceExtractor>,
    synthesizer: Arc<dyn DraftSynthesizer>,
    critic: Arc<dyn AdequacyCritic>,
    policy: RetryPolicy,
}

impl IterationController {
    /// Create new controller with the default retry policy
    pub fn new(
        extractor: Arc<dyn EvidenceExtractor>,
        synthesizer: Arc<dyn DraftSynthesizer>,
        critic: Arc<dyn AdequacyCritic>,
    ) -> Self {
        Self {
            extractor,
            synthesizer,
            critic,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run to completion without external cancellation
    pub async fn run(&self, document: &DocumentView, query: &str, max_iterations: u32) -> RunResult {
        self.run_with_cancellation(document, query, max_iterations, &CancellationToken::new())
            .await
    }

    /// Run until a stop condition or until `cancel` fires at an iteration boundary
    pub async fn run_with_cancellation(
        &self,
        document: &DocumentView,
        query: &str,
        max_iterations: u32,
        cancel: &CancellationToken,
    ) -> RunResult {
        let span = info_span!("qfs_run", run_id = %Uuid::new_v4());
        self.drive(document, query, max_iterations, cancel)
            .instrument(span)
            .await
    }

    async fn drive(
        &self,
        document: &DocumentView,
        query: &str,
        max_iterations: u32,
        cancel: &CancellationToken,
    ) -> RunResult {
        let query = query.trim();
        let mut state = RunState::Running;
        let mut failure = None;

        if let Err(e) = validate_input(document, query, max_iterations) {
            warn!("Rejecting run: {}", e);
            state = state.on_invalid_input();
            failure = Some(RunFailure::input_invalid(e.to_string()));
        } else {
            info!(
                "Starting refinement - Query: {:?}, Passages: {}, Budget: {}",
                query,
                document.passages().len(),
                max_iterations
            );
        }

        let mut history: Vec<IterationRecord> = Vec::new();
        let mut current_summary = String::new();
        let mut guidance: Option<String> = None;

        let stop_reason = loop {
            if let Some(reason) = state.stop_reason() {
                break reason;
            }

            let iteration = history.len() as u32 + 1;
            match self
                .run_round(document, query, iteration, &current_summary, guidance.as_deref())
                .await
            {
                Ok(record) => {
                    let stalled = record.summary == current_summary;
                    state = state.after_round(record.verdict, iteration, max_iterations, stalled);

                    info!(
                        "Iteration {}/{} done - Evidence: {}, Summary: {} chars, Verdict: {:?}",
                        iteration,
                        max_iterations,
                        record.evidence.len(),
                        record.summary.len(),
                        record.verdict
                    );

                    current_summary = record.summary.clone();
                    guidance = record.guidance.clone();
                    history.push(record);

                    state = state.at_boundary(cancel.is_cancelled());
                }
                Err(run_failure) => {
                    error!(
                        "Iteration {} aborted: {} failed after {} attempts: {}",
                        iteration,
                        run_failure
                            .stage
                            .map(|s| s.to_string())
                            .unwrap_or_default(),
                        run_failure.attempts,
                        run_failure.message
                    );
                    state = state.on_delegate_failure();
                    failure = Some(run_failure);
                }
            }
        };

        info!(
            "Refinement finished - Stop reason: {}, Iterations: {}",
            stop_reason,
            history.len()
        );

        RunResult::from_history(query, max_iterations, stop_reason, failure, history)
    }

    async fn run_round(
        &self,
        document: &DocumentView,
        query: &str,
        iteration: u32,
        prior_summary: &str,
        guidance: Option<&str>,
    ) -> std::result::Result<IterationRecord, RunFailure> {
        debug!("Iteration {} - extracting evidence (guided: {})", iteration, guidance.is_some());
        let evidence = self
            .call(Stage::Extract, iteration, move || async move {
                self.extractor.extract(document, query, guidance).await
            })
            .await?;

        debug!("Iteration {} - drafting from {} passages", iteration, evidence.len());
        let evidence_ref = &evidence;
        let summary = self
            .call(Stage::Synthesize, iteration, move || async move {
                self.synthesizer
                    .synthesize(query, prior_summary, evidence_ref)
                    .await
            })
            .await?;

        debug!("Iteration {} - critiquing summary", iteration);
        let summary_ref: &str = &summary;
        let critique = self
            .call(Stage::Critique, iteration, move || async move {
                let critique = self.critic.critique(query, summary_ref).await?;
                critique.validate()?;
                Ok::<_, QfsError>(critique)
            })
            .await?;

        Ok(IterationRecord::new(iteration, evidence, summary, critique))
    }

    /// One delegate call under the retry policy; each attempt has its own deadline
    async fn call<T, F, Fut>(
        &self,
        stage: Stage,
        iteration: u32,
        mut operation: F,
    ) -> std::result::Result<T, RunFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts();
        let deadline = self.policy.timeout_for(stage);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let outcome = match tokio::time::timeout(deadline, operation()).await {
                Ok(result) => result,
                Err(_) => Err(QfsError::timeout(format!(
                    "{} did not finish within {:?}",
                    stage, deadline
                ))),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        info!("Iteration {} {} recovered on attempt {}", iteration, stage, attempt);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!(
                        "Iteration {} {} failed (attempt {}/{}): {}",
                        iteration, stage, attempt, max_attempts, e
                    );
                    last_error = Some(e);

                    if attempt < max_attempts {
                        let delay = self.policy.backoff(attempt);
                        if !delay.is_zero() {
                            debug!("Retrying {} in {:?}", stage, delay);
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| QfsError::llm(format!("{} was never attempted", stage)));
        Err(RunFailure::delegate(stage, max_attempts, &error))
    }
}

fn validate_input(document: &DocumentView, query: &str, max_iterations: u32) -> Result<()> {
    if max_iterations == 0 {
        return Err(QfsError::invalid_input("max_iterations must be at least 1"));
    }
    if query.is_empty() {
        return Err(QfsError::invalid_input("query is empty"));
    }
    if document.is_empty() {
        return Err(QfsError::invalid_input("document is empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceSet;
    use crate::types::{Critique, StopReason};
    use async_trait::async_trait;

    struct NoEvidence;

    #[async_trait]
    impl EvidenceExtractor for NoEvidence {
        async fn extract(&self, _: &DocumentView, _: &str, _: Option<&str>) -> Result<EvidenceSet> {
            Ok(EvidenceSet::empty())
        }
    }

    struct Echo;

    #[async_trait]
    impl DraftSynthesizer for Echo {
        async fn synthesize(&self, query: &str, _: &str, _: &EvidenceSet) -> Result<String> {
            Ok(format!("about {}", query))
        }
    }

    struct Satisfied;

    #[async_trait]
    impl AdequacyCritic for Satisfied {
        async fn critique(&self, _: &str, _: &str) -> Result<Critique> {
            Ok(Critique::sufficient())
        }
    }

    fn controller() -> IterationController {
        IterationController::new(Arc::new(NoEvidence), Arc::new(Echo), Arc::new(Satisfied))
    }

    #[tokio::test]
    async fn test_query_is_trimmed() {
        let result = controller()
            .run(&DocumentView::new("Some text."), "  topic \n", 3)
            .await;
        assert_eq!(result.query, "topic");
        assert_eq!(result.final_summary, "about topic");
        assert_eq!(result.stop_reason, StopReason::CriticSufficient);
    }

    #[tokio::test]
    async fn test_zero_budget_is_invalid_input() {
        let result = controller().run(&DocumentView::new("Some text."), "topic", 0).await;
        assert_eq!(result.stop_reason, StopReason::InputInvalid);
        assert_eq!(result.iterations_used, 0);
    }

    #[tokio::test]
    async fn test_blank_query_is_invalid_input() {
        let result = controller().run(&DocumentView::new("Some text."), "   ", 3).await;
        assert_eq!(result.stop_reason, StopReason::InputInvalid);
        assert!(result.failure.unwrap().message.contains("query"));
    }
}
