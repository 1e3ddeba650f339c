use qfs_common::{QfsError, Result};
use qfs_llm::is_acu_question;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::evidence::EvidenceSet;

/// Critic judgement of a candidate summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Sufficient,
    NeedsMoreEvidence,
    NeedsCorrection,
}

/// One diagnostic question evaluated against the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub question: String,
    pub answer: String,
    pub supported: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
}

/// Critic output for one candidate summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Critique {
    pub verdict: Verdict,
    pub guidance: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
}

impl Critique {
    pub fn sufficient() -> Self {
        Self {
            verdict: Verdict::Sufficient,
            guidance: None,
            findings: Vec::new(),
        }
    }

    pub fn needs_more_evidence(guidance: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::NeedsMoreEvidence,
            guidance: Some(guidance.into()),
            findings: Vec::new(),
        }
    }

    pub fn needs_correction(guidance: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::NeedsCorrection,
            guidance: Some(guidance.into()),
            findings: Vec::new(),
        }
    }

    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.findings = findings;
        self
    }

    /// Guidance text, treating blank guidance as absent
    pub fn guidance_text(&self) -> Option<&str> {
        self.guidance
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }

    /// Guidance must accompany every negative verdict and only negative verdicts
    pub fn validate(&self) -> Result<()> {
        match (self.verdict, self.guidance_text()) {
            (Verdict::Sufficient, Some(_)) => Err(QfsError::malformed(
                "critic returned guidance with a SUFFICIENT verdict",
            )),
            (Verdict::NeedsMoreEvidence | Verdict::NeedsCorrection, None) => {
                Err(QfsError::malformed(format!(
                    "critic returned {:?} without guidance",
                    self.verdict
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Delegate call within an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Synthesize,
    Critique,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Extract => "extract",
            Self::Synthesize => "synthesize",
            Self::Critique => "critique",
        };
        f.write_str(name)
    }
}

/// Why a run could not complete normally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    InputInvalid,
    DelegateUnavailable,
    MalformedDelegateResponse,
}

impl FailureKind {
    /// Classify the last error of an exhausted delegate call
    pub fn classify(error: &QfsError) -> Self {
        if error.is_malformed() {
            Self::MalformedDelegateResponse
        } else {
            Self::DelegateUnavailable
        }
    }
}

/// Details of an abnormal termination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// Attempts made before giving up (0 for input errors)
    pub attempts: u32,
    pub message: String,
}

impl RunFailure {
    pub fn input_invalid(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::InputInvalid,
            stage: None,
            attempts: 0,
            message: message.into(),
        }
    }

    pub fn delegate(stage: Stage, attempts: u32, error: &QfsError) -> Self {
        Self {
            kind: FailureKind::classify(error),
            stage: Some(stage),
            attempts,
            message: error.to_string(),
        }
    }
}

/// Why the refinement loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    CriticSufficient,
    BudgetExhausted,
    NoProgress,
    InputInvalid,
    DelegateFailed,
    Cancelled,
}

impl StopReason {
    /// Normal completions, as opposed to invalid input, failure or cancellation
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Self::CriticSufficient | Self::BudgetExhausted | Self::NoProgress
        )
    }

    /// Process exit code reported by the CLI
    pub fn exit_code(self) -> u8 {
        match self {
            Self::CriticSufficient | Self::BudgetExhausted | Self::NoProgress => 0,
            Self::InputInvalid => 2,
            Self::DelegateFailed => 3,
            Self::Cancelled => 130,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CriticSufficient => "CRITIC_SUFFICIENT",
            Self::BudgetExhausted => "BUDGET_EXHAUSTED",
            Self::NoProgress => "NO_PROGRESS",
            Self::InputInvalid => "INPUT_INVALID",
            Self::DelegateFailed => "DELEGATE_FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one completed round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration_index: u32,
    pub evidence: EvidenceSet,
    pub summary: String,
    pub verdict: Verdict,
    pub guidance: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
    /// Findings the judge accepted
    #[serde(default)]
    pub correct_count_all: usize,
    /// Accepted findings among the ACU questions
    #[serde(default)]
    pub correct_count_acu: usize,
}

impl IterationRecord {
    pub(crate) fn new(
        iteration_index: u32,
        evidence: EvidenceSet,
        summary: String,
        critique: Critique,
    ) -> Self {
        let correct = critique.findings.iter().filter(|f| f.supported);
        let correct_count_acu = correct
            .clone()
            .filter(|f| is_acu_question(&f.question))
            .count();
        let correct_count_all = correct.count();

        Self {
            iteration_index,
            evidence,
            summary,
            verdict: critique.verdict,
            guidance: critique.guidance_text().map(str::to_string),
            findings: critique.findings,
            correct_count_all,
            correct_count_acu,
        }
    }
}

/// Final outcome of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub query: String,
    pub final_summary: String,
    pub iterations_used: u32,
    pub max_iterations: u32,
    pub stop_reason: StopReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
    pub history: Vec<IterationRecord>,
    /// Diagnostic questions the critic asked, in first-asked order
    #[serde(default)]
    pub questions: Vec<String>,
    /// ACU questions the critic asked, with their prefix
    #[serde(default)]
    pub acu_questions: Vec<String>,
}

impl RunResult {
    /// Result for a run that never started
    pub fn input_invalid(query: &str, max_iterations: u32, message: impl Into<String>) -> Self {
        Self {
            query: query.to_string(),
            final_summary: String::new(),
            iterations_used: 0,
            max_iterations,
            stop_reason: StopReason::InputInvalid,
            failure: Some(RunFailure::input_invalid(message)),
            history: Vec::new(),
            questions: Vec::new(),
            acu_questions: Vec::new(),
        }
    }

    /// Assemble a result from the completed history; the final summary is
    /// always the last recorded snapshot
    pub(crate) fn from_history(
        query: &str,
        max_iterations: u32,
        stop_reason: StopReason,
        failure: Option<RunFailure>,
        history: Vec<IterationRecord>,
    ) -> Self {
        let final_summary = history
            .last()
            .map(|record| record.summary.clone())
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let (acu_questions, questions): (Vec<String>, Vec<String>) = history
            .iter()
            .flat_map(|record| &record.findings)
            .map(|f| f.question.clone())
            .filter(|q| seen.insert(q.clone()))
            .partition(|q| is_acu_question(q));

        Self {
            query: query.to_string(),
            final_summary,
            iterations_used: history.len() as u32,
            max_iterations,
            stop_reason,
            failure,
            history,
            questions,
            acu_questions,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.stop_reason.exit_code()
    }
}
