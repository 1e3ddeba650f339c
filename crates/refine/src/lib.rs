//! QFS refinement core
//!
//! Iteration controller for query-focused summarization and the delegates it
//! drives: evidence extraction, draft synthesis and adequacy critique.

mod controller;
mod critic;
mod delegates;
mod document;
mod embedding;
mod evidence;
mod lexical;
mod policy;
mod report;
mod state;
mod synthesizer;
mod types;

pub use controller::IterationController;
pub use critic::LlmCritic;
pub use delegates::{AdequacyCritic, DraftSynthesizer, EvidenceExtractor};
pub use document::{DocumentPassage, DocumentView, SourceLocator};
pub use embedding::EmbeddingExtractor;
pub use evidence::{cosine_similarity, EvidencePassage, EvidenceSet};
pub use lexical::LexicalExtractor;
pub use policy::RetryPolicy;
pub use report::{render_json, render_print, write_report, OutputFormat, RunReport};
pub use state::RunState;
pub use synthesizer::LlmSynthesizer;
pub use types::{
    Critique, FailureKind, Finding, IterationRecord, RunFailure, RunResult, Stage, StopReason,
    Verdict,
};
