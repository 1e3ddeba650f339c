//! Question/answer/judge adequacy critic
//!
//! The critic quizzes the summary: diagnostic questions are drawn from the
//! document, answered from the summary alone, and the answers are judged
//! against the document. Failed answers become the guidance for the next round.
//!
//! ACU questions (prefixed `ACU.`) each target one atomic fact. When the judge
//! finds such a fact missing from the summary, the fact leads the guidance.

use async_trait::async_trait;
use qfs_common::{QfsError, Result};
use qfs_llm::{
    acu_concept, answer_prompt, is_acu_question, judge_prompt, parse_json, questions_prompt,
    GenerateOptions, GenerateRequest, LlmClient, ACU_PREFIX, MAX_ACU_QUESTIONS, MAX_QUESTIONS,
    MISSING_ATOMIC_FACT, NO_ANSWER_FALLBACK,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::delegates::AdequacyCritic;
use crate::types::{Critique, Finding};

const GUIDANCE_SEPARATOR: &str = "; ";

#[derive(Debug, Deserialize)]
struct QuestionsReply {
    questions: Vec<String>,
    #[serde(default)]
    acu_questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AnswersReply {
    #[serde(default)]
    answers: Vec<AnswerItem>,
}

#[derive(Debug, Deserialize)]
struct AnswerItem {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
}

#[derive(Debug, Deserialize)]
struct JudgeReply {
    evaluations: Vec<Evaluation>,
    judgment: bool,
}

#[derive(Debug, Deserialize)]
struct Evaluation {
    question: String,
    #[serde(default)]
    answer: String,
    result: bool,
    #[serde(default)]
    issue: Option<String>,
}

/// Critic backed by a text generation model and the full document
pub struct LlmCritic {
    client: Arc<dyn LlmClient>,
    model: String,
    document: Arc<str>,
    options: GenerateOptions,
    questions: Mutex<HashMap<String, Arc<Vec<String>>>>,
}

impl LlmCritic {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        document: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            document: document.into(),
            options: GenerateOptions {
                temperature: Some(0.0),
                ..Default::default()
            },
            questions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    async fn ask_json<T: serde::de::DeserializeOwned>(&self, prompt: String) -> Result<T> {
        let request = GenerateRequest::json(&self.model, prompt, self.options.clone());
        let raw = self.client.generate(request).await?;
        parse_json(&raw)
    }

    /// Diagnostic questions for `query` followed by its ACU questions, generated on
    /// first use and reused afterwards
    async fn questions(&self, query: &str) -> Result<Arc<Vec<String>>> {
        let mut cache = self.questions.lock().await;
        if let Some(questions) = cache.get(query) {
            return Ok(questions.clone());
        }

        let reply: QuestionsReply = self.ask_json(questions_prompt(query, &self.document)).await?;
        let mut questions: Vec<String> = reply
            .questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty() && !is_acu_question(q))
            .take(MAX_QUESTIONS)
            .collect();

        if questions.is_empty() {
            return Err(QfsError::malformed("critic model produced no questions"));
        }

        let acu_questions: Vec<String> = reply
            .acu_questions
            .iter()
            .map(|q| acu_concept(q))
            .filter(|concept| !concept.is_empty())
            .take(MAX_ACU_QUESTIONS)
            .map(|concept| format!("{} {}?", ACU_PREFIX, concept))
            .collect();

        info!(
            "Generated {} diagnostic questions and {} ACU questions",
            questions.len(),
            acu_questions.len()
        );
        questions.extend(acu_questions);
        let questions = Arc::new(questions);
        cache.insert(query.to_string(), questions.clone());
        Ok(questions)
    }

    async fn answers(&self, summary: &str, questions: &[String]) -> Result<Vec<(String, String)>> {
        let reply: AnswersReply = self.ask_json(answer_prompt(summary, questions)).await?;
        Ok(pair_answers(questions, reply.answers))
    }
}

/// Match answers to questions by text, falling back to position
fn pair_answers(questions: &[String], answers: Vec<AnswerItem>) -> Vec<(String, String)> {
    let by_question: HashMap<String, &str> = answers
        .iter()
        .map(|a| (normalize(&a.question), a.answer.as_str()))
        .collect();

    questions
        .iter()
        .enumerate()
        .map(|(i, question)| {
            let answer = by_question
                .get(&normalize(question))
                .copied()
                .or_else(|| answers.get(i).map(|a| a.answer.as_str()))
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .unwrap_or(NO_ANSWER_FALLBACK);
            (question.clone(), answer.to_string())
        })
        .collect()
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn is_correction(issue: &str) -> bool {
    let issue = issue.to_lowercase();
    issue.contains("unsupported") || issue.contains("incorrect")
}

fn is_missing_atomic_fact(finding: &Finding) -> bool {
    is_acu_question(&finding.question)
        && finding
            .issue
            .as_deref()
            .is_some_and(|i| i.to_lowercase().starts_with(MISSING_ATOMIC_FACT))
}

/// Turn a judge reply into a critique
///
/// Guidance lists missing ACU facts first, then the remaining gaps in judge
/// order, without duplicates.
fn critique_from(reply: JudgeReply) -> Result<Critique> {
    let findings: Vec<Finding> = reply
        .evaluations
        .into_iter()
        .map(|e| Finding {
            question: e.question.trim().to_string(),
            answer: e.answer.trim().to_string(),
            supported: e.result,
            issue: e
                .issue
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty()),
        })
        .collect();

    if reply.judgment {
        return Ok(Critique::sufficient().with_findings(findings));
    }

    let failed: Vec<&Finding> = findings.iter().filter(|f| !f.supported).collect();

    let missing_facts = failed
        .iter()
        .filter(|f| is_missing_atomic_fact(f))
        .map(|f| acu_concept(&f.question));
    let other_gaps = failed
        .iter()
        .filter(|f| !is_missing_atomic_fact(f))
        .map(|f| match f.issue.as_deref() {
            Some(issue) => issue,
            None if is_acu_question(&f.question) => acu_concept(&f.question),
            None => f.question.as_str(),
        });

    let mut seen = HashSet::new();
    let topics: Vec<&str> = missing_facts
        .chain(other_gaps)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(normalize(t)))
        .collect();

    if topics.is_empty() {
        return Err(QfsError::malformed(
            "judge rejected the summary without naming any gap",
        ));
    }

    let guidance = topics.join(GUIDANCE_SEPARATOR);
    let corrective = failed
        .iter()
        .filter_map(|f| f.issue.as_deref())
        .any(is_correction);

    let critique = if corrective {
        Critique::needs_correction(guidance)
    } else {
        Critique::needs_more_evidence(guidance)
    };
    Ok(critique.with_findings(findings))
}

#[async_trait]
impl AdequacyCritic for LlmCritic {
    async fn critique(&self, query: &str, summary: &str) -> Result<Critique> {
        let questions = self.questions(query).await?;
        let qa_pairs = self.answers(summary, &questions).await?;

        let reply: JudgeReply = self
            .ask_json(judge_prompt(&self.document, summary, &qa_pairs))
            .await?;
        let critique = critique_from(reply)?;

        debug!(
            "Critique - Verdict: {:?}, Supported: {}/{}",
            critique.verdict,
            critique.findings.iter().filter(|f| f.supported).count(),
            critique.findings.len()
        );
        Ok(critique)
    }
}
