//! Prompt templates for the refinement delegates

/// Answer used when the summary does not contain what a question asks for
pub const NO_ANSWER_FALLBACK: &str = "Not enough information in summary";

/// Maximum number of diagnostic questions requested from the model
pub const MAX_QUESTIONS: usize = 7;

/// Prefix marking an atomic content unit (ACU) question
pub const ACU_PREFIX: &str = "ACU.";

/// Maximum number of ACU questions kept per query
pub const MAX_ACU_QUESTIONS: usize = 3;

/// Judge issue for an ACU fact the article states but the summary lacks
pub const MISSING_ATOMIC_FACT: &str = "missing atomic fact";

/// Whether `question` targets a single atomic fact
pub fn is_acu_question(question: &str) -> bool {
    question.trim_start().starts_with(ACU_PREFIX)
}

/// Fact an ACU question asks about, without its prefix or trailing punctuation
///
/// `"ACU. Founding year?"` becomes `"Founding year"`.
pub fn acu_concept(question: &str) -> &str {
    let question = question.trim_start();
    question
        .strip_prefix(ACU_PREFIX)
        .unwrap_or(question)
        .trim_matches(|c: char| c == ' ' || c == ':' || c == '?')
}

/// One evidence passage as shown to the drafting model
#[derive(Debug, Clone)]
pub struct EvidenceLine<'a> {
    /// Where the passage comes from in the document
    pub locator: String,

    /// Passage text
    pub text: &'a str,
}

/// Prompt for drafting (or redrafting) the query-focused summary
pub fn synthesis_prompt(query: &str, prior_summary: &str, evidence: &[EvidenceLine<'_>]) -> String {
    let prior = if prior_summary.trim().is_empty() {
        "(none)"
    } else {
        prior_summary
    };

    let passages = if evidence.is_empty() {
        "(no new passages)".to_string()
    } else {
        evidence
            .iter()
            .enumerate()
            .map(|(i, line)| format!("[{}] ({})\n{}", i + 1, line.locator, line.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    format!(
        "You write summaries of a document from the point of view of one reader's question.\n\n\
         Reader's query:\n{query}\n\n\
         Current summary:\n{prior}\n\n\
         Passages selected from the document for this revision:\n{passages}\n\n\
         Rewrite the summary so that it answers the query using the current summary and the passages.\n\
         - Return the complete summary, not a list of changes.\n\
         - Keep facts that are already correct; fix anything the passages contradict.\n\
         - Use only information that appears in the current summary or the passages.\n\
         - If the passages add nothing, return the current summary unchanged.\n\n\
         Format:\n\
         SUMMARY: a cohesive overview of 200-250 words addressing the query.\n\
         KEY HIGHLIGHTS: 3-5 short statements with the most important query-relevant facts.\n\n\
         Output only the summary and highlights.",
    )
}

/// Prompt for generating diagnostic questions
/// (JSON: `{"questions": [...], "acu_questions": [...]}`)
pub fn questions_prompt(query: &str, article: &str) -> String {
    format!(
        "You prepare an exam that checks whether a summary serves a reader's query.\n\n\
         Reader's query:\n{query}\n\n\
         Article:\n{article}\n\n\
         Write at most {MAX_QUESTIONS} questions that:\n\
         - are answerable from the article,\n\
         - are tied to both the query and the article content,\n\
         - cover different aspects without overlapping.\n\n\
         Also write up to {MAX_ACU_QUESTIONS} ACU questions, each starting with \"{ACU_PREFIX}\", that target one \
         easy, explicitly stated atomic fact (a number, date or named entity) directly relevant to the query. \
         Skip anything that needs inference or aggregation.\n\n\
         Respond with JSON only: {{\"questions\": [\"...\"], \"acu_questions\": [\"{ACU_PREFIX} ...\"]}}",
    )
}

/// Prompt for answering questions strictly from a summary
/// (JSON: `{"answers": [{"question", "answer"}]}`)
pub fn answer_prompt(summary: &str, questions: &[String]) -> String {
    let questions = questions
        .iter()
        .map(|q| format!("- {}", q))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Answer each question using only the SUMMARY below.\n\n\
         SUMMARY:\n{summary}\n\n\
         Questions:\n{questions}\n\n\
         Rules:\n\
         - Copy each question verbatim into the \"question\" field.\n\
         - If a question starts with \"{ACU_PREFIX}\", answer with the precise minimal span (number, date or name). \
         If the summary does not state it verbatim or in a clearly equivalent form, use the fallback below.\n\
         - Otherwise give the most specific answer the summary supports.\n\
         - If the summary does not contain the answer, answer exactly: {NO_ANSWER_FALLBACK}\n\
         - Never invent facts.\n\n\
         Respond with JSON only: {{\"answers\": [{{\"question\": \"...\", \"answer\": \"...\"}}]}}",
    )
}

/// Prompt for judging answers against the full article
/// (JSON: `{"evaluations": [{"question", "answer", "result", "issue"}], "judgment"}`)
pub fn judge_prompt(article: &str, summary: &str, qa_pairs: &[(String, String)]) -> String {
    let pairs = qa_pairs
        .iter()
        .map(|(q, a)| format!("{}: {}", q, a))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You check answers taken from a summary against the ARTICLE, which is the ground truth.\n\n\
         ARTICLE:\n{article}\n\n\
         SUMMARY:\n{summary}\n\n\
         QUESTION/ANSWER PAIRS:\n{pairs}\n\n\
         For a question starting with \"{ACU_PREFIX}\":\n\
         - the article states the fact and the answer matches it (ignoring trivial formatting): result=true,\n\
         - the article states the fact but the answer is missing, inexact or the fallback: result=false, issue=\"{MISSING_ATOMIC_FACT}\",\n\
         - the article lacks the fact but the answer claims one: result=false, issue=\"unsupported\",\n\
         - the article lacks the fact and the answer is the fallback \"{NO_ANSWER_FALLBACK}\": result=true.\n\
         For any other question set \"result\" to true only when the answer is accurate and specific according to the article.\n\
         When it is false, set \"issue\" to a short description of the gap:\n\
         - start with \"missing\" when the article has the fact but the summary lacks it,\n\
         - start with \"unsupported\" when the answer states something the article does not support,\n\
         - start with \"incorrect\" when the answer contradicts the article.\n\
         Set \"judgment\" to true only if every result is true and no central fact is absent from the summary.\n\n\
         Respond with JSON only: {{\"evaluations\": [{{\"question\": \"...\", \"answer\": \"...\", \"result\": true, \"issue\": null}}], \"judgment\": false}}",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesis_prompt_numbers_passages() {
        let evidence = vec![
            EvidenceLine { locator: "passage 2".to_string(), text: "Alpha." },
            EvidenceLine { locator: "passage 5".to_string(), text: "Beta." },
        ];
        let prompt = synthesis_prompt("what?", "", &evidence);
        assert!(prompt.contains("Current summary:\n(none)"));
        assert!(prompt.contains("[1] (passage 2)\nAlpha."));
        assert!(prompt.contains("[2] (passage 5)\nBeta."));
    }

    #[test]
    fn test_synthesis_prompt_without_evidence() {
        let prompt = synthesis_prompt("what?", "old summary", &[]);
        assert!(prompt.contains("(no new passages)"));
        assert!(prompt.contains("old summary"));
    }

    #[test]
    fn test_answer_prompt_lists_questions() {
        let prompt = answer_prompt("sum", &["Who?".to_string(), "When?".to_string()]);
        assert!(prompt.contains("- Who?\n- When?"));
        assert!(prompt.contains(NO_ANSWER_FALLBACK));
    }

    #[test]
    fn test_judge_prompt_includes_pairs() {
        let prompt = judge_prompt("art", "sum", &[("Who?".to_string(), "Ann".to_string())]);
        assert!(prompt.contains("Who?: Ann"));
        assert!(prompt.contains("issue=\"missing atomic fact\""));
    }

    #[test]
    fn test_questions_prompt_asks_for_acu_questions() {
        let prompt = questions_prompt("campuses", "art");
        assert!(prompt.contains("up to 3 ACU questions"));
        assert!(prompt.contains("\"acu_questions\""));
    }

    #[test]
    fn test_acu_helpers() {
        assert!(is_acu_question("ACU. Founding year?"));
        assert!(is_acu_question("  ACU.Year"));
        assert!(!is_acu_question("What is an ACU.?"));

        assert_eq!(acu_concept("ACU. Founding year?"), "Founding year");
        assert_eq!(acu_concept("ACU.: Number of campuses ?"), "Number of campuses");
        assert_eq!(acu_concept("Plain question?"), "Plain question");
    }
}
