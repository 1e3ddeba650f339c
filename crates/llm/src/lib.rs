//! QFS LLM Integration
//!
//! Ollama API client, prompt builders and text utilities shared by the
//! refinement delegates

mod chunking;
mod client;
mod llm_trait;
mod prompts;
mod rate_limit;
mod structured;
mod types;

pub use chunking::{chunk_text, split_paragraphs, TextChunk};
pub use client::OllamaClient;
pub use llm_trait::LlmClient;
pub use prompts::{
    acu_concept, answer_prompt, is_acu_question, judge_prompt, questions_prompt, synthesis_prompt,
    EvidenceLine, ACU_PREFIX, MAX_ACU_QUESTIONS, MAX_QUESTIONS, MISSING_ATOMIC_FACT,
    NO_ANSWER_FALLBACK,
};
pub use rate_limit::RateLimitedClient;
pub use structured::{extract_json, parse_json};
pub use types::{
    EmbedRequest, EmbedResponse, GenerateOptions, GenerateRequest, GenerateResponse,
};
