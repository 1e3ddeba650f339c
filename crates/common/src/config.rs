use crate::error::QfsError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Which evidence extractor a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// Term-overlap scoring, no model calls
    Lexical,
    /// Cosine similarity over LLM embeddings
    Embedding,
}

impl FromStr for ExtractorKind {
    type Err = QfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lexical" => Ok(Self::Lexical),
            "embedding" => Ok(Self::Embedding),
            other => Err(QfsError::config(format!(
                "Unknown extractor '{}' (expected 'lexical' or 'embedding')",
                other
            ))),
        }
    }
}

/// QFS application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ollama API base URL
    pub ollama_base_url: String,

    /// Model used to draft summaries
    pub llm_model: String,

    /// Model used for question generation, answering and judging
    pub critic_model: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Evidence extractor
    pub extractor: ExtractorKind,

    /// Passages kept per evidence set
    pub evidence_top_k: usize,

    /// Longest passage produced by document segmentation
    pub passage_max_chars: usize,

    /// Default iteration budget
    pub max_iterations: u32,

    /// Retries per delegate call after the first attempt
    pub delegate_max_retries: u32,

    /// Per-call deadline for extraction, drafting and each HTTP request
    pub delegate_timeout_secs: u64,

    /// Per-call deadline for a critique, which issues several model requests
    pub critic_timeout_secs: u64,

    /// Backoff base between delegate retries
    pub retry_base_delay_ms: u64,

    /// Optional client-side LLM request rate
    pub requests_per_second: Option<f64>,

    /// Log directory
    pub log_dir: PathBuf,

    /// Log level
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: "http://localhost:11434".to_string(),
            llm_model: "llama3.2:latest".to_string(),
            critic_model: "llama3.2:latest".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            extractor: ExtractorKind::Lexical,
            evidence_top_k: 8,
            passage_max_chars: 1200,
            max_iterations: 5,
            delegate_max_retries: 2,
            delegate_timeout_secs: 120,
            critic_timeout_secs: 360,
            retry_base_delay_ms: 1000,
            requests_per_second: None,
            log_dir: PathBuf::from("./qfs-logs"),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self, QfsError> {
        // Load .env file (ignore if not exists)
        let _ = dotenv::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, QfsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let llm_model = lookup("LLM_MODEL").unwrap_or(defaults.llm_model);

        let config = Self {
            ollama_base_url: lookup("OLLAMA_BASE_URL").unwrap_or(defaults.ollama_base_url),
            critic_model: lookup("CRITIC_MODEL").unwrap_or_else(|| llm_model.clone()),
            llm_model,
            embedding_model: lookup("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            extractor: match lookup("EXTRACTOR") {
                Some(value) => value.parse()?,
                None => defaults.extractor,
            },
            evidence_top_k: parse_number(&lookup, "EVIDENCE_TOP_K")?
                .unwrap_or(defaults.evidence_top_k),
            passage_max_chars: parse_number(&lookup, "PASSAGE_MAX_CHARS")?
                .unwrap_or(defaults.passage_max_chars),
            max_iterations: parse_number(&lookup, "MAX_ITERATIONS")?
                .unwrap_or(defaults.max_iterations),
            delegate_max_retries: parse_number(&lookup, "DELEGATE_MAX_RETRIES")?
                .unwrap_or(defaults.delegate_max_retries),
            delegate_timeout_secs: parse_number(&lookup, "DELEGATE_TIMEOUT_SECS")?
                .unwrap_or(defaults.delegate_timeout_secs),
            critic_timeout_secs: parse_number(&lookup, "CRITIC_TIMEOUT_SECS")?
                .unwrap_or(defaults.critic_timeout_secs),
            retry_base_delay_ms: parse_number(&lookup, "RETRY_BASE_DELAY_MS")?
                .unwrap_or(defaults.retry_base_delay_ms),
            requests_per_second: parse_number(&lookup, "REQUESTS_PER_SECOND")?,
            log_dir: lookup("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        };

        Ok(config)
    }

    /// Ensure required directories exist, create if not
    pub fn ensure_directories(&self) -> Result<(), QfsError> {
        if !self.log_dir.exists() {
            std::fs::create_dir_all(&self.log_dir).map_err(|e| {
                QfsError::config(format!(
                    "Failed to create directory {}: {}",
                    self.log_dir.display(),
                    e
                ))
            })?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), QfsError> {
        if self.llm_model.is_empty() || self.critic_model.is_empty() {
            return Err(QfsError::config("LLM model name cannot be empty"));
        }

        if self.extractor == ExtractorKind::Embedding && self.embedding_model.is_empty() {
            return Err(QfsError::config("Embedding model name cannot be empty"));
        }

        if !self.ollama_base_url.starts_with("http://")
            && !self.ollama_base_url.starts_with("https://")
        {
            return Err(QfsError::config(
                "Ollama base URL must start with http:// or https://",
            ));
        }

        if self.evidence_top_k == 0 {
            return Err(QfsError::config("EVIDENCE_TOP_K must be at least 1"));
        }

        if self.passage_max_chars == 0 {
            return Err(QfsError::config("PASSAGE_MAX_CHARS must be at least 1"));
        }

        if self.max_iterations == 0 {
            return Err(QfsError::config("MAX_ITERATIONS must be at least 1"));
        }

        if self.delegate_timeout_secs == 0 {
            return Err(QfsError::config("DELEGATE_TIMEOUT_SECS cannot be 0"));
        }

        // a critique makes at least one HTTP request bounded by the delegate timeout
        if self.critic_timeout_secs < self.delegate_timeout_secs {
            return Err(QfsError::config(
                "CRITIC_TIMEOUT_SECS cannot be shorter than DELEGATE_TIMEOUT_SECS",
            ));
        }

        if let Some(rate) = self.requests_per_second {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(QfsError::config("REQUESTS_PER_SECOND must be positive"));
            }
        }

        Ok(())
    }
}

fn parse_number<T, F>(lookup: &F, key: &str) -> Result<Option<T>, QfsError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| QfsError::config(format!("{} is not a valid number: '{}'", key, raw))),
        None => Ok(None),
    }
}
