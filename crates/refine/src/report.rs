//! Rendering of run results for the console and for JSON files

use chrono::{DateTime, Utc};
use qfs_common::{QfsError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use crate::types::RunResult;

/// How the final result is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Print,
    Json,
}

impl FromStr for OutputFormat {
    type Err = QfsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "print" => Ok(Self::Print),
            "json" => Ok(Self::Json),
            other => Err(QfsError::config(format!(
                "Unknown output format '{}' (expected 'print' or 'json')",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Print => f.write_str("print"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Self-contained JSON record of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub tool_version: String,
    pub generated_at: DateTime<Utc>,

    /// Hex SHA-256 of the document text the run was based on
    pub document_sha256: String,

    #[serde(flatten)]
    pub result: RunResult,
}

impl RunReport {
    pub fn new(result: RunResult, document_text: &str) -> Self {
        Self {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            document_sha256: hex::encode(Sha256::digest(document_text.as_bytes())),
            result,
        }
    }
}

/// Final summary followed by a short trailer
pub fn render_print(result: &RunResult) -> String {
    let mut out = String::new();

    if result.final_summary.is_empty() {
        out.push_str("(no summary produced)\n");
    } else {
        out.push_str(result.final_summary.trim_end());
        out.push('\n');
    }

    out.push_str("\n---\n");
    let _ = writeln!(
        out,
        "iterations_used: {}/{}",
        result.iterations_used, result.max_iterations
    );
    let _ = writeln!(out, "stop_reason: {}", result.stop_reason);

    if let Some(failure) = &result.failure {
        let stage = failure
            .stage
            .map(|s| format!(" during {}", s))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "failure: {:?}{} ({} attempts): {}",
            failure.kind, stage, failure.attempts, failure.message
        );
    }

    out
}

/// Pretty-printed JSON document
pub fn render_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Write rendered output, creating missing parent directories
pub async fn write_report(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await?;
    Ok(())
}
