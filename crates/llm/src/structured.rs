//! Parsing of structured (JSON) model output

use qfs_common::{QfsError, Result};
use serde::de::DeserializeOwned;

/// Locate the JSON object inside a model answer.
///
/// Models wrap JSON in code fences or surround it with prose even when asked
/// not to; the outermost `{ ... }` span is taken.
pub fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Parse a model answer into `T`, reporting unusable output as a malformed response
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let json = extract_json(raw).ok_or_else(|| {
        QfsError::malformed(format!("No JSON object in model output: {}", preview(raw)))
    })?;

    serde_json::from_str(json).map_err(|e| {
        QfsError::malformed(format!(
            "Model output does not match schema: {}. Output: {}",
            e,
            preview(raw)
        ))
    })
}

fn preview(raw: &str) -> String {
    const LIMIT: usize = 200;
    if raw.chars().count() <= LIMIT {
        raw.to_string()
    } else {
        let head: String = raw.chars().take(LIMIT).collect();
        format!("{}...", head)
    }
}
