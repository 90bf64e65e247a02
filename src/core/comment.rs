use crate::core::DiffFile;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// A `(line, comment)` pair proposed by the model.
///
/// The line number stays textual because it comes straight from model output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReviewFinding {
    #[serde(rename = "lineNumber", deserialize_with = "line_number_as_string")]
    pub line_number: String,
    #[serde(rename = "reviewComment")]
    pub review_comment: String,
}

/// An inline comment as submitted in a review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewComment {
    pub path: String,
    pub line: u64,
    pub body: String,
}

#[derive(Deserialize)]
struct ReviewEnvelope {
    reviews: Vec<ReviewFinding>,
}

fn line_number_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "lineNumber must be a string or number, got {}",
            other
        ))),
    }
}

/// Parses a model reply of the form `{"reviews": [{lineNumber, reviewComment}]}`.
///
/// Returns `None` for anything that does not have exactly that shape.
pub fn parse_review_response(content: &str) -> Option<Vec<ReviewFinding>> {
    let body = strip_code_fence(content.trim());
    let body = if body.is_empty() { "{}" } else { body };

    match serde_json::from_str::<ReviewEnvelope>(body) {
        Ok(envelope) => Some(envelope.reviews),
        Err(err) => {
            warn!("Discarding malformed model response: {}", err);
            debug!("Model response was: {}", content);
            None
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening fence.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

pub struct CommentMapper;

impl CommentMapper {
    pub fn map(file: &DiffFile, findings: &[ReviewFinding]) -> Vec<ReviewComment> {
        let Some(path) = file.target_path() else {
            return Vec::new();
        };

        findings
            .iter()
            .filter_map(|finding| match parse_line_number(&finding.line_number) {
                Some(line) => Some(ReviewComment {
                    path: path.to_string(),
                    line,
                    body: finding.review_comment.clone(),
                }),
                None => {
                    warn!(
                        "Dropping finding for {} with unusable line number {:?}",
                        path, finding.line_number
                    );
                    None
                }
            })
            .collect()
    }
}

fn parse_line_number(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if let Ok(line) = trimmed.parse::<u64>() {
        return (line > 0).then_some(line);
    }
    // Models occasionally answer "12.0".
    match trimmed.parse::<f64>() {
        Ok(value) if value >= 1.0 && value.fract() == 0.0 && value <= u32::MAX as f64 => {
            Some(value as u64)
        }
        _ => None,
    }
}
