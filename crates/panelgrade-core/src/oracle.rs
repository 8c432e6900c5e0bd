//! Scoring oracle contract and response decoding.
//!
//! The oracle is the language-model backend, treated as an opaque async
//! function from a rendered prompt to completion text. Everything about the
//! call itself (endpoint, model, auth) lives behind [`ScoringOracle`];
//! everything about making sense of what comes back lives here, because the
//! oracle wraps its JSON in prose and echoes document text with raw
//! backslashes more often than not.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors reported by a scoring oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The oracle reported a rate-limit condition; callers should back off.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The oracle returned an API-level failure.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The request never completed.
    #[error("network error: {0}")]
    Network(String),

    /// The oracle answered with no completion text.
    #[error("empty completion")]
    EmptyCompletion,
}

impl OracleError {
    /// Whether this error is a rate-limit signal.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, OracleError::RateLimited(_))
    }

    /// Classify an API failure, promoting 429s and rate-limit-worded
    /// messages to [`OracleError::RateLimited`].
    pub fn from_status(status: u16, message: String) -> Self {
        let lowered = message.to_lowercase();
        if status == 429 || lowered.contains("rate limit") || lowered.contains("too many requests")
        {
            OracleError::RateLimited(message)
        } else {
            OracleError::Api { status, message }
        }
    }
}

/// The language-model scoring backend.
///
/// Implementations must be cheap to clone behind an `Arc`; the scheduler
/// shares one oracle across every in-flight scoring task.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Complete `prompt`, returning the raw response text.
    async fn complete(&self, prompt: &str) -> std::result::Result<String, OracleError>;
}

/// Decoded per-criterion score payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleScore {
    /// Raw numeric score as the oracle reported it.
    pub score: f64,

    #[serde(default, deserialize_with = "string_or_list")]
    pub evidence: String,

    #[serde(default)]
    pub reasoning: String,

    #[serde(default)]
    pub improvements: Option<String>,
}

impl OracleScore {
    /// Score snapped to the 1-4 scale in 0.5 increments, or `None` when the
    /// reported value falls outside the scale.
    pub fn normalized_score(&self) -> Option<f64> {
        let snapped = (self.score * 2.0).round() / 2.0;
        if (1.0..=4.0).contains(&snapped) {
            Some(snapped)
        } else {
            None
        }
    }
}

/// Why a response could not be decoded into an [`OracleScore`].
#[derive(Debug, Error)]
pub enum ScoreParseError {
    /// No balanced `{...}` object anywhere in the response.
    #[error("no JSON object found in response")]
    NoJsonObject,

    /// The candidate object failed to decode.
    #[error("invalid score payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// The decoded score is outside the 1-4 scale.
    #[error("score {0} outside the 1-4 scale")]
    ScoreOutOfRange(f64),
}

/// Decode a raw oracle response into an [`OracleScore`].
///
/// The oracle may wrap its JSON in prose, so the first balanced `{...}`
/// substring is located before decoding. Lone backslashes that do not begin
/// a valid JSON escape (LaTeX fragments, Windows paths echoed back from the
/// documents) are doubled first so they decode instead of erroring.
pub fn parse_score_response(text: &str) -> std::result::Result<OracleScore, ScoreParseError> {
    let candidate = extract_json_object(text).ok_or(ScoreParseError::NoJsonObject)?;
    let repaired = repair_escapes(candidate);
    let decoded: OracleScore = serde_json::from_str(&repaired)?;
    match decoded.normalized_score() {
        Some(_) => Ok(decoded),
        None => {
            debug!(score = decoded.score, "oracle score outside 1-4 scale");
            Err(ScoreParseError::ScoreOutOfRange(decoded.score))
        }
    }
}

/// Locate the first balanced `{...}` substring, respecting JSON strings.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Double lone backslashes that do not begin a valid JSON escape.
pub fn repair_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some(&next) if matches!(next, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') => {
                out.push('\\');
                out.push(next);
                chars.next();
            }
            _ => out.push_str("\\\\"),
        }
    }
    out
}

fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s,
        StringOrList::Many(items) => items.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object_from_surrounding_prose() {
        let text = "Here is my evaluation:\n{\"score\": 3.5, \"evidence\": \"solid\"}\nHope it helps.";
        assert_eq!(
            extract_json_object(text).unwrap(),
            "{\"score\": 3.5, \"evidence\": \"solid\"}"
        );
    }

    #[test]
    fn test_extract_json_object_handles_nested_and_strings() {
        let text = "x {\"a\": {\"b\": \"brace } in string\"}, \"c\": 1} trailing {\"d\": 2}";
        assert_eq!(
            extract_json_object(text).unwrap(),
            "{\"a\": {\"b\": \"brace } in string\"}, \"c\": 1}"
        );
    }

    #[test]
    fn test_extract_json_object_none_when_unbalanced() {
        assert!(extract_json_object("no object here").is_none());
        assert!(extract_json_object("{\"score\": 3").is_none());
    }

    #[test]
    fn test_repair_escapes_doubles_invalid_escape() {
        assert_eq!(repair_escapes(r"a \x b"), r"a \\x b");
        assert_eq!(repair_escapes(r"C:\Users\prop"), r"C:\\Users\\prop");
    }

    #[test]
    fn test_repair_escapes_keeps_valid_escapes() {
        assert_eq!(repair_escapes(r#"line\nbreak \"quoted\""#), r#"line\nbreak \"quoted\""#);
        assert_eq!(repair_escapes(r"unicode \u00e9"), r"unicode \u00e9");
    }

    #[test]
    fn test_repair_escapes_trailing_backslash() {
        assert_eq!(repair_escapes(r"tail\"), r"tail\\");
    }

    #[test]
    fn test_parse_score_response_with_invalid_escape() {
        // A literal \x inside a string value must decode after repair.
        let text = r#"{"score": 3.0, "evidence": "formula \xi in the text", "reasoning": "ok"}"#;
        let score = parse_score_response(text).unwrap();
        assert_eq!(score.score, 3.0);
        assert!(score.evidence.contains("xi"));
    }

    #[test]
    fn test_parse_score_response_requires_numeric_score() {
        let err = parse_score_response(r#"{"evidence": "good", "reasoning": "fine"}"#).unwrap_err();
        assert!(matches!(err, ScoreParseError::InvalidPayload(_)));
    }

    #[test]
    fn test_parse_score_response_rejects_out_of_range() {
        let err = parse_score_response(r#"{"score": 9.0}"#).unwrap_err();
        assert!(matches!(err, ScoreParseError::ScoreOutOfRange(_)));
    }

    #[test]
    fn test_parse_score_response_accepts_evidence_list() {
        let text = r#"{"score": 2.5, "evidence": ["budget slide 4", "team bios"], "reasoning": "thin"}"#;
        let score = parse_score_response(text).unwrap();
        assert_eq!(score.evidence, "budget slide 4\nteam bios");
    }

    #[test]
    fn test_normalized_score_snaps_to_half_steps() {
        let score = OracleScore {
            score: 3.3,
            evidence: String::new(),
            reasoning: String::new(),
            improvements: None,
        };
        assert_eq!(score.normalized_score(), Some(3.5));

        let low = OracleScore { score: 0.2, ..score.clone() };
        assert_eq!(low.normalized_score(), None);
    }

    #[test]
    fn test_from_status_classifies_rate_limits() {
        assert!(OracleError::from_status(429, "slow down".to_string()).is_rate_limit());
        assert!(OracleError::from_status(500, "Rate limit exceeded".to_string()).is_rate_limit());
        assert!(!OracleError::from_status(500, "boom".to_string()).is_rate_limit());
    }
}
