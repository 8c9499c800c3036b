//! Body matchers.

use super::string::StringMatcher;
use super::{MatchContext, MatcherError, RequestMessageMatcher, MISMATCH, PERFECT};
use crate::request::{BodyData, RequestMessage};
use serde_json::Value;

/// Matches the request body.
#[derive(Debug, Clone)]
pub enum BodyMatcher {
    /// Structural JSON equality.
    ///
    /// With `strict`, a body that cannot be read as JSON is a matcher failure
    /// rather than a plain mismatch.
    Json {
        expected: Value,
        ignore_case: bool,
        strict: bool,
    },
    /// Exact text equality.
    ExactText(String),
    /// Exact byte equality.
    ExactBytes(Vec<u8>),
    /// String pattern applied to the textual body.
    Text(StringMatcher),
}

impl BodyMatcher {
    pub fn json(expected: Value) -> Self {
        BodyMatcher::Json {
            expected,
            ignore_case: false,
            strict: false,
        }
    }

    /// Body matcher equivalent to a captured body, picked by its detected kind.
    pub fn exact_for(body: &BodyData) -> Option<Self> {
        match body {
            BodyData::Empty => None,
            BodyData::Json { value, .. } => Some(BodyMatcher::json(value.clone())),
            BodyData::Text(text) => Some(BodyMatcher::ExactText(text.clone())),
            BodyData::Bytes(bytes) => Some(BodyMatcher::ExactBytes(bytes.clone())),
        }
    }

    fn score_json(
        expected: &Value,
        ignore_case: bool,
        strict: bool,
        body: &BodyData,
    ) -> Result<f64, MatcherError> {
        let parsed;
        let actual = match body {
            BodyData::Json { value, .. } => value,
            BodyData::Empty => return Ok(MISMATCH),
            other => match other.as_text().map(serde_json::from_str::<Value>) {
                Some(Ok(value)) => {
                    parsed = value;
                    &parsed
                }
                Some(Err(e)) if strict => {
                    return Err(MatcherError::MalformedBody {
                        expected: "JSON",
                        reason: e.to_string(),
                    })
                }
                None if strict => {
                    return Err(MatcherError::MalformedBody {
                        expected: "JSON",
                        reason: "body is not UTF-8".to_string(),
                    })
                }
                _ => return Ok(MISMATCH),
            },
        };

        Ok(if json_equals(actual, expected, ignore_case) {
            PERFECT
        } else {
            MISMATCH
        })
    }
}

impl RequestMessageMatcher for BodyMatcher {
    fn name(&self) -> &'static str {
        "body"
    }

    fn matching_score(
        &self,
        request: &RequestMessage,
        _context: &MatchContext<'_>,
    ) -> Result<f64, MatcherError> {
        let body = &request.body;
        let matched = match self {
            BodyMatcher::Json {
                expected,
                ignore_case,
                strict,
            } => return Self::score_json(expected, *ignore_case, *strict, body),
            BodyMatcher::ExactText(text) => body.as_text() == Some(text.as_str()),
            BodyMatcher::ExactBytes(bytes) => !body.is_empty() && body.as_bytes() == bytes.as_slice(),
            BodyMatcher::Text(matcher) => matcher.is_match(body.as_text()),
        };
        Ok(if matched { PERFECT } else { MISMATCH })
    }
}

/// Deep JSON equality; object key order is irrelevant.
fn json_equals(actual: &Value, expected: &Value, ignore_case: bool) -> bool {
    match (actual, expected) {
        (Value::String(a), Value::String(b)) if ignore_case => a.to_lowercase() == b.to_lowercase(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| json_equals(x, y, ignore_case))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && b.iter().all(|(key, expected_value)| {
                    a.get(key)
                        .map(|actual_value| json_equals(actual_value, expected_value, ignore_case))
                        .unwrap_or(false)
                })
        }
        _ => actual == expected,
    }
}
