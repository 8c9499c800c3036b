//! Isolated evaluation of one mapping against one request.
//!
//! Whatever a mapping's matchers do, the outcome is a value: a match result,
//! or the reason the mapping can't take part in this resolution.

use crate::mapping::Mapping;
use crate::matchers::{MatchResult, MatcherError};
use crate::request::RequestMessage;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Why a mapping was excluded from a resolution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationFailure {
    #[error("{} matcher error(s): {}", .0.len(), join_errors(.0))]
    Matcher(Vec<MatcherError>),
    #[error("matcher panicked: {0}")]
    Panicked(String),
}

impl EvaluationFailure {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EvaluationFailure::Matcher(_) => "matcher_error",
            EvaluationFailure::Panicked(_) => "panic",
        }
    }
}

pub type Evaluation = Result<MatchResult, EvaluationFailure>;

/// Evaluate `mapping` against `request` with the given scenario gating state.
pub fn evaluate(mapping: &Mapping, request: &RequestMessage, gating_state: Option<&str>) -> Evaluation {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        mapping.match_request(request, gating_state)
    }))
    .map_err(|payload| EvaluationFailure::Panicked(panic_message(payload.as_ref())))?;

    if result.has_errors() {
        return Err(EvaluationFailure::Matcher(result.errors().cloned().collect()));
    }
    Ok(result)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn join_errors(errors: &[MatcherError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
