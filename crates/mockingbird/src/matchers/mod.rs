//! Request matchers and per-mapping match results.
//!
//! Every matcher implements [`RequestMessageMatcher`] and scores one aspect of
//! a request in `[0, 1]`. A mapping composes them in a [`RequestMatcher`]; the
//! outcome of each sub-matcher lands in a [`MatchResult`], which the selector
//! ranks.
//!
//! # Module Structure
//!
//! - `string` - string patterns and score aggregation
//! - `request` - method, path, query, header, cookie, client IP and scenario matchers
//! - `body` - body matchers (JSON equality, exact text, exact bytes, text patterns)
//! - `composite` - the per-mapping [`RequestMatcher`]

mod body;
mod composite;
mod request;
mod string;

pub use body::BodyMatcher;
pub use composite::RequestMatcher;
pub use request::{
    ClientIpMatcher, CookieMatcher, HeaderMatcher, MethodMatcher, ParamMatcher, PathMatcher,
    ScenarioStateMatcher,
};
pub use string::{CachedValue, MatchOperator, StringMatcher};

use crate::request::RequestMessage;
use std::cmp::Ordering;
use std::fmt;

/// Score of a sub-matcher that fully matched.
pub const PERFECT: f64 = 1.0;
/// Score of a sub-matcher that did not match at all.
pub const MISMATCH: f64 = 0.0;

/// Failure raised by a matcher while scoring a request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatcherError {
    #[error("request body is not valid {expected}: {reason}")]
    MalformedBody {
        expected: &'static str,
        reason: String,
    },
    #[error("{matcher} failed: {message}")]
    Failed { matcher: String, message: String },
}

/// Evaluation context handed to every matcher alongside the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchContext<'a> {
    /// Current state of the mapping's scenario; `None` when the mapping has
    /// no scenario or the scenario has not started.
    pub gating_state: Option<&'a str>,
}

/// A single request predicate.
pub trait RequestMessageMatcher: Send + Sync + fmt::Debug {
    /// Short name used in match details and logs.
    fn name(&self) -> &'static str;

    /// Score the request in `[0, 1]`, or fail.
    fn matching_score(
        &self,
        request: &RequestMessage,
        context: &MatchContext<'_>,
    ) -> Result<f64, MatcherError>;
}

/// Outcome of one sub-matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchDetail {
    pub matcher: &'static str,
    pub score: f64,
    pub error: Option<MatcherError>,
}

/// Collected sub-matcher outcomes for one mapping against one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    details: Vec<MatchDetail>,
}

impl MatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `matcher` and record its outcome. A failing matcher scores
    /// [`MISMATCH`] and keeps its error.
    pub fn record(
        &mut self,
        matcher: &dyn RequestMessageMatcher,
        request: &RequestMessage,
        context: &MatchContext<'_>,
    ) {
        let detail = match matcher.matching_score(request, context) {
            Ok(score) => MatchDetail {
                matcher: matcher.name(),
                score: score.clamp(MISMATCH, PERFECT),
                error: None,
            },
            Err(error) => MatchDetail {
                matcher: matcher.name(),
                score: MISMATCH,
                error: Some(error),
            },
        };
        self.details.push(detail);
    }

    pub fn add_score(&mut self, matcher: &'static str, score: f64) {
        self.details.push(MatchDetail {
            matcher,
            score: score.clamp(MISMATCH, PERFECT),
            error: None,
        });
    }

    pub fn details(&self) -> &[MatchDetail] {
        &self.details
    }

    pub fn errors(&self) -> impl Iterator<Item = &MatcherError> {
        self.details.iter().filter_map(|d| d.error.as_ref())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn total_matchers(&self) -> usize {
        self.details.len()
    }

    pub fn total_score(&self) -> f64 {
        self.details.iter().map(|d| d.score).sum()
    }

    /// Mean sub-matcher score; [`MISMATCH`] when nothing was evaluated.
    pub fn average_score(&self) -> f64 {
        if self.details.is_empty() {
            MISMATCH
        } else {
            self.total_score() / self.details.len() as f64
        }
    }

    /// True when every sub-matcher scored [`PERFECT`] (vacuously true when empty).
    pub fn is_perfect_match(&self) -> bool {
        self.details.iter().all(|d| d.score == PERFECT)
    }

    /// Ranking order: the better match sorts first.
    ///
    /// Higher average score first; on an equal average, fewer sub-matchers first.
    pub fn rank_cmp(&self, other: &MatchResult) -> Ordering {
        other
            .average_score()
            .total_cmp(&self.average_score())
            .then_with(|| self.total_matchers().cmp(&other.total_matchers()))
    }
}
