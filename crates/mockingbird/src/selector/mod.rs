//! Mapping selection: resolving a request to at most one mapping.
//!
//! A resolution runs in four steps:
//!
//! 1. Eligibility: mappings outside their time window are skipped, and
//!    mappings with a probability take part only if a fresh draw in `[0, 1)`
//!    is at most that probability.
//! 2. Evaluation: each eligible mapping is scored against the request under
//!    its scenario's current state. Mappings whose evaluation fails are
//!    excluded (and logged, except for admin requests).
//! 3. Partial ranking: the best non-zero candidate, kept for diagnostics.
//! 4. Winner: in strict mode the best perfect match, ranked by priority
//!    first; in permissive mode the best partial candidate.
//!
//! Steps 3 and 4 are pure functions of the candidate list ([`rank_partial`]
//! and [`rank_perfect`]).

#[cfg(test)]
mod tests;

use crate::config::MatchingConfig;
use crate::evaluator::{self, panic_message, EvaluationFailure};
use crate::mapping::{Mapping, MappingRegistry};
use crate::matchers::MatchResult;
use crate::random::{RandomSource, ThreadRandom};
use crate::request::RequestMessage;
use crate::scenario::ScenarioStore;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// A mapping together with how well it matched.
#[derive(Debug, Clone)]
pub struct MappingMatch {
    pub mapping: Arc<Mapping>,
    pub result: MatchResult,
}

/// Outcome of one resolution.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// The mapping that should answer the request.
    pub matched: Option<MappingMatch>,
    /// The best partial candidate, whether or not anything matched.
    pub partial: Option<MappingMatch>,
}

pub struct MappingSelector {
    registry: Arc<MappingRegistry>,
    scenarios: Arc<ScenarioStore>,
    random: Arc<dyn RandomSource>,
    settings: MatchingConfig,
}

impl MappingSelector {
    pub fn new(
        registry: Arc<MappingRegistry>,
        scenarios: Arc<ScenarioStore>,
        settings: MatchingConfig,
    ) -> Self {
        Self {
            registry,
            scenarios,
            random: Arc::new(ThreadRandom),
            settings,
        }
    }

    /// Replace the random source used for probability sampling.
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn settings(&self) -> &MatchingConfig {
        &self.settings
    }

    pub fn resolve(&self, request: &RequestMessage) -> Resolution {
        self.resolve_at(request, Utc::now())
    }

    /// Resolve `request` as if the current time were `now`.
    pub fn resolve_at(&self, request: &RequestMessage, now: DateTime<Utc>) -> Resolution {
        let snapshot = self.registry.snapshot();
        let admin_request = request.path_starts_with(&self.settings.admin_path_prefix);

        let candidates: Vec<MappingMatch> = snapshot
            .iter()
            .filter(|mapping| self.is_eligible(mapping, now))
            .filter_map(|mapping| self.evaluate_candidate(mapping, request, admin_request))
            .collect();

        let partial = rank_partial(&candidates).into_iter().next();
        let matched = if self.settings.allow_partial_mapping {
            partial.clone()
        } else {
            rank_perfect(&candidates).into_iter().next()
        };

        debug!(
            path = %request.path,
            candidates = candidates.len(),
            matched = ?matched.as_ref().map(|m| m.mapping.id),
            partial = ?partial.as_ref().map(|m| m.mapping.id),
            "Resolved request"
        );

        Resolution { matched, partial }
    }

    fn is_eligible(&self, mapping: &Mapping, now: DateTime<Utc>) -> bool {
        if !mapping.is_time_valid(now) {
            debug!(mapping = %mapping.id, "Skipping mapping outside its time window");
            return false;
        }
        match mapping.probability {
            // A zero probability never samples in, even on a draw of exactly 0.0
            Some(probability) if probability <= 0.0 => false,
            Some(probability) => {
                let draw = self.random.next_f64();
                let eligible = draw <= probability;
                if !eligible {
                    debug!(mapping = %mapping.id, draw, probability, "Skipping mapping by probability");
                }
                eligible
            }
            None => true,
        }
    }

    fn evaluate_candidate(
        &self,
        mapping: &Arc<Mapping>,
        request: &RequestMessage,
        admin_request: bool,
    ) -> Option<MappingMatch> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let gating_state = mapping
                .scenario
                .as_deref()
                .and_then(|name| self.scenarios.current_state(name));
            evaluator::evaluate(mapping, request, gating_state.as_deref())
        }));

        match outcome {
            Ok(Ok(result)) => {
                debug!(
                    mapping = %mapping.id,
                    average = result.average_score(),
                    perfect = result.is_perfect_match(),
                    "Evaluated mapping"
                );
                Some(MappingMatch {
                    mapping: Arc::clone(mapping),
                    result,
                })
            }
            Ok(Err(failure)) => {
                crate::metrics::record_matcher_error(failure.kind());
                if !admin_request {
                    log_failure(mapping, &failure);
                }
                None
            }
            Err(payload) => {
                crate::metrics::record_matcher_error("panic");
                error!(
                    mapping = %mapping.id,
                    "Resolution failed for mapping: {}",
                    panic_message(payload.as_ref())
                );
                None
            }
        }
    }
}

fn log_failure(mapping: &Mapping, failure: &EvaluationFailure) {
    match failure {
        EvaluationFailure::Matcher(errors) => {
            for err in errors {
                error!(mapping = %mapping.id, title = ?mapping.title, "Matcher failed: {}", err);
            }
        }
        EvaluationFailure::Panicked(message) => {
            error!(mapping = %mapping.id, title = ?mapping.title, "Matcher panicked: {}", message);
        }
    }
}

/// Probability descending, absent probability after any present one.
fn compare_probability(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_tail(a: &Mapping, b: &Mapping) -> Ordering {
    compare_probability(a.probability, b.probability).then_with(|| b.updated_at.cmp(&a.updated_at))
}

/// Partial candidates, best first.
///
/// Admin mappings only take part when they match perfectly, and candidates
/// with an average score of zero are dropped.
pub fn rank_partial(candidates: &[MappingMatch]) -> Vec<MappingMatch> {
    let mut ranked: Vec<MappingMatch> = candidates
        .iter()
        .filter(|c| !c.mapping.is_admin_interface || c.result.is_perfect_match())
        .filter(|c| c.result.average_score() > 0.0)
        .cloned()
        .collect();

    ranked.sort_by(|a, b| {
        a.result
            .rank_cmp(&b.result)
            .then_with(|| a.result.total_matchers().cmp(&b.result.total_matchers()))
            .then_with(|| a.mapping.priority.cmp(&b.mapping.priority))
            .then_with(|| compare_tail(&a.mapping, &b.mapping))
    });
    ranked
}

/// Perfect candidates, best first. Priority outranks match quality.
pub fn rank_perfect(candidates: &[MappingMatch]) -> Vec<MappingMatch> {
    let mut ranked: Vec<MappingMatch> = candidates
        .iter()
        .filter(|c| c.result.is_perfect_match())
        .cloned()
        .collect();

    ranked.sort_by(|a, b| {
        a.mapping
            .priority
            .cmp(&b.mapping.priority)
            .then_with(|| a.result.rank_cmp(&b.result))
            .then_with(|| a.result.total_matchers().cmp(&b.result.total_matchers()))
            .then_with(|| compare_tail(&a.mapping, &b.mapping))
    });
    ranked
}
