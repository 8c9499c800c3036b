//! Mappings: a request matcher, a response recipe and selection metadata.
//!
//! # Module Structure
//!
//! - `error` - registration errors
//! - `registry` - the live, concurrently readable mapping collection

mod error;
mod registry;

pub use error::MappingError;
pub use registry::{MappingRegistry, Snapshot};

use crate::matchers::{MatchContext, MatchResult, RequestMatcher, ScenarioStateMatcher};
use crate::request::RequestMessage;
use crate::response::{ResponseMessage, ResponseProvider};
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Default priority for mappings that don't set one.
pub const DEFAULT_PRIORITY: i32 = 0;

/// Priority given to mappings synthesized by record mode. Sorts after every
/// other priority, so a recording never shadows a hand-written mapping.
pub const PROXY_PRIORITY: i32 = i32::MAX;

/// Validity window of a mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeSettings {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Time to live, counted from `start` (or from the mapping's `updated_at`
    /// when there is no start).
    pub ttl: Option<Duration>,
}

impl TimeSettings {
    /// Whether `now` falls inside the window. Both bounds are inclusive.
    pub fn is_valid_at(&self, now: DateTime<Utc>, updated_at: DateTime<Utc>) -> bool {
        if self.start.is_some_and(|start| now < start) {
            return false;
        }
        if self.end.is_some_and(|end| now > end) {
            return false;
        }
        if let Some(ttl) = self.ttl {
            let origin = self.start.unwrap_or(updated_at);
            // A TTL reaching past the representable range never expires
            if origin.checked_add_signed(ttl).is_some_and(|expiry| now > expiry) {
                return false;
            }
        }
        true
    }
}

/// A registered stub.
#[derive(Clone)]
pub struct Mapping {
    pub id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub request_matcher: RequestMatcher,
    pub response_provider: Arc<dyn ResponseProvider>,
    /// Lower value is preferred among perfect matches.
    pub priority: i32,
    /// Sampling probability in `[0, 1]`; `None` means always eligible.
    pub probability: Option<f64>,
    pub scenario: Option<String>,
    /// State the scenario must be in for this mapping to match.
    pub execution_condition_state: Option<String>,
    /// State the scenario moves to once this mapping wins.
    pub next_state: Option<String>,
    /// Wins needed in the current state before moving to `next_state`.
    pub times_in_same_state: Option<u32>,
    pub is_admin_interface: bool,
    pub updated_at: DateTime<Utc>,
    pub time_settings: Option<TimeSettings>,
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("priority", &self.priority)
            .field("probability", &self.probability)
            .field("scenario", &self.scenario)
            .field("is_admin_interface", &self.is_admin_interface)
            .field("matchers", &self.request_matcher.len())
            .finish_non_exhaustive()
    }
}

impl Mapping {
    pub fn builder(request_matcher: RequestMatcher) -> MappingBuilder {
        MappingBuilder::new(request_matcher)
    }

    /// Whether the mapping's time window (if any) contains `now`.
    pub fn is_time_valid(&self, now: DateTime<Utc>) -> bool {
        self.time_settings
            .as_ref()
            .map_or(true, |settings| settings.is_valid_at(now, self.updated_at))
    }

    /// Score the mapping against a request.
    ///
    /// Mappings that take part in a scenario get one extra sub-matcher
    /// comparing `gating_state` with their execution condition.
    pub fn match_request(
        &self,
        request: &RequestMessage,
        gating_state: Option<&str>,
    ) -> MatchResult {
        let context = MatchContext { gating_state };
        let mut result = self.request_matcher.evaluate(request, &context);
        if self.scenario.is_some() {
            let scenario_matcher =
                ScenarioStateMatcher::new(self.execution_condition_state.as_deref());
            result.record(&scenario_matcher, request, &context);
        }
        result
    }

    /// Check the invariants enforced at registration.
    pub fn validate(&self) -> Result<(), MappingError> {
        if let Some(probability) = self.probability {
            if !(0.0..=1.0).contains(&probability) {
                return Err(MappingError::InvalidProbability {
                    id: self.id,
                    probability,
                });
            }
        }

        if let Some(path) = self.request_matcher.path() {
            for literal in path.literal_paths() {
                if literal.trim().is_empty() || !literal.starts_with('/') {
                    return Err(MappingError::InvalidPath {
                        id: self.id,
                        path: literal.to_string(),
                    });
                }
            }
        }

        if self.times_in_same_state == Some(0) {
            return Err(MappingError::InvalidStateTimes { id: self.id });
        }

        Ok(())
    }

    /// Short label for logs: the title when present, otherwise the id.
    pub fn label(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.id.to_string())
    }
}

/// Builder for [`Mapping`].
#[derive(Debug)]
pub struct MappingBuilder {
    mapping: Mapping,
}

impl MappingBuilder {
    fn new(request_matcher: RequestMatcher) -> Self {
        Self {
            mapping: Mapping {
                id: Uuid::new_v4(),
                title: None,
                description: None,
                request_matcher,
                response_provider: Arc::new(ResponseMessage::default()),
                priority: DEFAULT_PRIORITY,
                probability: None,
                scenario: None,
                execution_condition_state: None,
                next_state: None,
                times_in_same_state: None,
                is_admin_interface: false,
                updated_at: Utc::now(),
                time_settings: None,
            },
        }
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.mapping.id = id;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.mapping.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.mapping.description = Some(description.into());
        self
    }

    pub fn respond_with(mut self, provider: Arc<dyn ResponseProvider>) -> Self {
        self.mapping.response_provider = provider;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.mapping.priority = priority;
        self
    }

    pub fn probability(mut self, probability: f64) -> Self {
        self.mapping.probability = Some(probability);
        self
    }

    pub fn in_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.mapping.scenario = Some(scenario.into());
        self
    }

    pub fn when_state_is(mut self, state: impl Into<String>) -> Self {
        self.mapping.execution_condition_state = Some(state.into());
        self
    }

    pub fn will_set_state_to(mut self, state: impl Into<String>) -> Self {
        self.mapping.next_state = Some(state.into());
        self
    }

    pub fn times_in_same_state(mut self, times: u32) -> Self {
        self.mapping.times_in_same_state = Some(times);
        self
    }

    pub fn admin_interface(mut self) -> Self {
        self.mapping.is_admin_interface = true;
        self
    }

    pub fn updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.mapping.updated_at = updated_at;
        self
    }

    pub fn time_settings(mut self, settings: TimeSettings) -> Self {
        self.mapping.time_settings = Some(settings);
        self
    }

    pub fn build(self) -> Mapping {
        self.mapping
    }
}
