//! Matchers for the individual parts of a request.

use super::string::{MatchOperator, StringMatcher};
use super::{MatchContext, MatcherError, RequestMessageMatcher, MISMATCH, PERFECT};
use crate::request::RequestMessage;

/// Matches the HTTP method against any of a list (case-insensitive).
#[derive(Debug, Clone, PartialEq)]
pub struct MethodMatcher {
    methods: Vec<String>,
}

impl MethodMatcher {
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            methods: methods
                .into_iter()
                .map(|m| m.into().to_uppercase())
                .collect(),
        }
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }
}

impl RequestMessageMatcher for MethodMatcher {
    fn name(&self) -> &'static str {
        "method"
    }

    fn matching_score(
        &self,
        request: &RequestMessage,
        _context: &MatchContext<'_>,
    ) -> Result<f64, MatcherError> {
        let matched = self
            .methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(&request.method));
        Ok(if matched { PERFECT } else { MISMATCH })
    }
}

/// Matches the request path.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    operator: MatchOperator,
    matchers: Vec<StringMatcher>,
}

impl PathMatcher {
    pub fn new(operator: MatchOperator, matchers: Vec<StringMatcher>) -> Self {
        Self { operator, matchers }
    }

    /// Exact match on a literal path.
    pub fn exact(path: impl Into<String>) -> Self {
        Self::new(MatchOperator::Or, vec![StringMatcher::exact(path)])
    }

    pub fn operator(&self) -> MatchOperator {
        self.operator
    }

    pub fn matchers(&self) -> &[StringMatcher] {
        &self.matchers
    }

    /// Literal paths of the exact patterns, for validation.
    pub fn literal_paths(&self) -> impl Iterator<Item = &str> {
        self.matchers.iter().filter_map(StringMatcher::exact_value)
    }
}

impl RequestMessageMatcher for PathMatcher {
    fn name(&self) -> &'static str {
        "path"
    }

    fn matching_score(
        &self,
        request: &RequestMessage,
        _context: &MatchContext<'_>,
    ) -> Result<f64, MatcherError> {
        Ok(self
            .operator
            .aggregate(self.matchers.iter().map(|m| m.score(Some(&request.path)))))
    }
}

/// Scores a multi-valued field: each pattern takes its best value, then the
/// pattern scores are folded with the operator.
fn score_values(operator: MatchOperator, matchers: &[StringMatcher], values: &[String]) -> f64 {
    if values.is_empty() {
        return operator.aggregate(matchers.iter().map(|m| m.score(None)));
    }
    operator.aggregate(matchers.iter().map(|m| {
        values
            .iter()
            .map(|v| m.score(Some(v)))
            .fold(MISMATCH, f64::max)
    }))
}

/// Matches one query parameter.
#[derive(Debug, Clone)]
pub struct ParamMatcher {
    key: String,
    operator: MatchOperator,
    matchers: Vec<StringMatcher>,
}

impl ParamMatcher {
    pub fn new(key: impl Into<String>, matchers: Vec<StringMatcher>) -> Self {
        Self {
            key: key.into(),
            operator: MatchOperator::Average,
            matchers,
        }
    }

    pub fn with_operator(mut self, operator: MatchOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> MatchOperator {
        self.operator
    }

    pub fn matchers(&self) -> &[StringMatcher] {
        &self.matchers
    }
}

impl RequestMessageMatcher for ParamMatcher {
    fn name(&self) -> &'static str {
        "param"
    }

    fn matching_score(
        &self,
        request: &RequestMessage,
        _context: &MatchContext<'_>,
    ) -> Result<f64, MatcherError> {
        let values = match request.query.get(&self.key) {
            Some(values) => values.as_slice(),
            None => &[],
        };
        if self.matchers.is_empty() {
            // Key presence only
            return Ok(if values.is_empty() { MISMATCH } else { PERFECT });
        }
        Ok(score_values(self.operator, &self.matchers, values))
    }
}

/// Matches one header (name compared case-insensitively).
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: String,
    operator: MatchOperator,
    matchers: Vec<StringMatcher>,
}

impl HeaderMatcher {
    pub fn new(name: impl Into<String>, matchers: Vec<StringMatcher>) -> Self {
        Self {
            name: name.into(),
            operator: MatchOperator::Average,
            matchers,
        }
    }

    pub fn with_operator(mut self, operator: MatchOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn header_name(&self) -> &str {
        &self.name
    }

    pub fn operator(&self) -> MatchOperator {
        self.operator
    }

    pub fn matchers(&self) -> &[StringMatcher] {
        &self.matchers
    }
}

impl RequestMessageMatcher for HeaderMatcher {
    fn name(&self) -> &'static str {
        "header"
    }

    fn matching_score(
        &self,
        request: &RequestMessage,
        _context: &MatchContext<'_>,
    ) -> Result<f64, MatcherError> {
        let values = request.header(&self.name).unwrap_or(&[]);
        Ok(score_values(self.operator, &self.matchers, values))
    }
}

/// Matches one cookie.
#[derive(Debug, Clone)]
pub struct CookieMatcher {
    name: String,
    operator: MatchOperator,
    matchers: Vec<StringMatcher>,
}

impl CookieMatcher {
    pub fn new(name: impl Into<String>, matchers: Vec<StringMatcher>) -> Self {
        Self {
            name: name.into(),
            operator: MatchOperator::Or,
            matchers,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.name
    }

    pub fn matchers(&self) -> &[StringMatcher] {
        &self.matchers
    }
}

impl RequestMessageMatcher for CookieMatcher {
    fn name(&self) -> &'static str {
        "cookie"
    }

    fn matching_score(
        &self,
        request: &RequestMessage,
        _context: &MatchContext<'_>,
    ) -> Result<f64, MatcherError> {
        let value = request.cookies.get(&self.name).map(String::as_str);
        Ok(self
            .operator
            .aggregate(self.matchers.iter().map(|m| m.score(value))))
    }
}

/// Matches the client IP address.
#[derive(Debug, Clone)]
pub struct ClientIpMatcher {
    operator: MatchOperator,
    matchers: Vec<StringMatcher>,
}

impl ClientIpMatcher {
    pub fn new(operator: MatchOperator, matchers: Vec<StringMatcher>) -> Self {
        Self { operator, matchers }
    }

    pub fn operator(&self) -> MatchOperator {
        self.operator
    }

    pub fn matchers(&self) -> &[StringMatcher] {
        &self.matchers
    }
}

impl RequestMessageMatcher for ClientIpMatcher {
    fn name(&self) -> &'static str {
        "client_ip"
    }

    fn matching_score(
        &self,
        request: &RequestMessage,
        _context: &MatchContext<'_>,
    ) -> Result<f64, MatcherError> {
        let ip = request.client_ip.as_deref();
        Ok(self
            .operator
            .aggregate(self.matchers.iter().map(|m| m.score(ip))))
    }
}

/// Compares the scenario's current state with the state a mapping requires.
///
/// Without a gating state (scenario unknown or not started) only mappings with
/// no required state match; they are the scenario's entry points.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioStateMatcher<'a> {
    expected_state: Option<&'a str>,
}

impl<'a> ScenarioStateMatcher<'a> {
    pub fn new(expected_state: Option<&'a str>) -> Self {
        Self { expected_state }
    }
}

impl RequestMessageMatcher for ScenarioStateMatcher<'_> {
    fn name(&self) -> &'static str {
        "scenario_state"
    }

    fn matching_score(
        &self,
        _request: &RequestMessage,
        context: &MatchContext<'_>,
    ) -> Result<f64, MatcherError> {
        let satisfied = match context.gating_state {
            None => self.expected_state.is_none(),
            Some(current) => self.expected_state == Some(current),
        };
        Ok(if satisfied { PERFECT } else { MISMATCH })
    }
}
