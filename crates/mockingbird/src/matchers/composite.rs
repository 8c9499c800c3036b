//! Per-mapping composition of request matchers.

use super::body::BodyMatcher;
use super::request::{
    ClientIpMatcher, CookieMatcher, HeaderMatcher, MethodMatcher, ParamMatcher, PathMatcher,
};
use super::string::{MatchOperator, StringMatcher};
use super::{MatchContext, MatchResult, RequestMessageMatcher};
use crate::request::RequestMessage;
use std::sync::Arc;

/// All predicates of one mapping.
///
/// Built-in matchers live in typed slots so record mode can reuse their
/// definitions; anything else is attached as a custom trait object.
#[derive(Debug, Clone, Default)]
pub struct RequestMatcher {
    client_ip: Option<ClientIpMatcher>,
    path: Option<PathMatcher>,
    method: Option<MethodMatcher>,
    params: Vec<ParamMatcher>,
    cookies: Vec<CookieMatcher>,
    headers: Vec<HeaderMatcher>,
    body: Option<BodyMatcher>,
    custom: Vec<Arc<dyn RequestMessageMatcher>>,
}

impl RequestMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(self, path: impl Into<String>) -> Self {
        self.with_path_matcher(PathMatcher::exact(path))
    }

    pub fn with_path_matcher(mut self, matcher: PathMatcher) -> Self {
        self.path = Some(matcher);
        self
    }

    pub fn using_method(self, method: impl Into<String>) -> Self {
        self.using_methods([method.into()])
    }

    pub fn using_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.method = Some(MethodMatcher::new(methods));
        self
    }

    pub fn with_method_matcher(mut self, matcher: MethodMatcher) -> Self {
        self.method = Some(matcher);
        self
    }

    /// Require a query parameter to have each of `values`.
    pub fn with_param<I, S>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let matchers = values.into_iter().map(StringMatcher::exact).collect();
        self.with_param_matcher(ParamMatcher::new(key, matchers))
    }

    pub fn with_param_matcher(mut self, matcher: ParamMatcher) -> Self {
        self.params.push(matcher);
        self
    }

    pub fn with_header<I, S>(self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let matchers = values.into_iter().map(StringMatcher::exact).collect();
        self.with_header_matcher(HeaderMatcher::new(name, matchers))
    }

    pub fn with_header_matcher(mut self, matcher: HeaderMatcher) -> Self {
        self.headers.push(matcher);
        self
    }

    pub fn with_cookie(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_cookie_matcher(CookieMatcher::new(name, vec![StringMatcher::exact(value)]))
    }

    pub fn with_cookie_matcher(mut self, matcher: CookieMatcher) -> Self {
        self.cookies.push(matcher);
        self
    }

    pub fn with_client_ip(self, ip: impl Into<String>) -> Self {
        self.with_client_ip_matcher(ClientIpMatcher::new(
            MatchOperator::Or,
            vec![StringMatcher::exact(ip)],
        ))
    }

    pub fn with_client_ip_matcher(mut self, matcher: ClientIpMatcher) -> Self {
        self.client_ip = Some(matcher);
        self
    }

    pub fn with_body(mut self, matcher: BodyMatcher) -> Self {
        self.body = Some(matcher);
        self
    }

    pub fn with_custom(mut self, matcher: Arc<dyn RequestMessageMatcher>) -> Self {
        self.custom.push(matcher);
        self
    }

    pub fn client_ip(&self) -> Option<&ClientIpMatcher> {
        self.client_ip.as_ref()
    }

    pub fn path(&self) -> Option<&PathMatcher> {
        self.path.as_ref()
    }

    pub fn method(&self) -> Option<&MethodMatcher> {
        self.method.as_ref()
    }

    pub fn params(&self) -> &[ParamMatcher] {
        &self.params
    }

    pub fn cookies(&self) -> &[CookieMatcher] {
        &self.cookies
    }

    pub fn headers(&self) -> &[HeaderMatcher] {
        &self.headers
    }

    pub fn body(&self) -> Option<&BodyMatcher> {
        self.body.as_ref()
    }

    /// Number of sub-matchers that will be evaluated.
    pub fn len(&self) -> usize {
        self.matchers().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sub-matchers in evaluation order.
    pub fn matchers(&self) -> impl Iterator<Item = &dyn RequestMessageMatcher> {
        let singles: [Option<&dyn RequestMessageMatcher>; 3] = [
            self.client_ip
                .as_ref()
                .map(|m| m as &dyn RequestMessageMatcher),
            self.path.as_ref().map(|m| m as &dyn RequestMessageMatcher),
            self.method.as_ref().map(|m| m as &dyn RequestMessageMatcher),
        ];
        singles
            .into_iter()
            .flatten()
            .chain(self.params.iter().map(|m| m as &dyn RequestMessageMatcher))
            .chain(self.cookies.iter().map(|m| m as &dyn RequestMessageMatcher))
            .chain(self.headers.iter().map(|m| m as &dyn RequestMessageMatcher))
            .chain(self.body.iter().map(|m| m as &dyn RequestMessageMatcher))
            .chain(
                self.custom
                    .iter()
                    .map(|m| m.as_ref() as &dyn RequestMessageMatcher),
            )
    }

    /// Score every sub-matcher against the request.
    pub fn evaluate(&self, request: &RequestMessage, context: &MatchContext<'_>) -> MatchResult {
        let mut result = MatchResult::new();
        for matcher in self.matchers() {
            result.record(matcher, request, context);
        }
        result
    }
}
