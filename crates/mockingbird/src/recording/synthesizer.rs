//! Mapping synthesis from a proxied request/response exchange.

use crate::config::ProxyAndRecordSettings;
use crate::mapping::{Mapping, PROXY_PRIORITY};
use crate::matchers::{BodyMatcher, RequestMatcher};
use crate::request::{BodyData, RequestMessage};
use crate::response::ResponseMessage;
use std::sync::Arc;

/// Build a mapping that replays `response` for requests like `request`.
///
/// With `use_defined_request_matchers` and a `template` (usually the closest
/// partial match), the template's matcher definitions are reused; otherwise
/// exact matchers are captured from the request. Excluded headers and
/// cookies are left out either way.
pub fn synthesize(
    template: Option<&Mapping>,
    settings: &ProxyAndRecordSettings,
    request: &RequestMessage,
    response: &ResponseMessage,
) -> Mapping {
    let defined = template
        .filter(|_| settings.use_defined_request_matchers)
        .map(|t| &t.request_matcher);

    let matcher = match defined {
        Some(defined) => from_defined(defined, settings, request),
        None => from_request(settings, request),
    };

    let default_label = format!("Proxy Mapping for {} {}", request.method, request.path);
    let pick = |value: Option<&String>| {
        value
            .filter(|v| settings.use_defined_request_matchers && !v.is_empty())
            .cloned()
            .unwrap_or_else(|| default_label.clone())
    };
    let title = pick(template.and_then(|t| t.title.as_ref()));
    let description = pick(template.and_then(|t| t.description.as_ref()));

    Mapping::builder(matcher)
        .title(title)
        .description(description)
        .priority(PROXY_PRIORITY)
        .respond_with(Arc::new(response.clone()))
        .build()
}

fn from_defined(
    defined: &RequestMatcher,
    settings: &ProxyAndRecordSettings,
    request: &RequestMessage,
) -> RequestMatcher {
    let mut matcher = RequestMatcher::new();

    if let Some(client_ip) = defined.client_ip() {
        matcher = matcher.with_client_ip_matcher(client_ip.clone());
    }

    matcher = match defined.path() {
        Some(path) => matcher.with_path_matcher(path.clone()),
        None => matcher.with_path(request.path.clone()),
    };

    matcher = match defined.method() {
        Some(method) => matcher.with_method_matcher(method.clone()),
        None => matcher.using_method(request.method.clone()),
    };

    for param in defined.params() {
        matcher = matcher.with_param_matcher(param.clone());
    }

    for cookie in defined.cookies() {
        if !settings.is_excluded_cookie(cookie.cookie_name()) {
            matcher = matcher.with_cookie_matcher(cookie.clone());
        }
    }

    for header in defined.headers() {
        if !settings.is_excluded_header(header.header_name()) {
            matcher = matcher.with_header_matcher(header.clone());
        }
    }

    match defined.body() {
        Some(body) => matcher.with_body(body.clone()),
        None => with_captured_body(matcher, &request.body),
    }
}

fn from_request(settings: &ProxyAndRecordSettings, request: &RequestMessage) -> RequestMatcher {
    let mut matcher = RequestMatcher::new()
        .with_path(request.path.clone())
        .using_method(request.method.clone());

    for (key, values) in &request.query {
        matcher = matcher.with_param(key.clone(), values.iter().cloned());
    }

    for (name, value) in &request.cookies {
        if !settings.is_excluded_cookie(name) {
            matcher = matcher.with_cookie(name.clone(), value.clone());
        }
    }

    for (name, values) in &request.headers {
        if !settings.is_excluded_header(name) {
            matcher = matcher.with_header(name.clone(), values.iter().cloned());
        }
    }

    with_captured_body(matcher, &request.body)
}

fn with_captured_body(matcher: RequestMatcher, body: &BodyData) -> RequestMatcher {
    match BodyMatcher::exact_for(body) {
        // Recorded JSON compares string values case-insensitively
        Some(BodyMatcher::Json {
            expected, strict, ..
        }) => matcher.with_body(BodyMatcher::Json {
            expected,
            ignore_case: true,
            strict,
        }),
        Some(body_matcher) => matcher.with_body(body_matcher),
        None => matcher,
    }
}
