//! Proxy and record mode configuration.

use crate::recording::UrlReplace;
use serde::{Deserialize, Serialize};

/// Header that never becomes a header matcher; cookies get their own matchers.
pub const COOKIE_HEADER: &str = "cookie";

/// Settings for forwarding unmatched requests and recording the exchange.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProxyAndRecordSettings {
    /// Upstream base URL; proxying is off without it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Register a mapping synthesized from each proxied exchange.
    #[serde(default)]
    pub save_mapping: bool,
    /// Reuse the matchers of the closest mapping instead of capturing exact values.
    #[serde(default)]
    pub use_defined_request_matchers: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_headers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_cookies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_replace: Option<UrlReplace>,
}

impl ProxyAndRecordSettings {
    pub fn is_enabled(&self) -> bool {
        self.url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }

    /// Whether a header is left out of recorded mappings. `Cookie` always is.
    pub fn is_excluded_header(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(COOKIE_HEADER)
            || self
                .excluded_headers
                .iter()
                .any(|excluded| excluded.eq_ignore_ascii_case(name))
    }

    pub fn is_excluded_cookie(&self, name: &str) -> bool {
        self.excluded_cookies
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_header_always_excluded() {
        let settings = ProxyAndRecordSettings::default();
        assert!(settings.is_excluded_header("Cookie"));
        assert!(settings.is_excluded_header("cookie"));
        assert!(!settings.is_excluded_header("Accept"));
    }

    #[test]
    fn test_exclusions_ignore_case() {
        let settings = ProxyAndRecordSettings {
            excluded_headers: vec!["X-Request-Id".into()],
            excluded_cookies: vec!["JSESSIONID".into()],
            ..Default::default()
        };
        assert!(settings.is_excluded_header("x-request-id"));
        assert!(settings.is_excluded_cookie("jsessionid"));
        assert!(!settings.is_excluded_cookie("theme"));
    }

    #[test]
    fn test_enabled_requires_url() {
        let mut settings = ProxyAndRecordSettings::default();
        assert!(!settings.is_enabled());
        settings.url = Some("  ".into());
        assert!(!settings.is_enabled());
        settings.url = Some("http://localhost:9000".into());
        assert!(settings.is_enabled());
    }
}
