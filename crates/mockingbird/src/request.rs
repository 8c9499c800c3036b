//! Incoming request model used by every matcher.
//!
//! The transport layer converts a hyper request into a [`RequestMessage`]
//! once; matchers only ever see this owned, decoded form.

use serde::Serialize;
use std::collections::BTreeMap;

/// Request body after content detection.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum BodyData {
    #[default]
    Empty,
    /// Body parsed as JSON. The original text is kept for exact comparisons.
    Json {
        value: serde_json::Value,
        text: String,
    },
    Text(String),
    Bytes(Vec<u8>),
}

impl BodyData {
    /// Detect the body kind from raw bytes and an optional content type.
    ///
    /// JSON is attempted when the content type says so or when the payload
    /// starts like a JSON document; anything valid UTF-8 falls back to text.
    pub fn detect(raw: &[u8], content_type: Option<&str>) -> Self {
        if raw.is_empty() {
            return BodyData::Empty;
        }

        let text = match std::str::from_utf8(raw) {
            Ok(text) => text,
            Err(_) => return BodyData::Bytes(raw.to_vec()),
        };

        let declared_json = content_type
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);
        let looks_like_json = matches!(text.trim_start().chars().next(), Some('{') | Some('['));

        if declared_json || looks_like_json {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
                return BodyData::Json {
                    value,
                    text: text.to_string(),
                };
            }
        }

        BodyData::Text(text.to_string())
    }

    /// Body as text, when it has a textual representation.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            BodyData::Empty => None,
            BodyData::Json { text, .. } => Some(text),
            BodyData::Text(text) => Some(text),
            BodyData::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
        }
    }

    /// Raw body bytes (empty slice when there is no body).
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            BodyData::Empty => &[],
            BodyData::Json { text, .. } => text.as_bytes(),
            BodyData::Text(text) => text.as_bytes(),
            BodyData::Bytes(bytes) => bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, BodyData::Empty)
    }
}

/// A decoded HTTP request.
///
/// Header names are stored lower-cased; query keys and values are URL-decoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMessage {
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_query: Option<String>,
    pub query: BTreeMap<String, Vec<String>>,
    pub headers: BTreeMap<String, Vec<String>>,
    pub cookies: BTreeMap<String, String>,
    pub body: BodyData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
}

impl RequestMessage {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Attach a raw query string (without the leading `?`).
    pub fn with_query_string(mut self, query: &str) -> Self {
        if query.is_empty() {
            return self;
        }
        self.raw_query = Some(query.to_string());
        self.query = parse_query_string(query);
        self
    }

    /// Add a header value. A `Cookie` header also populates [`Self::cookies`].
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        if name == "cookie" {
            for (key, val) in parse_cookies(&value) {
                self.cookies.insert(key, val);
            }
        }
        self.headers.entry(name).or_default().push(value);
        self
    }

    pub fn with_body(mut self, body: BodyData) -> Self {
        self.body = body;
        self
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    /// All values of a header, looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// First value of a header.
    pub fn first_header(&self, name: &str) -> Option<&str> {
        self.header(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Whether the request path lives under `prefix` (ASCII case-insensitive).
    pub fn path_starts_with(&self, prefix: &str) -> bool {
        self.path.len() >= prefix.len()
            && self.path.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    }
}

/// Parse a query string into a multi-map, URL-decoding keys and values.
///
/// Repeated keys keep every value in order of appearance. A key without `=`
/// maps to an empty value.
pub fn parse_query_string(query: &str) -> BTreeMap<String, Vec<String>> {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pair in query.trim_start_matches('?').split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key);
        let value = decode_component(value);
        params.entry(key).or_default().push(value);
    }
    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

/// Split a `Cookie` header into name/value pairs.
pub fn parse_cookies(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|part| {
            let (name, value) = part.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
