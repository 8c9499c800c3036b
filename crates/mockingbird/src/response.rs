//! Response recipes attached to mappings.

use crate::request::{BodyData, RequestMessage};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Produces the response for a request once its mapping has won.
pub trait ResponseProvider: Send + Sync + fmt::Debug {
    fn provide(&self, request: &RequestMessage) -> ResponseMessage;
}

/// A concrete HTTP response.
///
/// Also usable directly as a [`ResponseProvider`] that replays itself
/// verbatim, which is how recorded exchanges are served back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMessage {
    pub status: u16,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: BodyData,
}

impl Default for ResponseMessage {
    fn default() -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body: BodyData::Empty,
        }
    }
}

impl ResponseMessage {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_string())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_body(mut self, body: BodyData) -> Self {
        self.body = body;
        self
    }

    /// JSON body with a matching content type.
    pub fn with_json(self, value: serde_json::Value) -> Self {
        let text = value.to_string();
        self.with_header("Content-Type", "application/json")
            .with_body(BodyData::Json { value, text })
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_body(BodyData::Text(text.into()))
    }

    /// Convert into a hyper response.
    ///
    /// Headers that cannot be represented are skipped; an invalid status
    /// falls back to 500.
    pub fn into_hyper(self) -> Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Bytes::copy_from_slice(self.body.as_bytes());

        let mut builder = Response::builder().status(status);
        for (name, values) in &self.headers {
            // content-length is recomputed by hyper from the body
            if name.eq_ignore_ascii_case("content-length")
                || name.eq_ignore_ascii_case("transfer-encoding")
            {
                continue;
            }
            for value in values {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        builder.body(Full::new(body.clone())).unwrap_or_else(|_| {
            let mut response = Response::new(Full::new(body));
            *response.status_mut() = status;
            response
        })
    }
}

impl ResponseProvider for ResponseMessage {
    fn provide(&self, _request: &RequestMessage) -> ResponseMessage {
        self.clone()
    }
}
