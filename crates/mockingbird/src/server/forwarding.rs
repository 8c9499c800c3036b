//! Forwarding of unmatched requests to the configured upstream.

use crate::config::ProxyAndRecordSettings;
use crate::request::{BodyData, RequestMessage};
use crate::response::ResponseMessage;
use anyhow::Context;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::debug;

/// Global HTTP client for proxy requests
static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

fn http_client() -> &'static reqwest::Client {
    HTTP_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Hop-by-hop and recomputed headers that are never forwarded.
const SKIPPED_HEADERS: &[&str] = &["host", "content-length", "connection", "transfer-encoding"];

/// Upstream URL for `request`: base URL, path and query, then the URL
/// replacement rule.
pub fn target_url(base: &str, settings: &ProxyAndRecordSettings, request: &RequestMessage) -> String {
    let mut url = format!("{}{}", base.trim_end_matches('/'), request.path);
    if let Some(query) = &request.raw_query {
        url.push('?');
        url.push_str(query);
    }
    match &settings.url_replace {
        Some(replace) => replace.apply(&url),
        None => url,
    }
}

/// Send `request` upstream and capture the response.
pub async fn forward(
    settings: &ProxyAndRecordSettings,
    request: &RequestMessage,
) -> anyhow::Result<ResponseMessage> {
    let base = settings
        .url
        .as_deref()
        .context("Proxy URL is not configured")?;
    let url = target_url(base, settings, request);

    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .with_context(|| format!("Invalid HTTP method '{}'", request.method))?;
    let mut upstream = http_client().request(method, &url);

    for (name, values) in &request.headers {
        if SKIPPED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        for value in values {
            upstream = upstream.header(name.as_str(), value.as_str());
        }
    }
    if !request.body.is_empty() {
        upstream = upstream.body(request.body.as_bytes().to_vec());
    }

    let start = Instant::now();
    let response = upstream
        .send()
        .await
        .with_context(|| format!("Failed to send proxy request to {url}"))?;

    let status = response.status().as_u16();
    let mut captured = ResponseMessage::new(status);
    for (name, value) in response.headers() {
        captured = captured.with_header(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
    }
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read response body from {url}"))?;

    debug!(
        url = %url,
        status,
        latency_ms = start.elapsed().as_millis() as u64,
        "Proxied request"
    );

    Ok(captured.with_body(BodyData::detect(&body, content_type.as_deref())))
}
