//! Request handling: resolve, answer, and fall back to the upstream.

use super::forwarding;
use super::Server;
use crate::recording::synthesize;
use crate::request::{BodyData, RequestMessage};
use crate::response::ResponseMessage;
use crate::selector::{MappingMatch, Resolution};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// hyper entry point.
pub async fn handle_request(
    req: Request<Incoming>,
    server: Arc<Server>,
    client_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let raw_body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            Bytes::new()
        }
    };

    let mut request = RequestMessage::new(parts.method.as_str(), parts.uri.path())
        .with_query_string(parts.uri.query().unwrap_or(""))
        .with_client_ip(client_addr.ip().to_string());
    for (name, value) in &parts.headers {
        request = request.with_header(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
    }
    let content_type = request.first_header("content-type").map(str::to_string);
    request = request.with_body(BodyData::detect(&raw_body, content_type.as_deref()));

    Ok(respond(&server, &request).await.into_hyper())
}

/// Answer a decoded request.
pub async fn respond(server: &Server, request: &RequestMessage) -> ResponseMessage {
    let start = Instant::now();
    let resolution = server.engine.resolve(request);

    if let Some(winner) = &resolution.matched {
        crate::metrics::record_resolution("matched", start.elapsed().as_micros() as f64);
        crate::metrics::record_request(&request.method, "matched");
        debug!(mapping = %winner.mapping.id, path = %request.path, "Request matched");
        server.engine.record_win(&winner.mapping);
        return winner.mapping.response_provider.provide(request);
    }
    crate::metrics::record_resolution("unmatched", start.elapsed().as_micros() as f64);

    if server.proxy.is_enabled() {
        return proxy_and_record(server, request, &resolution).await;
    }

    crate::metrics::record_request(&request.method, "unmatched");
    not_found(resolution.partial.as_ref())
}

async fn proxy_and_record(
    server: &Server,
    request: &RequestMessage,
    resolution: &Resolution,
) -> ResponseMessage {
    let response = match forwarding::forward(&server.proxy, request).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Proxy request failed: {:#}", e);
            crate::metrics::record_request(&request.method, "proxy_error");
            return ResponseMessage::new(502).with_json(json!({
                "status": "Proxy request failed",
                "error": format!("{e:#}"),
            }));
        }
    };
    crate::metrics::record_request(&request.method, "proxied");

    if server.proxy.save_mapping {
        let template = resolution.partial.as_ref().map(|p| p.mapping.as_ref());
        let mapping = synthesize(template, &server.proxy, request, &response);
        match server.engine.register(mapping) {
            Ok(saved) => {
                crate::metrics::record_recorded_mapping();
                info!(mapping = %saved.id, title = ?saved.title, "Recorded proxy mapping");
            }
            Err(e) => warn!("Failed to save proxy mapping: {}", e),
        }
    }

    response
}

/// 404 answer carrying the closest partial match for diagnostics.
pub fn not_found(partial: Option<&MappingMatch>) -> ResponseMessage {
    let closest = partial.map(|p| {
        json!({
            "id": p.mapping.id,
            "title": p.mapping.title,
            "averageScore": p.result.average_score(),
        })
    });
    ResponseMessage::new(404).with_json(json!({
        "status": "No matching mapping found",
        "closestMapping": closest,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MatchingConfig, ProxyAndRecordSettings};
    use crate::engine::Engine;
    use crate::mapping::Mapping;
    use crate::matchers::RequestMatcher;

    fn server_with(mappings: Vec<Mapping>) -> Server {
        let engine = Engine::new(MatchingConfig::default());
        for mapping in mappings {
            engine.register(mapping).unwrap();
        }
        Server::new(Arc::new(engine), ProxyAndRecordSettings::default())
    }

    #[tokio::test]
    async fn test_matched_request_uses_provider() {
        let server = server_with(vec![Mapping::builder(
            RequestMatcher::new().with_path("/hello").using_method("GET"),
        )
        .respond_with(Arc::new(ResponseMessage::new(200).with_text("world")))
        .build()]);

        let response = respond(&server, &RequestMessage::new("GET", "/hello")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body.as_text(), Some("world"));
    }

    #[tokio::test]
    async fn test_unmatched_request_reports_closest_mapping() {
        let mapping = Mapping::builder(RequestMatcher::new().with_path("/hello").using_method("POST"))
            .title("Greeting")
            .build();
        let id = mapping.id;
        let server = server_with(vec![mapping]);

        let response = respond(&server, &RequestMessage::new("GET", "/hello")).await;
        assert_eq!(response.status, 404);
        let BodyData::Json { value, .. } = &response.body else {
            panic!("expected a JSON body");
        };
        assert_eq!(value["status"], "No matching mapping found");
        assert_eq!(value["closestMapping"]["id"], id.to_string());
        assert_eq!(value["closestMapping"]["title"], "Greeting");
        assert_eq!(value["closestMapping"]["averageScore"], 0.5);
    }

    #[tokio::test]
    async fn test_unmatched_without_candidates() {
        let server = server_with(Vec::new());
        let response = respond(&server, &RequestMessage::new("GET", "/nothing")).await;
        assert_eq!(response.status, 404);
        let BodyData::Json { value, .. } = &response.body else {
            panic!("expected a JSON body");
        };
        assert!(value["closestMapping"].is_null());
    }

    #[tokio::test]
    async fn test_winner_advances_scenario() {
        let server = server_with(vec![Mapping::builder(RequestMatcher::new().with_path("/pay"))
            .in_scenario("checkout")
            .will_set_state_to("Paid")
            .build()]);

        respond(&server, &RequestMessage::new("POST", "/pay")).await;
        assert_eq!(
            server.engine.scenarios().current_state("checkout").as_deref(),
            Some("Paid")
        );
    }
}
