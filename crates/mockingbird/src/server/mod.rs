//! HTTP front end for the mapping engine.
//!
//! # Module Structure
//!
//! - `handler` - per-request resolution, proxying and recording
//! - `forwarding` - upstream client for record mode

mod forwarding;
mod handler;

pub use forwarding::{forward, target_url};
pub use handler::{handle_request, not_found, respond};

use crate::config::ProxyAndRecordSettings;
use crate::engine::Engine;
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// A stub server bound to one engine.
pub struct Server {
    pub engine: Arc<Engine>,
    pub proxy: ProxyAndRecordSettings,
}

impl Server {
    pub fn new(engine: Arc<Engine>, proxy: ProxyAndRecordSettings) -> Self {
        Self { engine, proxy }
    }

    /// Accept connections on `listener` until `shutdown` fires.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<()> {
        let local_addr = listener.local_addr()?;
        info!("Mockingbird listening on {}", local_addr);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let server = Arc::clone(&self);
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    let server = Arc::clone(&server);
                                    async move { handle_request(req, server, addr).await }
                                });
                                if let Err(e) = http1::Builder::new()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    debug!("Connection error from {}: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error on {}: {}", local_addr, e);
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Server on {} shutting down", local_addr);
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Serve Prometheus metrics on `listener` until `shutdown` fires.
pub async fn serve_metrics(
    listener: TcpListener,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    info!("Metrics listening on {}", listener.local_addr()?);
    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, _) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Metrics accept error: {}", e);
                        continue;
                    }
                };
                tokio::spawn(async move {
                    let service = service_fn(|_req: Request<hyper::body::Incoming>| async {
                        Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(
                            crate::metrics::collect_metrics(),
                        ))))
                    });
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        debug!("Metrics connection error: {}", e);
                    }
                });
            }
            _ = shutdown.recv() => break,
        }
    }
    Ok(())
}
