//! HTTP front end of the mock server.
//!
//! Converts hyper requests into [`IncomingRequest`]s, resolves and renders
//! them, and writes the resulting status/headers/body back.

use crate::config::ServerSettings;
use crate::resolver::{IncomingRequest, Resolver};
use crate::template::{MockResponse, TemplateEngine};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue};
use hyper::http::request::Parts;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Mock server
///
/// Answers every request with the rendered response of the matching mock
/// definition, or an empty 404.
pub struct MockServer {
    resolver: Resolver,
    templates: TemplateEngine,
    settings: ServerSettings,
    /// Total requests processed.
    requests_total: AtomicU64,
    /// Total requests matched to a definition.
    requests_matched: AtomicU64,
    /// Total requests unmatched.
    requests_unmatched: AtomicU64,
}

impl MockServer {
    /// Create a new mock server around a built resolver.
    pub fn new(resolver: Resolver, settings: ServerSettings) -> Self {
        info!(
            definitions = resolver.definitions(),
            mock_dir = %settings.mock_dir.display(),
            "Mock server initialized"
        );

        Self {
            resolver,
            templates: TemplateEngine::new(),
            settings,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        }
    }

    /// Get total requests processed.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Get total requests matched.
    pub fn total_matched(&self) -> u64 {
        self.requests_matched.load(Ordering::Relaxed)
    }

    /// Get total requests unmatched.
    pub fn total_unmatched(&self) -> u64 {
        self.requests_unmatched.load(Ordering::Relaxed)
    }

    /// Resolve a request and render its response.
    pub fn handle(&self, request: &IncomingRequest) -> MockResponse {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        match self.resolver.resolve(request) {
            Some(resolution) => {
                self.requests_matched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_matches {
                    info!(
                        mock = %resolution.definition.name,
                        method = %request.method,
                        path = %request.path,
                        "Request matched mock"
                    );
                }
                self.templates
                    .render_response(&resolution.definition.response, &resolution.captures)
            }
            None => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                if self.settings.log_unmatched {
                    warn!(
                        method = %request.method,
                        path = %request.path,
                        "No matching mock found"
                    );
                }
                MockResponse::not_found()
            }
        }
    }

    /// Accept connections until `shutdown` resolves, then let every open
    /// connection finish its current request before returning.
    ///
    /// Each connection is served on its own task; the resolver is shared
    /// read-only between them.
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        info!(address = %addr, "Mock server listening");

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let server = Arc::clone(&self);
                        let mut stop = stop_rx.clone();
                        connections.spawn(async move {
                            let service = service_fn(move |req| Arc::clone(&server).service(req));
                            let conn = http1::Builder::new()
                                .serve_connection(TokioIo::new(stream), service);
                            tokio::pin!(conn);

                            let result = tokio::select! {
                                result = conn.as_mut() => result,
                                _ = stop.changed() => {
                                    conn.as_mut().graceful_shutdown();
                                    conn.as_mut().await
                                }
                            };
                            if let Err(err) = result {
                                debug!(remote = %remote, error = %err, "Connection closed with error");
                            }
                        });
                    }
                    Err(err) => warn!(error = %err, "Failed to accept connection"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = &mut shutdown => break,
            }
        }

        drop(listener);
        let _ = stop_tx.send(true);
        info!(connections = connections.len(), "Mock server draining connections");
        while connections.join_next().await.is_some() {}

        info!(
            total = self.total_requests(),
            matched = self.total_matched(),
            unmatched = self.total_unmatched(),
            "Mock server stopped"
        );
        Ok(())
    }

    async fn service(
        self: Arc<Self>,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let (parts, body) = req.into_parts();

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                warn!(error = %err, path = %parts.uri.path(), "Failed to read request body");
                return Ok(into_response(MockResponse::not_found()));
            }
        };

        let request = incoming_request(&parts, body);
        Ok(into_response(self.handle(&request)))
    }
}

/// Build the transport-independent request. Repeated header values are
/// joined with `,`.
fn incoming_request(parts: &Parts, body: Bytes) -> IncomingRequest {
    let headers = parts
        .headers
        .keys()
        .map(|name| {
            let value = parts
                .headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            (name.as_str().to_string(), value)
        })
        .collect();

    IncomingRequest {
        method: parts.method.as_str().to_string(),
        path: parts.uri.path().to_string(),
        headers,
        body,
    }
}

fn into_response(response: MockResponse) -> Response<Full<Bytes>> {
    let mut out = Response::new(Full::new(Bytes::from(response.body)));
    *out.status_mut() =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    for (name, value) in response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid response header"),
        }
    }

    out
}
