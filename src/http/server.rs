//! HTTP front end.
//!
//! # Responsibilities
//! - Create the Axum router with the single front handler
//! - Wire up middleware (tracing, request ID, timeout)
//! - Dispatch each request: relay, terminal bridge, static asset, or forward
//! - Forward plain requests to the upstream origin, rewriting bodies on match
//! - Drain gracefully and cancel every open session on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeFile,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::capture::WireDecoder;
use crate::config::{RelayConfig, RelaySettings, TerminalConfig};
use crate::http::request::{prepare_forward, strip_hop_by_hop, X_REQUEST_ID};
use crate::http::response::{is_rewritable, transform_body};
use crate::http::upstream::{Upstream, UpstreamError};
use crate::http::websocket::relay_upgrade;
use crate::lifecycle::Cancellation;
use crate::net::SessionTracker;
use crate::observability::metrics;
use crate::routing::{FrontRouter, Route};
use crate::terminal::terminal_upgrade;

/// Errors building the front end.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<FrontRouter>,
    pub upstream: Arc<Upstream>,
    pub client: Client<HttpConnector, Body>,
    pub decoder: Arc<WireDecoder>,
    pub sessions: SessionTracker,
    /// Parent of every session's cancellation.
    pub shutdown: Cancellation,
    pub relay: RelaySettings,
    pub terminal: TerminalConfig,
    pub upstream_connect_timeout: Duration,
    pub max_body_bytes: usize,
}

/// The relay's single listening entry point.
pub struct HttpServer {
    router: Router,
    sessions: SessionTracker,
    sessions_root: Cancellation,
}

impl HttpServer {
    /// Create the front end for `config`.
    pub fn new(config: &RelayConfig) -> Result<Self, ServerError> {
        let upstream = Arc::new(Upstream::from_config(&config.upstream)?);
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let sessions = SessionTracker::new();
        let sessions_root = Cancellation::new();

        let state = AppState {
            router: Arc::new(FrontRouter::from_config(config)),
            upstream,
            client,
            decoder: Arc::new(WireDecoder::from_config(&config.capture)),
            sessions: sessions.clone(),
            shutdown: sessions_root.clone(),
            relay: config.relay.clone(),
            terminal: config.terminal.clone(),
            upstream_connect_timeout: Duration::from_secs(config.upstream.connect_timeout_secs),
            max_body_bytes: config.limits.max_body_bytes,
        };

        let router = Self::build_router(config, state);
        Ok(Self {
            router,
            sessions,
            sessions_root,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(front_handler))
            .route("/", any(front_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Open-session tracker, shared with every handler.
    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    /// Serve `listener` until `shutdown` fires, then drain.
    ///
    /// Shutdown also cancels every open relay and bridge session.
    pub async fn run(self, listener: TcpListener, shutdown: Cancellation) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let sessions_root = self.sessions_root;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                sessions_root.cancel();
            })
            .await?;

        tracing::info!(
            open_sessions = self.sessions.active_count(),
            "HTTP server stopped"
        );
        Ok(())
    }
}

/// Front handler: classifies and dispatches every request.
async fn front_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let route = state.router.classify(request.headers(), request.uri().path());
    tracing::debug!(
        method = %request.method(),
        path = %request.uri().path(),
        route = ?route,
        "Dispatching request"
    );

    match route {
        Route::Relay => relay_upgrade(state, request).await,
        Route::Terminal => terminal_upgrade(state, request).await,
        Route::Asset(file) => serve_asset(file, request).await,
        Route::Forward => forward(&state, client, request).await,
    }
}

async fn serve_asset(file: std::path::PathBuf, request: Request<Body>) -> Response {
    match ServeFile::new(&file).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

/// Forward a plain request to the origin and pass back its response,
/// rewritten when a rule matches the path.
async fn forward(state: &AppState, client: SocketAddr, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let rule = state.router.rewrite_for(&path);

    let (mut parts, body) = request.into_parts();
    if let Err(e) = prepare_forward(&mut parts, &state.upstream, client, rule.is_some()) {
        tracing::error!(request_id = %request_id, path = %path, error = %e, "Cannot build upstream request");
        return bad_gateway(&method, start, "Invalid upstream request");
    }

    let response: Response<Incoming> = match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %request_id, path = %path, error = %e, "Upstream error");
            return bad_gateway(&method, start, "Upstream request failed");
        }
    };

    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    let response = Response::from_parts(parts, Body::new(body));

    let response = match rule {
        Some(rule) if is_rewritable(&method, &response) => {
            match transform_body(response, state.max_body_bytes, |body| rule.apply(body)).await {
                Ok(rewritten) => {
                    tracing::debug!(request_id = %request_id, path = %path, "Response body rewritten");
                    rewritten
                }
                Err(e) => {
                    tracing::error!(request_id = %request_id, path = %path, error = %e, "Failed to buffer response body");
                    return bad_gateway(&method, start, "Upstream body unreadable");
                }
            }
        }
        _ => response,
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

fn bad_gateway(method: &axum::http::Method, start: Instant, message: &'static str) -> Response {
    metrics::record_request(method.as_str(), StatusCode::BAD_GATEWAY.as_u16(), start);
    (StatusCode::BAD_GATEWAY, message).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;

    #[test]
    fn rejects_unusable_origin() {
        let config = RelayConfig {
            upstream: UpstreamConfig {
                origin: "ftp://game.local".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(HttpServer::new(&config), Err(ServerError::Upstream(_))));
    }

    #[tokio::test]
    async fn default_config_builds() {
        let server = HttpServer::new(&RelayConfig::default()).unwrap();
        assert_eq!(server.sessions().active_count(), 0);
    }
}
