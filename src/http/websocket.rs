//! WebSocket relay between the game client and the upstream server.
//!
//! # Responsibilities
//! - Dial the upstream WebSocket (with credentials) before accepting the client
//! - Pump messages in both directions concurrently
//! - Observe server messages through the wire decoder
//! - Check client liveness with periodic pings
//! - Tear the whole session down on the first failure anywhere
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket messages ────→ Relay ←──── WebSocket messages ────→ Server
//!                                         │
//!                                         └─ server messages → WireDecoder (observe only)
//! ```
//!
//! # Design Decisions
//! - Data frames only; control frames are answered per hop
//! - Forward first, observe second: decoding never delays or alters a message
//! - No half-duplex continuation: one closed direction closes both

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        FromRequestParts,
    },
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::{Mutex, Notify},
    time::{self, Instant, MissedTickBehavior},
};
use tokio_tungstenite::{
    tungstenite::{self, Message as UpstreamMessage},
    MaybeTlsStream, WebSocketStream,
};

use crate::capture::{DecodeError, WireDecoder};
use crate::config::{KeepaliveConfig, RelaySettings};
use crate::http::server::AppState;
use crate::http::upstream::Upstream;
use crate::lifecycle::Cancellation;
use crate::net::{SessionGuard, SessionKind};
use crate::observability::metrics;

/// Upper bound on the best-effort close handshake during teardown.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// WebSocket connection to the upstream server.
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

type ClientSink = SplitSink<WebSocket, Message>;

/// Errors that end a relay session.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("dial server: {0}")]
    Dial(#[source] tungstenite::Error),

    #[error("dial server: timed out after {0:?}")]
    DialTimeout(Duration),

    #[error("read client: {0}")]
    ClientRead(#[source] axum::Error),

    #[error("write client: {0}")]
    ClientWrite(#[source] axum::Error),

    #[error("read server: {0}")]
    ServerRead(#[source] tungstenite::Error),

    #[error("write server: {0}")]
    ServerWrite(#[source] tungstenite::Error),

    #[error("ping client: not acknowledged within {0:?}")]
    PingTimeout(Duration),

    #[error("decode server: {0}")]
    Decode(#[from] DecodeError),
}

/// The task a relay error or log line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
    Keepalive,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToServer => "client->server",
            Direction::ServerToClient => "server->client",
            Direction::Keepalive => "keepalive",
        }
    }
}

/// Client liveness check timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keepalive {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Keepalive {
    pub fn from_config(config: &KeepaliveConfig) -> Option<Self> {
        config.enabled.then(|| Self {
            interval: Duration::from_secs(config.interval_secs),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Call `ping` every `interval`; each ping must complete and be answered
    /// on `pong` within `timeout`.
    ///
    /// Only a pong that arrives while a ping is outstanding answers it.
    async fn run<F, Fut>(&self, mut ping: F, pong: &Notify) -> Result<(), RelayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), RelayError>>,
    {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let acknowledged = async {
                let answered = pong.notified();
                tokio::pin!(answered);
                answered.as_mut().enable();
                ping().await?;
                answered.await;
                Ok::<(), RelayError>(())
            };
            time::timeout(self.timeout, acknowledged)
                .await
                .map_err(|_| RelayError::PingTimeout(self.timeout))??;
        }
    }
}

/// Dial the upstream WebSocket at `path_and_query`.
pub async fn dial_upstream(
    upstream: &Upstream,
    path_and_query: &str,
    timeout: Duration,
) -> Result<UpstreamSocket, RelayError> {
    let request = upstream
        .websocket_request(path_and_query)
        .map_err(RelayError::Dial)?;
    let (socket, _) = time::timeout(timeout, tokio_tungstenite::connect_async(request))
        .await
        .map_err(|_| RelayError::DialTimeout(timeout))?
        .map_err(RelayError::Dial)?;
    Ok(socket)
}

/// Handle an upgrade request routed to the relay.
///
/// The upstream is dialed first; if that fails the client is answered with
/// `502` and never upgraded.
pub async fn relay_upgrade(state: AppState, request: Request<Body>) -> Response {
    let (mut parts, _body) = request.into_parts();
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            tracing::warn!(path = %path, error = %rejection, "Invalid relay upgrade request");
            return rejection.into_response();
        }
    };

    let server = match dial_upstream(&state.upstream, &path, state.upstream_connect_timeout).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Relay aborted before upgrade");
            return (StatusCode::BAD_GATEWAY, "Upstream WebSocket unavailable").into_response();
        }
    };

    let session = RelaySession::new(
        state.sessions.track(SessionKind::Relay),
        state.decoder.clone(),
        &state.relay,
        state.shutdown.child(),
    );

    upgrade
        .on_failed_upgrade(|e| tracing::warn!(error = %e, "Client upgrade failed"))
        .on_upgrade(move |client| session.run(client, server))
}

/// One client ↔ server relay.
pub struct RelaySession {
    guard: SessionGuard,
    decoder: Arc<WireDecoder>,
    keepalive: Option<Keepalive>,
    strict_decode: bool,
    cancel: Cancellation,
}

impl RelaySession {
    pub fn new(
        guard: SessionGuard,
        decoder: Arc<WireDecoder>,
        settings: &RelaySettings,
        cancel: Cancellation,
    ) -> Self {
        Self {
            guard,
            decoder,
            keepalive: Keepalive::from_config(&settings.keepalive),
            strict_decode: settings.strict_decode,
            cancel,
        }
    }

    /// Run until either peer fails or closes, or the session is cancelled.
    pub async fn run(self, client: WebSocket, server: UpstreamSocket) {
        let session_id = self.guard.id();
        tracing::info!(session_id = %session_id, "Relay session active");

        let (client_tx, mut client_rx) = client.split();
        let (mut server_tx, mut server_rx) = server.split();
        let client_tx = Mutex::new(client_tx);
        let pong = Notify::new();

        let upstream = self.supervise(Direction::ClientToServer, async {
            while let Some(message) = client_rx.next().await {
                let forward = match message.map_err(RelayError::ClientRead)? {
                    Message::Text(text) => UpstreamMessage::Text(text.to_string().into()),
                    Message::Binary(data) => UpstreamMessage::Binary(data),
                    Message::Pong(_) => {
                        pong.notify_waiters();
                        continue;
                    }
                    Message::Ping(_) => continue,
                    Message::Close(_) => break,
                };
                server_tx.send(forward).await.map_err(RelayError::ServerWrite)?;
                metrics::record_message(Direction::ClientToServer.as_str());
            }
            Ok(())
        });

        let downstream = self.supervise(Direction::ServerToClient, async {
            while let Some(message) = server_rx.next().await {
                match message.map_err(RelayError::ServerRead)? {
                    UpstreamMessage::Text(text) => {
                        send(&client_tx, Message::Text(text.to_string().into())).await?;
                        self.observe(text.as_str().as_bytes()).await?;
                    }
                    UpstreamMessage::Binary(data) => {
                        send(&client_tx, Message::Binary(data.clone())).await?;
                        self.observe(&data).await?;
                    }
                    UpstreamMessage::Close(_) => break,
                    UpstreamMessage::Ping(_) | UpstreamMessage::Pong(_) | UpstreamMessage::Frame(_) => {}
                }
            }
            Ok(())
        });

        let liveness = async {
            if let Some(keepalive) = &self.keepalive {
                let client_tx = &client_tx;
                self.supervise(
                    Direction::Keepalive,
                    keepalive.run(move || send_ping(client_tx), &pong),
                )
                .await;
            }
        };

        tokio::join!(upstream, downstream, liveness);

        let mut client_tx = client_tx.into_inner();
        let _ = time::timeout(CLOSE_GRACE, async {
            let _ = client_tx.close().await;
            let _ = server_tx.close().await;
        })
        .await;

        tracing::info!(session_id = %session_id, "Relay session closed");
    }

    /// Run one session task; whatever ends it cancels the whole session.
    async fn supervise<F>(&self, direction: Direction, task: F)
    where
        F: Future<Output = Result<(), RelayError>>,
    {
        let session_id = self.guard.id();
        tokio::select! {
            result = task => match result {
                Ok(()) => tracing::debug!(
                    session_id = %session_id,
                    direction = direction.as_str(),
                    "Peer closed"
                ),
                Err(e) => tracing::warn!(
                    session_id = %session_id,
                    direction = direction.as_str(),
                    error = %e,
                    "Relay task failed"
                ),
            },
            _ = self.cancel.cancelled() => tracing::trace!(
                session_id = %session_id,
                direction = direction.as_str(),
                "Relay task cancelled"
            ),
        }
        self.cancel.cancel();
    }

    async fn observe(&self, payload: &[u8]) -> Result<(), RelayError> {
        match self.decoder.observe(self.guard.id(), payload).await {
            Ok(_) => Ok(()),
            Err(e) if self.strict_decode => Err(e.into()),
            Err(e) => {
                tracing::warn!(session_id = %self.guard.id(), error = %e, "Failed to decode server message");
                Ok(())
            }
        }
    }
}

async fn send(client_tx: &Mutex<ClientSink>, message: Message) -> Result<(), RelayError> {
    client_tx
        .lock()
        .await
        .send(message)
        .await
        .map_err(RelayError::ClientWrite)?;
    metrics::record_message(Direction::ServerToClient.as_str());
    Ok(())
}

async fn send_ping(client_tx: &Mutex<ClientSink>) -> Result<(), RelayError> {
    client_tx
        .lock()
        .await
        .send(Message::Ping(Bytes::new()))
        .await
        .map_err(RelayError::ClientWrite)
}
