//! WebSocket ↔ TCP terminal bridge.
//!
//! Client messages are written to the terminal peer one per line; lines read
//! from the peer come back to the client as text messages.

use std::future::Future;
use std::io;
use std::time::Duration;

use axum::{
    body::Body,
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
    io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader},
    time,
};

use crate::http::server::AppState;
use crate::lifecycle::Cancellation;
use crate::net::{SessionGuard, SessionKind};
use crate::observability::metrics;
use crate::terminal::peer::{LocalTerminal, TerminalError};

const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Longest run of bytes delivered as one message when no newline arrives.
const MAX_LINE: u64 = 64 * 1024;

const TO_TERMINAL: &str = "client->terminal";
const FROM_TERMINAL: &str = "terminal->client";

/// Errors that end a bridge session.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("read client: {0}")]
    ClientRead(#[source] axum::Error),

    #[error("write client: {0}")]
    ClientWrite(#[source] axum::Error),

    #[error(transparent)]
    Terminal(#[from] TerminalError),
}

/// Handle an upgrade request routed to the terminal endpoint.
pub async fn terminal_upgrade(state: AppState, request: Request<Body>) -> Response {
    let (mut parts, _body) = request.into_parts();

    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Invalid terminal upgrade request");
            return rejection.into_response();
        }
    };

    let terminal = match LocalTerminal::from_config(&state.terminal).await {
        Ok(terminal) => terminal,
        Err(e) => {
            tracing::error!(error = %e, "Terminal bridge unavailable");
            return (StatusCode::BAD_GATEWAY, "Terminal unavailable").into_response();
        }
    };

    let bridge = TerminalBridge::new(
        state.sessions.track(SessionKind::Terminal),
        terminal,
        state.shutdown.child(),
    );

    upgrade
        .on_failed_upgrade(|e| tracing::warn!(error = %e, "Client upgrade failed"))
        .on_upgrade(move |client| bridge.run(client))
}

/// One client ↔ terminal bridge.
pub struct TerminalBridge {
    guard: SessionGuard,
    terminal: LocalTerminal,
    cancel: Cancellation,
}

impl TerminalBridge {
    pub fn new(guard: SessionGuard, terminal: LocalTerminal, cancel: Cancellation) -> Self {
        Self {
            guard,
            terminal,
            cancel,
        }
    }

    pub async fn run(self, client: WebSocket) {
        let session_id = self.guard.id();
        tracing::info!(session_id = %session_id, "Terminal session active");

        let (mut client_tx, mut client_rx) = client.split();

        let inbound = self.supervise(TO_TERMINAL, async {
            while let Some(message) = client_rx.next().await {
                let mut line = match message.map_err(BridgeError::ClientRead)? {
                    Message::Text(text) => text.as_str().as_bytes().to_vec(),
                    Message::Binary(data) => data.to_vec(),
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => continue,
                };
                line.push(b'\n');

                match self.terminal.write(&line).await {
                    Ok(()) => metrics::record_message(TO_TERMINAL),
                    Err(TerminalError::NoPeer) => {
                        tracing::warn!(session_id = %session_id, "No terminal peer, message dropped")
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(())
        });

        let outbound = self.supervise(FROM_TERMINAL, self.pump_lines(&mut client_tx));

        tokio::join!(inbound, outbound);

        let _ = time::timeout(CLOSE_GRACE, client_tx.close()).await;
        tracing::info!(session_id = %session_id, "Terminal session closed");
    }

    /// Forward peer lines to the client, picking up each new connection as
    /// it appears. Only a client write failure ends this loop.
    ///
    /// A connection replaced by a newer one is abandoned even if it is still
    /// open.
    async fn pump_lines(
        &self,
        client_tx: &mut SplitSink<WebSocket, Message>,
    ) -> Result<(), BridgeError> {
        let session_id = self.guard.id();
        let mut buf = Vec::new();

        loop {
            let (generation, read_half) = self.terminal.next_reader().await;
            let mut reader = BufReader::new(read_half);

            loop {
                buf.clear();
                let read = tokio::select! {
                    read = read_line(&mut reader, &mut buf) => read,
                    _ = self.terminal.superseded(generation) => {
                        tracing::debug!(session_id = %session_id, generation, "Terminal connection replaced");
                        break;
                    }
                };
                match read {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(trim_line_end(&buf)).into_owned();
                        client_tx
                            .send(Message::Text(line.into()))
                            .await
                            .map_err(BridgeError::ClientWrite)?;
                        metrics::record_message(FROM_TERMINAL);
                    }
                    Err(e) => {
                        tracing::warn!(session_id = %session_id, error = %e, "Terminal read failed");
                        break;
                    }
                }
            }

            self.terminal.disconnect(generation).await;
        }
    }

    async fn supervise<F>(&self, direction: &'static str, task: F)
    where
        F: Future<Output = Result<(), BridgeError>>,
    {
        let session_id = self.guard.id();
        tokio::select! {
            result = task => match result {
                Ok(()) => tracing::debug!(session_id = %session_id, direction, "Peer closed"),
                Err(e) => tracing::warn!(
                    session_id = %session_id,
                    direction,
                    error = %e,
                    "Terminal task failed"
                ),
            },
            _ = self.cancel.cancelled() => {}
        }
        self.cancel.cancel();
    }
}

/// Read up to and including the next `\n`, or at most [`MAX_LINE`] bytes.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    reader.take(MAX_LINE).read_until(b'\n', buf).await
}

/// Strip one trailing `\n` and any `\r` before it.
fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
