//! Shared utilities for integration testing.
//!
//! Mock origins (plain HTTP, WebSocket, TCP terminal) and a helper that
//! starts the relay on an ephemeral port in front of them.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{
    handshake::server::{ErrorResponse, Request, Response},
    Message,
};

use mitm_relay::config::RelayConfig;
use mitm_relay::{Cancellation, HttpServer};

/// Request head as seen by a mock origin.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    /// Header names lowercased.
    pub headers: Vec<(String, String)>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Canned response from a mock origin.
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl MockResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// Start a plain HTTP origin answering every request with `respond`.
/// Returns its address and the log of request heads it received.
pub async fn start_http_origin<F>(respond: F) -> (SocketAddr, Arc<Mutex<Vec<SeenRequest>>>)
where
    F: Fn(&SeenRequest) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let log = Arc::clone(&log);
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let (read, mut write) = socket.into_split();
                let Some(request) = read_head(BufReader::new(read)).await else {
                    return;
                };
                let response = respond(&request);
                log.lock().unwrap().push(request);

                let mut head = format!(
                    "HTTP/1.1 {} Mock\r\nContent-Length: {}\r\nConnection: close\r\n",
                    response.status,
                    response.body.len()
                );
                for (name, value) in &response.headers {
                    head.push_str(&format!("{}: {}\r\n", name, value));
                }
                head.push_str("\r\n");

                let _ = write.write_all(head.as_bytes()).await;
                let _ = write.write_all(response.body.as_bytes()).await;
                let _ = write.shutdown().await;
            });
        }
    });

    (addr, seen)
}

async fn read_head<R>(mut reader: BufReader<R>) -> Option<SeenRequest>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    reader.read_line(&mut line).await.ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        line.clear();
        reader.read_line(&mut line).await.ok()?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim().to_string();
            if name == "content-length" {
                content_length = value.parse().unwrap_or(0);
            }
            headers.push((name, value));
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await.ok()?;

    Some(SeenRequest {
        method,
        path,
        headers,
    })
}

/// Handle on the single connection accepted by a mock WebSocket origin.
pub struct WsOrigin {
    pub addr: SocketAddr,
    /// Messages to send to the relay.
    pub outgoing: mpsc::UnboundedSender<Message>,
    /// Data messages received from the relay; closes when the connection ends.
    pub incoming: mpsc::UnboundedReceiver<Message>,
    /// `Authorization` header of the handshake, once accepted.
    pub authorization: Arc<Mutex<Option<String>>>,
    /// Path and query of the handshake, once accepted.
    pub path: Arc<Mutex<Option<String>>>,
}

/// Start a WebSocket origin that accepts one connection.
pub async fn start_ws_origin() -> WsOrigin {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (outgoing, mut to_relay) = mpsc::unbounded_channel::<Message>();
    let (from_relay, incoming) = mpsc::unbounded_channel();
    let authorization = Arc::new(Mutex::new(None));
    let path = Arc::new(Mutex::new(None));

    let seen_auth = Arc::clone(&authorization);
    let seen_path = Arc::clone(&path);
    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            *seen_auth.lock().unwrap() = request
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            *seen_path.lock().unwrap() = request.uri().path_and_query().map(|pq| pq.to_string());
            Ok(response)
        };
        let Ok(socket) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
            return;
        };
        let (mut tx, mut rx) = socket.split();

        loop {
            tokio::select! {
                message = rx.next() => match message {
                    Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => {
                        if from_relay.send(message).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                message = to_relay.recv() => match message {
                    Some(message) => {
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        let _ = tx.close().await;
                        break;
                    }
                },
            }
        }
    });

    WsOrigin {
        addr,
        outgoing,
        incoming,
        authorization,
        path,
    }
}

/// Mock TCP terminal: answers each line `l` with `echo:l\n` and counts
/// accepted connections.
pub async fn start_echo_terminal() -> (SocketAddr, Arc<Mutex<Vec<String>>>, Arc<Mutex<usize>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let lines = Arc::new(Mutex::new(Vec::new()));
    let accepted = Arc::new(Mutex::new(0usize));
    let seen = Arc::clone(&lines);
    let count = Arc::clone(&accepted);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            *count.lock().unwrap() += 1;
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                let (read, mut write) = stream.into_split();
                let mut reader = BufReader::new(read).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    seen.lock().unwrap().push(line.clone());
                    if write.write_all(format!("echo:{}\n", line).as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    (addr, lines, accepted)
}

/// Configuration pointing at `origin`, with capture and client keepalive pings
/// disabled.
pub fn relay_config(origin: SocketAddr) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.origin = format!("http://{}", origin);
    config.upstream.connect_timeout_secs = 2;
    config.capture.enabled = false;
    config.capture.hex_dump = false;
    config.relay.keepalive.enabled = false;
    config
}

/// A relay started on an ephemeral port.
pub struct RunningRelay {
    pub addr: SocketAddr,
    pub shutdown: Cancellation,
    pub handle: JoinHandle<()>,
}

impl RunningRelay {
    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

/// Start the relay with `config`.
pub async fn start_relay(config: RelayConfig) -> RunningRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(&config).unwrap();
    let shutdown = Cancellation::new();
    let stop = shutdown.clone();

    let handle = tokio::spawn(async move {
        server.run(listener, stop).await.unwrap();
    });

    RunningRelay {
        addr,
        shutdown,
        handle,
    }
}

/// An address with nothing listening on it.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Poll `check` every 25ms until it returns `Some`, failing after `within`.
pub async fn eventually<T, F>(within: Duration, mut check: F) -> T
where
    F: FnMut() -> Option<T>,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if let Some(value) = check() {
            return value;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {:?}",
            within
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Connect a raw TCP peer, retrying briefly while the listener comes up.
pub async fn connect_tcp(addr: SocketAddr) -> TcpStream {
    eventually_async(Duration::from_secs(2), || TcpStream::connect(addr)).await
}

async fn eventually_async<T, E, F, Fut>(within: Duration, mut attempt: F) -> T
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if let Ok(value) = attempt().await {
            return value;
        }
        assert!(tokio::time::Instant::now() < deadline, "attempt kept failing");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
