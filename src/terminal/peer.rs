//! The local terminal peer: one TCP connection slot shared by the bridge's
//! reader and writer.
//!
//! At most one connection is active at a time. Readers park until a
//! connection exists; the writer establishes one on demand (connect mode) or
//! an acceptor installs each incoming peer (listen mode).

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::{
    io::AsyncWriteExt,
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    sync::{watch, Mutex, Notify},
    task::JoinHandle,
    time,
};

use crate::config::{TerminalConfig, TerminalMode};

/// Errors raised by the terminal peer.
#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("connect terminal {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connect terminal {0}: timed out")]
    ConnectTimeout(String),

    #[error("listen terminal {address}: {source}")]
    Listen {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no terminal peer connected")]
    NoPeer,

    #[error("write terminal: {0}")]
    Write(#[source] std::io::Error),
}

#[derive(Default)]
struct Slot {
    /// Bumped every time a connection is installed.
    generation: u64,
    writer: Option<OwnedWriteHalf>,
    /// Read half waiting to be picked up by the reader.
    reader: Option<OwnedReadHalf>,
}

impl Slot {
    fn install(&mut self, stream: TcpStream) -> u64 {
        let (reader, writer) = stream.into_split();
        self.generation += 1;
        self.reader = Some(reader);
        self.writer = Some(writer);
        self.generation
    }
}

struct Shared {
    slot: Mutex<Slot>,
    connected: Notify,
    /// Generation of the most recently installed connection.
    current: watch::Sender<u64>,
}

impl Shared {
    async fn install(&self, stream: TcpStream) -> u64 {
        let generation = self.slot.lock().await.install(stream);
        self.announce(generation);
        generation
    }

    fn announce(&self, generation: u64) {
        self.current.send_replace(generation);
        self.connected.notify_one();
    }
}

enum Acquire {
    Dial { address: String, timeout: Duration },
    Accept { acceptor: JoinHandle<()> },
}

/// A lazily acquired TCP peer.
pub struct LocalTerminal {
    shared: Arc<Shared>,
    acquire: Acquire,
}

impl LocalTerminal {
    fn with_acquire(shared: Arc<Shared>, acquire: Acquire) -> Self {
        Self { shared, acquire }
    }

    fn new_shared() -> Arc<Shared> {
        Arc::new(Shared {
            slot: Mutex::new(Slot::default()),
            connected: Notify::new(),
            current: watch::channel(0).0,
        })
    }

    /// Peer that dials `address` on the first write and after every loss.
    pub fn connect_on_demand(address: impl Into<String>, timeout: Duration) -> Self {
        Self::with_acquire(
            Self::new_shared(),
            Acquire::Dial {
                address: address.into(),
                timeout,
            },
        )
    }

    /// Peer that listens on `address`; each accepted connection replaces the
    /// current one.
    pub async fn listen(address: &str) -> Result<Self, TerminalError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| TerminalError::Listen {
                address: address.to_string(),
                source,
            })?;
        tracing::info!(address = %address, "Terminal listener bound");

        let shared = Self::new_shared();
        let accepting = Arc::clone(&shared);
        let acceptor = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let generation = accepting.install(stream).await;
                        tracing::info!(peer = %peer, generation, "Terminal peer accepted");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Terminal accept failed");
                        break;
                    }
                }
            }
        });

        Ok(Self::with_acquire(shared, Acquire::Accept { acceptor }))
    }

    /// Build the peer described by the bridge configuration.
    pub async fn from_config(config: &TerminalConfig) -> Result<Self, TerminalError> {
        match config.mode {
            TerminalMode::Connect => Ok(Self::connect_on_demand(
                config.address.clone(),
                Duration::from_secs(config.connect_timeout_secs),
            )),
            TerminalMode::Listen => Self::listen(&config.address).await,
        }
    }

    /// Write `data` to the current connection, establishing one first in
    /// connect mode.
    ///
    /// A failed write clears the slot so the next write starts afresh.
    pub async fn write(&self, data: &[u8]) -> Result<(), TerminalError> {
        let mut slot = self.shared.slot.lock().await;

        if slot.writer.is_none() {
            match &self.acquire {
                Acquire::Dial { address, timeout } => {
                    let stream = time::timeout(*timeout, TcpStream::connect(address.as_str()))
                        .await
                        .map_err(|_| TerminalError::ConnectTimeout(address.clone()))?
                        .map_err(|source| TerminalError::Connect {
                            address: address.clone(),
                            source,
                        })?;
                    let generation = slot.install(stream);
                    self.shared.announce(generation);
                    tracing::info!(address = %address, generation, "Terminal connected");
                }
                Acquire::Accept { .. } => return Err(TerminalError::NoPeer),
            }
        }

        let Some(writer) = slot.writer.as_mut() else {
            return Err(TerminalError::NoPeer);
        };
        if let Err(e) = writer.write_all(data).await {
            slot.writer = None;
            slot.reader = None;
            return Err(TerminalError::Write(e));
        }
        Ok(())
    }

    /// Wait until a connection exists and take its read half.
    ///
    /// Returns the connection generation to hand back to [`disconnect`].
    ///
    /// [`disconnect`]: LocalTerminal::disconnect
    pub async fn next_reader(&self) -> (u64, OwnedReadHalf) {
        loop {
            {
                let mut slot = self.shared.slot.lock().await;
                if let Some(reader) = slot.reader.take() {
                    return (slot.generation, reader);
                }
            }
            self.shared.connected.notified().await;
        }
    }

    /// Resolve once a connection newer than `generation` has been installed.
    ///
    /// The replaced connection's write half is already gone at that point,
    /// so its reader should be abandoned in favour of [`next_reader`].
    ///
    /// [`next_reader`]: LocalTerminal::next_reader
    pub async fn superseded(&self, generation: u64) {
        let mut rx = self.shared.current.subscribe();
        // The sender lives in `self.shared`, so this only returns on change.
        let _ = rx.wait_for(|current| *current != generation).await;
    }

    /// Drop connection `generation` if it is still the current one.
    pub async fn disconnect(&self, generation: u64) {
        let mut slot = self.shared.slot.lock().await;
        if slot.generation == generation {
            slot.writer = None;
            slot.reader = None;
            tracing::debug!(generation, "Terminal connection dropped");
        }
    }

    /// Whether a connection is currently installed.
    pub async fn is_connected(&self) -> bool {
        self.shared.slot.lock().await.writer.is_some()
    }
}

impl Drop for LocalTerminal {
    fn drop(&mut self) {
        if let Acquire::Accept { acceptor } = &self.acquire {
            acceptor.abort();
        }
    }
}
