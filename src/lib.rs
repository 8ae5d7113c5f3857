//! Man-in-the-middle relay for a browser game.
//!
//! Sits between the game client and its server: forwards HTTP (rewriting
//! selected response bodies), relays the game WebSocket while capturing map
//! snapshots and challenge payloads, and bridges an auxiliary WebSocket to a
//! local TCP terminal.

pub mod capture;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod terminal;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::{Cancellation, Shutdown};
