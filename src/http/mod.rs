//! HTTP and WebSocket front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, classify and dispatch)
//!         ├─ upgrade on the terminal path → terminal bridge
//!         ├─ other upgrade → websocket.rs (relay to upstream WS)
//!         ├─ static asset path → local file
//!         └─ otherwise → request.rs (point at upstream, strip hop-by-hop)
//!                      → upstream origin
//!                      → response.rs (rewrite body, fix Content-Length)
//!     → client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod upstream;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use response::transform_body;
pub use server::{AppState, HttpServer, ServerError};
pub use upstream::{Upstream, UpstreamError};
pub use websocket::{RelayError, RelaySession};
