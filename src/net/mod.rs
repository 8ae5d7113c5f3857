//! Network session subsystem.
//!
//! # Data Flow
//! ```text
//! Upgrade request accepted by the front end
//!     → connection.rs (session id, active-session tracking)
//!     → relay or terminal bridge runs its tasks
//!     → guard dropped, session counted as closed
//!
//! Session States:
//!     Connecting → Active → Closing → Closed
//! ```

pub mod connection;

pub use connection::{SessionGuard, SessionId, SessionKind, SessionTracker};
