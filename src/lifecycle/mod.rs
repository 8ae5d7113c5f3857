//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     root Cancellation → server stops accepting, drains
//!                       → every session child is cancelled
//!
//! Sessions (cancel.rs):
//!     first failing task → Cancellation::cancel → sibling tasks exit
//! ```
//!
//! # Design Decisions
//! - Cancellation is cooperative: tasks select on `cancelled()`
//! - A session signal is a child of the root, never the other way around

pub mod cancel;
pub mod shutdown;
pub mod signals;

pub use cancel::Cancellation;
pub use shutdown::Shutdown;
