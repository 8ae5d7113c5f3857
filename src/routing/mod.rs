//! Request routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (headers, path)
//!     → router.rs (upgrade? terminal path? asset? forward)
//!     → Route enum consumed by the HTTP front end
//!
//! Forwarded response for a rewritten path
//!     → rewrite.rs (ordered find/replace edits on the body)
//! ```
//!
//! # Design Decisions
//! - Exact path matching, no regex
//! - Rewrite rules are pure byte functions; a missing pattern is a no-op

pub mod rewrite;
pub mod router;

pub use router::{is_upgrade, FrontRouter, Route};
