//! Wire capture subsystem.
//!
//! # Data Flow
//! ```text
//! server → client message (already forwarded)
//!     → envelope.rs (tagged JSON → WireEnvelope)
//!     → decoder.rs (dispatch by kind)
//!         map            → store.rs (map snapshot file)
//!         terminal/data  → store.rs (challenge file) + hexdump.rs (log)
//!         anything else  → ignored
//! ```
//!
//! # Design Decisions
//! - Decoding is observational: it never alters or blocks the relayed bytes
//! - Decode and artifact failures are logged, never fatal by default
//! - Challenge IDs are sanitized before becoming filename components

pub mod decoder;
pub mod envelope;
pub mod hexdump;
pub mod store;

pub use decoder::WireDecoder;
pub use envelope::{decode, DecodeError, WireEnvelope};
pub use hexdump::hex_dump;
pub use store::{sanitize_component, ArtifactStore};
