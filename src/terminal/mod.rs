//! Local terminal bridge: exposes a raw TCP console over a WebSocket.

pub mod bridge;
pub mod peer;

pub use bridge::{terminal_upgrade, BridgeError, TerminalBridge};
pub use peer::{LocalTerminal, TerminalError};
