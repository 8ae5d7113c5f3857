//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → shared via Arc to the front end and every session
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AssetConfig, BodyEdit, CaptureConfig, Credentials, KeepaliveConfig, ListenerConfig,
    ObservabilityConfig, RelayConfig, RelaySettings, RewriteRule, TerminalConfig, TerminalMode,
    UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
