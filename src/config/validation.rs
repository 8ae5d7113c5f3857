//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and the upstream origin
//! - Validate value ranges (keepalive timeout < interval)
//! - Reject rewrite edits that can never apply
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{BodyEdit, RelayConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream origin '{0}' must be an http:// URL with a host")]
    InvalidOrigin(String),

    #[error("{field} path '{value}' must start with '/'")]
    InvalidPath { field: &'static str, value: String },

    #[error("keepalive timeout ({timeout}s) must be positive and below the interval ({interval}s)")]
    KeepaliveTiming { interval: u64, timeout: u64 },

    #[error("rewrite for '{path}': {reason}")]
    InvalidEdit { path: String, reason: &'static str },
}

/// Check a configuration, collecting every problem.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "metrics",
            value: config.observability.metrics_address.clone(),
        });
    }

    match Url::parse(&config.upstream.origin) {
        Ok(url) if url.scheme() == "http" && url.host_str().is_some() => {}
        _ => errors.push(ValidationError::InvalidOrigin(config.upstream.origin.clone())),
    }

    let keepalive = &config.relay.keepalive;
    if keepalive.enabled
        && (keepalive.timeout_secs == 0 || keepalive.timeout_secs >= keepalive.interval_secs)
    {
        errors.push(ValidationError::KeepaliveTiming {
            interval: keepalive.interval_secs,
            timeout: keepalive.timeout_secs,
        });
    }

    check_path(&mut errors, "terminal", &config.terminal.path);
    for asset in &config.assets {
        check_path(&mut errors, "asset", &asset.path);
    }

    for rule in &config.rewrites {
        check_path(&mut errors, "rewrite", &rule.path);
        for edit in &rule.edits {
            let reason = match edit {
                BodyEdit::Replace { find, .. } if find.is_empty() => Some("empty find pattern"),
                BodyEdit::Replace { count: Some(0), .. } => Some("replace count of zero"),
                BodyEdit::InjectBefore { marker, .. } if marker.is_empty() => Some("empty marker"),
                _ => None,
            };
            if let Some(reason) = reason {
                errors.push(ValidationError::InvalidEdit {
                    path: rule.path.clone(),
                    reason,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_path(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if !value.starts_with('/') {
        errors.push(ValidationError::InvalidPath {
            field,
            value: value.to_string(),
        });
    }
}
