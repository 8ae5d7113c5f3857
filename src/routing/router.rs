//! Front-end request classification.
//!
//! # Routing order
//! 1. Upgrade requests → terminal bridge on the terminal path, relay otherwise
//! 2. Configured static asset paths → local file
//! 3. Everything else → forwarded to the upstream origin
//!
//! Paths match exactly and case-sensitively.

use std::collections::HashMap;
use std::path::PathBuf;

use axum::http::{header, HeaderMap};

use crate::config::{RelayConfig, RewriteRule};

/// Where a request is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Relay,
    Terminal,
    Asset(PathBuf),
    Forward,
}

/// Classifies requests and looks up rewrite rules.
#[derive(Debug, Default)]
pub struct FrontRouter {
    terminal_path: String,
    assets: HashMap<String, PathBuf>,
    rewrites: HashMap<String, RewriteRule>,
}

impl FrontRouter {
    /// Build the router from configuration.
    pub fn from_config(config: &RelayConfig) -> Self {
        let assets = config
            .assets
            .iter()
            .map(|asset| (asset.path.clone(), PathBuf::from(&asset.file)))
            .collect();

        // Later rules for the same path win.
        let rewrites = config
            .rewrites
            .iter()
            .map(|rule| (rule.path.clone(), rule.clone()))
            .collect();

        tracing::debug!(
            terminal_path = %config.terminal.path,
            assets = config.assets.len(),
            rewrites = config.rewrites.len(),
            "Front router built"
        );

        Self {
            terminal_path: config.terminal.path.clone(),
            assets,
            rewrites,
        }
    }

    /// Decide where a request goes.
    pub fn classify(&self, headers: &HeaderMap, path: &str) -> Route {
        if is_upgrade(headers) {
            return if path == self.terminal_path {
                Route::Terminal
            } else {
                Route::Relay
            };
        }

        match self.assets.get(path) {
            Some(file) => Route::Asset(file.clone()),
            None => Route::Forward,
        }
    }

    /// Rewrite rule for a forwarded request path, if any.
    pub fn rewrite_for(&self, path: &str) -> Option<&RewriteRule> {
        self.rewrites.get(path)
    }
}

/// Whether the request carries a protocol-upgrade header.
pub fn is_upgrade(headers: &HeaderMap) -> bool {
    headers.contains_key(header::UPGRADE)
}
