//! Response body rewrite rules.
//!
//! Each rule is a pure `Bytes → Bytes` function. A pattern that is not found
//! leaves the body unchanged.

use axum::body::Bytes;
use memchr::memmem;

use crate::config::{BodyEdit, RewriteRule};

/// Replace up to `limit` non-overlapping occurrences, left to right.
fn replace(data: &[u8], from: &[u8], to: &[u8], limit: Option<usize>) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut copied = 0;

    let hits = memmem::find_iter(data, from).take(limit.unwrap_or(usize::MAX));
    for at in hits {
        out.extend_from_slice(&data[copied..at]);
        out.extend_from_slice(to);
        copied = at + from.len();
    }
    out.extend_from_slice(&data[copied..]);
    out
}

fn inject_before(data: &[u8], marker: &[u8], content: &[u8]) -> Option<Vec<u8>> {
    if marker.is_empty() {
        return None;
    }
    let at = memmem::find(data, marker)?;
    let mut out = Vec::with_capacity(data.len() + content.len());
    out.extend_from_slice(&data[..at]);
    out.extend_from_slice(content);
    out.extend_from_slice(&data[at..]);
    Some(out)
}

impl BodyEdit {
    /// Apply this edit to a body.
    pub fn apply(&self, body: Bytes) -> Bytes {
        match self {
            BodyEdit::Replace { find: pattern, replace: with, count } => {
                if pattern.is_empty() || memmem::find(&body, pattern.as_bytes()).is_none() {
                    return body;
                }
                Bytes::from(replace(&body, pattern.as_bytes(), with.as_bytes(), *count))
            }
            BodyEdit::InjectBefore { marker, content } => {
                match inject_before(&body, marker.as_bytes(), content.as_bytes()) {
                    Some(out) => Bytes::from(out),
                    None => body,
                }
            }
        }
    }
}

impl RewriteRule {
    /// Apply every edit in order.
    pub fn apply(&self, body: Bytes) -> Bytes {
        self.edits.iter().fold(body, |body, edit| edit.apply(body))
    }
}
