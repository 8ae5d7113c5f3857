//! On-disk artifact store.
//!
//! Two append-only directories: one file per map snapshot, one file per
//! captured challenge payload. Files are never rewritten.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::CaptureConfig;

/// Characters that may not appear in a filename component.
const FORBIDDEN: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Replace every forbidden character of a challenge ID with `-`.
pub fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| if FORBIDDEN.contains(&c) { '-' } else { c })
        .collect()
}

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

/// Writes captured artifacts into the configured directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    map_dir: PathBuf,
    challenge_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(map_dir: impl Into<PathBuf>, challenge_dir: impl Into<PathBuf>) -> Self {
        Self {
            map_dir: map_dir.into(),
            challenge_dir: challenge_dir.into(),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(&config.map_dir, &config.challenge_dir)
    }

    pub fn map_dir(&self) -> &Path {
        &self.map_dir
    }

    pub fn challenge_dir(&self) -> &Path {
        &self.challenge_dir
    }

    /// Path a map snapshot taken at `nanos` is stored under.
    pub fn map_path(&self, nanos: u128) -> PathBuf {
        self.map_dir.join(format!("{}.json", nanos))
    }

    /// Path a challenge payload taken at `nanos` is stored under.
    ///
    /// Always a direct child of the challenge directory.
    pub fn challenge_path(&self, challenge_id: &str, nanos: u128) -> PathBuf {
        self.challenge_dir
            .join(format!("{}-{}.json", sanitize_component(challenge_id), nanos))
    }

    /// Persist a map snapshot verbatim.
    pub async fn write_map(&self, blob: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.map_path(unix_nanos());
        write_new(&path, blob).await?;
        Ok(path)
    }

    /// Persist a decoded challenge payload.
    pub async fn write_challenge(&self, challenge_id: &str, data: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.challenge_path(challenge_id, unix_nanos());
        write_new(&path, data).await?;
        Ok(path)
    }
}

async fn write_new(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await
}
