//! Observational decoding of server-to-client relay traffic.

use crate::capture::envelope::{self, DecodeError, WireEnvelope};
use crate::capture::hexdump::hex_dump;
use crate::capture::store::ArtifactStore;
use crate::config::CaptureConfig;
use crate::net::SessionId;
use crate::observability::metrics;

/// Decodes server messages and records their side effects.
///
/// Never touches the message itself; callers forward the original bytes
/// whatever the outcome.
#[derive(Debug, Clone)]
pub struct WireDecoder {
    store: Option<ArtifactStore>,
    hex_dump: bool,
}

impl WireDecoder {
    pub fn new(store: Option<ArtifactStore>, hex_dump: bool) -> Self {
        Self { store, hex_dump }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        let store = config.enabled.then(|| ArtifactStore::from_config(config));
        Self::new(store, config.hex_dump)
    }

    /// Decode one payload and run the side effects of its kind.
    ///
    /// Artifact write failures are logged and do not count as decode errors.
    pub async fn observe(
        &self,
        session_id: SessionId,
        payload: &[u8],
    ) -> Result<WireEnvelope, DecodeError> {
        let envelope = match envelope::decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                metrics::record_decode_failure();
                return Err(e);
            }
        };

        match &envelope {
            WireEnvelope::Map { blob } => {
                tracing::debug!(session_id = %session_id, bytes = blob.len(), "Map snapshot received");
                if let Some(store) = &self.store {
                    match store.write_map(blob.as_bytes()).await {
                        Ok(path) => {
                            metrics::record_artifact("map");
                            tracing::debug!(session_id = %session_id, path = %path.display(), "Map snapshot saved");
                        }
                        Err(e) => {
                            tracing::warn!(session_id = %session_id, error = %e, "Failed to write map snapshot");
                        }
                    }
                }
            }
            WireEnvelope::TerminalData { challenge_id, bytes } => {
                tracing::info!(
                    session_id = %session_id,
                    challenge_id = %challenge_id,
                    bytes = bytes.len(),
                    "Terminal data received"
                );
                if let Some(store) = &self.store {
                    match store.write_challenge(challenge_id, bytes).await {
                        Ok(path) => {
                            metrics::record_artifact("challenge");
                            tracing::debug!(session_id = %session_id, path = %path.display(), "Challenge payload saved");
                        }
                        Err(e) => {
                            tracing::warn!(session_id = %session_id, error = %e, "Failed to write challenge payload");
                        }
                    }
                }
                if self.hex_dump {
                    tracing::info!(
                        session_id = %session_id,
                        challenge_id = %challenge_id,
                        "Terminal data\n{}",
                        hex_dump(bytes)
                    );
                }
            }
            WireEnvelope::TerminalEvent { challenge_id, event_type } => {
                tracing::debug!(
                    session_id = %session_id,
                    challenge_id = %challenge_id,
                    event_type = %event_type,
                    "Terminal event"
                );
            }
            WireEnvelope::Unknown => {}
        }

        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn terminal_data_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("map"), dir.path().join("chall"));
        let decoder = WireDecoder::new(Some(store.clone()), true);

        let envelope = decoder
            .observe(
                SessionId::new(),
                br#"{"type":"terminal","challengeID":"a:b","eventType":"data","data":"deadbeef"}"#,
            )
            .await
            .unwrap();
        assert_eq!(envelope.kind(), "terminal_data");

        let mut entries = std::fs::read_dir(store.challenge_dir()).unwrap();
        let entry = entries.next().unwrap().unwrap();
        assert!(entries.next().is_none());
        assert!(entry.file_name().to_str().unwrap().starts_with("a-b-"));
        assert_eq!(std::fs::read(entry.path()).unwrap(), [0xde, 0xad, 0xbe, 0xef]);
    }

    #[tokio::test]
    async fn write_failure_is_not_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        // Directories nested under a regular file cannot be created.
        let store = ArtifactStore::new(blocker.join("map"), blocker.join("chall"));
        let decoder = WireDecoder::new(Some(store), false);

        let envelope = decoder
            .observe(SessionId::new(), br#"{"type":"map","map":[1]}"#)
            .await
            .unwrap();
        assert_eq!(envelope, WireEnvelope::Map { blob: "[1]".into() });
    }

    #[tokio::test]
    async fn disabled_capture_writes_nothing() {
        let config = CaptureConfig {
            enabled: false,
            ..Default::default()
        };
        let decoder = WireDecoder::from_config(&config);
        assert!(decoder.store.is_none());
        assert!(decoder
            .observe(SessionId::new(), br#"{"type":"map","map":{}}"#)
            .await
            .is_ok());
    }
}
