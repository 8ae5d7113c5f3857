//! Wire envelope decoding.
//!
//! Server messages are JSON objects tagged by a `type` field. Only the kinds
//! the relay cares about are modelled; anything else decodes to
//! [`WireEnvelope::Unknown`].

use serde::Deserialize;
use serde_json::value::RawValue;
use thiserror::Error;

/// Errors raised while decoding an envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not a JSON object or a field has the wrong shape.
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    /// A field required by the envelope kind is absent.
    #[error("envelope of type '{kind}' is missing field '{field}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    /// The `data` field of a terminal envelope is not valid hex.
    #[error("terminal data is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// A decoded server-to-client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEnvelope {
    /// Full map snapshot; `blob` is the raw JSON text of the `map` field.
    Map { blob: String },
    /// Terminal output captured for a challenge.
    TerminalData { challenge_id: String, bytes: Vec<u8> },
    /// Any other terminal event (open, close, ...).
    TerminalEvent {
        challenge_id: String,
        event_type: String,
    },
    /// Missing or unrecognized `type`.
    Unknown,
}

impl WireEnvelope {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WireEnvelope::Map { .. } => "map",
            WireEnvelope::TerminalData { .. } => "terminal_data",
            WireEnvelope::TerminalEvent { .. } => "terminal_event",
            WireEnvelope::Unknown => "unknown",
        }
    }
}

#[derive(Deserialize)]
struct Discriminant {
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct MapFields<'a> {
    #[serde(borrow)]
    map: Option<&'a RawValue>,
}

#[derive(Deserialize)]
struct TerminalFields {
    #[serde(rename = "challengeID")]
    challenge_id: Option<String>,
    #[serde(rename = "eventType")]
    event_type: Option<String>,
    data: Option<String>,
}

/// Decode one raw server message.
///
/// The discriminant is read first so that fields of unrecognized kinds are
/// never inspected.
pub fn decode(payload: &[u8]) -> Result<WireEnvelope, DecodeError> {
    let discriminant: Discriminant = serde_json::from_slice(payload)?;

    match discriminant.kind.as_deref() {
        Some("map") => {
            let fields: MapFields<'_> = serde_json::from_slice(payload)?;
            let map = fields.map.ok_or(DecodeError::MissingField {
                kind: "map",
                field: "map",
            })?;
            Ok(WireEnvelope::Map {
                blob: map.get().to_string(),
            })
        }
        Some("terminal") => {
            let fields: TerminalFields = serde_json::from_slice(payload)?;
            let challenge_id = fields.challenge_id.ok_or(DecodeError::MissingField {
                kind: "terminal",
                field: "challengeID",
            })?;
            let event_type = fields.event_type.ok_or(DecodeError::MissingField {
                kind: "terminal",
                field: "eventType",
            })?;

            if event_type != "data" {
                return Ok(WireEnvelope::TerminalEvent {
                    challenge_id,
                    event_type,
                });
            }

            let encoded = fields.data.ok_or(DecodeError::MissingField {
                kind: "terminal",
                field: "data",
            })?;
            Ok(WireEnvelope::TerminalData {
                challenge_id,
                bytes: hex::decode(encoded)?,
            })
        }
        _ => Ok(WireEnvelope::Unknown),
    }
}
