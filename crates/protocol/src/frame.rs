use serde::{Deserialize, Serialize};

use crate::opcode;

/// A decoded gateway frame.
///
/// `payload` is kept as a raw JSON document; use
/// [`Frame::payload_as`] to read it into one of the typed payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "op")]
    pub opcode: u32,
    #[serde(rename = "d", default)]
    pub payload: serde_json::Value,
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

/// Why an inbound text frame could not be used.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// Not JSON, or JSON without a valid envelope.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),
    /// The envelope was fine but `d` did not have the expected shape.
    #[error("unexpected payload for op {op}: {source}")]
    Payload {
        op: u32,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode a text frame.  Callers drop the frame on error; it is never fatal.
pub fn decode(raw: &str) -> Result<Frame, DecodeError> {
    serde_json::from_str(raw).map_err(DecodeError::MalformedFrame)
}

/// Encode an outbound frame.  Outbound frames never carry `s` or `t`.
pub fn encode<P: Serialize>(op: u32, payload: &P) -> Result<String, serde_json::Error> {
    let frame = Frame {
        opcode: op,
        payload: serde_json::to_value(payload)?,
        sequence: None,
        event_type: None,
    };
    serde_json::to_string(&frame)
}

impl Frame {
    /// Deserialize `d` into `T`.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, DecodeError> {
        T::deserialize(&self.payload).map_err(|source| DecodeError::Payload {
            op: self.opcode,
            source,
        })
    }

    /// The dispatch event name, for op 0 frames.
    pub fn event(&self) -> Option<&str> {
        if self.opcode == opcode::DISPATCH {
            self.event_type.as_deref()
        } else {
            None
        }
    }

    /// The "resumable" flag of an Invalid Session frame.  Anything other
    /// than a literal `true` counts as not resumable.
    pub fn resumable(&self) -> bool {
        self.payload.as_bool().unwrap_or(false)
    }
}
