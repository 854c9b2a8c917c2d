//! WebSocket frame codec.
//!
//! Every text frame, in both directions, is `{"event": "<NAME>", "data": <payload>}`.
//! `data` may be omitted for payload-less events.

use serde_json::Value;

use crate::domain::events::{ProtocolError, ServerEvent};

/// Event name reported when a frame's name could not be read.
pub const UNKNOWN_EVENT_NAME: &str = "UNKNOWN";

/// An inbound frame split into its name and raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub event: String,
    pub data: Value,
}

impl InboundFrame {
    /// Parses a text frame without interpreting the payload.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;

        let Value::Object(mut fields) = value else {
            return Err(ProtocolError::MalformedFrame(
                "frame must be a JSON object".to_string(),
            ));
        };

        let event = match fields.remove("event") {
            Some(Value::String(name)) if !name.trim().is_empty() => name,
            _ => {
                return Err(ProtocolError::MalformedFrame(
                    "frame has no event name".to_string(),
                ))
            }
        };

        Ok(Self {
            event,
            data: fields.remove("data").unwrap_or(Value::Null),
        })
    }
}

/// Renders an outbound event as a text frame.
pub fn encode_frame(event: &ServerEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}
