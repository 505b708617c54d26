//! WebSocket message types.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchyard_core::{Body, ClientError, Result};
use tokio_tungstenite::tungstenite::protocol::Message as TungsteniteMessage;

/// Message type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Text message
    Text,
    /// Binary message
    Binary,
}

/// A data frame exchanged with the peer.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The message type
    pub message_type: MessageType,
    /// The message payload
    pub payload: Bytes,
}

impl Message {
    /// Create a new text message.
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            message_type: MessageType::Text,
            payload: Bytes::from(text.into()),
        }
    }

    /// Create a new binary message.
    pub fn binary<B: Into<Bytes>>(data: B) -> Self {
        Self {
            message_type: MessageType::Binary,
            payload: data.into(),
        }
    }

    /// Build the outgoing message for a request body.
    ///
    /// JSON bodies and UTF-8 byte bodies travel as text frames, anything
    /// else as a binary frame.
    pub fn from_body(body: &Body) -> Result<Self> {
        match body {
            Body::Json(value) => serde_json::to_string(value)
                .map(Self::text)
                .map_err(|e| ClientError::validation(format!("failed to encode JSON message: {e}"))),
            Body::Bytes(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => Ok(Self::text(text)),
                Err(_) => Ok(Self::binary(bytes.clone())),
            },
        }
    }

    /// Convert a data frame received from the peer.
    ///
    /// Control frames yield `None`.
    pub fn from_frame(frame: TungsteniteMessage) -> Option<Self> {
        match frame {
            TungsteniteMessage::Text(text) => Some(Self::text(text.as_str())),
            TungsteniteMessage::Binary(data) => Some(Self::binary(data)),
            _ => None,
        }
    }

    /// Parse a text payload as JSON, if it is JSON.
    pub fn json_value(&self) -> Option<Value> {
        if self.is_text() {
            serde_json::from_slice(&self.payload).ok()
        } else {
            None
        }
    }

    /// Get the message payload as a string.
    pub fn as_text(&self) -> Option<&str> {
        if self.is_text() {
            std::str::from_utf8(&self.payload).ok()
        } else {
            None
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Check if this is a text message.
    pub fn is_text(&self) -> bool {
        self.message_type == MessageType::Text
    }
}

impl From<Message> for TungsteniteMessage {
    fn from(message: Message) -> Self {
        match message.message_type {
            MessageType::Text => match String::from_utf8(message.payload.to_vec()) {
                Ok(text) => TungsteniteMessage::text(text),
                Err(_) => TungsteniteMessage::binary(message.payload),
            },
            MessageType::Binary => TungsteniteMessage::binary(message.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_body() {
        let message = Message::from_body(&Body::Json(json!({"op": "ping"}))).unwrap();
        assert!(message.is_text());
        assert_eq!(message.json_value(), Some(json!({"op": "ping"})));

        let message = Message::from_body(&Body::Bytes(Bytes::from_static(&[0xff, 0x00]))).unwrap();
        assert_eq!(message.message_type, MessageType::Binary);
        assert!(message.as_text().is_none());
    }

    #[test]
    fn test_control_frames_skipped() {
        assert!(Message::from_frame(TungsteniteMessage::Ping(Bytes::new())).is_none());
        let message = Message::from_frame(TungsteniteMessage::text("hi".to_string())).unwrap();
        assert_eq!(message.as_text(), Some("hi"));
    }
}
