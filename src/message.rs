//! Inbound/outbound message payloads.

use bytes::Bytes;

/// A WebSocket application message: UTF-8 text or opaque bytes.
///
/// Messages are immutable once produced. Fan-out hands each subscriber its
/// own clone; `Bytes` clones are reference-counted, so binary payloads are
/// not copied per subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    /// A text frame payload.
    Text(String),
    /// A binary frame payload.
    Binary(Bytes),
}

impl WsMessage {
    /// Build a text message.
    pub fn text(s: impl Into<String>) -> Self {
        WsMessage::Text(s.into())
    }

    /// Build a binary message.
    pub fn binary(b: impl Into<Bytes>) -> Self {
        WsMessage::Binary(b.into())
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            WsMessage::Text(s) => s.len(),
            WsMessage::Binary(b) => b.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the payload as text, if this is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }
}

impl From<String> for WsMessage {
    fn from(s: String) -> Self {
        WsMessage::Text(s)
    }
}

impl From<&str> for WsMessage {
    fn from(s: &str) -> Self {
        WsMessage::Text(s.to_string())
    }
}

impl From<Bytes> for WsMessage {
    fn from(b: Bytes) -> Self {
        WsMessage::Binary(b)
    }
}

impl From<Vec<u8>> for WsMessage {
    fn from(b: Vec<u8>) -> Self {
        WsMessage::Binary(Bytes::from(b))
    }
}
