//! Reconciliation message types and their wire encoding.
//!
//! On the wire every message is a JSON envelope whose payload is itself a
//! JSON document carried as a string:
//!
//! ```text
//! { "type": "HASH_CHECK", "payload": "{\"root_hash\":\"…\",\"count\":3}" }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use hashsync_core::{Digest, Record};

use crate::error::{Result, SyncError};

/// Message discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    HashCheck,
    RequestSnapshot,
    SnapshotData,
}

impl MessageType {
    /// Wire name of this type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MessageType::HashCheck => "HASH_CHECK",
            MessageType::RequestSnapshot => "REQUEST_SNAPSHOT",
            MessageType::SnapshotData => "SNAPSHOT_DATA",
        }
    }

    /// Parse a wire name. Unknown names yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HASH_CHECK" => Some(MessageType::HashCheck),
            "REQUEST_SNAPSHOT" => Some(MessageType::RequestSnapshot),
            "SNAPSHOT_DATA" => Some(MessageType::SnapshotData),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outer wire envelope.
///
/// `kind` is kept as a raw string so that unrecognized types survive
/// decoding and can be logged rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

/// Payload of `HASH_CHECK`: a summary of one party's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub root_hash: Digest,
    pub count: usize,
}

impl SyncState {
    /// Summarize a record collection.
    pub fn of(records: &[Record]) -> Self {
        Self {
            root_hash: hashsync_core::root_digest(records),
            count: records.len(),
        }
    }
}

/// Payload of `SNAPSHOT_DATA`: one party's full record collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub items: Vec<Record>,
}

/// A decoded reconciliation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMessage {
    /// "Here is my digest."
    HashCheck(SyncState),
    /// "Send me your full state."
    RequestSnapshot,
    /// "Here is my full state."
    SnapshotData(SnapshotPayload),
}

impl SyncMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            SyncMessage::HashCheck(_) => MessageType::HashCheck,
            SyncMessage::RequestSnapshot => MessageType::RequestSnapshot,
            SyncMessage::SnapshotData(_) => MessageType::SnapshotData,
        }
    }

    /// Build the wire envelope.
    pub fn to_envelope(&self) -> Result<Envelope> {
        let payload = match self {
            SyncMessage::HashCheck(state) => serde_json::to_string(state)?,
            SyncMessage::RequestSnapshot => String::new(),
            SyncMessage::SnapshotData(snapshot) => serde_json::to_string(snapshot)?,
        };
        Ok(Envelope {
            kind: self.message_type().as_str().to_string(),
            payload: Some(payload),
        })
    }

    /// Read a message out of an envelope.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self> {
        let kind = MessageType::parse(&envelope.kind)
            .ok_or_else(|| SyncError::UnknownMessageType(envelope.kind.clone()))?;
        let payload = envelope.payload.as_deref().unwrap_or_default();

        match kind {
            MessageType::HashCheck => Ok(SyncMessage::HashCheck(serde_json::from_str(payload)?)),
            MessageType::RequestSnapshot => Ok(SyncMessage::RequestSnapshot),
            MessageType::SnapshotData => {
                Ok(SyncMessage::SnapshotData(serde_json::from_str(payload)?))
            }
        }
    }

    /// Encode to a single UTF-8 text frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_envelope()?)?)
    }

    /// Decode a UTF-8 text frame.
    pub fn decode(frame: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(frame)?;
        Self::from_envelope(&envelope)
    }
}
