//! Wire messages exchanged between swarm nodes.
//!
//! Frames are newline-delimited JSON objects tagged by `type`.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::net::backend::NetError;
use crate::rendezvous::ProcessRole;

/// Longest accepted frame, newline excluded.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Unique identifier for a node, generated once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generate a new random node ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node-{}", self.0.simple())
    }
}

/// A single frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// First frame on every connection.
    Hello {
        node_id: NodeId,
        listen_address: Option<SocketAddr>,
        role: ProcessRole,
    },
    /// Application data.
    Payload {
        from: NodeId,
        topic: String,
        body: serde_json::Value,
    },
    /// Sent on orderly close.
    Bye { node_id: NodeId },
}

impl Message {
    /// Build a payload frame.
    pub fn payload(from: NodeId, topic: impl Into<String>, body: serde_json::Value) -> Self {
        Message::Payload {
            from,
            topic: topic.into(),
            body,
        }
    }

    /// Encode as a single line, including the trailing newline.
    pub fn encode(&self) -> Result<Vec<u8>, NetError> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Decode one line (without the newline).
    pub fn decode(line: &str) -> Result<Self, NetError> {
        Ok(serde_json::from_str(line.trim_end())?)
    }
}

/// A message together with the connection it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub peer: SocketAddr,
    pub message: Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_is_one_line() {
        let msg = Message::payload(NodeId::new(), "round", serde_json::json!({"round": 1}));
        let bytes = msg.encode().unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);

        let line = std::str::from_utf8(&bytes).unwrap();
        assert_eq!(Message::decode(line).unwrap(), msg);
    }

    #[test]
    fn test_tagged_representation() {
        let id = NodeId::new();
        let line = serde_json::to_string(&Message::Bye { node_id: id }).unwrap();
        assert!(line.contains(r#""type":"bye""#));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(Message::decode("{not json"), Err(NetError::Codec(_))));
    }

    #[test]
    fn test_node_id_unique() {
        assert_ne!(NodeId::new(), NodeId::new());
        assert!(NodeId::new().to_string().starts_with("node-"));
    }
}
