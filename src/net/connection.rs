//! Per-peer connection handling.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Serialize writes to a peer
//! - Read length-capped frames from a peer and forward them inbound
//! - Drop the peer from the table when its stream ends or oversteps the cap

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use crate::net::backend::NetResult;
use crate::net::message::{Envelope, Message, MAX_FRAME_BYTES};
use crate::observability::metrics;

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Peer table shared by the backend and its reader tasks.
pub type PeerTable = Arc<DashMap<SocketAddr, PeerConnection>>;

/// Write side of a connected peer. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PeerConnection {
    id: ConnectionId,
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl PeerConnection {
    pub fn new(writer: OwnedWriteHalf) -> Self {
        Self {
            id: ConnectionId::new(),
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Write one frame.
    pub async fn write(&self, message: &Message) -> NetResult<()> {
        let bytes = message.encode()?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        metrics::record_message("sent");
        Ok(())
    }

    /// Close the write half.
    pub async fn shutdown(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

/// Read frames from `reader` until EOF, forwarding them to `inbound`.
///
/// A full `inbound` queue pauses reading, which pushes back on the peer.
/// The peer is removed from `peers` when the stream ends, says goodbye or
/// sends a frame longer than [`MAX_FRAME_BYTES`].
pub fn spawn_reader(
    addr: SocketAddr,
    id: ConnectionId,
    reader: OwnedReadHalf,
    inbound: mpsc::Sender<Envelope>,
    peers: PeerTable,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_FRAME_BYTES));
        loop {
            match lines.next().await {
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => match Message::decode(&line) {
                    Ok(message) => {
                        metrics::record_message("received");
                        match &message {
                            Message::Hello { node_id, role, .. } => {
                                tracing::info!(peer = %addr, connection_id = %id, node_id = %node_id, role = %role, "Peer said hello");
                            }
                            Message::Bye { node_id } => {
                                tracing::info!(peer = %addr, node_id = %node_id, "Peer said goodbye");
                            }
                            Message::Payload { .. } => {}
                        }
                        let bye = matches!(message, Message::Bye { .. });
                        if inbound.send(Envelope { peer: addr, message }).await.is_err() || bye {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(peer = %addr, error = %e, "Dropping undecodable frame");
                    }
                },
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    metrics::record_message("oversized");
                    tracing::warn!(peer = %addr, limit = MAX_FRAME_BYTES, "Frame too long, dropping peer");
                    break;
                }
                None => break,
                Some(Err(e)) => {
                    tracing::warn!(peer = %addr, error = %e, "Peer read failed");
                    break;
                }
            }
        }

        peers.remove(&addr);
        metrics::record_connected_peers(peers.len());
        tracing::debug!(peer = %addr, connection_id = %id, "Peer connection closed");
    })
}
