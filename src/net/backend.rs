//! The capability contract every transport implements.

use std::net::SocketAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::message::{Envelope, Message, NodeId};
use crate::rendezvous::ProcessRole;

/// Errors raised by transports.
#[derive(Debug, Error)]
pub enum NetError {
    /// Failed to bind the listen address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// None of the initial peers answered.
    #[error("no initial peer reachable ({attempted} attempted)")]
    Unreachable { attempted: usize },

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("unknown peer {0}")]
    UnknownPeer(SocketAddr),

    /// `connect` was called on an already connected backend.
    #[error("backend already connected")]
    AlreadyConnected,

    #[error("backend not connected")]
    NotConnected,

    #[error("backend closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Inbound frames queued per backend before readers wait on the workload.
pub const INBOUND_CAPACITY: usize = 1024;

/// Result type for transport operations.
pub type NetResult<T> = Result<T, NetError>;

/// Which transport implementation to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Newline-delimited JSON over TCP.
    Tcp,
    /// In-process backend for single-node runs.
    Loopback,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Tcp => write!(f, "tcp"),
            BackendKind::Loopback => write!(f, "loopback"),
        }
    }
}

/// A transport usable by the rendezvous coordinator and the workload.
#[async_trait]
pub trait CommunicationBackend: Send + Sync + std::fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Identity this backend announces to peers.
    fn node_id(&self) -> NodeId;

    /// Address peers can reach this node on, once connected.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Join the swarm. An initiator seeds the coordination point; a joiner
    /// must reach at least one of `peers`.
    async fn connect(&self, role: ProcessRole, peers: &[SocketAddr]) -> NetResult<()>;

    /// Send to a single connected peer.
    async fn send(&self, peer: SocketAddr, message: Message) -> NetResult<()>;

    /// Send to every connected peer. Returns how many received it.
    async fn broadcast(&self, message: Message) -> NetResult<usize>;

    /// Wait for the next inbound message. `None` once closed.
    async fn recv(&self) -> Option<Envelope>;

    /// Take an inbound message if one is already queued.
    fn try_recv(&self) -> Option<Envelope>;

    /// Currently connected peers.
    fn peers(&self) -> Vec<SocketAddr>;

    /// Say goodbye to peers and stop background tasks.
    async fn close(&self) -> NetResult<()>;
}
