//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! SwarmConfig.backend
//!     → build_backend (tcp | loopback)
//!     → registry.rs (bound once into Communication)
//!     → rendezvous (connect with role + initial peers)
//!     → workload (send / broadcast / recv)
//!
//! TCP peers:
//!     listener.rs (accept + dial)
//!     → connection.rs (framed reader task, serialized writer)
//!     → message.rs (newline-delimited JSON)
//! ```
//!
//! # Design Decisions
//! - Transports sit behind the `CommunicationBackend` trait
//! - The registry is an owned value, not a global
//! - Dials are bounded by the startup timeout; nothing retries
//! - Frames are length-capped and inbound queues are bounded

pub mod backend;
pub mod connection;
pub mod listener;
pub mod loopback;
pub mod message;
pub mod registry;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

pub use backend::{BackendKind, CommunicationBackend, NetError, NetResult, INBOUND_CAPACITY};
pub use listener::TcpBackend;
pub use loopback::LoopbackBackend;
pub use message::{Envelope, Message, NodeId, MAX_FRAME_BYTES};
pub use registry::{BindError, Communication};

use crate::config::SwarmConfig;

/// Instantiate the transport selected by `config.backend`.
pub fn build_backend(
    config: &SwarmConfig,
    node_id: NodeId,
) -> NetResult<Arc<dyn CommunicationBackend>> {
    match config.backend {
        BackendKind::Tcp => {
            let listen_address: SocketAddr = config
                .listen_address
                .parse()
                .map_err(|_| NetError::InvalidAddress(config.listen_address.clone()))?;
            let dial_timeout = Duration::from_secs(config.startup_timeout_secs);
            Ok(Arc::new(TcpBackend::new(node_id, listen_address, dial_timeout)))
        }
        BackendKind::Loopback => Ok(Arc::new(LoopbackBackend::new(node_id))),
    }
}
