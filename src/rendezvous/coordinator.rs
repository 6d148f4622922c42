//! Rendezvous coordinator.
//!
//! Publishes this node's role through the bound backend before any workload
//! code runs.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::SwarmConfig;
use crate::net::{BindError, Communication, NetError, NodeId};
use crate::rendezvous::ProcessRole;

/// Errors raised while joining the swarm.
#[derive(Debug, Error)]
pub enum RendezvousError {
    /// `init` already ran in this process.
    #[error("rendezvous already initialized as {current}")]
    AlreadyInitialized { current: ProcessRole },

    /// The registry had no backend bound.
    #[error("rendezvous needs a bound backend: {0}")]
    Backend(#[from] BindError),

    #[error("invalid initial peer '{0}'")]
    InvalidPeer(String),

    /// The backend could not reach or create the coordination point.
    #[error("rendezvous transport failure: {0}")]
    Transport(#[from] NetError),
}

/// What the rest of the process learns from a successful rendezvous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendezvousInfo {
    pub role: ProcessRole,
    pub node_id: NodeId,
    pub local_addr: Option<SocketAddr>,
    pub peers: usize,
}

/// Determines and publishes this process's role, once.
#[derive(Debug)]
pub struct Rendezvous {
    initial_peers: Vec<String>,
    role: Option<ProcessRole>,
}

impl Rendezvous {
    pub fn new(initial_peers: Vec<String>) -> Self {
        Self {
            initial_peers,
            role: None,
        }
    }

    pub fn from_config(config: &SwarmConfig) -> Self {
        Self::new(config.initial_peers.clone())
    }

    /// The role fixed by `init`, if it ran.
    pub fn role(&self) -> Option<ProcessRole> {
        self.role
    }

    /// Join the swarm with `role`.
    ///
    /// The role is fixed as soon as this is called; a later call fails with
    /// `AlreadyInitialized` whether or not the first one succeeded.
    pub async fn init(
        &mut self,
        comm: &Communication,
        role: ProcessRole,
    ) -> Result<RendezvousInfo, RendezvousError> {
        if let Some(current) = self.role {
            return Err(RendezvousError::AlreadyInitialized { current });
        }
        self.role = Some(role);

        let backend = comm.backend()?;
        let peers = self
            .initial_peers
            .iter()
            .map(|peer| {
                peer.parse::<SocketAddr>()
                    .map_err(|_| RendezvousError::InvalidPeer(peer.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            role = %role,
            backend = backend.name(),
            initial_peers = peers.len(),
            "Initializing rendezvous"
        );
        backend.connect(role, &peers).await?;

        let info = RendezvousInfo {
            role,
            node_id: backend.node_id(),
            local_addr: backend.local_addr(),
            peers: backend.peers().len(),
        };
        tracing::info!(
            role = %info.role,
            node_id = %info.node_id,
            address = ?info.local_addr,
            peers = info.peers,
            "Rendezvous ready"
        );
        Ok(info)
    }
}
