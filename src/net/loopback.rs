//! In-process transport.
//!
//! Every frame sent or broadcast is recorded and echoed back to the node's
//! own inbound queue, so a single node can run a workload without a network.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::net::backend::{CommunicationBackend, NetError, NetResult, INBOUND_CAPACITY};
use crate::net::message::{Envelope, Message, NodeId};
use crate::observability::metrics;
use crate::rendezvous::ProcessRole;

/// Address the loopback backend reports for itself.
pub const LOOPBACK_ADDR: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0));

#[derive(Debug)]
pub struct LoopbackBackend {
    node_id: NodeId,
    role: OnceLock<ProcessRole>,
    sent: Mutex<Vec<Message>>,
    inbound_tx: mpsc::Sender<Envelope>,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<Envelope>>,
    closed: AtomicBool,
}

impl LoopbackBackend {
    pub fn new(node_id: NodeId) -> Self {
        Self::with_capacity(node_id, INBOUND_CAPACITY)
    }

    /// Backend whose echo queue holds at most `capacity` frames. Echoes that
    /// do not fit are dropped.
    pub fn with_capacity(node_id: NodeId, capacity: usize) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        Self {
            node_id,
            role: OnceLock::new(),
            sent: Mutex::new(Vec::new()),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            closed: AtomicBool::new(false),
        }
    }

    /// Role passed to `connect`, if it was called.
    pub fn role(&self) -> Option<ProcessRole> {
        self.role.get().copied()
    }

    /// Every frame sent so far, in order.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn deliver(&self, message: Message) -> NetResult<()> {
        if self.is_closed() {
            return Err(NetError::Closed);
        }
        if self.role.get().is_none() {
            return Err(NetError::NotConnected);
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        let envelope = Envelope {
            peer: LOOPBACK_ADDR,
            message,
        };
        match self.inbound_tx.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                metrics::record_message("dropped");
                tracing::warn!(node_id = %self.node_id, "Loopback queue full, dropping echo");
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(NetError::Closed),
        }
    }
}

#[async_trait]
impl CommunicationBackend for LoopbackBackend {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.role.get().map(|_| LOOPBACK_ADDR)
    }

    async fn connect(&self, role: ProcessRole, peers: &[SocketAddr]) -> NetResult<()> {
        if self.is_closed() {
            return Err(NetError::Closed);
        }
        self.role.set(role).map_err(|_| NetError::AlreadyConnected)?;
        if !peers.is_empty() {
            tracing::debug!(ignored = peers.len(), "Loopback backend ignores initial peers");
        }
        Ok(())
    }

    async fn send(&self, peer: SocketAddr, message: Message) -> NetResult<()> {
        if peer != LOOPBACK_ADDR {
            return Err(NetError::UnknownPeer(peer));
        }
        self.deliver(message)
    }

    async fn broadcast(&self, message: Message) -> NetResult<usize> {
        self.deliver(message)?;
        Ok(1)
    }

    async fn recv(&self) -> Option<Envelope> {
        if self.is_closed() {
            return None;
        }
        self.inbound_rx.lock().await.recv().await
    }

    fn try_recv(&self) -> Option<Envelope> {
        self.inbound_rx.try_lock().ok()?.try_recv().ok()
    }

    fn peers(&self) -> Vec<SocketAddr> {
        match self.role.get() {
            Some(_) => vec![LOOPBACK_ADDR],
            None => Vec::new(),
        }
    }

    async fn close(&self) -> NetResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_echoes() {
        let backend = LoopbackBackend::new(NodeId::new());
        backend.connect(ProcessRole::Initiator, &[]).await.unwrap();

        let msg = Message::payload(backend.node_id(), "round", serde_json::json!(1));
        assert_eq!(backend.broadcast(msg.clone()).await.unwrap(), 1);
        assert_eq!(backend.sent(), vec![msg.clone()]);
        assert_eq!(backend.try_recv().map(|e| e.message), Some(msg));
        assert!(backend.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_full_queue_drops_echoes() {
        let backend = LoopbackBackend::with_capacity(NodeId::new(), 2);
        backend.connect(ProcessRole::Initiator, &[]).await.unwrap();

        for round in 0..3 {
            let msg = Message::payload(backend.node_id(), "round", serde_json::json!(round));
            assert_eq!(backend.broadcast(msg).await.unwrap(), 1);
        }
        assert_eq!(backend.sent().len(), 3);
        assert!(backend.try_recv().is_some());
        assert!(backend.try_recv().is_some());
        assert!(backend.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_requires_connect() {
        let backend = LoopbackBackend::new(NodeId::new());
        let msg = Message::Bye { node_id: backend.node_id() };
        assert!(matches!(backend.broadcast(msg).await, Err(NetError::NotConnected)));
        assert!(backend.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_second_connect_rejected() {
        let backend = LoopbackBackend::new(NodeId::new());
        backend.connect(ProcessRole::Joiner, &[]).await.unwrap();
        assert!(matches!(
            backend.connect(ProcessRole::Initiator, &[]).await,
            Err(NetError::AlreadyConnected)
        ));
        assert_eq!(backend.role(), Some(ProcessRole::Joiner));
    }

    #[tokio::test]
    async fn test_closed_backend() {
        let backend = LoopbackBackend::new(NodeId::new());
        backend.connect(ProcessRole::Joiner, &[]).await.unwrap();
        backend.close().await.unwrap();
        assert!(backend.recv().await.is_none());
        let msg = Message::Bye { node_id: backend.node_id() };
        assert!(matches!(backend.broadcast(msg).await, Err(NetError::Closed)));
    }
}
