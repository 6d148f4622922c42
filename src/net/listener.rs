//! TCP transport.
//!
//! # Responsibilities
//! - Bind the node's listen address and accept peers in the background
//! - Dial initial peers with a bounded timeout
//! - Keep the peer table and fan out broadcasts
//! - Forward inbound frames to a single queue

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::net::backend::{CommunicationBackend, NetError, NetResult, INBOUND_CAPACITY};
use crate::net::connection::{spawn_reader, PeerConnection, PeerTable};
use crate::net::message::{Envelope, Message, NodeId};
use crate::observability::metrics;
use crate::rendezvous::ProcessRole;

/// Newline-delimited JSON over TCP.
#[derive(Debug)]
pub struct TcpBackend {
    node_id: NodeId,
    listen_address: SocketAddr,
    dial_timeout: Duration,
    local_addr: OnceLock<SocketAddr>,
    role: OnceLock<ProcessRole>,
    peers: PeerTable,
    inbound_tx: mpsc::Sender<Envelope>,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<Envelope>>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    closed: AtomicBool,
}

impl TcpBackend {
    /// Create an unconnected backend. Nothing is bound until `connect`.
    pub fn new(node_id: NodeId, listen_address: SocketAddr, dial_timeout: Duration) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        Self {
            node_id,
            listen_address,
            dial_timeout,
            local_addr: OnceLock::new(),
            role: OnceLock::new(),
            peers: Arc::new(DashMap::new()),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            tasks: Arc::new(Mutex::new(Vec::new())),
            closed: AtomicBool::new(false),
        }
    }

    fn hello(&self) -> Message {
        Message::Hello {
            node_id: self.node_id,
            listen_address: self.local_addr.get().copied(),
            role: self.role.get().copied().unwrap_or(ProcessRole::Joiner),
        }
    }

    fn track_task(&self, handle: JoinHandle<()>) {
        track(&self.tasks, handle);
    }

    /// Register a stream in the peer table and start reading from it.
    fn register(&self, stream: TcpStream, addr: SocketAddr) -> PeerConnection {
        let (reader, writer) = stream.into_split();
        let connection = PeerConnection::new(writer);
        self.peers.insert(addr, connection.clone());
        metrics::record_connected_peers(self.peers.len());

        let handle = spawn_reader(
            addr,
            connection.id(),
            reader,
            self.inbound_tx.clone(),
            self.peers.clone(),
        );
        self.track_task(handle);
        connection
    }

    async fn dial(&self, addr: SocketAddr) -> NetResult<()> {
        let stream = match timeout(self.dial_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(NetError::Io(e)),
            Err(_) => {
                return Err(NetError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("dial timed out after {:?}", self.dial_timeout),
                )))
            }
        };
        let connection = self.register(stream, addr);
        connection.write(&self.hello()).await?;
        tracing::info!(peer = %addr, connection_id = %connection.id(), "Connected to peer");
        Ok(())
    }

    fn spawn_accept_loop(&self, listener: TcpListener) {
        let peers = self.peers.clone();
        let inbound = self.inbound_tx.clone();
        let hello = self.hello();
        let tasks = self.tasks.clone();

        let handle = tokio::spawn(async move {
            loop {
                let (stream, addr) = accept_with_backoff(|| listener.accept()).await;

                let (reader, writer) = stream.into_split();
                let connection = PeerConnection::new(writer);
                peers.insert(addr, connection.clone());
                metrics::record_connected_peers(peers.len());
                tracing::info!(peer = %addr, connection_id = %connection.id(), "Peer connected");

                let reader = spawn_reader(addr, connection.id(), reader, inbound.clone(), peers.clone());
                track(&tasks, reader);
                if let Err(e) = connection.write(&hello).await {
                    tracing::warn!(peer = %addr, error = %e, "Failed to greet peer");
                }
            }
        });
        self.track_task(handle);
    }
}

/// Pause after a failed accept, so fd exhaustion does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Retry `accept` until it yields a connection, sleeping after each error.
async fn accept_with_backoff<F, Fut, T>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                tracing::warn!(error = %e, backoff_ms = ACCEPT_ERROR_BACKOFF.as_millis() as u64, "Accept failed");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}

fn track(tasks: &Mutex<Vec<JoinHandle<()>>>, handle: JoinHandle<()>) {
    if let Ok(mut tasks) = tasks.lock() {
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }
}

#[async_trait]
impl CommunicationBackend for TcpBackend {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    async fn connect(&self, role: ProcessRole, peers: &[SocketAddr]) -> NetResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NetError::Closed);
        }
        if self.role.set(role).is_err() {
            return Err(NetError::AlreadyConnected);
        }

        let listener = TcpListener::bind(self.listen_address)
            .await
            .map_err(|source| NetError::Bind {
                address: self.listen_address,
                source,
            })?;
        let local = listener.local_addr()?;
        let _ = self.local_addr.set(local);

        tracing::info!(
            address = %local,
            node_id = %self.node_id,
            role = %role,
            "Listening for swarm peers"
        );
        self.spawn_accept_loop(listener);

        let mut connected = 0;
        for &addr in peers {
            match self.dial(addr).await {
                Ok(()) => connected += 1,
                Err(e) => tracing::warn!(peer = %addr, error = %e, "Initial peer unreachable"),
            }
        }

        if role == ProcessRole::Joiner && connected == 0 {
            return Err(NetError::Unreachable {
                attempted: peers.len(),
            });
        }
        Ok(())
    }

    async fn send(&self, peer: SocketAddr, message: Message) -> NetResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NetError::Closed);
        }
        // Clone out of the map so no shard lock is held across the write.
        let connection = self
            .peers
            .get(&peer)
            .map(|entry| entry.value().clone())
            .ok_or(NetError::UnknownPeer(peer))?;
        connection.write(&message).await
    }

    async fn broadcast(&self, message: Message) -> NetResult<usize> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NetError::Closed);
        }
        if self.local_addr.get().is_none() {
            return Err(NetError::NotConnected);
        }

        let targets: Vec<(SocketAddr, PeerConnection)> = self
            .peers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        for (addr, connection) in targets {
            match connection.write(&message).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(peer = %addr, error = %e, "Broadcast to peer failed, dropping it");
                    self.peers.remove(&addr);
                }
            }
        }
        metrics::record_connected_peers(self.peers.len());
        Ok(delivered)
    }

    async fn recv(&self) -> Option<Envelope> {
        self.inbound_rx.lock().await.recv().await
    }

    fn try_recv(&self) -> Option<Envelope> {
        self.inbound_rx.try_lock().ok()?.try_recv().ok()
    }

    fn peers(&self) -> Vec<SocketAddr> {
        self.peers.iter().map(|entry| *entry.key()).collect()
    }

    async fn close(&self) -> NetResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let bye = Message::Bye {
            node_id: self.node_id,
        };
        let connections: Vec<PeerConnection> =
            self.peers.iter().map(|entry| entry.value().clone()).collect();
        for connection in connections {
            let _ = connection.write(&bye).await;
            connection.shutdown().await;
        }
        self.peers.clear();
        metrics::record_connected_peers(0);

        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        tracing::info!(node_id = %self.node_id, "TCP backend closed");
        Ok(())
    }
}

impl Drop for TcpBackend {
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> TcpBackend {
        TcpBackend::new(
            NodeId::new(),
            "127.0.0.1:0".parse().unwrap(),
            Duration::from_millis(500),
        )
    }

    async fn next_payload(backend: &TcpBackend) -> Envelope {
        loop {
            let envelope = timeout(Duration::from_secs(5), backend.recv())
                .await
                .expect("timed out waiting for a frame")
                .expect("inbound queue closed");
            if matches!(envelope.message, Message::Payload { .. }) {
                return envelope;
            }
        }
    }

    #[tokio::test]
    async fn test_joiner_reaches_initiator() {
        let seed = backend();
        seed.connect(ProcessRole::Initiator, &[]).await.unwrap();
        let seed_addr = seed.local_addr().unwrap();

        let joiner = backend();
        joiner.connect(ProcessRole::Joiner, &[seed_addr]).await.unwrap();
        assert_eq!(joiner.peers(), vec![seed_addr]);

        let sent = Message::payload(joiner.node_id(), "round", serde_json::json!({"round": 1}));
        assert_eq!(joiner.broadcast(sent.clone()).await.unwrap(), 1);

        let received = next_payload(&seed).await;
        assert_eq!(received.message, sent);

        joiner.close().await.unwrap();
        seed.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_joiner_without_reachable_peer() {
        // Bind then drop to get a port nobody listens on.
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();

        let joiner = backend();
        let err = joiner.connect(ProcessRole::Joiner, &[dead]).await.unwrap_err();
        assert!(matches!(err, NetError::Unreachable { attempted: 1 }));
    }

    #[tokio::test]
    async fn test_connect_twice_rejected() {
        let seed = backend();
        seed.connect(ProcessRole::Initiator, &[]).await.unwrap();
        let err = seed.connect(ProcessRole::Initiator, &[]).await.unwrap_err();
        assert!(matches!(err, NetError::AlreadyConnected));
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer() {
        let seed = backend();
        seed.connect(ProcessRole::Initiator, &[]).await.unwrap();
        let stranger: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let err = seed
            .send(stranger, Message::Bye { node_id: seed.node_id() })
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::UnknownPeer(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_errors_back_off() {
        let mut failures = 3;
        let started = tokio::time::Instant::now();
        let accepted = accept_with_backoff(|| {
            let result = if failures > 0 {
                failures -= 1;
                Err(std::io::Error::new(std::io::ErrorKind::Other, "too many open files"))
            } else {
                Ok(7)
            };
            std::future::ready(result)
        })
        .await;

        assert_eq!(accepted, 7);
        assert!(started.elapsed() >= ACCEPT_ERROR_BACKOFF * 3);
    }

    #[tokio::test]
    async fn test_broadcast_before_connect() {
        let idle = backend();
        let err = idle
            .broadcast(Message::Bye { node_id: idle.node_id() })
            .await
            .unwrap_err();
        assert!(matches!(err, NetError::NotConnected));
    }
}
