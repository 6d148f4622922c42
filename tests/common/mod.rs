//! Shared fakes for launcher integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use swarm_launcher::config::{LauncherConfig, WorkloadConfig};
use swarm_launcher::net::{
    BackendKind, CommunicationBackend, Envelope, Message, NetError, NetResult, NodeId,
};
use swarm_launcher::rendezvous::ProcessRole;
use swarm_launcher::workload::{
    BuildError, WorkloadContext, WorkloadController, WorkloadError, WorkloadFactory,
};

pub const RECORDING_TARGET: &str = "test.recording";

/// Ordered record of every side effect the fakes observed.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Backend that records calls instead of talking to peers.
#[derive(Debug)]
pub struct RecordingBackend {
    node_id: NodeId,
    log: EventLog,
    fail_connect: bool,
    closed: AtomicBool,
}

impl RecordingBackend {
    pub fn new(log: EventLog) -> Self {
        Self {
            node_id: NodeId::new(),
            log,
            fail_connect: false,
            closed: AtomicBool::new(false),
        }
    }

    /// Every connect attempt reports the coordination point unreachable.
    pub fn unreachable(log: EventLog) -> Self {
        Self {
            fail_connect: true,
            ..Self::new(log)
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommunicationBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn node_id(&self) -> NodeId {
        self.node_id
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    async fn connect(&self, role: ProcessRole, peers: &[SocketAddr]) -> NetResult<()> {
        self.log.push(format!("connect:{role}"));
        if self.fail_connect {
            return Err(NetError::Unreachable {
                attempted: peers.len(),
            });
        }
        Ok(())
    }

    async fn send(&self, _peer: SocketAddr, _message: Message) -> NetResult<()> {
        self.log.push("send");
        Ok(())
    }

    async fn broadcast(&self, _message: Message) -> NetResult<usize> {
        self.log.push("broadcast");
        Ok(0)
    }

    async fn recv(&self) -> Option<Envelope> {
        None
    }

    fn try_recv(&self) -> Option<Envelope> {
        None
    }

    fn peers(&self) -> Vec<SocketAddr> {
        Vec::new()
    }

    async fn close(&self) -> NetResult<()> {
        self.log.push("close");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Where a recording workload should fail, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inject {
    Nothing,
    Build,
    Run,
    Panic,
}

/// Factory producing [`RecordingController`]s.
#[derive(Debug, Clone)]
pub struct RecordingFactory {
    log: EventLog,
    inject: Inject,
}

impl RecordingFactory {
    pub fn new(log: EventLog, inject: Inject) -> Self {
        Self { log, inject }
    }
}

impl WorkloadFactory for RecordingFactory {
    fn build(
        &self,
        config: &WorkloadConfig,
        ctx: WorkloadContext,
    ) -> Result<Box<dyn WorkloadController>, BuildError> {
        self.log.push(format!("build:{}", ctx.rendezvous.role));
        if self.inject == Inject::Build {
            return Err(BuildError::MissingField {
                target: config.target().unwrap_or_default().to_string(),
                field: "max_rounds".to_string(),
            });
        }
        Ok(Box::new(RecordingController {
            log: self.log.clone(),
            inject: self.inject,
            ctx,
        }))
    }
}

pub struct RecordingController {
    log: EventLog,
    inject: Inject,
    ctx: WorkloadContext,
}

#[async_trait]
impl WorkloadController for RecordingController {
    fn name(&self) -> &str {
        "recording"
    }

    async fn run(&mut self) -> Result<(), WorkloadError> {
        self.log.push("run");
        let hello = Message::payload(self.ctx.backend.node_id(), "test", serde_json::json!({}));
        self.ctx.backend.broadcast(hello).await?;
        match self.inject {
            Inject::Run => Err(WorkloadError::RoundFailed {
                round: 1,
                reason: "injected".to_string(),
            }),
            Inject::Panic => {
                let scores: Vec<u64> = Vec::new();
                self.log.push(format!("score:{}", scores[1]));
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Config for an in-process launch driven by the recording fakes.
pub fn recording_config(role: ProcessRole) -> LauncherConfig {
    let mut config = LauncherConfig::default();
    config.swarm.backend = BackendKind::Loopback;
    config.swarm.role = role;
    config.swarm.initial_peers = vec!["127.0.0.1:1".to_string()];
    config.supervisor.grace_period_secs = 0;
    let mut table = toml::Table::new();
    table.insert("target".into(), RECORDING_TARGET.into());
    config.game_manager = WorkloadConfig::new(table);
    config
}

/// Write `content` as `swarm.toml` in a fresh temp dir.
pub fn write_config(content: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("swarm.toml");
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

/// An address nothing listens on.
pub fn dead_address() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}
