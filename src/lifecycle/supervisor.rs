//! Launch orchestration.
//!
//! # Responsibilities
//! - Bind the communication backend
//! - Initialize the rendezvous role
//! - Build the workload and run it to completion
//!
//! # Design Decisions
//! - Fail fast: any stage error ends the sequence, later stages never run
//! - Stages execute in order; only the workload runs on its own task, and the
//!   supervisor waits for it
//! - The supervisor never exits the process; `fatal.rs` decides that

use std::sync::Arc;

use crate::config::LauncherConfig;
use crate::lifecycle::error::{LaunchError, LaunchFailure, StartupError};
use crate::net::{build_backend, Communication, CommunicationBackend, NodeId};
use crate::observability::metrics;
use crate::rendezvous::{ProcessRole, Rendezvous};
use crate::workload::{WorkloadContext, WorkloadError, WorkloadFactory};

/// Supervisor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    BackendBound,
    RendezvousReady,
    WorkloadBuilt,
    Running,
    Completed,
    FailedFatal,
}

impl Stage {
    pub fn index(&self) -> u8 {
        match self {
            Stage::Start => 0,
            Stage::BackendBound => 1,
            Stage::RendezvousReady => 2,
            Stage::WorkloadBuilt => 3,
            Stage::Running => 4,
            Stage::Completed => 5,
            Stage::FailedFatal => 6,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::BackendBound => "backend-bound",
            Stage::RendezvousReady => "rendezvous-ready",
            Stage::WorkloadBuilt => "workload-built",
            Stage::Running => "running",
            Stage::Completed => "completed",
            Stage::FailedFatal => "failed-fatal",
        };
        f.write_str(name)
    }
}

/// Drives one node from startup to workload completion.
pub struct Supervisor<F: WorkloadFactory> {
    config: LauncherConfig,
    factory: F,
    node_id: NodeId,
    backend: Option<Arc<dyn CommunicationBackend>>,
    comm: Communication,
    rendezvous: Rendezvous,
    history: Vec<Stage>,
}

impl<F: WorkloadFactory> Supervisor<F> {
    pub fn new(config: LauncherConfig, factory: F) -> Self {
        let rendezvous = Rendezvous::from_config(&config.swarm);
        Self {
            config,
            factory,
            node_id: NodeId::new(),
            backend: None,
            comm: Communication::new(),
            rendezvous,
            history: vec![Stage::Start],
        }
    }

    /// Use `backend` instead of the one named in the config.
    pub fn with_backend(mut self, backend: Arc<dyn CommunicationBackend>) -> Self {
        self.node_id = backend.node_id();
        self.backend = Some(backend);
        self
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn role(&self) -> ProcessRole {
        self.config.swarm.role
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.history.last().copied().unwrap_or(Stage::Start)
    }

    /// Every stage entered so far, in order.
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    fn advance(&mut self, stage: Stage) {
        tracing::debug!(from = %self.stage(), to = %stage, "Stage transition");
        self.history.push(stage);
        metrics::record_stage(stage.index());
    }

    /// Run every stage in order. Returns once the workload finishes or any
    /// stage fails; the error is handed back untouched for the fatal handler.
    pub async fn launch(&mut self) -> Result<(), LaunchFailure> {
        match self.run_stages().await {
            Ok(()) => Ok(()),
            Err(error) => {
                let failure = LaunchFailure::new(error, self.stage());
                self.advance(Stage::FailedFatal);
                Err(failure)
            }
        }
    }

    async fn run_stages(&mut self) -> Result<(), LaunchError> {
        tracing::info!(
            node_id = %self.node_id,
            role = %self.role(),
            backend = %self.config.swarm.backend,
            "Launching swarm node"
        );

        let backend = match self.backend.take() {
            Some(backend) => backend,
            None => build_backend(&self.config.swarm, self.node_id).map_err(StartupError::from)?,
        };
        self.comm.set_backend(backend).map_err(StartupError::from)?;
        self.advance(Stage::BackendBound);

        let role = self.role();
        let info = self
            .rendezvous
            .init(&self.comm, role)
            .await
            .map_err(StartupError::from)?;
        self.advance(Stage::RendezvousReady);

        let ctx = WorkloadContext::new(&self.comm, info)?;
        let mut controller = self.factory.build(&self.config.game_manager, ctx)?;
        self.advance(Stage::WorkloadBuilt);

        self.advance(Stage::Running);
        tracing::info!(workload = controller.name(), "Running workload");
        // A panic inside `run` surfaces as a JoinError and takes the fatal path.
        let run = tokio::spawn(async move { controller.run().await });
        run.await.map_err(WorkloadError::from)??;
        self.advance(Stage::Completed);

        if let Ok(backend) = self.comm.backend() {
            if let Err(e) = backend.close().await {
                tracing::warn!(error = %e, "Backend close failed after completion");
            }
        }
        tracing::info!(node_id = %self.node_id, "Workload completed");
        Ok(())
    }
}
