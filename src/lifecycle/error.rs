//! Failure taxonomy for the launch sequence.

use std::backtrace::{Backtrace, BacktraceStatus};

use thiserror::Error;

use crate::config::loader::full_error_enabled;
use crate::config::ConfigError;
use crate::lifecycle::supervisor::Stage;
use crate::net::{BindError, NetError};
use crate::rendezvous::RendezvousError;
use crate::workload::{BuildError, WorkloadError};

/// Backend binding or rendezvous could not complete.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to create communication backend: {0}")]
    Transport(#[from] NetError),

    #[error("failed to bind communication backend: {0}")]
    Bind(#[from] BindError),

    #[error("rendezvous failed: {0}")]
    Rendezvous(#[from] RendezvousError),
}

/// Anything that ends the launch sequence.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("startup failure: {0}")]
    Startup(#[from] StartupError),

    #[error("configuration failure: {0}")]
    Config(#[from] ConfigError),

    #[error("workload build failure: {0}")]
    Build(#[from] BuildError),

    #[error("workload runtime failure: {0}")]
    Runtime(#[from] WorkloadError),
}

/// Coarse failure class, used for labels only. Every kind is handled the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Startup,
    Build,
    Runtime,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Startup => "startup",
            FailureKind::Build => "build",
            FailureKind::Runtime => "runtime",
        }
    }
}

impl LaunchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LaunchError::Startup(_) => FailureKind::Startup,
            LaunchError::Config(_) | LaunchError::Build(_) => FailureKind::Build,
            LaunchError::Runtime(_) => FailureKind::Runtime,
        }
    }
}

/// A launch error together with where and how it surfaced.
#[derive(Debug)]
pub struct LaunchFailure {
    error: LaunchError,
    stage: Stage,
    backtrace: Backtrace,
}

impl LaunchFailure {
    /// Wrap `error`. The backtrace is always captured unless
    /// `SWARM_FULL_ERROR=0`, in which case `RUST_BACKTRACE` decides.
    pub fn new(error: LaunchError, stage: Stage) -> Self {
        let backtrace = if full_error_enabled() {
            Backtrace::force_capture()
        } else {
            Backtrace::capture()
        };
        Self {
            error,
            stage,
            backtrace,
        }
    }

    pub fn error(&self) -> &LaunchError {
        &self.error
    }

    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }

    /// Last stage reached before the failure.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.backtrace.status() {
            BacktraceStatus::Captured => Some(&self.backtrace),
            _ => None,
        }
    }
}

// Not derived: thiserror would route the backtrace field through the
// nightly-only `provide` API.
impl std::fmt::Display for LaunchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [stage: {}]", self.error, self.stage)
    }
}

impl std::error::Error for LaunchFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
