//! Workload factory.
//!
//! # Responsibilities
//! - Resolve the `target` of a workload config to a constructor
//! - Hand constructors typed access to their arguments
//! - Surface every construction problem as a `BuildError`

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::config::WorkloadConfig;
use crate::net::{BindError, Communication, CommunicationBackend};
use crate::rendezvous::RendezvousInfo;
use crate::workload::controller::WorkloadController;
use crate::workload::rounds::RoundsGame;

/// Errors raised while constructing a workload.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("workload config has no 'target'")]
    MissingTarget,

    #[error("unknown workload target '{0}'")]
    UnknownTarget(String),

    #[error("{target}: missing required field '{field}'")]
    MissingField { target: String, field: String },

    #[error("{target}: field '{field}' must be {expected}")]
    InvalidField {
        target: String,
        field: String,
        expected: &'static str,
    },

    #[error("workload needs a bound backend: {0}")]
    Backend(#[from] BindError),
}

/// Everything a constructor may depend on besides its own arguments.
#[derive(Debug, Clone)]
pub struct WorkloadContext {
    pub backend: Arc<dyn CommunicationBackend>,
    pub rendezvous: RendezvousInfo,
}

impl WorkloadContext {
    /// Borrow the bound backend out of the registry.
    pub fn new(comm: &Communication, rendezvous: RendezvousInfo) -> Result<Self, BuildError> {
        Ok(Self {
            backend: comm.backend()?.clone(),
            rendezvous,
        })
    }
}

/// Builds a runnable controller from a config tree.
pub trait WorkloadFactory {
    fn build(
        &self,
        config: &WorkloadConfig,
        ctx: WorkloadContext,
    ) -> Result<Box<dyn WorkloadController>, BuildError>;
}

/// Constructor signature stored in the registry.
pub type Constructor = Box<
    dyn Fn(&WorkloadArgs<'_>, WorkloadContext) -> Result<Box<dyn WorkloadController>, BuildError>
        + Send
        + Sync,
>;

/// Typed view over a workload's arguments, tagged with its target for errors.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadArgs<'a> {
    target: &'a str,
    config: &'a WorkloadConfig,
}

impl<'a> WorkloadArgs<'a> {
    pub fn new(target: &'a str, config: &'a WorkloadConfig) -> Self {
        Self { target, config }
    }

    pub fn target(&self) -> &str {
        self.target
    }

    fn missing(&self, field: &str) -> BuildError {
        BuildError::MissingField {
            target: self.target.to_string(),
            field: field.to_string(),
        }
    }

    fn invalid(&self, field: &str, expected: &'static str) -> BuildError {
        BuildError::InvalidField {
            target: self.target.to_string(),
            field: field.to_string(),
            expected,
        }
    }

    /// A non-negative integer argument that must be present.
    pub fn required_u64(&self, field: &str) -> Result<u64, BuildError> {
        self.optional_u64(field)?.ok_or_else(|| self.missing(field))
    }

    pub fn optional_u64(&self, field: &str) -> Result<Option<u64>, BuildError> {
        match self.config.get(field) {
            None => Ok(None),
            Some(value) => value
                .as_integer()
                .and_then(|v| u64::try_from(v).ok())
                .map(Some)
                .ok_or_else(|| self.invalid(field, "a non-negative integer")),
        }
    }

    pub fn optional_str(&self, field: &str) -> Result<Option<&'a str>, BuildError> {
        match self.config.get(field) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or_else(|| self.invalid(field, "a string")),
        }
    }
}

/// Factory backed by a map of target name to constructor.
pub struct WorkloadRegistry {
    constructors: HashMap<String, Constructor>,
}

impl WorkloadRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with the built-in game manager.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(RoundsGame::TARGET, |args, ctx| {
            let game = RoundsGame::from_args(args, ctx)?;
            Ok(Box::new(game) as Box<dyn WorkloadController>)
        });
        registry
    }

    /// Register (or replace) the constructor for `target`.
    pub fn register<F>(&mut self, target: &str, constructor: F)
    where
        F: Fn(&WorkloadArgs<'_>, WorkloadContext) -> Result<Box<dyn WorkloadController>, BuildError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(target.to_string(), Box::new(constructor));
    }

    pub fn targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        targets.sort_unstable();
        targets
    }
}

impl Default for WorkloadRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl WorkloadFactory for WorkloadRegistry {
    fn build(
        &self,
        config: &WorkloadConfig,
        ctx: WorkloadContext,
    ) -> Result<Box<dyn WorkloadController>, BuildError> {
        let target = config.target().ok_or(BuildError::MissingTarget)?;
        let constructor = self
            .constructors
            .get(target)
            .ok_or_else(|| BuildError::UnknownTarget(target.to_string()))?;

        let controller = constructor(&WorkloadArgs::new(target, config), ctx)?;
        tracing::info!(target = target, workload = controller.name(), "Workload constructed");
        Ok(controller)
    }
}
