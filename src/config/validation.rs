//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//! - Check that a joiner has somewhere to join
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LauncherConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::LauncherConfig;
use crate::net::BackendKind;
use crate::rendezvous::ProcessRole;

/// Upper bound on the fatal grace delay.
pub const MAX_GRACE_PERIOD_SECS: u64 = 60;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a deserialized config for semantic errors.
pub fn validate_config(config: &LauncherConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let swarm = &config.swarm;

    if swarm.listen_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "swarm.listen_address",
            format!("'{}' is not a socket address", swarm.listen_address),
        ));
    }

    for peer in &swarm.initial_peers {
        if peer.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "swarm.initial_peers",
                format!("'{}' is not a socket address", peer),
            ));
        }
    }

    if swarm.backend == BackendKind::Tcp
        && swarm.role == ProcessRole::Joiner
        && swarm.initial_peers.is_empty()
    {
        errors.push(ValidationError::new(
            "swarm.initial_peers",
            "a joiner needs at least one initial peer",
        ));
    }

    if swarm.startup_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "swarm.startup_timeout_secs",
            "must be greater than zero",
        ));
    }

    if config.supervisor.grace_period_secs > MAX_GRACE_PERIOD_SECS {
        errors.push(ValidationError::new(
            "supervisor.grace_period_secs",
            format!("must be at most {}", MAX_GRACE_PERIOD_SECS),
        ));
    }

    if config.game_manager.target().is_none() {
        errors.push(ValidationError::new(
            "game_manager.target",
            "missing workload target",
        ));
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
