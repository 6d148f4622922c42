//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the launcher.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::net::BackendKind;
use crate::rendezvous::ProcessRole;

/// Root configuration for the swarm launcher.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LauncherConfig {
    /// Transport and rendezvous settings.
    pub swarm: SwarmConfig,

    /// Fail-fast supervisor settings.
    pub supervisor: SupervisorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Workload declaration, handed to the workload factory untouched.
    pub game_manager: WorkloadConfig,
}

/// Swarm membership configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Transport implementation to register.
    pub backend: BackendKind,

    /// Role this process takes during rendezvous.
    pub role: ProcessRole,

    /// Address the node listens on (e.g., "0.0.0.0:38331").
    pub listen_address: String,

    /// Addresses of peers to dial when joining.
    pub initial_peers: Vec<String>,

    /// Per-peer dial timeout in seconds.
    pub startup_timeout_secs: u64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Tcp,
            role: ProcessRole::Joiner,
            listen_address: "0.0.0.0:38331".to_string(),
            initial_peers: Vec::new(),
            startup_timeout_secs: 30,
        }
    }
}

/// Fail-fast supervisor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Delay between reporting a fatal error and exiting, in seconds.
    pub grace_period_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 3,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Declarative workload configuration.
///
/// The `target` key selects a registered constructor; all other keys are
/// interpreted by that constructor alone.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(transparent)]
pub struct WorkloadConfig(toml::Table);

impl WorkloadConfig {
    /// Wrap a parsed table.
    pub fn new(table: toml::Table) -> Self {
        Self(table)
    }

    /// The constructor name this workload resolves to.
    pub fn target(&self) -> Option<&str> {
        self.0.get("target").and_then(toml::Value::as_str)
    }

    /// Look up a constructor argument.
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.0.get(key)
    }

    pub fn table(&self) -> &toml::Table {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LauncherConfig::default();
        assert_eq!(config.swarm.role, ProcessRole::Joiner);
        assert_eq!(config.swarm.backend, BackendKind::Tcp);
        assert_eq!(config.supervisor.grace_period_secs, 3);
        assert!(config.game_manager.target().is_none());
    }

    #[test]
    fn test_minimal_document() {
        let config: LauncherConfig = toml::from_str(
            r#"
            [swarm]
            backend = "loopback"
            role = "initiator"

            [game_manager]
            target = "swarm.rounds"
            max_rounds = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.swarm.backend, BackendKind::Loopback);
        assert_eq!(config.swarm.role, ProcessRole::Initiator);
        assert_eq!(config.swarm.startup_timeout_secs, 30);
        assert_eq!(config.game_manager.target(), Some("swarm.rounds"));
        assert_eq!(
            config.game_manager.get("max_rounds").and_then(toml::Value::as_integer),
            Some(4)
        );
    }
}
