//! Rendezvous roles.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role a process takes in the peer handshake.
///
/// Exactly one deployment-level decision picks the initiator; the launcher
/// only carries the choice through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessRole {
    /// Seeds the coordination point.
    #[serde(alias = "master")]
    Initiator,
    /// Connects to an existing coordination point.
    #[default]
    Joiner,
}

impl ProcessRole {
    pub fn is_initiator(&self) -> bool {
        matches!(self, ProcessRole::Initiator)
    }
}

impl std::fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessRole::Initiator => write!(f, "initiator"),
            ProcessRole::Joiner => write!(f, "joiner"),
        }
    }
}

impl FromStr for ProcessRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "initiator" | "master" => Ok(ProcessRole::Initiator),
            "joiner" => Ok(ProcessRole::Joiner),
            other => Err(format!("unknown role '{}', expected initiator or joiner", other)),
        }
    }
}
