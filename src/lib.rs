//! Swarm node launcher library.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rendezvous;
pub mod workload;

pub use config::schema::LauncherConfig;
pub use lifecycle::{FailFast, LaunchFailure, Supervisor};
pub use net::Communication;
pub use rendezvous::ProcessRole;
