//! Swarm node launcher.
//!
//! Brings one node up and runs its game manager to completion.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI args + TOML config
//!          │
//!          ▼
//!   ┌──────────────┐   resolvers, overrides, validation
//!   │    config    │
//!   └──────┬───────┘
//!          ▼
//!   ┌──────────────────────────────────────────────────────┐
//!   │                     supervisor                        │
//!   │                                                       │
//!   │  net backend ──▶ Communication ──▶ rendezvous init    │
//!   │                                         │             │
//!   │                                         ▼             │
//!   │                   workload factory ──▶ run()          │
//!   └──────────────────────────┬───────────────────────────┘
//!                              ▼
//!                  FailFast (report, grace, exit)
//! ```
//!
//! Every failure, wherever it happens, ends the process with status 1 after
//! the grace delay. Restarting the node is left to the outer supervisor.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use swarm_launcher::config::{load_config, ObservabilityConfig, Resolvers, SupervisorConfig};
use swarm_launcher::lifecycle::{
    abort, ExitOutcome, FailFast, LaunchError, LaunchFailure, Stage, Supervisor,
};
use swarm_launcher::observability::{logging, metrics};
use swarm_launcher::rendezvous::ProcessRole;
use swarm_launcher::workload::WorkloadRegistry;

#[derive(Debug, Parser)]
#[command(name = "swarm-launcher", version, about = "Launch a swarm node and run its game")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "SWARM_CONFIG", default_value = "configs/swarm.toml")]
    config: PathBuf,

    /// Rendezvous role, overrides `swarm.role`
    #[arg(long)]
    role: Option<ProcessRole>,

    /// Config overrides as dotted.key=value
    overrides: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut overrides = cli.overrides;
    if let Some(role) = cli.role {
        overrides.push(format!("swarm.role={role}"));
    }

    let (result, grace) = match load_config(&cli.config, &overrides, &Resolvers::with_builtins()) {
        Ok(config) => {
            logging::init_logging(&config.observability);
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                config = %cli.config.display(),
                "swarm-launcher starting"
            );

            if config.observability.metrics_enabled {
                match config.observability.metrics_address.parse() {
                    Ok(addr) => metrics::init_metrics(addr),
                    Err(_) => tracing::error!(
                        metrics_address = %config.observability.metrics_address,
                        "Failed to parse metrics address"
                    ),
                }
            }

            let grace = Duration::from_secs(config.supervisor.grace_period_secs);
            let mut supervisor = Supervisor::new(config, WorkloadRegistry::with_builtins());
            (supervisor.launch().await, grace)
        }
        Err(e) => {
            logging::init_logging(&ObservabilityConfig::default());
            let grace = Duration::from_secs(SupervisorConfig::default().grace_period_secs);
            let failure = LaunchFailure::new(LaunchError::Config(e), Stage::Start);
            (Err(failure), grace)
        }
    };

    match FailFast::new(std::io::stderr(), grace).handle(result).await {
        ExitOutcome::NormalExit => tracing::info!("Shutdown complete"),
        ExitOutcome::FatalExit(code) => abort(code),
    }
}
