//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor (supervisor.rs):
//!     Start → BackendBound → RendezvousReady → WorkloadBuilt → Running
//!           → Completed | FailedFatal
//!
//! Fatal path (fatal.rs):
//!     LaunchFailure → report to stderr + log → grace delay → abort(1)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: transport first, then rendezvous, then workload
//! - Errors are values; the launch result is matched once in `main`
//! - No graceful shutdown on failure: the process exits hard after the grace delay

pub mod error;
pub mod fatal;
pub mod supervisor;

pub use error::{FailureKind, LaunchError, LaunchFailure, StartupError};
pub use fatal::{abort, ExitOutcome, FailFast, FATAL_EXIT_CODE};
pub use supervisor::{Stage, Supervisor};
