//! Workload subsystem.
//!
//! # Data Flow
//! ```text
//! [game_manager] table (target + arguments)
//!     → factory.rs (look up constructor by target)
//!     → Box<dyn WorkloadController>
//!     → supervisor calls run() once
//! ```
//!
//! # Design Decisions
//! - Construction either yields a complete controller or an error
//! - Additional workloads plug in by registering a constructor
//! - `rounds.rs` is the built-in game manager

pub mod controller;
pub mod factory;
pub mod rounds;

pub use controller::{WorkloadController, WorkloadError};
pub use factory::{BuildError, WorkloadContext, WorkloadFactory, WorkloadRegistry};
pub use rounds::RoundsGame;
