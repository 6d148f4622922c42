//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse into a table)
//!     → CLI overrides (dotted.key=value)
//!     → resolvers.rs (${name:arg} interpolation)
//!     → validation.rs (semantic checks)
//!     → LauncherConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload path
//! - All fields have defaults to allow minimal configs
//! - The `game_manager` section stays an opaque table for the workload factory

pub mod loader;
pub mod resolvers;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use resolvers::Resolvers;
pub use schema::LauncherConfig;
pub use schema::ObservabilityConfig;
pub use schema::SupervisorConfig;
pub use schema::SwarmConfig;
pub use schema::WorkloadConfig;
