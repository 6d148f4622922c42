//! Rendezvous subsystem.
//!
//! # Data Flow
//! ```text
//! ProcessRole (config / CLI)
//!     → coordinator.rs (init exactly once)
//!     → bound CommunicationBackend::connect(role, initial peers)
//!     → RendezvousInfo (role, node id, published address)
//! ```
//!
//! # Design Decisions
//! - The role is an input, never decided here
//! - A second init is rejected, even after a failed first attempt
//! - Protocol side effects belong to the backend; this layer owns sequencing

pub mod coordinator;
pub mod role;

pub use coordinator::{Rendezvous, RendezvousError, RendezvousInfo};
pub use role::ProcessRole;
