//! Communication backend registry.
//!
//! The registry is an explicit single-writer object: binding takes
//! `&mut self`, so it can only happen while nothing else holds a reference,
//! and every later reader goes through a shared borrow.

use std::sync::Arc;

use thiserror::Error;

use crate::net::backend::CommunicationBackend;

/// Errors raised by the registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    /// A backend is already bound.
    #[error("communication backend already bound to '{0}'")]
    AlreadyBound(&'static str),

    /// Communication was attempted before a backend was bound.
    #[error("no communication backend bound")]
    NotBound,
}

/// Process-wide choice of transport, bound once at startup.
#[derive(Debug, Default)]
pub struct Communication {
    backend: Option<Arc<dyn CommunicationBackend>>,
}

impl Communication {
    /// An unbound registry.
    pub fn new() -> Self {
        Self { backend: None }
    }

    /// Bind the transport. A second bind is rejected and leaves the first in place.
    pub fn set_backend(&mut self, backend: Arc<dyn CommunicationBackend>) -> Result<(), BindError> {
        if let Some(existing) = &self.backend {
            return Err(BindError::AlreadyBound(existing.name()));
        }
        tracing::info!(backend = backend.name(), node_id = %backend.node_id(), "Communication backend bound");
        self.backend = Some(backend);
        Ok(())
    }

    /// The bound transport.
    pub fn backend(&self) -> Result<&Arc<dyn CommunicationBackend>, BindError> {
        self.backend.as_ref().ok_or(BindError::NotBound)
    }

    pub fn is_bound(&self) -> bool {
        self.backend.is_some()
    }
}
