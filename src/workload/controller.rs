//! The workload contract the supervisor runs.

use std::any::Any;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinError;

use crate::net::NetError;

/// Errors a workload may raise out of `run`.
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("communication failed: {0}")]
    Communication(#[from] NetError),

    #[error("round {round} failed: {reason}")]
    RoundFailed { round: u64, reason: String },

    /// `run` panicked; the payload message is kept when it is a string.
    #[error("workload panicked: {0}")]
    Panicked(String),

    /// The workload task was cancelled before finishing.
    #[error("workload task cancelled")]
    Cancelled,

    /// Anything raised by an externally registered workload.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<JoinError> for WorkloadError {
    fn from(err: JoinError) -> Self {
        match err.try_into_panic() {
            Ok(payload) => WorkloadError::Panicked(panic_message(payload.as_ref())),
            Err(_) => WorkloadError::Cancelled,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A constructed, runnable unit of work.
///
/// `run` blocks the supervisor for the whole workload lifetime and may spawn
/// its own tasks; the supervisor never inspects what happens inside.
#[async_trait]
pub trait WorkloadController: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn run(&mut self) -> Result<(), WorkloadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let join = tokio::spawn(async {
            let rounds: Vec<u64> = Vec::new();
            rounds[3]
        })
        .await
        .unwrap_err();

        match WorkloadError::from(join) {
            WorkloadError::Panicked(message) => assert!(message.contains("index out of bounds"), "{message}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_abort_becomes_cancelled() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let err = WorkloadError::from(handle.await.unwrap_err());
        assert!(matches!(err, WorkloadError::Cancelled));
    }
}
