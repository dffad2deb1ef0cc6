//! Runtime error types.

use std::time::Duration;

use thiserror::Error;

use crate::view::EngineError;

/// Errors from the runtime driver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The engine task is no longer running.
    #[error("engine task has shut down")]
    Shutdown,

    /// The engine rejected the operation.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Errors from an optimistic write.
///
/// Only [`Failed`](OptimisticError::Failed) carries the write collaborator's
/// own error. In every case the speculative mutation has been reverted by
/// the time the error is returned (unless the engine itself is gone).
#[derive(Debug, Error)]
pub enum OptimisticError<E> {
    /// The write operation failed.
    #[error("operation failed: {0}")]
    Failed(E),

    /// The write operation did not finish in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The runtime could not process the mutation.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl<E> OptimisticError<E> {
    /// The write collaborator's error, if that is what failed
    pub fn into_failure(self) -> Option<E> {
        match self {
            OptimisticError::Failed(err) => Some(err),
            _ => None,
        }
    }
}
