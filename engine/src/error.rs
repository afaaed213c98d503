//! Errors that abort a run. Node failures never appear here.

use crate::graph::TransitionError;
use crate::state::{StoreError, TargetError};
use crate::synthesis::PolicyError;

/// Error type for a whole audit run
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid audit target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("Invalid synthesis policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Phase machine error: {0}")]
    Transition(#[from] TransitionError),
}

/// Result type for audit runs
pub type EngineResult<T> = Result<T, EngineError>;
