//! Error taxonomy for the execution engine

use thiserror::Error;

/// Stable error kinds surfaced by every executor implementation.
///
/// Mirrors the taxonomy in the design: validation, not-found, not-permitted,
/// runtime-setup, execution-failed, cancelled, io and internal all map to a
/// distinct variant so adapters (HTTP, CLI) can translate without string
/// matching.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not permitted: {0}")]
    NotPermitted(String),

    #[error("runtime setup failed: {0}")]
    RuntimeSetup(String),

    #[error("command exited with code {0}")]
    ExecutionFailed(i64),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Short machine-stable tag for logging/metrics, matching the kinds in
    /// the design's error table.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::NotFound(_) => "not-found",
            EngineError::NotPermitted(_) => "not-permitted",
            EngineError::RuntimeSetup(_) => "runtime-setup",
            EngineError::ExecutionFailed(_) => "execution-failed",
            EngineError::Cancelled => "cancelled",
            EngineError::Io(_) => "io",
            EngineError::Docker(_) => "runtime-setup",
            EngineError::Internal(_) => "internal",
        }
    }
}
