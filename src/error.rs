use thiserror::Error;

use crate::domain::TransactionStatus;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("edit not allowed on {status} record")]
    EditNotAllowed { status: TransactionStatus },

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("not found: {0}")]
    NotFound(String),
}

impl EngineError {
    /// Transport failures are the only retryable class; everything else is a
    /// local guard that will fail the same way on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Transport(_))
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Transport(TransportError::Request(err))
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response from transaction API: {0}")]
    InvalidResponse(String),

    #[error("upstream rejected request: {0}")]
    Remote(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("circuit breaker open: {0}")]
    CircuitOpen(String),
}
