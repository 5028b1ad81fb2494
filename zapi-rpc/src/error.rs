//! Error types for the node client and the operation tracker.

use thiserror::Error;

use crate::types::OperationId;

/// Result alias used throughout the crate.
pub type ZapiResult<T> = Result<T, ZapiError>;

/// Every failure the tracker can surface. Nothing is retried or recovered
/// locally; callers decide whether to re-submit or re-poll.
#[derive(Debug, Error)]
pub enum ZapiError {
    /// Malformed caller input, detected before any network call.
    #[error("{0}")]
    Validation(String),

    /// The node answered with a structured JSON-RPC error.
    #[error("RPC Error: {message} (Code: {code})")]
    Rpc { code: i64, message: String },

    /// The node could not be reached or did not speak JSON-RPC.
    #[error("Network Error: {0}")]
    Network(String),

    /// A status query failed while waiting on an operation.
    #[error("failed to poll operation status: {0}")]
    Poll(#[source] Box<ZapiError>),

    /// The polled identifier was absent from the status response.
    #[error("operation {0} not found")]
    NotFound(OperationId),

    /// The node reported a terminal failure for the operation.
    #[error("Operation failed: {message}")]
    OperationFailed { code: Option<i64>, message: String },

    /// The attempt budget ran out before a terminal status was observed.
    #[error("operation {id} did not complete after {attempts} status checks")]
    Timeout { id: OperationId, attempts: u32 },
}

impl ZapiError {
    /// Stable machine-readable code for each variant.
    pub fn code(&self) -> &'static str {
        match self {
            ZapiError::Validation(_) => "VALIDATION_ERROR",
            ZapiError::Rpc { .. } => "RPC_ERROR",
            ZapiError::Network(_) => "NETWORK_ERROR",
            ZapiError::Poll(_) => "POLL_ERROR",
            ZapiError::NotFound(_) => "OPERATION_NOT_FOUND",
            ZapiError::OperationFailed { .. } => "OPERATION_FAILED",
            ZapiError::Timeout { .. } => "OPERATION_TIMEOUT",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ZapiError::Validation(message.into())
    }
}
