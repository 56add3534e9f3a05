//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// No factory registered for the selector
    #[error("backend '{id}': unknown selector '{selector}'")]
    UnknownSelector { id: String, selector: String },

    /// Backend creation error
    #[error("failed to create backend '{id}': {message}")]
    BackendCreation { id: String, message: String },

    /// One or more backends failed during fan-out
    #[error("fan-out of '{record_id}' failed on {} backend(s): {}", failed.len(), failed.join(", "))]
    PartialFanout {
        record_id: String,
        failed: Vec<String>,
    },

    /// Backend error (from contract)
    #[error("backend error: {0}")]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    /// Create a backend creation error
    pub fn backend_creation(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendCreation {
            id: id.into(),
            message: message.into(),
        }
    }
}
