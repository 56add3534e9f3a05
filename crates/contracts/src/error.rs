//! Layered error definitions
//!
//! Categorized by source: config / backend / record / source

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Missing or malformed backend parameter
    #[error("backend '{backend}' parameter '{param}': {message}")]
    BackendParam {
        backend: String,
        param: String,
        message: String,
    },

    // ===== Backend Errors =====
    /// Backend connection error
    #[error("backend '{backend}' connection error: {message}")]
    BackendConnection { backend: String, message: String },

    /// Backend write error
    #[error("backend '{backend}' write error: {message}")]
    BackendWrite { backend: String, message: String },

    // ===== Record Errors =====
    /// Record could not be serialized to its payload
    #[error("failed to serialize record '{record_id}': {source}")]
    Serialization {
        record_id: String,
        #[source]
        source: serde_json::Error,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create backend parameter error
    pub fn backend_param(
        backend: impl Into<String>,
        param: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::BackendParam {
            backend: backend.into(),
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create backend connection error
    pub fn backend_connection(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendConnection {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create backend write error
    pub fn backend_write(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendWrite {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Whether the error points at a dead or missing connection
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::BackendConnection { .. })
    }
}

/// Error reported by a content source while polling its feeds.
///
/// Never thrown back into the pipeline; producers hand it to the
/// error-notification path of the intake API.
#[derive(Debug, Error)]
#[error("source '{source_name}' failed: {message}")]
pub struct SourceError {
    pub source_name: String,
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SourceError {
    pub fn new(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Attach the underlying cause
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}
