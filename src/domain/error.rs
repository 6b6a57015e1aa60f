use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Precondition failed: {message}")]
    PreconditionFailed { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Resolver error: {resolver} - {message}")]
    Resolver { resolver: String, message: String },

    #[error("Telemetry write error: {message}")]
    TelemetryWrite { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn resolver(resolver: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolver {
            resolver: resolver.into(),
            message: message.into(),
        }
    }

    pub fn telemetry_write(message: impl Into<String>) -> Self {
        Self::TelemetryWrite {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the error was raised by request validation, before any side effect
    pub fn is_request_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::PreconditionFailed { .. }
        )
    }
}
