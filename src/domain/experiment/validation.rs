//! Experiment validation utilities

use thiserror::Error;

/// Maximum length for experiment IDs
pub const MAX_EXPERIMENT_ID_LENGTH: usize = 64;

/// Validation errors for experiments and their derived identifiers
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExperimentValidationError {
    #[error("Experiment ID cannot be empty")]
    EmptyId,

    #[error("Experiment ID exceeds maximum length of {0} characters")]
    IdTooLong(usize),

    #[error("Experiment ID must start with a letter or number")]
    InvalidIdStart,

    #[error("Experiment ID contains invalid character: '{0}'")]
    InvalidIdCharacter(char),

    #[error("Experiment feature cannot be empty")]
    EmptyFeature,

    #[error("Experiment name cannot be empty")]
    EmptyName,

    #[error("Malformed correlation ID: '{0}'")]
    MalformedCorrelationId(String),
}

impl From<ExperimentValidationError> for crate::domain::DomainError {
    fn from(err: ExperimentValidationError) -> Self {
        crate::domain::DomainError::validation(err.to_string())
    }
}

/// Validate an experiment ID
///
/// IDs are embedded verbatim in correlation ids, so the `~` separator (and
/// anything other than ASCII letters, digits, `-` and `_`) is rejected.
pub fn validate_experiment_id(id: &str) -> Result<(), ExperimentValidationError> {
    let Some(first_char) = id.chars().next() else {
        return Err(ExperimentValidationError::EmptyId);
    };

    if id.len() > MAX_EXPERIMENT_ID_LENGTH {
        return Err(ExperimentValidationError::IdTooLong(MAX_EXPERIMENT_ID_LENGTH));
    }

    if !first_char.is_ascii_alphanumeric() {
        return Err(ExperimentValidationError::InvalidIdStart);
    }

    if let Some(ch) = id
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_'))
    {
        return Err(ExperimentValidationError::InvalidIdCharacter(ch));
    }

    Ok(())
}

/// Validate the feature and name identity fields
pub fn validate_identity(feature: &str, name: &str) -> Result<(), ExperimentValidationError> {
    if feature.trim().is_empty() {
        return Err(ExperimentValidationError::EmptyFeature);
    }

    if name.trim().is_empty() {
        return Err(ExperimentValidationError::EmptyName);
    }

    Ok(())
}
