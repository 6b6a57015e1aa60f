//! Correlation ids linking a recommended item to the exposure that produced it
//!
//! Format: `{experiment_id}~{user_id}~{variation_index}~{result_rank}`.
//! Attribution systems split on `~` to credit a later conversion to the
//! variation. Experiment ids cannot contain `~`; user ids may, so parsing
//! takes the experiment id from the left and the two numbers from the right.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::validation::ExperimentValidationError;

const SEPARATOR: char = '~';

/// Identifier of one item instance within one exposure
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CorrelationId {
    experiment_id: String,
    user_id: String,
    variation_index: usize,
    result_rank: usize,
}

impl CorrelationId {
    /// Derive the id for an item of a response
    pub fn generate(
        experiment_id: impl Into<String>,
        user_id: impl Into<String>,
        variation_index: usize,
        result_rank: usize,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            user_id: user_id.into(),
            variation_index,
            result_rank,
        }
    }

    /// Parse a correlation id back into its parts
    pub fn parse(value: &str) -> Result<Self, ExperimentValidationError> {
        let malformed = || ExperimentValidationError::MalformedCorrelationId(value.to_string());

        let (experiment_id, rest) = value.split_once(SEPARATOR).ok_or_else(malformed)?;
        let (rest, rank) = rest.rsplit_once(SEPARATOR).ok_or_else(malformed)?;
        let (user_id, index) = rest.rsplit_once(SEPARATOR).ok_or_else(malformed)?;

        if experiment_id.is_empty() || user_id.is_empty() {
            return Err(malformed());
        }

        let variation_index = index.parse().map_err(|_| malformed())?;
        let result_rank: usize = rank.parse().map_err(|_| malformed())?;

        if result_rank == 0 {
            return Err(malformed());
        }

        Ok(Self::generate(experiment_id, user_id, variation_index, result_rank))
    }

    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn variation_index(&self) -> usize {
        self.variation_index
    }

    pub fn result_rank(&self) -> usize {
        self.result_rank
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.experiment_id,
            self.user_id,
            self.variation_index,
            self.result_rank,
            sep = SEPARATOR
        )
    }
}

impl FromStr for CorrelationId {
    type Err = ExperimentValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CorrelationId {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CorrelationId> for String {
    fn from(id: CorrelationId) -> Self {
        id.to_string()
    }
}
