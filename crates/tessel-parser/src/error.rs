use tessel_common::scenario::ActionKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioDefinitionError {
    #[error("Step {index}: invalid timeout '{raw}'")]
    InvalidTimeout { index: usize, raw: String },

    #[error("Step {index}: invalid value for '{action}': {reason}")]
    InvalidValue {
        index: usize,
        action: ActionKind,
        reason: String,
    },

    #[error("Step {index}: '{action}' requires a value")]
    MissingValue { index: usize, action: ActionKind },

    #[error("Step {index}: '{action}' requires a target")]
    MissingTarget { index: usize, action: ActionKind },

    #[error("Step {index}: invalid assertion: {reason}")]
    InvalidAssertion { index: usize, reason: String },

    #[error("Failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse scenario file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid scenario file format, expected a 'scenarios' key")]
    MissingScenarios,
}

impl ScenarioDefinitionError {
    /// Index of the offending step, for step-level errors.
    pub fn step_index(&self) -> Option<usize> {
        match self {
            ScenarioDefinitionError::InvalidTimeout { index, .. }
            | ScenarioDefinitionError::InvalidValue { index, .. }
            | ScenarioDefinitionError::MissingValue { index, .. }
            | ScenarioDefinitionError::MissingTarget { index, .. }
            | ScenarioDefinitionError::InvalidAssertion { index, .. } => Some(*index),
            _ => None,
        }
    }
}
