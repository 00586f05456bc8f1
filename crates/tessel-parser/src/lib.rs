//! Scenario parsing.
//!
//! Turns a [`ScenarioDefinition`] into an ordered list of [`StepSpec`]s. Steps may
//! be structured records or single free-text phrases; both shapes normalize to the
//! same model. Every authored step yields exactly one `StepSpec`.

pub mod error;
pub mod phrase;
pub mod source;
pub mod structured;

pub use error::ScenarioDefinitionError;
pub use phrase::parse_phrase;
pub use source::{load_scenarios, parse_scenarios};

use tessel_common::scenario::{ActionKind, ScenarioDefinition, StepDefinition, StepSpec};
use tracing::warn;

/// Parses every step of `definition`, in order.
///
/// Malformed structured values fail the whole definition with the offending step
/// index. Phrases no rule recognizes are kept as `unknown` steps.
pub fn parse(definition: &ScenarioDefinition) -> Result<Vec<StepSpec>, ScenarioDefinitionError> {
    let steps = definition
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| parse_step(index, step))
        .collect::<Result<Vec<_>, _>>()?;

    for index in unknown_steps(&steps) {
        warn!(
            scenario = %definition.name,
            step = index,
            "Unrecognized step '{}' will not be executed",
            steps[index].description
        );
    }
    Ok(steps)
}

pub fn parse_step(
    index: usize,
    step: &StepDefinition,
) -> Result<StepSpec, ScenarioDefinitionError> {
    match step {
        StepDefinition::Phrase(text) => Ok(parse_phrase(index, text)),
        StepDefinition::Structured(record) => structured::parse_structured(index, record),
    }
}

/// Indices of steps classified as `unknown`.
pub fn unknown_steps(steps: &[StepSpec]) -> Vec<usize> {
    steps
        .iter()
        .enumerate()
        .filter(|(_, s)| s.action == ActionKind::Unknown)
        .map(|(i, _)| i)
        .collect()
}
