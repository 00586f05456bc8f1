//! YAML scenario files.
//!
//! ```yaml
//! scenarios:
//!   - name: Login
//!     tags: [smoke]
//!     steps:
//!       - type "a@b.com" into email field
//!       - action: click
//!         target: submit button
//! ```

use crate::error::ScenarioDefinitionError;
use serde::Deserialize;
use std::path::Path;
use tessel_common::scenario::ScenarioDefinition;

#[derive(Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    scenarios: Option<Vec<ScenarioDefinition>>,
}

pub fn parse_scenarios(content: &str) -> Result<Vec<ScenarioDefinition>, ScenarioDefinitionError> {
    let file: ScenarioFile = serde_yaml::from_str(content)?;
    file.scenarios
        .ok_or(ScenarioDefinitionError::MissingScenarios)
}

pub fn load_scenarios(path: &Path) -> Result<Vec<ScenarioDefinition>, ScenarioDefinitionError> {
    let content = std::fs::read_to_string(path)?;
    parse_scenarios(&content)
}

/// Keeps scenarios carrying `tag`.
pub fn filter_by_tag(scenarios: Vec<ScenarioDefinition>, tag: &str) -> Vec<ScenarioDefinition> {
    scenarios
        .into_iter()
        .filter(|s| s.tags.contains(tag))
        .collect()
}
