//! Per-step results and the aggregate test run handed to reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tessel_common::error::SessionError;
use tessel_common::scenario::ActionKind;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Success,
    Failed,
    Skipped,
}

/// Why a step did not succeed. Recorded in the step's result, never raised past
/// the executor.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StepError {
    #[error("No element matches '{target}'")]
    ElementNotFound { target: String },

    #[error("Element not interactable: {reason}")]
    ElementNotInteractable { reason: String },

    #[error("Timed out after {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    #[error("Unrecognized step: {description}")]
    UnknownAction { description: String },

    #[error("Assertion failed: {detail}")]
    ValidationFailure { detail: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("Session error: {message}")]
    Session { message: String },
}

impl StepError {
    /// Whether another attempt with a fresh snapshot might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StepError::ElementNotFound { .. }
                | StepError::ElementNotInteractable { .. }
                | StepError::Timeout { .. }
        )
    }
}

impl From<SessionError> for StepError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotInteractable { reason, .. } => {
                StepError::ElementNotInteractable { reason }
            }
            SessionError::StaleElement(id) => StepError::ElementNotInteractable {
                reason: format!("element {id} is no longer attached"),
            },
            SessionError::Timeout(ms) => StepError::Timeout { waited_ms: ms },
            SessionError::Script(msg) => StepError::ElementNotInteractable { reason: msg },
            other => StepError::Session {
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub description: String,
    pub action: ActionKind,
    pub outcome: StepOutcome,
    /// Action attempts made, including the first.
    pub attempts: u32,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
    /// The acted-on element scored below the confidence threshold.
    #[serde(default)]
    pub low_confidence: bool,
    /// Snapshot id of the element acted on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        self.outcome == StepOutcome::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRun {
    pub scenario: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub results: Vec<StepResult>,
    pub verdict: Verdict,
    #[serde(default)]
    pub cancelled: bool,
    /// Index of the critical step whose failure stopped the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted_at: Option<usize>,
}

impl TestRun {
    pub fn start(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            started_at: Utc::now(),
            finished_at: None,
            results: Vec::new(),
            verdict: Verdict::Fail,
            cancelled: false,
            aborted_at: None,
        }
    }

    pub fn record(&mut self, result: StepResult) {
        self.results.push(result);
    }

    /// Stamps the finish time and computes the verdict. Idempotent.
    pub fn finalize(&mut self) {
        self.finished_at.get_or_insert_with(Utc::now);
        let all_passed = self.results.iter().all(StepResult::is_success);
        self.verdict = if all_passed && !self.cancelled && self.aborted_at.is_none() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    pub fn count(&self, outcome: StepOutcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: usize, outcome: StepOutcome) -> StepResult {
        StepResult {
            index,
            description: format!("step {index}"),
            action: ActionKind::Click,
            outcome,
            attempts: 1,
            elapsed_ms: 0,
            error: None,
            screenshot: None,
            low_confidence: false,
            matched: None,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_verdict_requires_every_step() {
        let mut run = TestRun::start("s");
        run.record(result(0, StepOutcome::Success));
        run.finalize();
        assert!(run.passed());

        let mut run = TestRun::start("s");
        run.record(result(0, StepOutcome::Success));
        run.record(result(1, StepOutcome::Skipped));
        run.finalize();
        assert_eq!(run.verdict, Verdict::Fail);
    }

    #[test]
    fn test_cancelled_run_never_passes() {
        let mut run = TestRun::start("s");
        run.record(result(0, StepOutcome::Success));
        run.cancelled = true;
        run.finalize();
        assert_eq!(run.verdict, Verdict::Fail);
    }

    #[test]
    fn test_step_error_from_session_error() {
        let err: StepError = SessionError::StaleElement(4).into();
        assert!(matches!(err, StepError::ElementNotInteractable { .. }));
        assert!(err.is_retryable());

        let err: StepError = SessionError::Navigation("net::ERR".into()).into();
        assert!(matches!(err, StepError::Session { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_step_error_serializes_tagged() {
        let json = serde_json::to_value(StepError::ElementNotFound {
            target: "login button".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "element_not_found");
        assert_eq!(json["target"], "login button");
    }
}
