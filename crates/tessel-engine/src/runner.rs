//! Scoped scenario runs: parse, acquire the session, execute, release.

use crate::config::EngineConfig;
use crate::executor::Executor;
use crate::run::TestRun;
use crate::session::Session;
use futures::FutureExt;
use futures::future::join_all;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tessel_common::error::SessionError;
use tessel_common::scenario::{ScenarioDefinition, StepSpec};
use tessel_parser::ScenarioDefinitionError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Invalid scenario: {0}")]
    Definition(#[from] ScenarioDefinitionError),

    #[error("Failed to start browser session: {0}")]
    Launch(SessionError),

    #[error("Failed to open page: {0}")]
    Navigation(SessionError),

    #[error("Run aborted by a panic: {0}")]
    Panicked(String),
}

#[derive(Debug)]
pub struct ScenarioOutcome {
    pub scenario: String,
    pub result: Result<TestRun, RunnerError>,
}

/// Runs one scenario on `session` against `url`.
///
/// The definition is parsed before the session is touched, so definition errors
/// never launch a browser. Once launched, the session is closed on every exit
/// path, including navigation failures and panics inside execution.
pub async fn run_scenario<S: Session + ?Sized>(
    session: &mut S,
    url: &str,
    definition: &ScenarioDefinition,
    config: &EngineConfig,
    cancel: CancellationToken,
) -> Result<TestRun, RunnerError> {
    let steps = tessel_parser::parse(definition)?;

    if let Err(e) = session.launch().await {
        release(session, &definition.name).await;
        return Err(RunnerError::Launch(e));
    }
    info!("Session started for '{}'", definition.name);

    let outcome = AssertUnwindSafe(drive(
        &mut *session,
        url,
        &steps,
        definition,
        config,
        cancel,
    ))
    .catch_unwind()
    .await;

    release(session, &definition.name).await;

    match outcome {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("Run '{}' panicked: {}", definition.name, message);
            Err(RunnerError::Panicked(message))
        }
    }
}

async fn drive<S: Session + ?Sized>(
    session: &mut S,
    url: &str,
    steps: &[StepSpec],
    definition: &ScenarioDefinition,
    config: &EngineConfig,
    cancel: CancellationToken,
) -> Result<TestRun, RunnerError> {
    session.navigate(url).await.map_err(RunnerError::Navigation)?;
    let initial = session.snapshot().await.map_err(RunnerError::Navigation)?;

    let mut executor = Executor::new(session, config, cancel).for_scenario(&definition.name);
    Ok(executor.execute(steps, initial).await)
}

async fn release<S: Session + ?Sized>(session: &mut S, scenario: &str) {
    match session.close().await {
        Ok(()) => info!("Session closed for '{}'", scenario),
        Err(e) => warn!("Failed to close session for '{}': {}", scenario, e),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs every definition, each on its own session from `new_session`.
///
/// With `parallel` the runs progress concurrently; they share only `config`.
/// Each run gets a child of `cancel`, so cancelling the suite reaches every run.
/// Outcomes come back in definition order.
pub async fn run_suite<S, F>(
    definitions: &[ScenarioDefinition],
    url: &str,
    config: &EngineConfig,
    cancel: &CancellationToken,
    parallel: bool,
    mut new_session: F,
) -> Vec<ScenarioOutcome>
where
    S: Session,
    F: FnMut() -> S,
{
    let runs = definitions.iter().map(|definition| {
        let mut session = new_session();
        let cancel = cancel.child_token();
        async move {
            let result = run_scenario(&mut session, url, definition, config, cancel).await;
            ScenarioOutcome {
                scenario: definition.name.clone(),
                result,
            }
        }
    });

    if parallel {
        join_all(runs).await
    } else {
        let mut outcomes = Vec::with_capacity(definitions.len());
        for run in runs {
            if cancel.is_cancelled() {
                break;
            }
            outcomes.push(run.await);
        }
        outcomes
    }
}
