//! Step execution against a live session.
//!
//! The executor drives a parsed step list strictly in order. Each step moves
//! through `Pending → Resolving → Acting → (Succeeded | Retrying → Acting | Failed)`.
//! Every step error is caught at the step boundary and recorded in the run; only a
//! failed critical step or cancellation stops the run early.
//!
//! All waiting goes through [`Session::wait_millis`] in slices of at most the
//! configured poll interval. A cancelled token wakes whichever slice is in
//! flight.

use crate::config::{EngineConfig, LowConfidencePolicy, RetryConfig};
use crate::formatter::mask_sensitive;
use crate::run::{StepError, StepOutcome, StepResult, TestRun};
use crate::session::Session;
use crate::validator::validate_all;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Instant;
use tessel_common::protocol::{ElementNode, PageSnapshot};
use tessel_common::resolver::{ResolverOptions, resolve};
use tessel_common::scenario::{ActionKind, Assertion, Interaction, StepSpec, WaitCondition};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepPhase {
    Pending,
    Resolving,
    Acting,
    Retrying,
    Succeeded,
    Failed,
}

/// Attempt counter and backoff schedule for one step.
#[derive(Debug, Clone)]
struct RetryState {
    attempt: u32,
    max_attempts: u32,
    next_backoff_ms: u64,
    multiplier: f64,
    max_backoff_ms: u64,
}

impl RetryState {
    fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_retries.saturating_add(1),
            next_backoff_ms: config.initial_backoff_ms.min(config.max_backoff_ms),
            multiplier: config.backoff_multiplier.max(1.0),
            max_backoff_ms: config.max_backoff_ms,
        }
    }

    fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Delay before the next attempt; grows the one after it.
    fn next_backoff(&mut self) -> u64 {
        let delay = self.next_backoff_ms;
        let grown = (delay as f64 * self.multiplier).round() as u64;
        self.next_backoff_ms = grown.min(self.max_backoff_ms);
        delay
    }
}

/// Bookkeeping for the step in flight.
#[derive(Debug, Default)]
struct StepState {
    attempts: u32,
    waited_ms: u64,
    low_confidence: bool,
    matched: Option<u32>,
    warnings: Vec<String>,
}

impl StepState {
    fn warn_once(&mut self, message: String) {
        if !self.warnings.contains(&message) {
            self.warnings.push(message);
        }
    }
}

pub struct Executor<'a, S: Session + ?Sized> {
    session: &'a mut S,
    config: &'a EngineConfig,
    cancel: CancellationToken,
    scenario: String,
    pending_snapshot: Option<PageSnapshot>,
}

impl<'a, S: Session + ?Sized> Executor<'a, S> {
    pub fn new(session: &'a mut S, config: &'a EngineConfig, cancel: CancellationToken) -> Self {
        Self {
            session,
            config,
            cancel,
            scenario: "scenario".to_string(),
            pending_snapshot: None,
        }
    }

    /// Name used in the run record and screenshot labels.
    pub fn for_scenario(mut self, name: impl Into<String>) -> Self {
        self.scenario = name.into();
        self
    }

    /// Runs `steps` in order. `initial` serves the first resolution; every later
    /// one takes a fresh snapshot. Always returns a finalized run.
    pub async fn execute(&mut self, steps: &[StepSpec], initial: PageSnapshot) -> TestRun {
        let mut run = TestRun::start(self.scenario.clone());
        self.pending_snapshot = Some(initial);
        info!("Running '{}' ({} steps)", self.scenario, steps.len());

        for step in steps {
            if self.cancel.is_cancelled() {
                info!("Run '{}' cancelled before step {}", self.scenario, step.index);
                run.cancelled = true;
                break;
            }

            let result = self.execute_step(step).await;
            let cancelled = result.error == Some(StepError::Cancelled);
            let failed = result.outcome == StepOutcome::Failed;
            run.record(result);

            if cancelled {
                info!("Run '{}' cancelled during step {}", self.scenario, step.index);
                run.cancelled = true;
                break;
            }
            if failed && step.critical {
                error!(
                    "Critical step {} failed, stopping '{}'",
                    step.index, self.scenario
                );
                run.aborted_at = Some(step.index);
                break;
            }
        }

        run.finalize();
        info!(
            verdict = ?run.verdict,
            passed = run.count(StepOutcome::Success),
            failed = run.count(StepOutcome::Failed),
            "Finished '{}'",
            self.scenario
        );
        run
    }

    async fn execute_step(&mut self, step: &StepSpec) -> StepResult {
        let started = Instant::now();
        let mut state = StepState::default();
        self.enter(step, StepPhase::Pending);
        info!(
            step = step.index,
            "{} {}",
            step.action,
            self.loggable_target(step)
        );

        let outcome = match step.action {
            ActionKind::Unknown => Err(StepError::UnknownAction {
                description: step.description.clone(),
            }),
            ActionKind::Wait => self.wait_step(step, &mut state).await,
            ActionKind::Verify => self.verify_step(step, &mut state).await,
            _ => self.act_with_retry(step, &mut state).await,
        };

        let mut screenshot = None;
        match &outcome {
            Ok(()) => {
                self.enter(step, StepPhase::Succeeded);
                if self.config.waits.settle_ms > 0 {
                    // Cancellation during settling leaves the success intact.
                    let _ = self.pause(self.config.waits.settle_ms, &mut state).await;
                }
                if self.config.screenshots.on_success {
                    screenshot = self.capture(step, "success", &mut state).await;
                }
            }
            Err(StepError::Cancelled) => {}
            Err(err) => {
                self.enter(step, StepPhase::Failed);
                warn!(step = step.index, "Step failed: {}", err);
                if step.action != ActionKind::Unknown {
                    screenshot = self.capture(step, "error", &mut state).await;
                }
            }
        }

        let elapsed = (started.elapsed().as_millis() as u64).max(state.waited_ms);
        let (outcome, error) = match outcome {
            Ok(()) => (StepOutcome::Success, None),
            Err(StepError::Cancelled) => (StepOutcome::Skipped, Some(StepError::Cancelled)),
            Err(err) => (StepOutcome::Failed, Some(err)),
        };
        StepResult {
            index: step.index,
            description: step.description.clone(),
            action: step.action,
            outcome,
            attempts: state.attempts,
            elapsed_ms: elapsed,
            error,
            screenshot,
            low_confidence: state.low_confidence,
            matched: state.matched,
            warnings: state.warnings,
        }
    }

    async fn act_with_retry(
        &mut self,
        step: &StepSpec,
        state: &mut StepState,
    ) -> Result<(), StepError> {
        let budget = self.budget(step);
        let mut retry = RetryState::new(&self.config.retry);
        loop {
            state.attempts = retry.begin_attempt();
            let err = match self.attempt(step, budget, state).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            if !err.is_retryable() || retry.exhausted() {
                return Err(err);
            }
            let delay = retry.next_backoff();
            self.enter(step, StepPhase::Retrying);
            warn!(
                step = step.index,
                attempt = retry.attempt,
                "{}; retrying in {}ms",
                err,
                delay
            );
            self.pause(delay, state).await?;
        }
    }

    async fn attempt(
        &mut self,
        step: &StepSpec,
        budget: u64,
        state: &mut StepState,
    ) -> Result<(), StepError> {
        if let Some(direction) = step.scroll_direction() {
            self.enter(step, StepPhase::Acting);
            let interaction = Interaction::ScrollViewport {
                direction,
                amount: step.value.as_deref().and_then(|v| v.trim().parse().ok()),
            };
            return Ok(self.session.perform(None, &interaction).await?);
        }

        let target = step.target.as_deref().unwrap_or_default();
        self.enter(step, StepPhase::Resolving);
        let strict = step.action == ActionKind::Click;
        let element = self.locate(target, strict, budget, state).await?;
        state.matched = Some(element.id);

        self.enter(step, StepPhase::Acting);
        let interaction = interaction_for(step);
        if let Interaction::Type { text, .. } = &interaction {
            debug!(
                step = step.index,
                "Typing '{}' into element {}",
                self.loggable_value(text, target),
                element.id
            );
        }
        Ok(self.session.perform(Some(&element), &interaction).await?)
    }

    /// Polls fresh snapshots until `target` resolves or the step's wait budget
    /// runs out. At least one snapshot is always taken.
    ///
    /// A `strict` lookup never settles for a low-confidence match, whatever the
    /// configured policy says; clicks are strict.
    async fn locate(
        &mut self,
        target: &str,
        strict: bool,
        budget: u64,
        state: &mut StepState,
    ) -> Result<ElementNode, StepError> {
        let options = self.options();
        let proceed =
            !strict && self.config.resolution.low_confidence == LowConfidencePolicy::Proceed;
        loop {
            if let Some(snapshot) = self.fresh_snapshot().await? {
                let resolved = resolve(&snapshot, target, &options);
                if let Some(top) = resolved.top() {
                    if !resolved.low_confidence || proceed {
                        state.low_confidence = resolved.low_confidence;
                        if resolved.low_confidence {
                            let message = format!(
                                "low-confidence match for '{}' (score {:.2})",
                                target, top.score
                            );
                            warn!("{}", message);
                            state.warn_once(message);
                        }
                        return Ok(top.element.clone());
                    }
                    debug!(
                        "Best match for '{}' scored {:.2}, below the confidence threshold",
                        target, top.score
                    );
                }
            }

            if state.waited_ms >= budget {
                return Err(StepError::ElementNotFound {
                    target: target.to_string(),
                });
            }
            self.poll_pause(budget, state).await?;
        }
    }

    async fn wait_step(&mut self, step: &StepSpec, state: &mut StepState) -> Result<(), StepError> {
        state.attempts = 1;
        let Some(target) = step.target.as_deref() else {
            let millis = step.wait_duration_ms().unwrap_or(0);
            debug!(step = step.index, "Waiting {}ms", millis);
            return self.pause(millis, state).await;
        };

        let budget = self.budget(step);
        let options = self.options();
        loop {
            if let Some(snapshot) = self.fresh_snapshot().await? {
                let present = !resolve(&snapshot, target, &options).is_empty();
                let done = match step.wait_until {
                    WaitCondition::Appears => present,
                    WaitCondition::Disappears => !present,
                };
                if done {
                    return Ok(());
                }
            }
            if state.waited_ms >= budget {
                return Err(StepError::Timeout {
                    waited_ms: state.waited_ms,
                });
            }
            self.poll_pause(budget, state).await?;
        }
    }

    /// Polls until every assertion holds. A verify step is never retried beyond
    /// this polling.
    async fn verify_step(
        &mut self,
        step: &StepSpec,
        state: &mut StepState,
    ) -> Result<(), StepError> {
        state.attempts = 1;
        let assertions = match (&step.assertions[..], &step.target) {
            ([], Some(target)) => vec![Assertion::visible(target.clone())],
            (list, _) => list.to_vec(),
        };
        let budget = self.budget(step);
        let options = self.options();
        let mut last_detail = String::from("page could not be captured");
        loop {
            if let Some(snapshot) = self.fresh_snapshot().await? {
                let verdict = validate_all(&assertions, &snapshot, &options);
                if verdict.passed {
                    debug!(step = step.index, "Verified: {}", verdict.detail);
                    return Ok(());
                }
                last_detail = verdict.detail;
            }
            if state.waited_ms >= budget {
                return Err(StepError::ValidationFailure {
                    detail: last_detail,
                });
            }
            self.poll_pause(budget, state).await?;
        }
    }

    /// The initial snapshot once, then a fresh capture per call. Transient
    /// capture failures (mid-navigation) read as "nothing yet".
    async fn fresh_snapshot(&mut self) -> Result<Option<PageSnapshot>, StepError> {
        if let Some(snapshot) = self.pending_snapshot.take() {
            return Ok(Some(snapshot));
        }
        match self.session.snapshot().await {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) if err.is_transient() => {
                debug!("Snapshot unavailable: {}", err);
                Ok(None)
            }
            Err(err) => Err(StepError::Session {
                message: err.to_string(),
            }),
        }
    }

    /// One poll interval, trimmed so the step never waits past `budget`.
    async fn poll_pause(&mut self, budget: u64, state: &mut StepState) -> Result<(), StepError> {
        let remaining = budget.saturating_sub(state.waited_ms);
        let slice = self.config.waits.poll_interval_ms.max(1).min(remaining);
        self.pause(slice, state).await
    }

    async fn pause(&mut self, millis: u64, state: &mut StepState) -> Result<(), StepError> {
        let max_slice = self.config.waits.poll_interval_ms.max(1);
        let mut remaining = millis;
        while remaining > 0 {
            if self.cancel.is_cancelled() {
                return Err(StepError::Cancelled);
            }
            let slice = remaining.min(max_slice);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(StepError::Cancelled),
                _ = self.session.wait_millis(slice) => {}
            }
            state.waited_ms += slice;
            remaining -= slice;
        }
        Ok(())
    }

    async fn capture(
        &mut self,
        step: &StepSpec,
        kind: &str,
        state: &mut StepState,
    ) -> Option<PathBuf> {
        let label = format!(
            "{}_step_{}_{}_{}",
            file_safe(&self.scenario),
            step.index,
            kind,
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        match self.session.capture_screenshot(&label).await {
            Ok(path) => {
                info!(step = step.index, "Screenshot saved to {}", path.display());
                Some(path)
            }
            Err(err) => {
                debug!(step = step.index, "No screenshot: {}", err);
                state.warn_once(format!("screenshot unavailable: {err}"));
                None
            }
        }
    }

    fn budget(&self, step: &StepSpec) -> u64 {
        step.timeout_ms.unwrap_or(self.config.waits.default_timeout_ms)
    }

    fn options(&self) -> ResolverOptions {
        self.config.resolution.options()
    }

    fn enter(&self, step: &StepSpec, phase: StepPhase) {
        debug!(step = step.index, phase = ?phase, "{}", step.action);
    }

    fn loggable_target(&self, step: &StepSpec) -> String {
        match (&step.target, &step.value) {
            (Some(target), Some(value)) => {
                format!("'{}' <- '{}'", target, self.loggable_value(value, target))
            }
            (Some(target), None) => format!("'{target}'"),
            (None, Some(value)) => value.clone(),
            (None, None) => String::new(),
        }
    }

    fn loggable_value(&self, value: &str, target: &str) -> String {
        let security = &self.config.security;
        if security.redact_in_logs {
            mask_sensitive(value, target, &security.sensitive_fields)
        } else {
            value.to_string()
        }
    }
}

fn interaction_for(step: &StepSpec) -> Interaction {
    let value = || step.value.clone().unwrap_or_default();
    match step.action {
        ActionKind::Type => Interaction::Type {
            text: value(),
            clear: true,
        },
        ActionKind::Select => Interaction::Select { option: value() },
        ActionKind::Hover => Interaction::Hover,
        ActionKind::Scroll => Interaction::ScrollIntoView,
        _ => Interaction::Click,
    }
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_state_bounds_attempts() {
        let config = RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            max_backoff_ms: 1500,
        };
        let mut retry = RetryState::new(&config);
        let mut delays = Vec::new();
        loop {
            retry.begin_attempt();
            if retry.exhausted() {
                break;
            }
            delays.push(retry.next_backoff());
        }
        assert_eq!(retry.attempt, 3);
        assert_eq!(delays, vec![500, 1000]);
        assert_eq!(retry.next_backoff(), 1500);
        assert_eq!(retry.next_backoff(), 1500);
    }

    #[test]
    fn test_interaction_for_type_clears_first() {
        let step = StepSpec::new(0, "type", ActionKind::Type)
            .with_target("email")
            .with_value("a@b.com");
        assert_eq!(
            interaction_for(&step),
            Interaction::Type {
                text: "a@b.com".into(),
                clear: true
            }
        );
    }

    #[test]
    fn test_file_safe_labels() {
        assert_eq!(file_safe("Login: happy path"), "Login__happy_path");
    }
}
