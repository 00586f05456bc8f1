use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tessel_engine::config::{EngineConfig, LowConfidencePolicy};
use tessel_engine::executor::Executor;
use tessel_engine::protocol::{ElementNode, PageSnapshot};
use tessel_engine::run::{StepError, StepOutcome, TestRun, Verdict};
use tessel_engine::scenario::{
    ActionKind, Interaction, ScenarioDefinition, ScrollDirection, StepSpec,
};
use tessel_engine::session::{Session, SessionError};
use tokio_util::sync::CancellationToken;

/// Scripted session: hands out snapshots in order (repeating the last one),
/// records interactions and keeps a virtual clock.
#[derive(Default)]
struct MockSession {
    snapshots: Vec<PageSnapshot>,
    performed: Vec<(Option<u32>, Interaction)>,
    fail_perform: bool,
    /// Reports this element as detached the first time it is acted on.
    stale_once: Option<u32>,
    /// Waits never finish on their own.
    hang_waits: bool,
    clock_ms: u64,
    cancel_on_perform: Option<(usize, CancellationToken)>,
    cancel_at_ms: Option<(u64, CancellationToken)>,
    screenshots: Vec<String>,
}

impl MockSession {
    fn with_page(page: PageSnapshot) -> Self {
        Self {
            snapshots: vec![page],
            ..Default::default()
        }
    }
}

#[async_trait]
impl Session for MockSession {
    async fn navigate(&mut self, _url: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, SessionError> {
        if self.snapshots.len() > 1 {
            Ok(self.snapshots.remove(0))
        } else {
            self.snapshots.first().cloned().ok_or(SessionError::NotReady)
        }
    }

    async fn perform(
        &mut self,
        element: Option<&ElementNode>,
        interaction: &Interaction,
    ) -> Result<(), SessionError> {
        self.performed.push((element.map(|e| e.id), interaction.clone()));
        if let Some((n, flag)) = &self.cancel_on_perform
            && self.performed.len() == *n
        {
            flag.cancel();
        }
        if let Some(id) = element.map(|e| e.id)
            && self.stale_once == Some(id)
        {
            self.stale_once = None;
            return Err(SessionError::StaleElement(id));
        }
        if self.fail_perform {
            return Err(SessionError::NotInteractable {
                id: element.map(|e| e.id).unwrap_or_default(),
                reason: "covered by overlay".into(),
            });
        }
        Ok(())
    }

    async fn capture_screenshot(&mut self, label: &str) -> Result<PathBuf, SessionError> {
        self.screenshots.push(label.to_string());
        Ok(PathBuf::from(format!("/tmp/{label}.png")))
    }

    async fn wait_millis(&mut self, millis: u64) {
        if self.hang_waits {
            std::future::pending::<()>().await;
        }
        self.clock_ms += millis;
        if let Some((at, flag)) = &self.cancel_at_ms
            && self.clock_ms >= *at
        {
            flag.cancel();
        }
    }
}

fn login_page() -> PageSnapshot {
    PageSnapshot::new(
        "https://example.com/login",
        vec![
            ElementNode::new(1, "body"),
            ElementNode::new(2, "form").with_parent(1, 1),
            ElementNode::new(3, "label")
                .with_parent(2, 2)
                .with_text("Email")
                .with_attr("for", "email"),
            ElementNode::new(4, "input")
                .with_parent(2, 2)
                .with_attr("id", "email")
                .with_attr("type", "email"),
            ElementNode::new(5, "input")
                .with_parent(2, 2)
                .with_attr("name", "password")
                .with_attr("type", "password"),
            ElementNode::new(6, "button")
                .with_parent(2, 2)
                .with_attr("type", "submit")
                .with_text("Log in"),
        ],
    )
}

/// The same page re-rendered with every element id shifted by `offset`.
fn renumbered(page: PageSnapshot, offset: u32) -> PageSnapshot {
    let elements = page
        .elements
        .into_iter()
        .map(|mut e| {
            e.id += offset;
            e.parent = e.parent.map(|p| p + offset);
            e
        })
        .collect();
    PageSnapshot::new(page.url, elements)
}

fn steps(phrases: &[&str]) -> Vec<StepSpec> {
    let definition = phrases
        .iter()
        .fold(ScenarioDefinition::new("test"), |d, p| d.phrase(*p));
    tessel_parser::parse(&definition).unwrap()
}

async fn execute(session: &mut MockSession, config: &EngineConfig, steps: &[StepSpec]) -> TestRun {
    let initial = session.snapshot().await.unwrap();
    Executor::new(session, config, CancellationToken::new())
        .for_scenario("login")
        .execute(steps, initial)
        .await
}

#[tokio::test]
async fn test_login_with_missing_dashboard() {
    let mut session = MockSession::with_page(login_page());
    let config = EngineConfig::default();
    let steps = steps(&[
        "type \"a@b.com\" into email field",
        "type \"x\" into password field",
        "click submit button",
        "verify dashboard appears",
    ]);

    let run = execute(&mut session, &config, &steps).await;

    assert_eq!(run.verdict, Verdict::Fail);
    assert_eq!(run.results.len(), 4);
    assert_eq!(run.count(StepOutcome::Success), 3);
    assert_eq!(run.count(StepOutcome::Failed), 1);
    assert_eq!(run.results[3].outcome, StepOutcome::Failed);
    assert!(matches!(
        run.results[3].error,
        Some(StepError::ValidationFailure { .. })
    ));
    assert!(run.results[3].screenshot.is_some());

    assert_eq!(
        session.performed,
        vec![
            (
                Some(4),
                Interaction::Type {
                    text: "a@b.com".into(),
                    clear: true
                }
            ),
            (
                Some(5),
                Interaction::Type {
                    text: "x".into(),
                    clear: true
                }
            ),
            (Some(6), Interaction::Click),
        ]
    );
    assert_eq!(run.results[2].matched, Some(6));
}

#[tokio::test]
async fn test_failing_action_attempted_retry_bound_plus_one() {
    for max_retries in [0, 2, 4] {
        let mut session = MockSession::with_page(login_page());
        session.fail_perform = true;
        let mut config = EngineConfig::default();
        config.retry.max_retries = max_retries;

        let run = execute(&mut session, &config, &steps(&["click submit button"])).await;

        let result = &run.results[0];
        assert_eq!(result.outcome, StepOutcome::Failed);
        assert_eq!(result.attempts, max_retries + 1);
        assert_eq!(session.performed.len(), (max_retries + 1) as usize);
        assert!(matches!(
            result.error,
            Some(StepError::ElementNotInteractable { .. })
        ));
    }
}

#[tokio::test]
async fn test_backoff_waits_grow() {
    let mut session = MockSession::with_page(login_page());
    session.fail_perform = true;
    let config = EngineConfig::default();

    execute(&mut session, &config, &steps(&["click submit button"])).await;

    // 500ms then 1000ms between the three attempts.
    assert_eq!(session.clock_ms, 1500);
}

#[tokio::test]
async fn test_click_without_match_is_element_not_found() {
    let mut session = MockSession::with_page(login_page());
    let config = EngineConfig::default();

    let run = execute(&mut session, &config, &steps(&["click the shopping cart icon"])).await;

    let result = &run.results[0];
    assert_eq!(result.outcome, StepOutcome::Failed);
    assert!(matches!(
        &result.error,
        Some(StepError::ElementNotFound { target }) if target == "the shopping cart icon"
    ));
    assert!(session.performed.is_empty());
    assert!(session.clock_ms >= config.waits.default_timeout_ms);
}

#[tokio::test]
async fn test_stale_element_is_re_resolved_on_retry() {
    let mut session = MockSession {
        snapshots: vec![login_page(), renumbered(login_page(), 10)],
        stale_once: Some(6),
        ..Default::default()
    };
    let config = EngineConfig::default();

    let run = execute(&mut session, &config, &steps(&["click submit button"])).await;

    let result = &run.results[0];
    assert_eq!(result.outcome, StepOutcome::Success);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.matched, Some(16));
    assert_eq!(
        session.performed,
        vec![(Some(6), Interaction::Click), (Some(16), Interaction::Click)]
    );
}

#[tokio::test]
async fn test_element_appearing_late_is_found_by_polling() {
    let loading = PageSnapshot::new("https://example.com", vec![ElementNode::new(1, "body")]);
    let mut session = MockSession {
        snapshots: vec![loading.clone(), loading, login_page()],
        ..Default::default()
    };
    let config = EngineConfig::default();

    let run = execute(&mut session, &config, &steps(&["click submit button"])).await;

    assert_eq!(run.results[0].outcome, StepOutcome::Success);
    assert_eq!(run.results[0].attempts, 1);
    assert_eq!(session.performed, vec![(Some(6), Interaction::Click)]);
    assert_eq!(session.clock_ms, 2 * config.waits.poll_interval_ms);
}

#[tokio::test]
async fn test_cancel_after_step_keeps_its_result() {
    let mut session = MockSession::with_page(login_page());
    let cancel = CancellationToken::new();
    session.cancel_on_perform = Some((2, cancel.clone()));
    let config = EngineConfig::default();
    let steps = steps(&[
        "click submit button",
        "click submit button",
        "click submit button",
        "click submit button",
    ]);

    let initial = session.snapshot().await.unwrap();
    let run = Executor::new(&mut session, &config, cancel)
        .execute(&steps, initial)
        .await;

    assert!(run.cancelled);
    assert_eq!(run.results.len(), 2);
    assert!(run.results.iter().all(|r| r.outcome == StepOutcome::Success));
    assert_eq!(run.verdict, Verdict::Fail);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_cancel_during_wait_is_checked_each_slice() {
    let mut session = MockSession::with_page(login_page());
    let cancel = CancellationToken::new();
    session.cancel_at_ms = Some((1000, cancel.clone()));
    let config = EngineConfig::default();
    let steps = steps(&["wait for 30 seconds", "click submit button"]);

    let initial = session.snapshot().await.unwrap();
    let run = Executor::new(&mut session, &config, cancel)
        .execute(&steps, initial)
        .await;

    assert!(run.cancelled);
    assert_eq!(run.results.len(), 1);
    assert_eq!(run.results[0].outcome, StepOutcome::Skipped);
    assert_eq!(run.results[0].error, Some(StepError::Cancelled));
    assert_eq!(session.clock_ms, 1000);
    assert!(session.performed.is_empty());
}

#[tokio::test]
async fn test_cancel_wakes_a_wait_in_flight() {
    let mut session = MockSession::with_page(login_page());
    session.hang_waits = true;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let config = EngineConfig::default();
    let steps = steps(&["wait for 5 seconds", "click submit button"]);

    let initial = session.snapshot().await.unwrap();
    let run = tokio::time::timeout(
        Duration::from_secs(5),
        Executor::new(&mut session, &config, cancel).execute(&steps, initial),
    )
    .await
    .expect("cancellation should end the wait");

    assert!(run.cancelled);
    assert_eq!(run.results.len(), 1);
    assert_eq!(run.results[0].error, Some(StepError::Cancelled));
    assert!(session.performed.is_empty());
}

#[tokio::test]
async fn test_critical_failure_stops_the_run() {
    let mut session = MockSession::with_page(login_page());
    let config = EngineConfig::default();
    let steps = vec![
        StepSpec::new(0, "click submit button", ActionKind::Click).with_target("submit button"),
        StepSpec::new(1, "click checkout", ActionKind::Click)
            .with_target("checkout")
            .with_timeout(500)
            .critical(),
        StepSpec::new(2, "click submit button", ActionKind::Click).with_target("submit button"),
    ];

    let run = execute(&mut session, &config, &steps).await;

    assert_eq!(run.aborted_at, Some(1));
    assert_eq!(run.results.len(), 2);
    assert_eq!(run.results[1].outcome, StepOutcome::Failed);
    assert_eq!(session.performed.len(), 1);
}

#[tokio::test]
async fn test_non_critical_failure_continues() {
    let mut session = MockSession::with_page(login_page());
    let config = EngineConfig::default();
    let steps = steps(&["dance wildly", "click submit button"]);

    let run = execute(&mut session, &config, &steps).await;

    assert_eq!(run.results.len(), 2);
    assert!(matches!(
        run.results[0].error,
        Some(StepError::UnknownAction { .. })
    ));
    assert_eq!(run.results[0].attempts, 0);
    assert_eq!(run.results[1].outcome, StepOutcome::Success);
    assert_eq!(session.performed, vec![(Some(6), Interaction::Click)]);
    // Unknown steps are never executed, so nothing to capture.
    assert!(session.screenshots.is_empty());
}

#[tokio::test]
async fn test_fixed_wait_uses_virtual_clock() {
    let mut session = MockSession::with_page(login_page());
    let config = EngineConfig::default();

    let run = execute(&mut session, &config, &steps(&["wait for 3 seconds"])).await;

    assert_eq!(run.results[0].outcome, StepOutcome::Success);
    assert_eq!(session.clock_ms, 3000);
    assert_eq!(run.results[0].elapsed_ms, 3000);
}

#[tokio::test]
async fn test_wait_for_disappearance_times_out() {
    let page = PageSnapshot::new(
        "https://example.com",
        vec![ElementNode::new(1, "div").with_attr("class", "spinner")],
    );
    let mut session = MockSession::with_page(page);
    let config = EngineConfig::default();

    let run = execute(
        &mut session,
        &config,
        &steps(&["wait up to 1 seconds for css(.spinner) to disappear"]),
    )
    .await;

    assert_eq!(
        run.results[0].error,
        Some(StepError::Timeout { waited_ms: 1000 })
    );
}

#[tokio::test]
async fn test_wait_for_disappearance_succeeds() {
    let busy = PageSnapshot::new(
        "https://example.com",
        vec![ElementNode::new(1, "div").with_attr("class", "spinner")],
    );
    let idle = PageSnapshot::new("https://example.com", vec![ElementNode::new(1, "div")]);
    let mut session = MockSession {
        snapshots: vec![busy.clone(), busy, idle],
        ..Default::default()
    };
    let config = EngineConfig::default();

    let run = execute(
        &mut session,
        &config,
        &steps(&["wait until css(.spinner) disappears"]),
    )
    .await;

    assert_eq!(run.results[0].outcome, StepOutcome::Success);
}

#[tokio::test]
async fn test_low_confidence_policy() {
    let page = PageSnapshot::new(
        "https://example.com",
        vec![ElementNode::new(1, "div").with_text("Welcome to the members dashboard area today")],
    );

    // Clicks never settle for a weak match, even under the default policy.
    let mut session = MockSession::with_page(page.clone());
    let config = EngineConfig::default();
    let run = execute(&mut session, &config, &steps(&["click dashboard"])).await;
    let result = &run.results[0];
    assert_eq!(result.outcome, StepOutcome::Failed);
    assert!(matches!(
        &result.error,
        Some(StepError::ElementNotFound { target }) if target == "dashboard"
    ));
    assert!(!result.low_confidence);
    assert!(session.performed.is_empty());

    let mut session = MockSession::with_page(page.clone());
    let run = execute(&mut session, &config, &steps(&["hover over dashboard"])).await;
    let result = &run.results[0];
    assert_eq!(result.outcome, StepOutcome::Success);
    assert!(result.low_confidence);
    assert!(result.warnings.iter().any(|w| w.contains("low-confidence")));
    assert_eq!(session.performed, vec![(Some(1), Interaction::Hover)]);

    let mut session = MockSession::with_page(page);
    let mut config = EngineConfig::default();
    config.resolution.low_confidence = LowConfidencePolicy::Fail;
    config.waits.default_timeout_ms = 500;
    let run = execute(&mut session, &config, &steps(&["hover over dashboard"])).await;
    assert!(matches!(
        run.results[0].error,
        Some(StepError::ElementNotFound { .. })
    ));
    assert!(session.performed.is_empty());
}

#[tokio::test]
async fn test_viewport_scroll_needs_no_element() {
    let mut session = MockSession::with_page(PageSnapshot::default());
    let config = EngineConfig::default();

    let run = execute(&mut session, &config, &steps(&["scroll down till end"])).await;

    assert!(run.passed());
    assert_eq!(
        session.performed,
        vec![(
            None,
            Interaction::ScrollViewport {
                direction: ScrollDirection::Bottom,
                amount: None
            }
        )]
    );
}

#[tokio::test]
async fn test_screenshots_on_success_when_enabled() {
    let mut session = MockSession::with_page(login_page());
    let mut config = EngineConfig::default();
    config.screenshots.on_success = true;

    let run = execute(&mut session, &config, &steps(&["click submit button"])).await;

    assert!(run.passed());
    assert_eq!(session.screenshots.len(), 1);
    assert!(session.screenshots[0].starts_with("login_step_0_success_"));
}
