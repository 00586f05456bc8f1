use crate::analyzer::StructureReport;
use crate::run::{StepOutcome, TestRun};

const MASK: &str = "••••••••";

/// Human-readable summary of a finished run.
pub fn format_run(run: &TestRun) -> String {
    let status = if run.passed() { "PASS" } else { "FAIL" };
    let mut output = format!(
        "{} {} ({} passed, {} failed, {} skipped)",
        status,
        run.scenario,
        run.count(StepOutcome::Success),
        run.count(StepOutcome::Failed),
        run.count(StepOutcome::Skipped),
    );
    if let Some(ms) = run.duration_ms() {
        output.push_str(&format!(" in {ms}ms"));
    }

    for result in &run.results {
        let mark = match result.outcome {
            StepOutcome::Success => "✓",
            StepOutcome::Failed => "✗",
            StepOutcome::Skipped => "-",
        };
        output.push_str(&format!(
            "\n  {} [{}] {}",
            mark, result.index, result.description
        ));
        if result.attempts > 1 {
            output.push_str(&format!(" ({} attempts)", result.attempts));
        }
        if result.low_confidence {
            output.push_str(" (low confidence)");
        }
        if let Some(err) = &result.error {
            output.push_str(&format!("\n      {}", err));
        }
        for warning in &result.warnings {
            output.push_str(&format!("\n      warning: {}", warning));
        }
        if let Some(path) = &result.screenshot {
            output.push_str(&format!("\n      screenshot: {}", path.display()));
        }
    }

    if run.cancelled {
        output.push_str("\nRun cancelled.");
    }
    if let Some(index) = run.aborted_at {
        output.push_str(&format!("\nStopped at critical step {}.", index));
    }
    output
}

pub fn format_report(report: &StructureReport) -> String {
    let mut output = format!("URL: {}", report.url);
    if !report.title.is_empty() {
        output.push_str(&format!("\nTitle: {}", report.title));
    }

    if !report.forms.is_empty() {
        output.push_str("\n\nForms:");
        for form in &report.forms {
            output.push_str(&format!(
                "\n- {} ({} {} inputs, method {})",
                form.display_name(),
                form.selector,
                form.inputs.len(),
                form.method.to_uppercase()
            ));
            for input in &form.inputs {
                let required = if input.required { " *" } else { "" };
                output.push_str(&format!(
                    "\n    {} [{}]{}",
                    input.label.as_deref().unwrap_or(&input.selector),
                    input.input_type,
                    required
                ));
            }
        }
    }

    if !report.navigation.is_empty() {
        output.push_str("\n\nNavigation:");
        for group in &report.navigation {
            output.push_str(&format!("\n- {:?} ({} links)", group.nav_type, group.items.len()));
        }
    }

    if !report.dynamic.is_empty() {
        output.push_str("\n\nDynamic content:");
        for signal in &report.dynamic {
            output.push_str(&format!("\n- {:?}: {}", signal.kind, signal.evidence.join(", ")));
        }
    }

    let features: Vec<&str> = [
        report.features.has_search.then_some("Search"),
        report.features.has_pagination.then_some("Pagination"),
        report.features.has_filters.then_some("Filters"),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !features.is_empty() {
        output.push_str(&format!("\n\nFeatures: {}", features.join(", ")));
    }

    if !report.suggested.is_empty() {
        output.push_str("\n\nSuggested scenarios:");
        for scenario in &report.suggested {
            output.push_str(&format!("\n- {} ({} steps)", scenario.name, scenario.steps.len()));
        }
    }
    output
}

/// Masks `value` when `field_name` mentions a sensitive field.
pub fn mask_sensitive(value: &str, field_name: &str, sensitive_fields: &[String]) -> String {
    let default_sensitive = ["password", "secret", "token", "cvv", "ssn", "card_number"];
    let name = field_name.to_lowercase();

    let is_sensitive = sensitive_fields
        .iter()
        .any(|f| !f.is_empty() && name.contains(&f.to_lowercase()))
        || default_sensitive.iter().any(|f| name.contains(*f));

    if is_sensitive {
        MASK.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{StepError, StepResult};
    use tessel_common::scenario::ActionKind;

    #[test]
    fn test_mask_sensitive() {
        let fields = vec!["pin".to_string()];
        assert_eq!(mask_sensitive("hunter2", "password field", &fields), MASK);
        assert_eq!(mask_sensitive("1234", "the PIN box", &fields), MASK);
        assert_eq!(mask_sensitive("a@b.com", "email field", &fields), "a@b.com");
    }

    #[test]
    fn test_format_run_lists_failures() {
        let mut run = TestRun::start("login");
        run.record(StepResult {
            index: 0,
            description: "click the login button".into(),
            action: ActionKind::Click,
            outcome: StepOutcome::Failed,
            attempts: 3,
            elapsed_ms: 10,
            error: Some(StepError::ElementNotFound {
                target: "the login button".into(),
            }),
            screenshot: None,
            low_confidence: false,
            matched: None,
            warnings: Vec::new(),
        });
        run.finalize();

        let text = format_run(&run);
        assert!(text.starts_with("FAIL login (0 passed, 1 failed, 0 skipped)"));
        assert!(text.contains("(3 attempts)"));
        assert!(text.contains("No element matches 'the login button'"));
    }
}
