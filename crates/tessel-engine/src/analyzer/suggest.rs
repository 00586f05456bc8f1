//! Deterministic scenario suggestions, written as free-text steps so they read
//! like hand-authored scenarios and go through the same parser.

use super::{DynamicKind, DynamicSignal, FormInfo, FormInput, NavGroup, NavType, StructureReport};
use tessel_common::scenario::ScenarioDefinition;

const MAX_NAV_LINKS: usize = 5;
const FORM_SETTLE: &str = "wait for 2 seconds";

pub(super) fn suggest(report: &StructureReport) -> Vec<ScenarioDefinition> {
    let mut out = Vec::new();
    for form in &report.forms {
        out.push(form_scenario(form));
    }
    for group in &report.navigation {
        out.push(nav_scenario(group));
    }
    for signal in &report.dynamic {
        out.push(dynamic_scenario(signal));
    }
    out
}

fn form_scenario(form: &FormInfo) -> ScenarioDefinition {
    let mut scenario =
        ScenarioDefinition::new(format!("Form Submission Test: {}", form.display_name()))
            .with_description("Fill every field with valid sample data and submit")
            .with_tag("form")
            .phrase(FORM_SETTLE);

    for input in &form.inputs {
        match input.input_type.as_str() {
            "checkbox" | "radio" => {
                if input.required {
                    scenario = scenario.phrase(format!("click css({})", input.selector));
                }
            }
            // Options are unknown until the page is live.
            "select" | "hidden" | "file" => {}
            _ => {
                scenario = scenario.phrase(format!(
                    "type \"{}\" into css({})",
                    sample_value(input),
                    input.selector
                ));
            }
        }
    }

    if let Some(submit) = &form.submit {
        scenario = scenario.phrase(format!("click css({})", submit.selector));
    }
    scenario
        .phrase(FORM_SETTLE)
        .phrase("verify that success message appears")
}

fn sample_value(input: &FormInput) -> String {
    let base = match input.input_type.as_str() {
        "email" => "test@example.com",
        "password" => "Test123!",
        "tel" => "5551234567",
        "url" => "https://example.com",
        "number" | "range" => input.validation.min.as_deref().unwrap_or("1"),
        "date" => "2024-01-01",
        "search" => "test",
        "textarea" => "This is a test message",
        _ => "test",
    };
    let mut value = base.to_string();
    if let Some(min) = input.validation.min_length {
        while value.chars().count() < min {
            value.push('x');
        }
    }
    if let Some(max) = input.validation.max_length {
        value = value.chars().take(max).collect();
    }
    value.replace('"', "'")
}

fn nav_scenario(group: &NavGroup) -> ScenarioDefinition {
    let kind = match group.nav_type {
        NavType::Primary => "primary",
        NavType::Footer => "footer",
        NavType::Breadcrumb => "breadcrumb",
    };
    let mut scenario = ScenarioDefinition::new(format!("Navigation Flow Test: {kind}"))
        .with_description("Follow each navigation link")
        .with_tag("navigation");
    for item in group.items.iter().take(MAX_NAV_LINKS) {
        let text = item.text.replace('"', "'");
        scenario = scenario
            .phrase(format!("click \"{text}\""))
            .phrase("wait for 2 seconds");
    }
    scenario
}

fn dynamic_scenario(signal: &DynamicSignal) -> ScenarioDefinition {
    let growth = signal
        .item_selector
        .as_ref()
        .map(|sel| format!("verify at least {} css({sel})", signal.item_count + 1));

    match signal.kind {
        DynamicKind::InfiniteScroll => {
            let scenario = ScenarioDefinition::new("Infinite Scroll Test")
                .with_description("Scroll to the end and check that more content loads")
                .with_tag("dynamic")
                .phrase("scroll down till end")
                .phrase("wait for 2 seconds");
            match growth {
                Some(step) => scenario.phrase(step),
                None => scenario.phrase("scroll down till end"),
            }
        }
        DynamicKind::LoadMore => {
            let trigger = match &signal.selector {
                Some(sel) => format!("click css({sel})"),
                None => format!(
                    "click \"{}\"",
                    signal.label.as_deref().unwrap_or("Load More")
                ),
            };
            let scenario = ScenarioDefinition::new("Load More Test")
                .with_description("Trigger the load-more control and check that more content loads")
                .with_tag("dynamic")
                .phrase(trigger)
                .phrase("wait for 2 seconds");
            match growth {
                Some(step) => scenario.phrase(step),
                None => scenario,
            }
        }
        DynamicKind::AutoRefresh => {
            let scenario = ScenarioDefinition::new("Auto Refresh Test")
                .with_description("Let the page refresh itself and check it is still intact")
                .with_tag("dynamic")
                .phrase("wait for 5 seconds");
            match &signal.selector {
                Some(sel) => scenario.phrase(format!("verify css({sel}) is visible")),
                None => scenario,
            }
        }
    }
}
