//! Structured step records.

use crate::error::ScenarioDefinitionError;
use serde_json::Value;
use tessel_common::scenario::{
    ActionKind, Assertion, AssertionDefinition, AssertionKind, Locator, MatchMode, StepSpec,
    StructuredStep, WaitCondition,
};

pub fn parse_structured(
    index: usize,
    record: &StructuredStep,
) -> Result<StepSpec, ScenarioDefinitionError> {
    let description = record
        .description
        .clone()
        .unwrap_or_else(|| render(record));

    let Some(action) = ActionKind::from_name(&record.action) else {
        return Ok(StepSpec::unknown(index, description));
    };

    let mut step = StepSpec::new(index, description, action);
    step.critical = record.critical;
    step.target = record
        .target
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from);
    step.value = scalar_value(index, action, record.value.as_ref())?;
    step.timeout_ms = record
        .timeout
        .as_ref()
        .map(|t| parse_timeout(index, t))
        .transpose()?;

    if let Some(until) = &record.wait_until {
        step.wait_until = parse_wait_condition(index, action, until)?;
    }

    for def in &record.assertions {
        let assertion = parse_assertion(index, def, step.target.as_deref())?;
        step.assertions.push(assertion);
    }

    match action {
        ActionKind::Type | ActionKind::Select if step.value.is_none() => {
            return Err(ScenarioDefinitionError::MissingValue { index, action });
        }
        ActionKind::Type | ActionKind::Select | ActionKind::Click | ActionKind::Hover
        | ActionKind::Scroll
            if step.target.is_none() =>
        {
            return Err(ScenarioDefinitionError::MissingTarget { index, action });
        }
        ActionKind::Verify if step.target.is_none() && step.assertions.is_empty() => {
            return Err(ScenarioDefinitionError::MissingTarget { index, action });
        }
        ActionKind::Wait => check_wait(index, &mut step)?,
        _ => {}
    }

    if action == ActionKind::Verify && step.assertions.is_empty() {
        let target = step.target.clone().unwrap_or_default();
        let assertion = match &step.value {
            Some(expected) => {
                Assertion::text(Locator::for_target(target), expected, MatchMode::Contains)
            }
            None => Assertion::visible(target),
        };
        step.assertions.push(assertion);
    }

    Ok(step)
}

fn render(record: &StructuredStep) -> String {
    let mut out = record.action.clone();
    if let Some(value) = &record.value {
        match value {
            Value::String(s) => out.push_str(&format!(" \"{s}\"")),
            other => out.push_str(&format!(" {other}")),
        }
    }
    if let Some(target) = &record.target {
        out.push(' ');
        out.push_str(target);
    }
    out
}

fn scalar_value(
    index: usize,
    action: ActionKind,
    value: Option<&Value>,
) -> Result<Option<String>, ScenarioDefinitionError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(ScenarioDefinitionError::InvalidValue {
            index,
            action,
            reason: format!("expected a scalar, got {other}"),
        }),
    }
}

/// Accepts seconds as a number or string, or strings with `s`/`ms` suffixes.
pub fn parse_timeout(index: usize, raw: &Value) -> Result<u64, ScenarioDefinitionError> {
    let invalid = || ScenarioDefinitionError::InvalidTimeout {
        index,
        raw: raw.to_string(),
    };
    let millis = match raw {
        Value::Number(n) => n.as_f64().map(|secs| secs * 1000.0),
        Value::String(s) => parse_duration_str(s),
        _ => None,
    }
    .ok_or_else(invalid)?;

    if !millis.is_finite() || millis < 0.0 {
        return Err(invalid());
    }
    Ok(millis.round() as u64)
}

fn parse_duration_str(s: &str) -> Option<f64> {
    let s = s.trim().to_ascii_lowercase();
    let (number, scale) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1.0)
    } else if let Some(n) = s
        .strip_suffix("seconds")
        .or_else(|| s.strip_suffix("second"))
        .or_else(|| s.strip_suffix("secs"))
        .or_else(|| s.strip_suffix("sec"))
        .or_else(|| s.strip_suffix('s'))
    {
        (n, 1000.0)
    } else {
        (s.as_str(), 1000.0)
    };
    number.trim().parse::<f64>().ok().map(|n| n * scale)
}

fn parse_wait_condition(
    index: usize,
    action: ActionKind,
    raw: &str,
) -> Result<WaitCondition, ScenarioDefinitionError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "appears" | "appear" | "visible" | "present" => Ok(WaitCondition::Appears),
        "disappears" | "disappear" | "hidden" | "gone" => Ok(WaitCondition::Disappears),
        other => Err(ScenarioDefinitionError::InvalidValue {
            index,
            action,
            reason: format!("unknown wait condition '{other}'"),
        }),
    }
}

/// A wait needs seconds to pause for, or a target to poll.
fn check_wait(index: usize, step: &mut StepSpec) -> Result<(), ScenarioDefinitionError> {
    match (&step.target, &step.value) {
        (None, None) => Err(ScenarioDefinitionError::MissingValue {
            index,
            action: ActionKind::Wait,
        }),
        (None, Some(_)) if step.wait_duration_ms().is_none() => {
            Err(ScenarioDefinitionError::InvalidValue {
                index,
                action: ActionKind::Wait,
                reason: "expected a number of seconds".into(),
            })
        }
        (Some(_), Some(_)) if step.timeout_ms.is_none() => {
            // A value on a target wait is its bound in seconds.
            let bound = step.wait_duration_ms().ok_or_else(|| {
                ScenarioDefinitionError::InvalidValue {
                    index,
                    action: ActionKind::Wait,
                    reason: "expected a number of seconds".into(),
                }
            })?;
            step.timeout_ms = Some(bound);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn parse_assertion(
    index: usize,
    def: &AssertionDefinition,
    step_target: Option<&str>,
) -> Result<Assertion, ScenarioDefinitionError> {
    let invalid = |reason: String| ScenarioDefinitionError::InvalidAssertion { index, reason };

    let locator = match (&def.selector, &def.target) {
        (Some(sel), _) => Some(Locator::Selector(sel.clone())),
        (None, Some(t)) => Some(Locator::for_target(t.clone())),
        (None, None) => step_target.map(|t| Locator::for_target(t.to_string())),
    };

    let kind = def.kind.trim().to_ascii_lowercase();
    match kind.as_str() {
        "element_visible" | "visible" => Ok(Assertion {
            kind: AssertionKind::ElementVisible,
            locator: locator.ok_or_else(|| invalid("element_visible needs a target".into()))?,
        }),
        "text_present" | "text" | "contains" => {
            let expected = def
                .expected
                .clone()
                .ok_or_else(|| invalid("text_present needs 'expected'".into()))?;
            Ok(Assertion::text(
                locator.unwrap_or(Locator::Page),
                expected,
                def.mode.unwrap_or_default(),
            ))
        }
        "minimum_elements" | "min_count" | "count" => {
            let count = match &def.count {
                Some(Value::Number(n)) => n.as_u64(),
                Some(Value::String(s)) => s.trim().parse().ok(),
                _ => None,
            }
            .ok_or_else(|| {
                invalid("minimum_elements needs a non-negative integer 'count'".into())
            })?;
            Ok(Assertion {
                kind: AssertionKind::MinimumCount {
                    count: count as usize,
                },
                locator: locator
                    .ok_or_else(|| invalid("minimum_elements needs a target".into()))?,
            })
        }
        other => Err(invalid(format!("unknown assertion type '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timeout_forms() {
        assert_eq!(parse_timeout(0, &json!(5)).unwrap(), 5000);
        assert_eq!(parse_timeout(0, &json!(1.5)).unwrap(), 1500);
        assert_eq!(parse_timeout(0, &json!("5")).unwrap(), 5000);
        assert_eq!(parse_timeout(0, &json!("5s")).unwrap(), 5000);
        assert_eq!(parse_timeout(0, &json!("250ms")).unwrap(), 250);
        assert_eq!(parse_timeout(0, &json!("2 seconds")).unwrap(), 2000);
    }

    #[test]
    fn test_bad_timeouts() {
        for raw in [json!("soon"), json!(-1), json!(true), json!([1]), json!("")] {
            let err = parse_timeout(3, &raw).unwrap_err();
            assert_eq!(err.step_index(), Some(3), "{raw}");
        }
    }

    #[test]
    fn test_verify_defaults_to_visibility() {
        let record = StructuredStep::new("verify").target("dashboard");
        let step = parse_structured(0, &record).unwrap();
        assert_eq!(step.assertions, vec![Assertion::visible("dashboard")]);
    }

    #[test]
    fn test_target_wait_uses_value_as_bound() {
        let record = StructuredStep::new("wait").target("results").value(4);
        let step = parse_structured(0, &record).unwrap();
        assert_eq!(step.timeout_ms, Some(4000));
    }

    #[test]
    fn test_unknown_action_name() {
        let record = StructuredStep::new("teleport").target("moon");
        let step = parse_structured(2, &record).unwrap();
        assert_eq!(step.action, ActionKind::Unknown);
        assert_eq!(step.description, "teleport moon");
    }
}
