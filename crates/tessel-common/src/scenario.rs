//! Scenario definitions as authored, and the normalized step model the engine runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Click,
    Type,
    Wait,
    Verify,
    Scroll,
    Hover,
    Select,
    /// No grammar rule recognized the step. Never executed.
    Unknown,
}

impl ActionKind {
    /// Maps an authored action name, including common synonyms.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "click" | "press" | "tap" => Some(ActionKind::Click),
            "type" | "enter" | "fill" | "input" => Some(ActionKind::Type),
            "wait" => Some(ActionKind::Wait),
            "verify" | "assert" | "check" | "expect" => Some(ActionKind::Verify),
            "scroll" => Some(ActionKind::Scroll),
            "hover" => Some(ActionKind::Hover),
            "select" | "choose" => Some(ActionKind::Select),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Wait => "wait",
            ActionKind::Verify => "verify",
            ActionKind::Scroll => "scroll",
            ActionKind::Hover => "hover",
            ActionKind::Select => "select",
            ActionKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitCondition {
    #[default]
    Appears,
    Disappears,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
    Top,
    Bottom,
}

impl ScrollDirection {
    /// Recognizes viewport scroll phrases such as "down" or "till end".
    pub fn from_phrase(phrase: &str) -> Option<Self> {
        let p = phrase.trim().to_ascii_lowercase();
        let p = p.trim_start_matches("the ").trim();
        match p {
            "up" => Some(ScrollDirection::Up),
            "down" => Some(ScrollDirection::Down),
            "left" => Some(ScrollDirection::Left),
            "right" => Some(ScrollDirection::Right),
            "top" | "to top" | "page top" | "top of page" | "top of the page" => {
                Some(ScrollDirection::Top)
            }
            "bottom" | "end" | "to bottom" | "to end" | "till end" | "until end"
            | "down till end" | "down until end" | "to the end" | "to the bottom"
            | "bottom of page" | "bottom of the page" => Some(ScrollDirection::Bottom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    Exact,
    #[default]
    Contains,
}

/// What an assertion inspects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "by", content = "value")]
pub enum Locator {
    /// Semantic description resolved with the element resolver.
    Description(String),
    /// Simple CSS selector.
    Selector(String),
    /// The whole page text.
    Page,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AssertionKind {
    ElementVisible,
    TextPresent { expected: String, mode: MatchMode },
    MinimumCount { count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub kind: AssertionKind,
    pub locator: Locator,
}

impl Assertion {
    pub fn visible(target: impl Into<String>) -> Self {
        Self {
            kind: AssertionKind::ElementVisible,
            locator: Locator::for_target(target),
        }
    }

    pub fn text(locator: Locator, expected: impl Into<String>, mode: MatchMode) -> Self {
        Self {
            kind: AssertionKind::TextPresent {
                expected: expected.into(),
                mode,
            },
            locator,
        }
    }

    pub fn min_count(target: impl Into<String>, count: usize) -> Self {
        Self {
            kind: AssertionKind::MinimumCount { count },
            locator: Locator::for_target(target),
        }
    }
}

impl Locator {
    /// `css(...)` targets become selectors; anything else is a description.
    pub fn for_target(target: impl Into<String>) -> Self {
        let target = target.into();
        match css_selector(&target) {
            Some(sel) => Locator::Selector(sel.to_string()),
            None => Locator::Description(target),
        }
    }
}

/// Extracts the selector from a `css(<selector>)` target.
pub fn css_selector(target: &str) -> Option<&str> {
    let t = target.trim();
    let inner = t.strip_prefix("css(")?.strip_suffix(')')?;
    let inner = inner.trim();
    (!inner.is_empty()).then_some(inner)
}

/// One normalized step ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    pub index: usize,
    /// Authored text of the step, or a rendering of the structured record.
    pub description: String,
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub critical: bool,
    #[serde(default)]
    pub wait_until: WaitCondition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
}

impl StepSpec {
    pub fn new(index: usize, description: impl Into<String>, action: ActionKind) -> Self {
        Self {
            index,
            description: description.into(),
            action,
            target: None,
            value: None,
            timeout_ms: None,
            critical: false,
            wait_until: WaitCondition::Appears,
            assertions: Vec::new(),
        }
    }

    pub fn unknown(index: usize, description: impl Into<String>) -> Self {
        Self::new(index, description, ActionKind::Unknown)
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Viewport direction for scroll steps whose target names one.
    pub fn scroll_direction(&self) -> Option<ScrollDirection> {
        if self.action != ActionKind::Scroll {
            return None;
        }
        self.target.as_deref().and_then(ScrollDirection::from_phrase)
    }

    /// Fixed wait duration in milliseconds, when the value holds seconds.
    pub fn wait_duration_ms(&self) -> Option<u64> {
        let secs: f64 = self.value.as_deref()?.trim().parse().ok()?;
        (secs >= 0.0).then(|| (secs * 1000.0).round() as u64)
    }
}

/// Low-level action a session performs on an element or the viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum Interaction {
    Click,
    Type { text: String, clear: bool },
    Select { option: String },
    Hover,
    ScrollIntoView,
    ScrollViewport {
        direction: ScrollDirection,
        amount: Option<u32>,
    },
}

/// A scenario as authored: structured records or free-text phrases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

impl ScenarioDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: BTreeSet::new(),
            steps: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn phrase(mut self, text: impl Into<String>) -> Self {
        self.steps.push(StepDefinition::Phrase(text.into()));
        self
    }

    pub fn structured(mut self, step: StructuredStep) -> Self {
        self.steps.push(StepDefinition::Structured(step));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepDefinition {
    Phrase(String),
    Structured(StructuredStep),
}

/// Structured step record. Loosely typed so malformed values surface as
/// definition errors with a step index instead of deserialization failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredStep {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<serde_json::Value>,
    #[serde(default)]
    pub critical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_until: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<AssertionDefinition>,
}

impl StructuredStep {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn value(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn timeout(mut self, timeout: impl Into<serde_json::Value>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }
}

/// Authored assertion record, e.g. `{type: text_present, selector: h1, expected: Welcome}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssertionDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<MatchMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<serde_json::Value>,
}
