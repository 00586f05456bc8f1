//! Deterministic, rule-based element classification.
//!
//! Each rule is a named predicate over a single [`ElementNode`] that votes for one
//! [`ElementKind`] with a fixed weight. The kind with the highest summed weight wins;
//! the names of the rules that fired for it are kept as evidence.

use crate::protocol::ElementNode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    Form,
    Input,
    Button,
    Link,
    Navigation,
    DynamicRegion,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementClassification {
    pub kind: ElementKind,
    /// In [0, 1].
    pub confidence: f64,
    pub evidence: Vec<String>,
}

impl ElementClassification {
    pub fn unknown() -> Self {
        Self {
            kind: ElementKind::Unknown,
            confidence: 0.0,
            evidence: Vec::new(),
        }
    }
}

struct Rule {
    name: &'static str,
    kind: ElementKind,
    weight: f64,
    test: fn(&ElementNode) -> bool,
}

fn class_contains(node: &ElementNode, needles: &[&str]) -> bool {
    node.classes().any(|c| {
        let c = c.to_ascii_lowercase();
        needles.iter().any(|n| c.contains(n))
    })
}

fn id_contains(node: &ElementNode, needles: &[&str]) -> bool {
    node.attr("id")
        .map(|id| id.to_ascii_lowercase())
        .is_some_and(|id| needles.iter().any(|n| id.contains(n)))
}

const RULES: &[Rule] = &[
    // form
    Rule {
        name: "form-tag",
        kind: ElementKind::Form,
        weight: 0.9,
        test: |n| n.tag == "form",
    },
    Rule {
        name: "form-role",
        kind: ElementKind::Form,
        weight: 0.6,
        test: |n| matches!(n.role(), Some("form" | "search")),
    },
    Rule {
        name: "form-class",
        kind: ElementKind::Form,
        weight: 0.3,
        test: |n| n.tag != "input" && class_contains(n, &["form", "login", "signup", "register"]),
    },
    // input
    Rule {
        name: "input-control",
        kind: ElementKind::Input,
        weight: 0.9,
        test: |n| n.is_field(),
    },
    Rule {
        name: "input-named",
        kind: ElementKind::Input,
        weight: 0.2,
        test: |n| n.is_field() && (n.attr("name").is_some() || n.attr("placeholder").is_some()),
    },
    // button
    Rule {
        name: "button-tag",
        kind: ElementKind::Button,
        weight: 0.9,
        test: |n| n.tag == "button",
    },
    Rule {
        name: "button-input-type",
        kind: ElementKind::Button,
        weight: 0.9,
        test: |n| n.tag == "input" && n.is_button_like(),
    },
    Rule {
        name: "button-role",
        kind: ElementKind::Button,
        weight: 0.7,
        test: |n| n.role() == Some("button"),
    },
    Rule {
        name: "button-class",
        kind: ElementKind::Button,
        weight: 0.4,
        test: |n| class_contains(n, &["btn", "button"]),
    },
    Rule {
        name: "button-onclick",
        kind: ElementKind::Button,
        weight: 0.3,
        test: |n| n.has_attr("onclick") && n.tag != "a",
    },
    // link
    Rule {
        name: "link-href",
        kind: ElementKind::Link,
        weight: 0.9,
        test: |n| n.tag == "a" && n.attr("href").is_some(),
    },
    Rule {
        name: "link-role",
        kind: ElementKind::Link,
        weight: 0.7,
        test: |n| n.role() == Some("link"),
    },
    // navigation
    Rule {
        name: "nav-tag",
        kind: ElementKind::Navigation,
        weight: 0.9,
        test: |n| n.tag == "nav",
    },
    Rule {
        name: "nav-role",
        kind: ElementKind::Navigation,
        weight: 0.8,
        test: |n| matches!(n.role(), Some("navigation" | "menubar" | "menu" | "tablist")),
    },
    Rule {
        name: "nav-class",
        kind: ElementKind::Navigation,
        weight: 0.4,
        test: |n| {
            !matches!(n.tag.as_str(), "a" | "button" | "input")
                && (class_contains(n, &["nav", "menu", "breadcrumb"])
                    || id_contains(n, &["nav", "menu"]))
        },
    },
    Rule {
        name: "nav-breadcrumb-label",
        kind: ElementKind::Navigation,
        weight: 0.5,
        test: |n| {
            n.attr("aria-label")
                .is_some_and(|l| l.to_ascii_lowercase().contains("breadcrumb"))
        },
    },
    // dynamic-region
    Rule {
        name: "dynamic-aria-live",
        kind: ElementKind::DynamicRegion,
        weight: 0.7,
        test: |n| matches!(n.attr("aria-live"), Some("polite" | "assertive")),
    },
    Rule {
        name: "dynamic-role",
        kind: ElementKind::DynamicRegion,
        weight: 0.7,
        test: |n| matches!(n.role(), Some("feed" | "log" | "status" | "marquee" | "timer")),
    },
    Rule {
        name: "dynamic-class",
        kind: ElementKind::DynamicRegion,
        weight: 0.5,
        test: |n| {
            class_contains(
                n,
                &["infinite", "lazy", "sentinel", "feed", "live", "ticker", "loader"],
            )
        },
    },
    Rule {
        name: "dynamic-data-attr",
        kind: ElementKind::DynamicRegion,
        weight: 0.5,
        test: |n| {
            n.attributes.keys().any(|k| {
                k.starts_with("data-")
                    && (k.contains("infinite") || k.contains("lazy") || k.contains("refresh"))
            })
        },
    },
    Rule {
        name: "dynamic-busy",
        kind: ElementKind::DynamicRegion,
        weight: 0.3,
        test: |n| n.attr("aria-busy") == Some("true"),
    },
];

/// Classifies a single element from its own tag and attributes.
pub fn classify(node: &ElementNode) -> ElementClassification {
    let mut best: Option<(ElementKind, f64)> = None;
    let mut totals: Vec<(ElementKind, f64)> = Vec::new();

    for rule in RULES.iter().filter(|r| (r.test)(node)) {
        match totals.iter_mut().find(|(k, _)| *k == rule.kind) {
            Some((_, total)) => *total += rule.weight,
            None => totals.push((rule.kind, rule.weight)),
        }
    }
    // First kind to reach the maximum wins, so rule order settles ties.
    for &(kind, total) in &totals {
        if best.is_none_or(|(_, b)| total > b) {
            best = Some((kind, total));
        }
    }

    let Some((kind, total)) = best else {
        return ElementClassification::unknown();
    };
    let evidence = RULES
        .iter()
        .filter(|r| r.kind == kind && (r.test)(node))
        .map(|r| r.name.to_string())
        .collect();

    ElementClassification {
        kind,
        confidence: total.min(1.0),
        evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_input_is_button() {
        let node = ElementNode::new(1, "input").with_attr("type", "submit");
        let c = classify(&node);
        assert_eq!(c.kind, ElementKind::Button);
        assert_eq!(c.evidence, vec!["button-input-type"]);
    }

    #[test]
    fn test_evidence_accumulates() {
        let node = ElementNode::new(1, "button").with_attr("class", "btn btn-primary");
        let c = classify(&node);
        assert_eq!(c.kind, ElementKind::Button);
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.evidence, vec!["button-tag", "button-class"]);
    }

    #[test]
    fn test_navigation_and_dynamic_regions() {
        let nav = ElementNode::new(1, "ul").with_attr("class", "main-menu");
        assert_eq!(classify(&nav).kind, ElementKind::Navigation);

        let feed = ElementNode::new(2, "div").with_attr("aria-live", "polite");
        assert_eq!(classify(&feed).kind, ElementKind::DynamicRegion);
    }

    #[test]
    fn test_plain_text_is_unknown() {
        let node = ElementNode::new(1, "p").with_text("hello");
        let c = classify(&node);
        assert_eq!(c.kind, ElementKind::Unknown);
        assert_eq!(c.confidence, 0.0);
        assert!(c.evidence.is_empty());
    }
}
