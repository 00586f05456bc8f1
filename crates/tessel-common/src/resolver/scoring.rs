//! Pure candidate scoring.
//!
//! `score` looks at one element plus the precomputed structural facts about it and
//! never walks the snapshot, so it can be exercised with synthetic fixtures.

use super::tokens::{Intent, TargetQuery, compact, words};
use crate::protocol::ElementNode;
use std::collections::HashSet;

pub const TEXT_WEIGHT: f64 = 0.50;
pub const ATTRIBUTE_WEIGHT: f64 = 0.25;
pub const INTENT_WEIGHT: f64 = 0.15;
pub const STRUCTURE_WEIGHT: f64 = 0.10;

const DISABLED_FACTOR: f64 = 0.9;
const FUZZY_FLOOR: f64 = 0.8;

/// Structural facts about an element gathered by the snapshot walk.
#[derive(Debug, Clone, Default)]
pub struct NodeFacts<'a> {
    /// Text of an associated `<label>`.
    pub label: Option<&'a str>,
    pub in_form: bool,
    pub in_navigation: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub text: f64,
    pub attributes: f64,
    pub intent: f64,
    pub structure: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        (TEXT_WEIGHT * self.text
            + ATTRIBUTE_WEIGHT * self.attributes
            + INTENT_WEIGHT * self.intent
            + STRUCTURE_WEIGHT * self.structure)
            .clamp(0.0, 1.0)
    }
}

/// Scores `node` against `query`. `None` when neither text nor attributes match.
pub fn score(query: &TargetQuery, node: &ElementNode, facts: &NodeFacts<'_>) -> Option<f64> {
    breakdown(query, node, facts).map(|b| {
        let total = b.total();
        if node.is_disabled() {
            total * DISABLED_FACTOR
        } else {
            total
        }
    })
}

pub fn breakdown(
    query: &TargetQuery,
    node: &ElementNode,
    facts: &NodeFacts<'_>,
) -> Option<ScoreBreakdown> {
    if query.is_empty() {
        return None;
    }
    let text = text_signal(query, node, facts);
    let attributes = attribute_signal(query, node);
    if text <= 0.0 && attributes <= 0.0 {
        return None;
    }
    Some(ScoreBreakdown {
        text,
        attributes,
        intent: intent_prior(query.intent, node, facts),
        structure: structural_prior(query.intent, node, facts),
    })
}

fn text_signal(query: &TargetQuery, node: &ElementNode, facts: &NodeFacts<'_>) -> f64 {
    let humanized_name = node.attr("name").map(|n| words(n).join(" "));
    let humanized_id = node.attr("id").map(|n| words(n).join(" "));
    // Submit controls read as "submit" whatever their caption says.
    let implicit = (node.input_type().as_deref() == Some("submit")).then_some("submit");

    let sources: [(Option<&str>, f64); 10] = [
        (Some(node.text.as_str()), 1.0),
        (node.attr("aria-label"), 1.0),
        (facts.label, 0.95),
        (node.attr("placeholder"), 0.95),
        (node.attr("title"), 0.85),
        (node.attr("alt"), 0.85),
        (node.attr("value"), 0.85),
        (humanized_name.as_deref(), 0.7),
        (humanized_id.as_deref(), 0.6),
        (implicit, 0.8),
    ];

    let content = query.content();
    let candidates: Vec<&str> = if content == query.phrase {
        vec![content.as_str()]
    } else {
        vec![content.as_str(), query.phrase.as_str()]
    };

    sources
        .iter()
        .filter_map(|(s, factor)| s.map(|s| (s, *factor)))
        .filter(|(s, _)| !s.trim().is_empty())
        .flat_map(|(s, factor)| candidates.iter().map(move |c| match_text(c, s) * factor))
        .fold(0.0, f64::max)
}

/// Similarity of a query phrase to one text source, in [0, 1].
fn match_text(phrase: &str, source: &str) -> f64 {
    let source_words = words(source);
    if phrase.is_empty() || source_words.is_empty() {
        return 0.0;
    }
    let source_norm = source_words.join(" ");
    if source_norm == phrase {
        return 1.0;
    }
    if compact(&source_norm) == compact(phrase) {
        return 0.9;
    }

    let phrase_words: Vec<&str> = phrase.split(' ').collect();
    if contains_words(&source_words, &phrase_words) {
        // Large containers that merely mention the phrase rank below tight matches.
        let ratio = phrase_words.len() as f64 / source_words.len() as f64;
        return 0.3 + 0.5 * ratio;
    }

    let fuzzy = strsim::normalized_levenshtein(&source_norm, phrase);
    let fuzzy = if fuzzy >= FUZZY_FLOOR { 0.7 * fuzzy } else { 0.0 };

    let source_set: HashSet<&str> = source_words.iter().map(|w| w.as_str()).collect();
    let hits = phrase_words.iter().filter(|w| source_set.contains(*w)).count();
    let overlap = if hits > 0 {
        let coverage = hits as f64 / phrase_words.len() as f64;
        let precision = hits as f64 / source_words.len() as f64;
        0.5 * coverage * (0.5 + 0.5 * precision)
    } else {
        0.0
    };

    fuzzy.max(overlap)
}

fn contains_words(haystack: &[String], needle: &[&str]) -> bool {
    !needle.is_empty()
        && haystack
            .windows(needle.len())
            .any(|w| w.iter().zip(needle).all(|(a, b)| a == b))
}

fn attribute_signal(query: &TargetQuery, node: &ElementNode) -> f64 {
    let attr_tokens: HashSet<String> = ["id", "name", "class", "type", "data-testid", "for"]
        .iter()
        .filter_map(|a| node.attr(a))
        .flat_map(words)
        .collect();
    if attr_tokens.is_empty() || query.tokens.is_empty() {
        return 0.0;
    }
    let hits = query
        .tokens
        .iter()
        .filter(|t| attr_tokens.contains(t.as_str()))
        .count();
    hits as f64 / query.tokens.len() as f64
}

fn intent_prior(intent: Option<Intent>, node: &ElementNode, facts: &NodeFacts<'_>) -> f64 {
    let Some(intent) = intent else {
        return if is_actionable(node) { 0.5 } else { 0.0 };
    };
    match intent {
        Intent::Button => {
            if node.is_button_like() {
                1.0
            } else if node.is_link() && node.classes().any(|c| c.contains("btn")) {
                0.6
            } else if node.tag == "a" {
                0.3
            } else {
                0.0
            }
        }
        Intent::Field => {
            if node.is_field() {
                1.0
            } else if node.tag == "label" {
                0.3
            } else {
                0.0
            }
        }
        Intent::Link => {
            if node.is_link() {
                1.0
            } else if node.is_button_like() {
                0.3
            } else {
                0.0
            }
        }
        Intent::Navigation => {
            if node.is_link() && facts.in_navigation {
                1.0
            } else if node.tag == "nav" || node.role() == Some("navigation") {
                0.8
            } else if node.is_link() {
                0.5
            } else {
                0.0
            }
        }
        Intent::Dropdown => {
            if node.tag == "select" || matches!(node.role(), Some("combobox" | "listbox")) {
                1.0
            } else {
                0.0
            }
        }
        Intent::Checkbox => {
            if matches!(node.input_type().as_deref(), Some("checkbox" | "radio"))
                || matches!(node.role(), Some("checkbox" | "radio" | "switch"))
            {
                1.0
            } else {
                0.0
            }
        }
        Intent::Heading => {
            if matches!(node.tag.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
                || node.role() == Some("heading")
            {
                1.0
            } else {
                0.0
            }
        }
        Intent::Image => {
            if matches!(node.tag.as_str(), "img" | "svg" | "picture") || node.role() == Some("img")
            {
                1.0
            } else {
                0.0
            }
        }
    }
}

fn structural_prior(intent: Option<Intent>, node: &ElementNode, facts: &NodeFacts<'_>) -> f64 {
    match intent {
        Some(Intent::Field | Intent::Dropdown | Intent::Checkbox) if facts.in_form => 1.0,
        Some(Intent::Button) if facts.in_form => 0.5,
        Some(Intent::Navigation | Intent::Link) if facts.in_navigation => 1.0,
        None if facts.in_form && node.is_field() => 0.5,
        _ => 0.0,
    }
}

fn is_actionable(node: &ElementNode) -> bool {
    node.is_button_like() || node.is_link() || node.is_field()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> TargetQuery {
        TargetQuery::parse(s)
    }

    #[test]
    fn test_exact_text_beats_containment() {
        let button = ElementNode::new(1, "button").with_text("Sign in");
        let panel =
            ElementNode::new(2, "div").with_text("Welcome back, please sign in to continue");
        let facts = NodeFacts::default();
        let a = score(&q("sign in"), &button, &facts).unwrap();
        let b = score(&q("sign in"), &panel, &facts).unwrap();
        assert!(a > b, "{a} <= {b}");
    }

    #[test]
    fn test_field_matches_by_name_and_structure() {
        let input = ElementNode::new(1, "input")
            .with_attr("type", "email")
            .with_attr("name", "email");
        let facts = NodeFacts {
            in_form: true,
            ..Default::default()
        };
        let b = breakdown(&q("email field"), &input, &facts).unwrap();
        assert_eq!(b.attributes, 1.0);
        assert_eq!(b.intent, 1.0);
        assert_eq!(b.structure, 1.0);
        assert!(b.total() > 0.5);
    }

    #[test]
    fn test_label_text_counts_as_text() {
        let input = ElementNode::new(1, "input").with_attr("id", "f1");
        let facts = NodeFacts {
            label: Some("Password"),
            ..Default::default()
        };
        let b = breakdown(&q("password"), &input, &facts).unwrap();
        assert!(b.text >= 0.95);
    }

    #[test]
    fn test_no_evidence_is_not_a_candidate() {
        let node = ElementNode::new(1, "button").with_text("Cancel");
        assert_eq!(score(&q("submit button"), &node, &NodeFacts::default()), None);
        assert_eq!(score(&q(""), &node, &NodeFacts::default()), None);
    }

    #[test]
    fn test_submit_type_reads_as_submit() {
        let button = ElementNode::new(1, "button")
            .with_attr("type", "submit")
            .with_text("Log in");
        let facts = NodeFacts {
            in_form: true,
            ..Default::default()
        };
        let b = breakdown(&q("submit button"), &button, &facts).unwrap();
        assert_eq!(b.text, 0.8);
        assert!(b.total() >= 0.5, "{}", b.total());

        let plain = ElementNode::new(2, "button").with_text("Log in");
        assert_eq!(score(&q("submit button"), &plain, &facts), None);
    }

    #[test]
    fn test_compact_match() {
        assert_eq!(match_text("login", "Log in"), 0.9);
        assert_eq!(match_text("login", "Login"), 1.0);
    }

    #[test]
    fn test_disabled_penalty() {
        let on = ElementNode::new(1, "button").with_text("Save");
        let off = on.clone().with_attr("disabled", "");
        let facts = NodeFacts::default();
        assert!(score(&q("save"), &on, &facts) > score(&q("save"), &off, &facts));
    }

    #[test]
    fn test_scores_stay_in_unit_range() {
        let node = ElementNode::new(1, "a")
            .with_text("Home")
            .with_attr("aria-label", "Home")
            .with_attr("id", "home")
            .with_attr("class", "home nav-link");
        let facts = NodeFacts {
            in_navigation: true,
            ..Default::default()
        };
        let s = score(&q("home link"), &node, &facts).unwrap();
        assert!((0.0..=1.0).contains(&s));
    }
}
