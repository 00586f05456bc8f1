//! Element resolution.
//!
//! Maps a semantic target description ("the login button", "email field") to a
//! ranked list of candidate elements in a [`PageSnapshot`]. Resolution is a pure
//! function of its inputs and holds no state between calls.
//!
//! Descriptions of the form `css(<selector>)` bypass scoring and match by selector.

pub mod classifier;
pub mod scoring;
pub mod tokens;

pub use classifier::{ElementClassification, ElementKind, classify};
pub use tokens::{Intent, TargetQuery};

use crate::protocol::{ElementNode, PageSnapshot, SnapshotContext};
use crate::scenario::css_selector;
use crate::selector::Selector;
use scoring::NodeFacts;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Tags that never make sense as a target.
const EXCLUDED_TAGS: &[&str] = &[
    "html", "head", "body", "script", "style", "meta", "link", "noscript", "template", "title",
    "br",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverOptions {
    /// Top scores below this are reported as low-confidence.
    pub confidence_threshold: f64,
    /// Scores at or below this are not matches at all.
    pub min_match_score: f64,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            min_match_score: 0.15,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub element: &'a ElementNode,
    pub score: f64,
    pub classification: ElementClassification,
}

#[derive(Debug, Clone)]
pub struct ResolvedTarget<'a> {
    pub description: String,
    /// Sorted by non-increasing score, then DOM order.
    pub candidates: Vec<Candidate<'a>>,
    pub low_confidence: bool,
}

impl<'a> ResolvedTarget<'a> {
    pub fn empty(description: &str) -> Self {
        Self {
            description: description.to_string(),
            candidates: Vec::new(),
            low_confidence: false,
        }
    }

    pub fn top(&self) -> Option<&Candidate<'a>> {
        self.candidates.first()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Structural facts about every element, computed in one pass over a snapshot.
pub struct ResolutionIndex<'a> {
    ctx: SnapshotContext<'a>,
    labels: HashMap<u32, String>,
    in_form: HashMap<u32, bool>,
    in_navigation: HashMap<u32, bool>,
}

impl<'a> ResolutionIndex<'a> {
    pub fn build(snapshot: &'a PageSnapshot) -> Self {
        let ctx = SnapshotContext::new(snapshot);

        let mut labels = HashMap::new();
        let by_dom_id: HashMap<&str, u32> = ctx
            .elements()
            .iter()
            .filter_map(|e| e.attr("id").map(|id| (id, e.id)))
            .collect();
        for label in ctx.elements().iter().filter(|e| e.tag == "label") {
            if label.text.is_empty() {
                continue;
            }
            if let Some(target) = label.attr("for").and_then(|f| by_dom_id.get(f)) {
                labels.entry(*target).or_insert_with(|| label.text.clone());
            }
            for control in ctx.descendants(label.id).filter(|c| c.is_field()) {
                labels
                    .entry(control.id)
                    .or_insert_with(|| label.text.clone());
            }
        }

        let mut in_form = HashMap::new();
        let mut in_navigation = HashMap::new();
        for node in ctx.elements() {
            in_form.insert(node.id, ctx.closest(node, is_form_container).is_some());
            in_navigation.insert(node.id, ctx.closest(node, is_nav_container).is_some());
        }

        Self {
            ctx,
            labels,
            in_form,
            in_navigation,
        }
    }

    pub fn context(&self) -> &SnapshotContext<'a> {
        &self.ctx
    }

    pub fn facts(&self, node: &ElementNode) -> NodeFacts<'_> {
        NodeFacts {
            label: self.labels.get(&node.id).map(|s| s.as_str()),
            in_form: self.in_form.get(&node.id).copied().unwrap_or(false),
            in_navigation: self.in_navigation.get(&node.id).copied().unwrap_or(false),
        }
    }

    pub fn label(&self, id: u32) -> Option<&str> {
        self.labels.get(&id).map(|s| s.as_str())
    }

    /// Ranks every visible element against `description`.
    pub fn resolve(&self, description: &str, options: &ResolverOptions) -> ResolvedTarget<'a> {
        if description.trim().is_empty() || self.ctx.elements().is_empty() {
            return ResolvedTarget::empty(description);
        }

        if let Some(sel) = css_selector(description) {
            return self.resolve_selector(description, sel);
        }

        let query = TargetQuery::parse(description);
        let mut candidates: Vec<Candidate<'a>> = self
            .ctx
            .elements()
            .iter()
            .filter(|e| e.visible && !EXCLUDED_TAGS.contains(&e.tag.as_str()))
            .filter_map(|e| {
                let score = scoring::score(&query, e, &self.facts(e))?;
                (score > options.min_match_score).then(|| Candidate {
                    element: e,
                    score,
                    classification: classify(e),
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| self.dom_order(a.element, b.element))
        });

        let low_confidence = candidates
            .first()
            .is_some_and(|c| c.score < options.confidence_threshold);

        ResolvedTarget {
            description: description.to_string(),
            candidates,
            low_confidence,
        }
    }

    fn resolve_selector(&self, description: &str, sel: &str) -> ResolvedTarget<'a> {
        let Ok(selector) = Selector::parse(sel) else {
            return ResolvedTarget::empty(description);
        };
        let candidates = selector
            .select_all(&self.ctx)
            .into_iter()
            .filter(|e| e.visible)
            .map(|e| Candidate {
                element: e,
                score: 1.0,
                classification: classify(e),
            })
            .collect();
        ResolvedTarget {
            description: description.to_string(),
            candidates,
            low_confidence: false,
        }
    }

    fn dom_order(&self, a: &ElementNode, b: &ElementNode) -> Ordering {
        self.ctx.position(a.id).cmp(&self.ctx.position(b.id))
    }
}

pub fn is_form_container(node: &ElementNode) -> bool {
    node.tag == "form" || matches!(node.role(), Some("form" | "search"))
}

pub fn is_nav_container(node: &ElementNode) -> bool {
    matches!(node.tag.as_str(), "nav" | "header" | "footer")
        || matches!(node.role(), Some("navigation" | "menubar" | "menu" | "tablist"))
}

/// Resolves `description` against `snapshot` with the given options.
pub fn resolve<'a>(
    snapshot: &'a PageSnapshot,
    description: &str,
    options: &ResolverOptions,
) -> ResolvedTarget<'a> {
    ResolutionIndex::build(snapshot).resolve(description, options)
}
