//! Structural analysis of a page snapshot.
//!
//! `analyze` derives forms, navigation groups and dynamic-content signals from a
//! [`PageSnapshot`] and proposes scenarios that exercise them. It never touches a
//! live browser and never fails: a page without structure yields an empty report.

mod dynamic;
mod forms;
mod navigation;
mod suggest;

pub use dynamic::{DynamicKind, DynamicSignal};
pub use forms::{FormControl, FormInfo, FormInput, ValidationRules};
pub use navigation::{NavGroup, NavItem, NavType};

use serde::{Deserialize, Serialize};
use tessel_common::protocol::{ElementNode, PageSnapshot, SnapshotContext};
use tessel_common::resolver::ResolutionIndex;
use tessel_common::scenario::ScenarioDefinition;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFeatures {
    pub has_search: bool,
    pub has_pagination: bool,
    pub has_filters: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureReport {
    pub url: String,
    pub title: String,
    pub forms: Vec<FormInfo>,
    pub navigation: Vec<NavGroup>,
    pub dynamic: Vec<DynamicSignal>,
    pub features: PageFeatures,
    pub suggested: Vec<ScenarioDefinition>,
}

impl StructureReport {
    pub fn is_empty(&self) -> bool {
        self.forms.is_empty() && self.navigation.is_empty() && self.dynamic.is_empty()
    }
}

pub fn analyze(snapshot: &PageSnapshot) -> StructureReport {
    let mut report = StructureReport {
        url: snapshot.url.clone(),
        title: snapshot.title.clone(),
        ..Default::default()
    };
    if snapshot.is_empty() {
        return report;
    }

    let index = ResolutionIndex::build(snapshot);
    let ctx = index.context();

    let mut form_walk = forms::FormCollector::default();
    let mut nav_walk = navigation::NavCollector::default();
    let mut dyn_walk = dynamic::DynamicCollector::default();
    let mut features = PageFeatures::default();

    for node in ctx.elements() {
        form_walk.visit(node, &index);
        nav_walk.visit(node, ctx);
        dyn_walk.visit(node, ctx);
        detect_features(node, ctx, &mut features);
    }

    report.forms = form_walk.finish();
    report.navigation = nav_walk.finish(&snapshot.url);
    report.dynamic = dyn_walk.finish(ctx, snapshot.activity.as_ref());
    report.features = features;
    report.suggested = suggest::suggest(&report);

    debug!(
        forms = report.forms.len(),
        nav_groups = report.navigation.len(),
        dynamic = report.dynamic.len(),
        suggested = report.suggested.len(),
        "Analyzed {}",
        snapshot.url
    );
    report
}

fn detect_features(node: &ElementNode, ctx: &SnapshotContext<'_>, features: &mut PageFeatures) {
    let hint = |attr: &str, needle: &str| {
        node.attr(attr)
            .is_some_and(|v| v.to_ascii_lowercase().contains(needle))
    };

    if node.role() == Some("search")
        || node.input_type().as_deref() == Some("search")
        || (node.is_field()
            && (hint("name", "search") || hint("id", "search") || hint("placeholder", "search")))
    {
        features.has_search = true;
    }

    if hint("class", "pagination")
        || hint("aria-label", "pagination")
        || node.attr("rel") == Some("next")
        || (node.is_link()
            && matches!(
                node.text.to_ascii_lowercase().as_str(),
                "next" | "next page" | "previous" | "prev" | "»" | "«"
            ))
    {
        features.has_pagination = true;
    }

    let in_filter_region = || {
        ctx.ancestors(node).any(|a| {
            a.classes().any(|c| {
                let c = c.to_ascii_lowercase();
                c.contains("filter") || c.contains("facet")
            })
        })
    };
    if (node.tag == "select"
        || matches!(node.input_type().as_deref(), Some("checkbox" | "radio" | "range")))
        && (hint("name", "filter") || hint("class", "filter") || in_filter_region())
    {
        features.has_filters = true;
    }
}

/// Simple CSS selector that locates `node`, preferring stable attributes.
pub fn selector_for(node: &ElementNode, ctx: &SnapshotContext<'_>) -> String {
    if let Some(id) = node.attr("id").filter(|id| is_ident(id)) {
        return format!("#{id}");
    }
    let scope = ctx
        .closest(node, tessel_common::resolver::is_form_container)
        .and_then(|f| f.attr("id"))
        .filter(|id| is_ident(id))
        .map(|id| format!("#{id} "))
        .unwrap_or_default();

    if let Some(name) = node.attr("name").filter(|n| is_attr_safe(n)) {
        return format!("{scope}{}[name=\"{name}\"]", node.tag);
    }
    if let Some(class) = node.classes().find(|c| is_ident(c)) {
        return format!("{scope}{}.{class}", node.tag);
    }
    if let Some(t) = node.attr("type").filter(|t| is_attr_safe(t)) {
        return format!("{scope}{}[type=\"{t}\"]", node.tag);
    }
    format!("{scope}{}", node.tag)
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit() || c == '-')
        && s.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

fn is_attr_safe(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == ']')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_preference() {
        let snapshot = PageSnapshot::new(
            "",
            vec![
                ElementNode::new(1, "form").with_attr("id", "signup"),
                ElementNode::new(2, "input")
                    .with_parent(1, 1)
                    .with_attr("id", "user-email"),
                ElementNode::new(3, "input")
                    .with_parent(1, 1)
                    .with_attr("name", "password"),
                ElementNode::new(4, "button").with_attr("class", "btn primary"),
                ElementNode::new(5, "div").with_attr("id", "9lives"),
            ],
        );
        let ctx = SnapshotContext::new(&snapshot);
        let sel = |id| selector_for(ctx.get(id).unwrap(), &ctx);
        assert_eq!(sel(2), "#user-email");
        assert_eq!(sel(3), "#signup input[name=\"password\"]");
        assert_eq!(sel(4), "button.btn");
        assert_eq!(sel(5), "div");
    }
}
