use super::selector_for;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tessel_common::protocol::{ElementNode, PageActivity, SnapshotContext};
use tessel_common::resolver::{ElementKind, classify};

/// Fraction of the page height treated as "near the bottom".
const BOTTOM_BAND: f32 = 0.2;
const MIN_REPEATED_ITEMS: usize = 3;
const LOAD_MORE_PHRASES: &[&str] = &[
    "load more",
    "show more",
    "view more",
    "see more",
    "more results",
    "load more results",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicKind {
    InfiniteScroll,
    LoadMore,
    AutoRefresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicSignal {
    pub kind: DynamicKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub evidence: Vec<String>,
    /// Repeated item selector whose count should grow when the signal fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_selector: Option<String>,
    #[serde(default)]
    pub item_count: usize,
}

#[derive(Default)]
pub(super) struct DynamicCollector {
    sentinels: Vec<(u32, Vec<String>)>,
    load_more: Vec<u32>,
    live_regions: Vec<(u32, String)>,
    meta_refresh: bool,
    // (parent id, tag, first class) -> child ids
    siblings: HashMap<(u32, String, String), Vec<u32>>,
}

impl DynamicCollector {
    pub fn visit(&mut self, node: &ElementNode, ctx: &SnapshotContext<'_>) {
        if node.tag == "meta"
            && node
                .attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case("refresh"))
        {
            self.meta_refresh = true;
            return;
        }

        if let Some(parent) = node.parent
            && node.visible
        {
            let class = node.classes().next().unwrap_or_default().to_string();
            self.siblings
                .entry((parent, node.tag.clone(), class))
                .or_default()
                .push(node.id);
        }

        if (node.is_button_like() || node.is_link()) && node.visible && is_load_more(node) {
            self.load_more.push(node.id);
            return;
        }

        let classification = classify(node);
        if classification.kind != ElementKind::DynamicRegion {
            return;
        }
        if matches!(node.attr("aria-live"), Some("polite" | "assertive"))
            || matches!(node.role(), Some("log" | "status" | "marquee" | "timer"))
        {
            self.live_regions.push((node.id, classification.evidence.join(", ")));
        } else if near_bottom(node, ctx) || has_infinite_attr(node) {
            self.sentinels.push((node.id, classification.evidence));
        }
    }

    pub fn finish(
        self,
        ctx: &SnapshotContext<'_>,
        activity: Option<&PageActivity>,
    ) -> Vec<DynamicSignal> {
        let mut signals = Vec::new();
        let items = self.largest_repeated_group(ctx);

        if let Some((id, evidence)) = self.sentinels.into_iter().next() {
            let node = ctx.get(id);
            signals.push(DynamicSignal {
                kind: DynamicKind::InfiniteScroll,
                element_id: Some(id),
                selector: node.map(|n| selector_for(n, ctx)),
                label: None,
                evidence,
                item_selector: items.as_ref().map(|(s, _)| s.clone()),
                item_count: items.as_ref().map(|(_, c)| *c).unwrap_or(0),
            });
        }

        for id in self.load_more {
            let Some(node) = ctx.get(id) else { continue };
            signals.push(DynamicSignal {
                kind: DynamicKind::LoadMore,
                element_id: Some(id),
                selector: Some(selector_for(node, ctx)),
                label: Some(node.text.clone()),
                evidence: vec!["load-more-text".into()],
                item_selector: items.as_ref().map(|(s, _)| s.clone()),
                item_count: items.as_ref().map(|(_, c)| *c).unwrap_or(0),
            });
        }

        let mut refresh_evidence = Vec::new();
        if let Some(a) = activity {
            if a.periodic_requests > 0 {
                refresh_evidence.push(format!("periodic-requests:{}", a.periodic_requests));
            }
            if a.dom_mutations > 0 {
                refresh_evidence.push(format!("dom-mutations:{}", a.dom_mutations));
            }
        }
        if self.meta_refresh {
            refresh_evidence.push("meta-refresh".into());
        }
        let region = self.live_regions.first().cloned();
        if let Some((_, evidence)) = &region {
            refresh_evidence.push(evidence.clone());
        }
        if !refresh_evidence.is_empty() {
            let region_node = region.and_then(|(id, _)| ctx.get(id));
            signals.push(DynamicSignal {
                kind: DynamicKind::AutoRefresh,
                element_id: region_node.map(|n| n.id),
                selector: region_node.map(|n| selector_for(n, ctx)),
                label: None,
                evidence: refresh_evidence,
                item_selector: None,
                item_count: 0,
            });
        }

        signals
    }

    /// Biggest run of same-tag, same-class siblings, as (selector, count).
    fn largest_repeated_group(&self, ctx: &SnapshotContext<'_>) -> Option<(String, usize)> {
        let ((parent, tag, class), ids) = self
            .siblings
            .iter()
            .filter(|(_, ids)| ids.len() >= MIN_REPEATED_ITEMS)
            .filter(|((_, tag, _), _)| !matches!(tag.as_str(), "option" | "br" | "script"))
            // Largest first, then earliest in the DOM for determinism.
            .max_by(|(_, a), (_, b)| {
                a.len()
                    .cmp(&b.len())
                    .then_with(|| ctx.position(b[0]).cmp(&ctx.position(a[0])))
            })?;

        let item = if !super::is_ident(class) {
            tag.clone()
        } else {
            format!("{tag}.{class}")
        };
        let selector = match ctx.get(*parent).and_then(|p| p.attr("id")) {
            Some(id) if super::is_ident(id) => format!("#{id} {item}"),
            _ => item,
        };
        Some((selector, ids.len()))
    }
}

fn is_load_more(node: &ElementNode) -> bool {
    let text = node
        .text
        .trim()
        .trim_end_matches(['.', '…', '+'])
        .trim()
        .to_ascii_lowercase();
    LOAD_MORE_PHRASES.contains(&text.as_str())
}

fn near_bottom(node: &ElementNode, ctx: &SnapshotContext<'_>) -> bool {
    let height = ctx.page_height();
    height > 0.0 && node.rect.y >= height * (1.0 - BOTTOM_BAND)
}

fn has_infinite_attr(node: &ElementNode) -> bool {
    node.attributes
        .keys()
        .any(|k| k.starts_with("data-") && k.contains("infinite"))
        || node.classes().any(|c| c.to_ascii_lowercase().contains("infinite"))
}
