//! Page snapshot model shared by the analyzer, resolver and executor.
//!
//! A [`PageSnapshot`] is an immutable capture of the DOM at one instant. Elements
//! are stored flat in DOM order; the tree shape is carried by `parent` links so a
//! snapshot serializes as a plain list.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// One element of a captured page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    /// Unique within a snapshot. Assigned in DOM order.
    pub id: u32,
    pub tag: String,
    /// Whitespace-normalized visible text.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub parent: Option<u32>,
    #[serde(default)]
    pub depth: u32,
}

fn default_visible() -> bool {
    true
}

impl ElementNode {
    pub fn new(id: u32, tag: impl Into<String>) -> Self {
        Self {
            id,
            tag: tag.into().to_ascii_lowercase(),
            visible: true,
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = normalize_whitespace(&text.into());
        self
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_parent(mut self, parent: u32, depth: u32) -> Self {
        self.parent = Some(parent);
        self.depth = depth;
        self
    }

    pub fn with_rect(mut self, x: f32, y: f32, width: f32, height: f32) -> Self {
        self.rect = Rect {
            x,
            y,
            width,
            height,
        };
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn role(&self) -> Option<&str> {
        self.attr("role")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .get("class")
            .map(|c| c.as_str())
            .unwrap_or_default()
            .split_whitespace()
    }

    /// Lowercased `type` attribute for inputs and buttons.
    pub fn input_type(&self) -> Option<String> {
        self.attr("type").map(|t| t.to_ascii_lowercase())
    }

    pub fn is_disabled(&self) -> bool {
        self.has_attr("disabled") || self.attr("aria-disabled") == Some("true")
    }

    pub fn is_link(&self) -> bool {
        self.tag == "a" || self.role() == Some("link")
    }

    /// Form controls that accept typed input.
    pub fn is_field(&self) -> bool {
        match self.tag.as_str() {
            "textarea" | "select" => true,
            "input" => !matches!(
                self.input_type().as_deref(),
                Some("submit" | "button" | "reset" | "image" | "hidden")
            ),
            _ => {
                self.attr("contenteditable") == Some("true")
                    || matches!(self.role(), Some("textbox" | "combobox" | "searchbox"))
            }
        }
    }

    pub fn is_button_like(&self) -> bool {
        match self.tag.as_str() {
            "button" => true,
            "input" => matches!(
                self.input_type().as_deref(),
                Some("submit" | "button" | "reset" | "image")
            ),
            _ => self.role() == Some("button"),
        }
    }
}

/// Caller-supplied signals about ongoing page activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageActivity {
    /// DOM mutations observed during the observation window.
    #[serde(default)]
    pub dom_mutations: u32,
    /// Network requests that repeated at a regular interval.
    #[serde(default)]
    pub periodic_requests: u32,
    #[serde(default)]
    pub observed_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub elements: Vec<ElementNode>,
    #[serde(default)]
    pub activity: Option<PageActivity>,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, elements: Vec<ElementNode>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            elements,
            activity: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&ElementNode> {
        self.elements.iter().find(|e| e.id == id)
    }
}

/// Id-indexed view over a snapshot, built once per analysis or resolution.
pub struct SnapshotContext<'a> {
    snapshot: &'a PageSnapshot,
    index: HashMap<u32, usize>,
    page_height: f32,
}

impl<'a> SnapshotContext<'a> {
    pub fn new(snapshot: &'a PageSnapshot) -> Self {
        let index = snapshot
            .elements
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.id, pos))
            .collect();
        let page_height = snapshot
            .elements
            .iter()
            .map(|e| e.rect.bottom())
            .fold(0.0_f32, f32::max);
        Self {
            snapshot,
            index,
            page_height,
        }
    }

    pub fn snapshot(&self) -> &'a PageSnapshot {
        self.snapshot
    }

    pub fn elements(&self) -> &'a [ElementNode] {
        &self.snapshot.elements
    }

    pub fn get(&self, id: u32) -> Option<&'a ElementNode> {
        self.index.get(&id).map(|&pos| &self.snapshot.elements[pos])
    }

    /// DOM position of an element, used for tie-breaking.
    pub fn position(&self, id: u32) -> usize {
        self.index.get(&id).copied().unwrap_or(usize::MAX)
    }

    pub fn page_height(&self) -> f32 {
        self.page_height
    }

    /// Walks parent links from the nearest ancestor outwards.
    pub fn ancestors(&self, node: &ElementNode) -> Ancestors<'_, 'a> {
        Ancestors {
            ctx: self,
            next: node.parent,
            remaining: self.snapshot.elements.len(),
        }
    }

    pub fn closest<F>(&self, node: &ElementNode, pred: F) -> Option<&'a ElementNode>
    where
        F: Fn(&ElementNode) -> bool,
    {
        self.ancestors(node).find(|a| pred(*a))
    }

    pub fn is_descendant_of(&self, node: &ElementNode, ancestor_id: u32) -> bool {
        self.ancestors(node).any(|a| a.id == ancestor_id)
    }

    pub fn descendants(&self, ancestor_id: u32) -> impl Iterator<Item = &'a ElementNode> + '_ {
        self.snapshot
            .elements
            .iter()
            .filter(move |e| self.is_descendant_of(e, ancestor_id))
    }

    pub fn children(&self, parent_id: u32) -> impl Iterator<Item = &'a ElementNode> + '_ {
        self.snapshot
            .elements
            .iter()
            .filter(move |e| e.parent == Some(parent_id))
    }
}

pub struct Ancestors<'c, 'a> {
    ctx: &'c SnapshotContext<'a>,
    next: Option<u32>,
    // Guards against parent cycles in malformed snapshots.
    remaining: usize,
}

impl<'a> Iterator for Ancestors<'_, 'a> {
    type Item = &'a ElementNode;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let node = self.ctx.get(self.next?)?;
        self.next = node.parent;
        Some(node)
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> PageSnapshot {
        PageSnapshot::new(
            "https://example.com",
            vec![
                ElementNode::new(1, "body"),
                ElementNode::new(2, "form").with_parent(1, 1),
                ElementNode::new(3, "div").with_parent(2, 2),
                ElementNode::new(4, "input").with_parent(3, 3),
                ElementNode::new(5, "p").with_parent(1, 1),
            ],
        )
    }

    #[test]
    fn test_ancestors_walk_to_root() {
        let snapshot = tree();
        let ctx = SnapshotContext::new(&snapshot);
        let input = ctx.get(4).unwrap();
        let ids: Vec<u32> = ctx.ancestors(input).map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert!(ctx.is_descendant_of(input, 2));
        assert!(!ctx.is_descendant_of(ctx.get(5).unwrap(), 2));
    }

    #[test]
    fn test_ancestors_stop_on_cycle() {
        let snapshot = PageSnapshot::new(
            "",
            vec![
                ElementNode::new(1, "div").with_parent(2, 1),
                ElementNode::new(2, "div").with_parent(1, 1),
            ],
        );
        let ctx = SnapshotContext::new(&snapshot);
        assert_eq!(ctx.ancestors(ctx.get(1).unwrap()).count(), 2);
    }

    #[test]
    fn test_field_and_button_detection() {
        let submit = ElementNode::new(1, "input").with_attr("type", "submit");
        let email = ElementNode::new(2, "input").with_attr("type", "email");
        let plain = ElementNode::new(3, "INPUT");
        assert!(submit.is_button_like());
        assert!(!submit.is_field());
        assert!(email.is_field());
        assert!(plain.is_field());
        assert_eq!(plain.tag, "input");
    }

    #[test]
    fn test_snapshot_deserializes_with_defaults() {
        let json = r#"{"url":"u","elements":[{"id":1,"tag":"button","text":"Go"}]}"#;
        let snapshot: PageSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.elements[0].visible);
        assert!(snapshot.activity.is_none());
    }
}
