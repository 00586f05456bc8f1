use serde::{Deserialize, Serialize};
use tessel_common::protocol::{ElementNode, SnapshotContext};
use tessel_common::resolver::is_nav_container;
use url::Url;

const MIN_GROUP_LINKS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavType {
    Primary,
    Footer,
    Breadcrumb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavItem {
    pub text: String,
    /// Absolute when the page URL allows resolving it.
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavGroup {
    pub element_id: u32,
    #[serde(rename = "type")]
    pub nav_type: NavType,
    pub items: Vec<NavItem>,
}

struct PendingGroup {
    container: u32,
    nav_type: NavType,
    links: Vec<(String, String)>,
}

#[derive(Default)]
pub(super) struct NavCollector {
    groups: Vec<PendingGroup>,
}

impl NavCollector {
    pub fn visit(&mut self, node: &ElementNode, ctx: &SnapshotContext<'_>) {
        if !node.is_link() || !node.visible || node.text.is_empty() {
            return;
        }
        let Some(href) = node.attr("href") else {
            return;
        };
        if href.trim_start().to_ascii_lowercase().starts_with("javascript:") {
            return;
        }
        let Some(container) = ctx
            .closest(node, |a| is_nav_container(a) || is_breadcrumb(a))
            .or_else(|| ctx.closest(node, |a| matches!(a.tag.as_str(), "ul" | "ol" | "menu")))
        else {
            return;
        };

        let pos = match self.groups.iter().position(|g| g.container == container.id) {
            Some(pos) => pos,
            None => {
                self.groups.push(PendingGroup {
                    container: container.id,
                    nav_type: nav_type(container, ctx),
                    links: Vec::new(),
                });
                self.groups.len() - 1
            }
        };
        let entry = &mut self.groups[pos];
        if !entry.links.iter().any(|(_, h)| h == href) {
            entry.links.push((node.text.clone(), href.to_string()));
        }
    }

    pub fn finish(self, page_url: &str) -> Vec<NavGroup> {
        let base = Url::parse(page_url).ok();
        self.groups
            .into_iter()
            .filter(|g| g.links.len() >= MIN_GROUP_LINKS)
            .map(|g| NavGroup {
                element_id: g.container,
                nav_type: g.nav_type,
                items: g
                    .links
                    .into_iter()
                    .map(|(text, href)| NavItem {
                        text,
                        href: absolutize(base.as_ref(), &href),
                    })
                    .collect(),
            })
            .collect()
    }
}

fn is_breadcrumb(node: &ElementNode) -> bool {
    let mentions =
        |v: Option<&str>| v.is_some_and(|v| v.to_ascii_lowercase().contains("breadcrumb"));
    mentions(node.attr("aria-label")) || mentions(node.attr("class")) || mentions(node.attr("id"))
}

fn nav_type(container: &ElementNode, ctx: &SnapshotContext<'_>) -> NavType {
    let chain = std::iter::once(container).chain(ctx.ancestors(container));
    let mut footer = false;
    for node in chain {
        if is_breadcrumb(node) {
            return NavType::Breadcrumb;
        }
        if node.tag == "footer" || node.role() == Some("contentinfo") {
            footer = true;
        }
    }
    if footer {
        NavType::Footer
    } else {
        NavType::Primary
    }
}

fn absolutize(base: Option<&Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}
