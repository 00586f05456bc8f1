//! Post-condition assertions evaluated against a page snapshot.

use serde::{Deserialize, Serialize};
use tessel_common::protocol::{ElementNode, PageSnapshot, SnapshotContext, normalize_whitespace};
use tessel_common::resolver::{ResolutionIndex, ResolverOptions};
use tessel_common::scenario::{Assertion, AssertionKind, Locator, MatchMode};
use tessel_common::selector::Selector;

/// How many top candidates a text assertion inspects for a described target.
const TEXT_CANDIDATES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub detail: String,
}

impl Verdict {
    fn pass(detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(detail: impl Into<String>) -> Self {
        Self {
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Evaluates one assertion. Never fails: a malformed selector is a failed verdict.
pub fn validate(
    assertion: &Assertion,
    snapshot: &PageSnapshot,
    options: &ResolverOptions,
) -> Verdict {
    let index = ResolutionIndex::build(snapshot);
    validate_with(assertion, &index, options)
}

/// ANDs every assertion, reporting the first failure's detail.
pub fn validate_all(
    assertions: &[Assertion],
    snapshot: &PageSnapshot,
    options: &ResolverOptions,
) -> Verdict {
    let index = ResolutionIndex::build(snapshot);
    let mut details = Vec::with_capacity(assertions.len());
    for assertion in assertions {
        let verdict = validate_with(assertion, &index, options);
        if !verdict.passed {
            return verdict;
        }
        details.push(verdict.detail);
    }
    Verdict::pass(details.join("; "))
}

fn validate_with(
    assertion: &Assertion,
    index: &ResolutionIndex<'_>,
    options: &ResolverOptions,
) -> Verdict {
    let located = match locate(&assertion.locator, index, options) {
        Ok(located) => located,
        Err(detail) => return Verdict::fail(detail),
    };
    let what = describe(&assertion.locator);

    match &assertion.kind {
        AssertionKind::ElementVisible => match located {
            Located::Page => Verdict::pass("page is loaded"),
            Located::Elements(found) if !found.is_empty() => {
                Verdict::pass(format!("{what} is visible"))
            }
            Located::Elements(_) => Verdict::fail(format!("{what} is not visible")),
        },

        AssertionKind::MinimumCount { count } => {
            let actual = match located {
                Located::Page => index.context().elements().iter().filter(|e| e.visible).count(),
                Located::Elements(found) => found.len(),
            };
            if actual >= *count {
                Verdict::pass(format!("found {actual} of at least {count} {what}"))
            } else {
                Verdict::fail(format!("expected at least {count} {what}, found {actual}"))
            }
        }

        AssertionKind::TextPresent { expected, mode } => {
            let limit = match assertion.locator {
                Locator::Description(_) => TEXT_CANDIDATES,
                _ => usize::MAX,
            };
            let texts: Vec<String> = match located {
                Located::Page => vec![page_text(index.context())],
                Located::Elements(found) => {
                    found.iter().take(limit).map(|e| element_text(e)).collect()
                }
            };
            if texts.is_empty() {
                return Verdict::fail(format!("{what} is not visible"));
            }
            if texts.iter().any(|t| text_matches(t, expected, *mode)) {
                Verdict::pass(format!("{what} has text '{expected}'"))
            } else {
                let verb = match mode {
                    MatchMode::Exact => "to equal",
                    MatchMode::Contains => "to contain",
                };
                Verdict::fail(format!(
                    "expected {what} {verb} '{expected}', found '{}'",
                    truncate(&texts[0], 80)
                ))
            }
        }
    }
}

enum Located<'a> {
    Page,
    Elements(Vec<&'a ElementNode>),
}

fn locate<'a>(
    locator: &Locator,
    index: &ResolutionIndex<'a>,
    options: &ResolverOptions,
) -> Result<Located<'a>, String> {
    match locator {
        Locator::Page => Ok(Located::Page),
        Locator::Selector(sel) => {
            let selector =
                Selector::parse(sel).map_err(|e| format!("invalid selector '{sel}': {e}"))?;
            let found = selector
                .select_all(index.context())
                .into_iter()
                .filter(|e| e.visible)
                .collect();
            Ok(Located::Elements(found))
        }
        Locator::Description(description) => {
            let found = index
                .resolve(description, options)
                .candidates
                .into_iter()
                .map(|c| c.element)
                .collect();
            Ok(Located::Elements(found))
        }
    }
}

fn describe(locator: &Locator) -> String {
    match locator {
        Locator::Page => "page".to_string(),
        Locator::Selector(sel) => format!("css({sel})"),
        Locator::Description(d) => format!("'{d}'"),
    }
}

fn text_matches(actual: &str, expected: &str, mode: MatchMode) -> bool {
    match mode {
        MatchMode::Exact => normalize_whitespace(actual) == normalize_whitespace(expected),
        MatchMode::Contains => normalize_whitespace(actual)
            .to_lowercase()
            .contains(&normalize_whitespace(expected).to_lowercase()),
    }
}

/// Text an assertion sees for a field: its value when it has no text.
fn element_text(node: &ElementNode) -> String {
    if node.text.is_empty() {
        node.attr("value").unwrap_or_default().to_string()
    } else {
        node.text.clone()
    }
}

/// Visible text of the page. Nested elements repeat their parent's text, which
/// containment checks tolerate.
fn page_text(ctx: &SnapshotContext<'_>) -> String {
    let joined = ctx
        .elements()
        .iter()
        .filter(|e| e.visible && !e.text.is_empty())
        .filter(|e| !matches!(e.tag.as_str(), "script" | "style" | "title" | "noscript"))
        .map(|e| e.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        ctx.snapshot().title.clone()
    } else {
        joined
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageSnapshot {
        PageSnapshot::new(
            "https://example.com/dashboard",
            vec![
                ElementNode::new(1, "body"),
                ElementNode::new(2, "h1").with_parent(1, 1).with_text("Welcome back, Ada"),
                ElementNode::new(3, "ul").with_parent(1, 1).with_attr("id", "results"),
                ElementNode::new(4, "li")
                    .with_parent(3, 2)
                    .with_attr("class", "item")
                    .with_text("One"),
                ElementNode::new(5, "li")
                    .with_parent(3, 2)
                    .with_attr("class", "item")
                    .with_text("Two"),
                ElementNode::new(6, "li")
                    .with_parent(3, 2)
                    .with_attr("class", "item")
                    .with_text("Three")
                    .hidden(),
                ElementNode::new(7, "div")
                    .with_parent(1, 1)
                    .with_attr("class", "toast")
                    .with_text("Saved")
                    .hidden(),
            ],
        )
    }

    fn check(assertion: Assertion) -> Verdict {
        validate(&assertion, &page(), &ResolverOptions::default())
    }

    #[test]
    fn test_visible() {
        assert!(check(Assertion::visible("css(#results)")).passed);
        assert!(!check(Assertion::visible("css(.toast)")).passed);
        assert!(check(Assertion::visible("welcome heading")).passed);
        assert!(!check(Assertion::visible("shopping cart")).passed);
    }

    #[test]
    fn test_text_modes() {
        let exact = Assertion::text(
            Locator::Selector("h1".into()),
            "Welcome  back, Ada",
            MatchMode::Exact,
        );
        assert!(check(exact).passed);

        let partial = Assertion::text(Locator::Selector("h1".into()), "welcome", MatchMode::Exact);
        assert!(!check(partial).passed);

        let contains = Assertion::text(Locator::Page, "back, ada", MatchMode::Contains);
        assert!(check(contains).passed);

        let hidden = Assertion::text(Locator::Page, "Saved", MatchMode::Contains);
        assert!(!check(hidden).passed);
    }

    #[test]
    fn test_minimum_count_ignores_hidden() {
        assert!(check(Assertion::min_count("css(#results li.item)", 2)).passed);
        let verdict = check(Assertion::min_count("css(li.item)", 3));
        assert!(!verdict.passed);
        assert!(verdict.detail.contains("found 2"));
    }

    #[test]
    fn test_all_reports_first_failure() {
        let assertions = vec![
            Assertion::visible("css(h1)"),
            Assertion::min_count("css(li)", 5),
            Assertion::visible("css(.missing)"),
        ];
        let verdict = validate_all(&assertions, &page(), &ResolverOptions::default());
        assert!(!verdict.passed);
        assert!(verdict.detail.contains("at least 5"));
    }

    #[test]
    fn test_invalid_selector_fails() {
        let verdict = check(Assertion::visible("css(a:hover)"));
        assert!(!verdict.passed);
        assert!(verdict.detail.contains("invalid selector"));
    }

    #[test]
    fn test_empty_snapshot() {
        let empty = PageSnapshot::default();
        let verdict = validate(
            &Assertion::visible("dashboard"),
            &empty,
            &ResolverOptions::default(),
        );
        assert!(!verdict.passed);
    }
}
