//! Free-text step grammar.
//!
//! A phrase is classified by an ordered list of pure matcher functions. Each
//! matcher recognizes one verb family and either returns a [`StepSpec`] or passes.
//! The first matcher to return a step wins.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use tessel_common::scenario::{
    ActionKind, Assertion, Locator, MatchMode, ScrollDirection, StepSpec, WaitCondition,
};

type Matcher = fn(usize, &str) -> Option<StepSpec>;

const MATCHERS: &[Matcher] = &[
    match_scroll,
    match_type,
    match_select,
    match_hover,
    match_wait,
    match_verify,
    match_click,
];

/// Seconds a bare `wait` pauses for.
const DEFAULT_WAIT_SECS: &str = "2";

// Quoted value in either quote style; read back with `quoted`.
const Q: &str = r#"(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#;
const VERIFY: &str = r"(?:verify|check|assert|expect|ensure|confirm)(?:\s+that)?";

fn re(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).unwrap()
}

static SCROLL_RE: LazyLock<Regex> = LazyLock::new(|| re(r"^scroll(?:\s+(?P<rest>.+))?$"));
static SCROLL_AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^(?P<dir>up|down|left|right)(?:\s+by)?\s+(?P<n>\d+)(?:\s*(?:px|pixels))?$")
});

static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(&format!(
        r"^(?:type|enter|input)\s+{Q}\s+(?:into|in|on)\s+(?P<t>.+)$"
    ))
});
static FILL_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(&format!(r"^fill(?:\s+in|\s+out)?\s+(?P<t>.+?)\s+with\s+{Q}$"))
});

static SELECT_QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(&format!(
        r"^(?:select|choose)\s+{Q}\s+(?:from|in)\s+(?P<t>.+)$"
    ))
});
static SELECT_BARE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^(?:select|choose)\s+(?P<v>.+?)\s+from\s+(?P<t>.+)$"));

static HOVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^(?:hover(?:\s+over|\s+on)?|mouse\s+over|move(?:\s+the)?(?:\s+mouse|\s+pointer)?\s+(?:to|over))\s+(?P<t>.+)$")
});

static WAIT_DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^wait(?:\s+for)?\s+(?P<n>\d+(?:\.\d+)?)\s*(?P<u>milliseconds?|ms|seconds?|secs?|s)?$")
});
static WAIT_BOUNDED_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^wait\s+up\s+to\s+(?P<n>\d+(?:\.\d+)?)\s*(?:seconds?|secs?|s)\s+for\s+(?P<t>.+?)(?:\s+to\s+(?P<c>appear|disappear|load|be\s+visible|be\s+hidden|go\s+away))?$")
});
static WAIT_GONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^wait\s+(?:until|till|for)\s+(?P<t>.+?)\s+(?:disappears|is\s+gone|is\s+hidden|vanishes|goes\s+away)$")
});
static WAIT_TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^wait\s+(?:for|until|till)\s+(?P<t>.+?)(?:\s+to\s+(?P<c>appear|disappear|load|be\s+visible|be\s+hidden|go\s+away)|\s+(?:appears|is\s+visible|loads|is\s+shown))?$")
});

static VERIFY_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(&format!(
        r"^{VERIFY}\s+(?:there\s+(?:are|is)\s+)?at\s+least\s+(?P<n>\d+)\s+(?P<t>.+?)(?:\s+(?:are|is)\s+(?:visible|present|shown|displayed))?$"
    ))
});
static VERIFY_PAGE_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(&format!(
        r"^{VERIFY}\s+(?:the\s+)?(?:page\s+)?(?:text\s+)?{Q}\s+(?:is\s+present|is\s+displayed|is\s+shown|is\s+visible|appears|exists)(?:\s+on\s+(?:the\s+)?page)?$"
    ))
});
static VERIFY_PAGE_CONTAINS_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(&format!(
        r"^{VERIFY}\s+(?:the\s+)?page\s+(?:contains|includes|shows|has\s+text)\s+{Q}$"
    ))
});
static VERIFY_EXACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(&format!(
        r"^{VERIFY}\s+(?P<t>.+?)\s+(?:text\s+)?(?:is|equals|reads)\s+{Q}$"
    ))
});
static VERIFY_CONTAINS_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(&format!(
        r"^{VERIFY}\s+(?P<t>.+?)\s+(?:contains|includes|has\s+text|shows)\s+{Q}$"
    ))
});
static VERIFY_VISIBLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(&format!(
        r"^{VERIFY}\s+(?P<t>.+?)(?:\s+(?:appears|is\s+visible|is\s+displayed|is\s+shown|exists|is\s+present|shows\s+up|loads))?$"
    ))
});

static CLICK_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^(?:click|press|tap)(?:\s+on)?\s+(?P<t>.+)$"));

/// Classifies one free-text phrase. Unrecognized phrases become `unknown` steps.
pub fn parse_phrase(index: usize, phrase: &str) -> StepSpec {
    let cleaned = clean(phrase);
    MATCHERS
        .iter()
        .find_map(|m| m(index, &cleaned))
        .map(|mut step| {
            step.description = phrase.trim().to_string();
            step
        })
        .unwrap_or_else(|| StepSpec::unknown(index, phrase.trim()))
}

fn clean(phrase: &str) -> String {
    let collapsed = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(['.', '!', ';'])
        .trim()
        .to_string()
}

fn quoted(caps: &Captures<'_>) -> Option<String> {
    caps.name("dq")
        .or_else(|| caps.name("sq"))
        .map(|m| m.as_str().to_string())
}

/// Trims and unquotes a captured target phrase.
fn target(raw: &str) -> Option<String> {
    let t = raw.trim();
    let t = t
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| t.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(t)
        .trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn seconds_to_ms(n: &str) -> Option<u64> {
    let secs: f64 = n.parse().ok()?;
    Some((secs * 1000.0).round() as u64)
}

fn match_scroll(index: usize, text: &str) -> Option<StepSpec> {
    let caps = SCROLL_RE.captures(text)?;
    let rest = caps.name("rest").map(|m| m.as_str().trim()).unwrap_or("down");
    let step = StepSpec::new(index, text, ActionKind::Scroll);

    if let Some(amount) = SCROLL_AMOUNT_RE.captures(rest) {
        return Some(
            step.with_target(amount["dir"].to_ascii_lowercase())
                .with_value(&amount["n"]),
        );
    }
    if ScrollDirection::from_phrase(rest).is_some() {
        return Some(step.with_target(rest.to_ascii_lowercase()));
    }
    let lower = rest.to_ascii_lowercase();
    let element = ["to ", "down to ", "until "]
        .iter()
        .find(|prefix| lower.starts_with(*prefix))
        .map_or(rest, |prefix| &rest[prefix.len()..]);
    Some(step.with_target(target(element)?))
}

fn match_type(index: usize, text: &str) -> Option<StepSpec> {
    let caps = TYPE_RE
        .captures(text)
        .or_else(|| FILL_RE.captures(text))?;
    Some(
        StepSpec::new(index, text, ActionKind::Type)
            .with_value(quoted(&caps)?)
            .with_target(target(&caps["t"])?),
    )
}

fn match_select(index: usize, text: &str) -> Option<StepSpec> {
    if let Some(caps) = SELECT_QUOTED_RE.captures(text) {
        return Some(
            StepSpec::new(index, text, ActionKind::Select)
                .with_value(quoted(&caps)?)
                .with_target(target(&caps["t"])?),
        );
    }
    let caps = SELECT_BARE_RE.captures(text)?;
    Some(
        StepSpec::new(index, text, ActionKind::Select)
            .with_value(caps["v"].trim())
            .with_target(target(&caps["t"])?),
    )
}

fn match_hover(index: usize, text: &str) -> Option<StepSpec> {
    let caps = HOVER_RE.captures(text)?;
    Some(StepSpec::new(index, text, ActionKind::Hover).with_target(target(&caps["t"])?))
}

fn wait_condition(caps: &Captures<'_>) -> WaitCondition {
    match caps.name("c").map(|m| m.as_str().to_ascii_lowercase()) {
        Some(c) if c.starts_with("disappear") || c.contains("hidden") || c.contains("away") => {
            WaitCondition::Disappears
        }
        _ => WaitCondition::Appears,
    }
}

fn match_wait(index: usize, text: &str) -> Option<StepSpec> {
    let step = StepSpec::new(index, text, ActionKind::Wait);
    if text.eq_ignore_ascii_case("wait") {
        return Some(step.with_value(DEFAULT_WAIT_SECS));
    }

    if let Some(caps) = WAIT_DURATION_RE.captures(text) {
        let n: f64 = caps["n"].parse().ok()?;
        let unit = caps.name("u").map(|u| u.as_str().to_ascii_lowercase());
        let secs = match unit.as_deref() {
            Some(u) if u.starts_with("ms") || u.starts_with("milli") => n / 1000.0,
            _ => n,
        };
        return Some(step.with_value(format_secs(secs)));
    }

    if let Some(caps) = WAIT_BOUNDED_RE.captures(text) {
        let mut step = step
            .with_target(target(&caps["t"])?)
            .with_timeout(seconds_to_ms(&caps["n"])?);
        step.wait_until = wait_condition(&caps);
        return Some(step);
    }

    if let Some(caps) = WAIT_GONE_RE.captures(text) {
        let mut step = step.with_target(target(&caps["t"])?);
        step.wait_until = WaitCondition::Disappears;
        return Some(step);
    }

    let caps = WAIT_TARGET_RE.captures(text)?;
    let mut step = step.with_target(target(&caps["t"])?);
    step.wait_until = wait_condition(&caps);
    Some(step)
}

fn format_secs(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{secs}")
    }
}

fn match_verify(index: usize, text: &str) -> Option<StepSpec> {
    let step = StepSpec::new(index, text, ActionKind::Verify);

    if let Some(caps) = VERIFY_COUNT_RE.captures(text) {
        let count: usize = caps["n"].parse().ok()?;
        let t = target(&caps["t"])?;
        return Some(
            step.with_target(t.clone())
                .with_assertion(Assertion::min_count(t, count)),
        );
    }

    if let Some(caps) = VERIFY_PAGE_TEXT_RE
        .captures(text)
        .or_else(|| VERIFY_PAGE_CONTAINS_RE.captures(text))
    {
        return Some(step.with_target("page").with_assertion(Assertion::text(
            Locator::Page,
            quoted(&caps)?,
            MatchMode::Contains,
        )));
    }

    for (regex, mode) in [
        (&*VERIFY_EXACT_RE, MatchMode::Exact),
        (&*VERIFY_CONTAINS_RE, MatchMode::Contains),
    ] {
        if let Some(caps) = regex.captures(text) {
            let t = target(&caps["t"])?;
            let expected = quoted(&caps)?;
            let locator = if is_page_target(&t) {
                Locator::Page
            } else {
                Locator::for_target(t.clone())
            };
            return Some(
                step.with_target(t)
                    .with_assertion(Assertion::text(locator, expected, mode)),
            );
        }
    }

    let caps = VERIFY_VISIBLE_RE.captures(text)?;
    let t = target(&caps["t"])?;
    Some(
        step.with_target(t.clone())
            .with_assertion(Assertion::visible(t)),
    )
}

fn is_page_target(t: &str) -> bool {
    matches!(
        t.to_ascii_lowercase().as_str(),
        "page" | "the page" | "page text" | "the page text" | "body"
    )
}

fn match_click(index: usize, text: &str) -> Option<StepSpec> {
    let caps = CLICK_RE.captures(text)?;
    Some(StepSpec::new(index, text, ActionKind::Click).with_target(target(&caps["t"])?))
}
