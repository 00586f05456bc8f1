//! Minimal CSS selector matching over snapshots.
//!
//! Supports type, `#id`, `.class` and attribute (`[a]`, `[a=v]`, `[a^=v]`,
//! `[a$=v]`, `[a*=v]`) simple selectors, compounds of those, the descendant
//! combinator and comma-separated lists. Pseudo-classes are rejected.

use crate::protocol::{ElementNode, SnapshotContext};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,
    #[error("Unsupported selector syntax '{0}'")]
    Unsupported(String),
    #[error("Unterminated attribute selector in '{0}'")]
    Unterminated(String),
}

#[derive(Debug, Clone, PartialEq)]
enum AttrOp {
    Exists,
    Equals(String),
    Prefix(String),
    Suffix(String),
    Substring(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, AttrOp)>,
}

impl Compound {
    fn matches(&self, node: &ElementNode) -> bool {
        if let Some(tag) = &self.tag
            && tag != "*"
            && *tag != node.tag
        {
            return false;
        }
        if let Some(id) = &self.id
            && node.attr("id") != Some(id.as_str())
        {
            return false;
        }
        if !self
            .classes
            .iter()
            .all(|c| node.classes().any(|nc| nc == c))
        {
            return false;
        }
        self.attrs.iter().all(|(name, op)| {
            let Some(value) = node.attributes.get(name) else {
                return false;
            };
            match op {
                AttrOp::Exists => true,
                AttrOp::Equals(v) => value == v,
                AttrOp::Prefix(v) => value.starts_with(v.as_str()),
                AttrOp::Suffix(v) => value.ends_with(v.as_str()),
                AttrOp::Substring(v) => value.contains(v.as_str()),
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    source: String,
    // Each alternative is a descendant chain, outermost first.
    alternatives: Vec<Vec<Compound>>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut alternatives = Vec::new();
        for part in split_outside_brackets(source, ',') {
            let chain = part
                .split_whitespace()
                .map(parse_compound)
                .collect::<Result<Vec<_>, _>>()?;
            if chain.is_empty() {
                return Err(SelectorError::Empty);
            }
            alternatives.push(chain);
        }
        Ok(Self {
            source: source.to_string(),
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, node: &ElementNode, ctx: &SnapshotContext<'_>) -> bool {
        self.alternatives
            .iter()
            .any(|chain| matches_chain(chain, node, ctx))
    }

    /// All matching elements in DOM order.
    pub fn select_all<'a>(&self, ctx: &SnapshotContext<'a>) -> Vec<&'a ElementNode> {
        ctx.elements()
            .iter()
            .filter(|e| self.matches(e, ctx))
            .collect()
    }
}

fn matches_chain(chain: &[Compound], node: &ElementNode, ctx: &SnapshotContext<'_>) -> bool {
    let Some((last, rest)) = chain.split_last() else {
        return false;
    };
    if !last.matches(node) {
        return false;
    }
    // Greedy right-to-left walk is exact for descendant-only chains.
    let mut pending = rest.iter().rev().peekable();
    for ancestor in ctx.ancestors(node) {
        match pending.peek() {
            Some(c) if c.matches(ancestor) => {
                pending.next();
            }
            Some(_) => {}
            None => break,
        }
    }
    pending.peek().is_none()
}

fn split_outside_brackets(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(input[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(input[start..].trim());
    parts
}

fn parse_compound(token: &str) -> Result<Compound, SelectorError> {
    let mut compound = Compound::default();
    let chars: Vec<char> = token.chars().collect();
    let mut i = 0;

    let read_ident = |i: &mut usize| -> String {
        let start = *i;
        while *i < chars.len() && (chars[*i].is_alphanumeric() || matches!(chars[*i], '-' | '_'))
        {
            *i += 1;
        }
        chars[start..*i].iter().collect()
    };

    if i < chars.len() && (chars[i].is_alphabetic() || chars[i] == '*') {
        if chars[i] == '*' {
            i += 1;
            compound.tag = Some("*".into());
        } else {
            compound.tag = Some(read_ident(&mut i).to_ascii_lowercase());
        }
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                i += 1;
                let id = read_ident(&mut i);
                if id.is_empty() {
                    return Err(SelectorError::Unsupported(token.into()));
                }
                compound.id = Some(id);
            }
            '.' => {
                i += 1;
                let class = read_ident(&mut i);
                if class.is_empty() {
                    return Err(SelectorError::Unsupported(token.into()));
                }
                compound.classes.push(class);
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|&c| c == ']')
                    .ok_or_else(|| SelectorError::Unterminated(token.into()))?;
                let body: String = chars[i + 1..i + close].iter().collect();
                compound.attrs.push(parse_attr(&body, token)?);
                i += close + 1;
            }
            _ => return Err(SelectorError::Unsupported(token.into())),
        }
    }

    Ok(compound)
}

fn parse_attr(body: &str, token: &str) -> Result<(String, AttrOp), SelectorError> {
    let unquote = |v: &str| v.trim().trim_matches(|c| c == '"' || c == '\'').to_string();
    let Some(eq) = body.find('=') else {
        let name = body.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(SelectorError::Unsupported(token.into()));
        }
        return Ok((name, AttrOp::Exists));
    };
    let (lhs, rhs) = (&body[..eq], &body[eq + 1..]);
    let value = unquote(rhs);
    let (name, op) = match lhs.chars().last() {
        Some('^') => (&lhs[..lhs.len() - 1], AttrOp::Prefix(value)),
        Some('$') => (&lhs[..lhs.len() - 1], AttrOp::Suffix(value)),
        Some('*') => (&lhs[..lhs.len() - 1], AttrOp::Substring(value)),
        Some('~' | '|') => return Err(SelectorError::Unsupported(token.into())),
        _ => (lhs, AttrOp::Equals(value)),
    };
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() {
        return Err(SelectorError::Unsupported(token.into()));
    }
    Ok((name, op))
}
