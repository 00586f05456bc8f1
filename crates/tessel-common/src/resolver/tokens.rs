//! Target description decomposition.

use serde::{Deserialize, Serialize};

const FILLER_WORDS: &[&str] = &[
    "the", "a", "an", "on", "into", "that", "over", "this", "please",
];

/// Element family a description asks for, inferred from trailing nouns like "button".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Button,
    Field,
    Link,
    Navigation,
    Dropdown,
    Checkbox,
    Heading,
    Image,
}

fn intent_word(word: &str) -> Option<Intent> {
    match word {
        "button" | "btn" | "buttons" => Some(Intent::Button),
        "field" | "input" | "box" | "textbox" | "textarea" | "fields" => Some(Intent::Field),
        "link" | "links" | "anchor" => Some(Intent::Link),
        "menu" | "nav" | "navigation" | "navbar" | "tab" | "tabs" => Some(Intent::Navigation),
        "dropdown" | "select" | "combobox" | "picker" => Some(Intent::Dropdown),
        "checkbox" | "radio" | "toggle" => Some(Intent::Checkbox),
        "heading" | "title" | "header" => Some(Intent::Heading),
        "image" | "icon" | "logo" | "picture" => Some(Intent::Image),
        _ => None,
    }
}

/// A target description split into content tokens and an optional intent.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetQuery {
    /// Lowercased description with fillers removed, intent words kept.
    pub phrase: String,
    /// Content tokens with fillers and intent words removed.
    pub tokens: Vec<String>,
    pub intent: Option<Intent>,
}

impl TargetQuery {
    pub fn parse(description: &str) -> Self {
        let words: Vec<String> = words(description)
            .into_iter()
            .filter(|w| !FILLER_WORDS.contains(&w.as_str()))
            .collect();

        // Trailing intent word wins ("search box button" is a button).
        let intent = words.iter().rev().find_map(|w| intent_word(w));

        let mut tokens: Vec<String> = words
            .iter()
            .filter(|w| intent_word(w).is_none())
            .cloned()
            .collect();
        // "the button" still carries meaning through its intent word.
        if tokens.is_empty() && intent.is_some() {
            tokens = words.clone();
        }

        Self {
            phrase: words.join(" "),
            tokens,
            intent,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.intent.is_none()
    }

    /// Content tokens rejoined, the text a label is expected to carry.
    pub fn content(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Lowercase alphanumeric words. Splits camelCase and snake_case identifiers.
pub fn words(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            prev_lower = c.is_lowercase() || c.is_numeric();
            current.extend(c.to_lowercase());
        } else {
            prev_lower = false;
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Lowercased text with only alphanumerics, so "Log in" and "login" compare equal.
pub fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}
