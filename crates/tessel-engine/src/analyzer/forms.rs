use super::selector_for;
use serde::{Deserialize, Serialize};
use tessel_common::protocol::ElementNode;
use tessel_common::resolver::{ElementClassification, ResolutionIndex, classify, is_form_container};
use tessel_common::resolver::tokens::words;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
}

impl ValidationRules {
    fn from_node(node: &ElementNode) -> Self {
        Self {
            pattern: node.attr("pattern").map(String::from),
            min_length: node.attr("minlength").and_then(|v| v.parse().ok()),
            max_length: node.attr("maxlength").and_then(|v| v.parse().ok()),
            min: node.attr("min").map(String::from),
            max: node.attr("max").map(String::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormInput {
    pub element_id: u32,
    pub tag: String,
    /// Declared or inferred: text, email, password, checkbox, select, textarea...
    pub input_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub required: bool,
    pub selector: String,
    #[serde(default)]
    pub validation: ValidationRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormControl {
    pub element_id: u32,
    pub selector: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormInfo {
    pub element_id: u32,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub method: String,
    pub inputs: Vec<FormInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit: Option<FormControl>,
    pub classification: ElementClassification,
}

impl FormInfo {
    /// A short human name for scenario titles.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.inputs.iter().find_map(|i| i.label.clone()))
            .unwrap_or_else(|| self.selector.clone())
    }
}

#[derive(Default)]
pub(super) struct FormCollector {
    forms: Vec<FormInfo>,
    // Buttons seen per form, in DOM order, for submit detection.
    buttons: Vec<(u32, ElementNode)>,
}

impl FormCollector {
    pub fn visit(&mut self, node: &ElementNode, index: &ResolutionIndex<'_>) {
        let ctx = index.context();
        if is_form_container(node) {
            self.forms.push(FormInfo {
                element_id: node.id,
                selector: selector_for(node, ctx),
                name: node.attr("name").or_else(|| node.attr("id")).map(String::from),
                action: node.attr("action").map(String::from),
                method: node
                    .attr("method")
                    .map(|m| m.to_ascii_lowercase())
                    .unwrap_or_else(|| "get".into()),
                inputs: Vec::new(),
                submit: None,
                classification: classify(node),
            });
            return;
        }

        if !node.visible {
            return;
        }
        let Some(form) = ctx.closest(node, is_form_container) else {
            return;
        };
        let Some(info) = self.forms.iter_mut().find(|f| f.element_id == form.id) else {
            return;
        };

        if node.is_button_like() {
            self.buttons.push((form.id, node.clone()));
        } else if node.is_field() {
            info.inputs.push(FormInput {
                element_id: node.id,
                tag: node.tag.clone(),
                input_type: infer_type(node),
                name: node.attr("name").map(String::from),
                label: field_label(node, index),
                required: node.has_attr("required") || node.attr("aria-required") == Some("true"),
                selector: selector_for(node, ctx),
                validation: ValidationRules::from_node(node),
            });
        }
    }

    pub fn finish(mut self) -> Vec<FormInfo> {
        for form in &mut self.forms {
            let buttons: Vec<&ElementNode> = self
                .buttons
                .iter()
                .filter(|(f, _)| *f == form.element_id)
                .map(|(_, b)| b)
                .collect();
            let submit = buttons
                .iter()
                .find(|b| b.input_type().as_deref() == Some("submit"))
                .or_else(|| {
                    buttons
                        .iter()
                        .find(|b| b.tag == "button" && b.attr("type").is_none())
                })
                .or_else(|| buttons.first());
            form.submit = submit.map(|b| FormControl {
                element_id: b.id,
                selector: button_selector(b, &form.selector),
                label: button_label(b),
            });
        }
        // Forms with nothing to fill or press are layout wrappers.
        self.forms
            .into_iter()
            .filter(|f| !f.inputs.is_empty() || f.submit.is_some())
            .collect()
    }
}

/// Submit control selector, scoped to its form unless the control has an id.
fn button_selector(node: &ElementNode, form_selector: &str) -> String {
    if let Some(id) = node.attr("id").filter(|id| super::is_ident(id)) {
        return format!("#{id}");
    }
    let control = match node.input_type() {
        Some(t) if (node.tag == "input" || t == "submit") && super::is_attr_safe(&t) => {
            format!("{}[type=\"{t}\"]", node.tag)
        }
        _ => node.tag.clone(),
    };
    format!("{form_selector} {control}")
}

fn button_label(node: &ElementNode) -> String {
    [
        Some(node.text.as_str()),
        node.attr("value"),
        node.attr("aria-label"),
    ]
    .into_iter()
    .flatten()
    .find(|s| !s.trim().is_empty())
    .unwrap_or("submit")
    .to_string()
}

fn infer_type(node: &ElementNode) -> String {
    match node.tag.as_str() {
        "textarea" => return "textarea".into(),
        "select" => return "select".into(),
        _ => {}
    }
    let declared = node.input_type().unwrap_or_else(|| "text".into());
    if declared != "text" {
        return declared;
    }
    let hints: Vec<String> = ["name", "id", "placeholder", "autocomplete"]
        .iter()
        .filter_map(|a| node.attr(a))
        .flat_map(words)
        .collect();
    let has = |w: &str| hints.iter().any(|h| h == w);
    if has("email") || has("mail") {
        "email".into()
    } else if has("password") || has("pass") || has("pwd") {
        "password".into()
    } else if has("phone") || has("tel") || has("mobile") {
        "tel".into()
    } else if has("search") || has("q") {
        "search".into()
    } else {
        declared
    }
}

fn field_label(node: &ElementNode, index: &ResolutionIndex<'_>) -> Option<String> {
    index
        .label(node.id)
        .or_else(|| node.attr("aria-label"))
        .or_else(|| node.attr("placeholder"))
        .map(String::from)
        .or_else(|| node.attr("name").map(|n| words(n).join(" ")))
        .filter(|l| !l.trim().is_empty())
}
