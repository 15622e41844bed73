//! Snapshot types produced by one extraction pass.
//!
//! Snapshots are created fresh per pass, never mutated afterwards, and are
//! the immutable input to every downstream stage.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use formpilot_page_adapter::BoundingBox;
use serde::{Deserialize, Serialize};

/// Computed-style facts sampled for one element.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedVisibility {
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub visibility: String,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub offset_left: f64,
    #[serde(default)]
    pub offset_top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub z_index: String,
    /// Raw `clip`/`clip-path` value when one is set.
    #[serde(default)]
    pub clip: Option<String>,
    /// Raw `transform` value when one is set.
    #[serde(default)]
    pub transform: Option<String>,
}

fn default_opacity() -> f64 {
    1.0
}

/// One interactive DOM node, as read by the extraction pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSnapshot {
    pub tag: String,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub class_names: BTreeSet<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub current_value: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub visibility: ComputedVisibility,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    /// Label candidates in association order: `for`-attribute label,
    /// enclosing label, aria-label, nearest preceding text.
    #[serde(default)]
    pub nearby_labels: Vec<String>,
    #[serde(default)]
    pub ancestor_form_id: Option<String>,
    /// An ancestor container is itself style-hidden.
    #[serde(default)]
    pub ancestor_hidden: bool,
    #[serde(default)]
    pub tabindex: Option<i32>,
    #[serde(default)]
    pub aria_hidden: bool,
    /// Stable generated selector (id, then name, then structural path).
    pub selector: String,
    /// Option values for `<select>` nodes.
    #[serde(default)]
    pub options: Vec<String>,
}

impl ElementSnapshot {
    pub fn is_checkbox(&self) -> bool {
        self.input_type.as_deref() == Some("checkbox")
    }

    pub fn is_submit_like(&self) -> bool {
        self.tag == "button"
            || matches!(self.input_type.as_deref(), Some("submit") | Some("button"))
    }

    pub fn is_select(&self) -> bool {
        self.tag == "select"
    }

    /// Every joined label candidate, for token matching.
    pub fn label_text(&self) -> String {
        self.nearby_labels.join(" ")
    }

    /// Lowercased identity tokens from id/name/class/placeholder/labels.
    /// Shared vocabulary for trap detection and heuristic purpose inference.
    pub fn identity_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut push_split = |raw: &str| {
            for token in raw
                .split(|c: char| !c.is_ascii_alphanumeric())
                .filter(|t| !t.is_empty())
            {
                tokens.push(token.to_ascii_lowercase());
            }
        };
        if let Some(id) = &self.id {
            push_split(id);
        }
        if let Some(name) = &self.name {
            push_split(name);
        }
        for class in &self.class_names {
            push_split(class);
        }
        if let Some(placeholder) = &self.placeholder {
            push_split(placeholder);
        }
        push_split(&self.label_text());
        tokens
    }
}

/// Page-level signals captured alongside the elements.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub looks_like_signup: bool,
    #[serde(default)]
    pub looks_like_login: bool,
    #[serde(default)]
    pub frame_count: usize,
    #[serde(default)]
    pub has_challenge_widget: bool,
    #[serde(default)]
    pub form_count: usize,
    /// Script/style/comment-stripped HTML of form-bearing regions,
    /// truncated before it leaves the page.
    #[serde(default)]
    pub html_excerpt: String,
}

/// How the pre-sample quiescence wait went. Informational only; a timeout
/// never aborts extraction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuiescenceReport {
    pub network_idle_reached: bool,
    pub indicator_matched: Option<String>,
    pub waited_ms: u64,
}

/// Complete output of one extraction pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub context: PageContext,
    pub elements: Vec<ElementSnapshot>,
    pub quiescence: QuiescenceReport,
    pub captured_at: DateTime<Utc>,
}

impl PageSnapshot {
    pub fn element(&self, selector: &str) -> Option<&ElementSnapshot> {
        self.elements.iter().find(|e| e.selector == selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_tokens_split_and_lowercase() {
        let snap = ElementSnapshot {
            tag: "input".into(),
            id: Some("user_Email-field".into()),
            name: Some("email".into()),
            placeholder: Some("Your e-mail".into()),
            selector: "#user_Email-field".into(),
            ..Default::default()
        };
        let tokens = snap.identity_tokens();
        assert!(tokens.contains(&"user".to_string()));
        assert!(tokens.contains(&"email".to_string()));
        assert!(tokens.contains(&"field".to_string()));
        assert!(tokens.contains(&"mail".to_string()));
    }

    #[test]
    fn checkbox_and_submit_detection() {
        let checkbox = ElementSnapshot {
            tag: "input".into(),
            input_type: Some("checkbox".into()),
            selector: "#terms".into(),
            ..Default::default()
        };
        assert!(checkbox.is_checkbox());
        assert!(!checkbox.is_submit_like());

        let button = ElementSnapshot {
            tag: "button".into(),
            selector: "form button".into(),
            ..Default::default()
        };
        assert!(button.is_submit_like());
    }

    #[test]
    fn snapshot_deserializes_camel_case_payload() {
        let raw = serde_json::json!({
            "tag": "input",
            "inputType": "email",
            "classNames": ["form-control"],
            "currentValue": "",
            "required": true,
            "visibility": {
                "display": "block",
                "visibility": "visible",
                "opacity": 1.0,
                "position": "static",
                "offsetLeft": 12.0,
                "offsetTop": 40.0,
                "width": 220.0,
                "height": 32.0,
                "zIndex": "auto"
            },
            "nearbyLabels": ["Email address"],
            "selector": "#email"
        });
        let snap: ElementSnapshot = serde_json::from_value(raw).unwrap();
        assert_eq!(snap.input_type.as_deref(), Some("email"));
        assert!(snap.required);
        assert_eq!(snap.visibility.width, 220.0);
        assert_eq!(snap.label_text(), "Email address");
    }
}
