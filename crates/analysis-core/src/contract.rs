//! The analysis contract.
//!
//! One fixed shape that both the generative path and the heuristic
//! fallback produce. Downstream code only ever sees these types, never
//! raw model JSON.

use formpilot_trap_gate::TrapVerdict;
use serde::{Deserialize, Serialize};

/// What a field is for. Drives the value table during execution.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldPurpose {
    Email,
    Password,
    ConfirmPassword,
    FirstName,
    LastName,
    FullName,
    Username,
    Phone,
    Company,
    Country,
    #[serde(other)]
    #[default]
    Other,
}

/// Fill priority. Critical fields go first and failures there weigh most.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Critical,
    #[default]
    Important,
    Optional,
}

impl Importance {
    /// Lower ranks fill first.
    pub fn rank(&self) -> u8 {
        match self {
            Importance::Critical => 0,
            Importance::Important => 1,
            Importance::Optional => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Signup,
    Login,
    Contact,
    Checkout,
    Survey,
    #[serde(other)]
    #[default]
    Unknown,
}

/// Which path produced a result.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    Repaired,
    Fallback,
    #[serde(other)]
    #[default]
    Model,
}

/// One fillable field, as the executor consumes it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPlan {
    #[serde(default)]
    pub purpose: FieldPurpose,
    pub selector: String,
    #[serde(default = "default_element_type")]
    pub element_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub importance: Importance,
    /// Set by the selector verifier; entries start unverified.
    #[serde(default)]
    pub selector_valid: bool,
    #[serde(default)]
    pub actually_visible: bool,
    /// Flagged by analysis as possibly decoy; filled only if verified safe.
    #[serde(default)]
    pub suspicious: bool,
}

fn default_element_type() -> String {
    "input".to_string()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckboxPlan {
    pub selector: String,
    #[serde(default)]
    pub label_text: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub selector_valid: bool,
    #[serde(default)]
    pub actually_visible: bool,
    #[serde(default)]
    pub suspicious: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonPlan {
    pub selector: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub selector_valid: bool,
    #[serde(default)]
    pub actually_visible: bool,
}

/// Trap entry carried in the contract, derived from detector verdicts
/// and/or model claims.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoneypotEntry {
    pub selector: String,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

impl From<&TrapVerdict> for HoneypotEntry {
    fn from(verdict: &TrapVerdict) -> Self {
        Self {
            selector: verdict.element_selector.clone(),
            reasons: verdict.reasons.iter().map(|r| r.as_str().to_string()).collect(),
            confidence: verdict.confidence,
        }
    }
}

/// Canonical pipeline output. The four sequence fields are always present
/// (possibly empty) and confidence is always within [0,1].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub page_type: PageType,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub fields: Vec<FieldPlan>,
    #[serde(default)]
    pub checkboxes: Vec<CheckboxPlan>,
    #[serde(default)]
    pub honeypots: Vec<HoneypotEntry>,
    #[serde(default)]
    pub submit_button: Option<ButtonPlan>,
    #[serde(default)]
    pub source: AnalysisSource,
}

impl AnalysisResult {
    /// Low-confidence sentinel for the case where nothing could be
    /// recovered from the model and the heuristic scan is about to run.
    pub fn empty_fallback(reason: impl Into<String>) -> Self {
        Self {
            analysis: reason.into(),
            page_type: PageType::Unknown,
            confidence: 0.2,
            source: AnalysisSource::Fallback,
            ..Default::default()
        }
    }

    pub fn honeypot_selectors(&self) -> Vec<&str> {
        self.honeypots.iter().map(|h| h.selector.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_ordering_is_critical_first() {
        assert!(Importance::Critical.rank() < Importance::Important.rank());
        assert!(Importance::Important.rank() < Importance::Optional.rank());
    }

    #[test]
    fn unknown_purpose_strings_map_to_other() {
        let plan: FieldPlan =
            serde_json::from_value(serde_json::json!({"purpose": "favoriteColor", "selector": "#x"}))
                .unwrap();
        assert_eq!(plan.purpose, FieldPurpose::Other);
        assert_eq!(plan.element_type, "input");
    }

    #[test]
    fn contract_wire_keys_are_camel_case() {
        let result = AnalysisResult {
            page_type: PageType::Signup,
            submit_button: Some(ButtonPlan {
                selector: "button[type=submit]".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let wire = serde_json::to_value(&result).unwrap();
        assert!(wire.get("pageType").is_some());
        assert!(wire.get("submitButton").is_some());
        assert!(wire.get("honeypots").unwrap().is_array());
    }

    #[test]
    fn empty_fallback_is_low_confidence() {
        let sentinel = AnalysisResult::empty_fallback("nothing parseable");
        assert_eq!(sentinel.source, AnalysisSource::Fallback);
        assert!(sentinel.confidence <= 0.3);
        assert!(sentinel.fields.is_empty());
    }
}
