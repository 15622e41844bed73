//! LLM-free heuristic scanner.
//!
//! When the generative path fails outright, this produces the identical
//! contract from rule-based purpose inference over the snapshot, with the
//! same trap rules applied and confidence capped below the generative
//! path's typical range.

use formpilot_form_perceiver::{ElementSnapshot, PageSnapshot};
use formpilot_trap_gate::TrapVerdict;
use tracing::info;

use crate::contract::{
    AnalysisResult, AnalysisSource, ButtonPlan, CheckboxPlan, FieldPlan, FieldPurpose,
    HoneypotEntry, Importance, PageType,
};
use crate::repair::GENERIC_SUBMIT_SELECTOR;

/// The fallback never claims more certainty than this.
pub const FALLBACK_CONFIDENCE_CAP: f64 = 0.8;

/// Input types that are never fillable targets.
const NON_FILLABLE_TYPES: &[&str] = &["hidden", "submit", "button", "image", "reset", "file"];

/// Heuristic full-page scan, bypassing the generative stage entirely.
pub fn scan(snapshot: &PageSnapshot, verdicts: &[TrapVerdict]) -> AnalysisResult {
    let mut fields = Vec::new();
    let mut checkboxes = Vec::new();
    let mut honeypots: Vec<HoneypotEntry> = verdicts
        .iter()
        .filter(|v| v.is_trap)
        .map(HoneypotEntry::from)
        .collect();
    let mut submit_button = None;
    let mut recognized = 0usize;

    for element in &snapshot.elements {
        if verdicts
            .iter()
            .any(|v| v.is_trap && v.element_selector == element.selector)
        {
            continue;
        }

        if element.is_submit_like() {
            if submit_button.is_none() && submit_tokens_match(element) {
                submit_button = Some(ButtonPlan {
                    selector: element.selector.clone(),
                    text: element.label_text(),
                    ..Default::default()
                });
            }
            continue;
        }

        if element.is_checkbox() {
            checkboxes.push(CheckboxPlan {
                selector: element.selector.clone(),
                label_text: element.label_text(),
                required: element.required,
                ..Default::default()
            });
            continue;
        }

        if let Some(input_type) = &element.input_type {
            if NON_FILLABLE_TYPES.contains(&input_type.as_str()) {
                continue;
            }
            if input_type == "checkbox" || input_type == "radio" {
                continue;
            }
        }
        if element.disabled {
            continue;
        }

        let purpose = infer_purpose(element);
        if purpose != FieldPurpose::Other {
            recognized += 1;
        }
        fields.push(FieldPlan {
            purpose,
            selector: element.selector.clone(),
            element_type: element.tag.clone(),
            required: element.required,
            importance: importance_for(purpose, element.required),
            ..Default::default()
        });
    }

    // Dedup honeypots the detector may have reported twice across passes.
    honeypots.dedup_by(|a, b| a.selector == b.selector);

    let confidence = (0.4 + 0.05 * recognized as f64).min(FALLBACK_CONFIDENCE_CAP);
    let page_type = if snapshot.context.looks_like_signup {
        PageType::Signup
    } else if snapshot.context.looks_like_login {
        PageType::Login
    } else {
        PageType::Unknown
    };

    info!(
        fields = fields.len(),
        checkboxes = checkboxes.len(),
        honeypots = honeypots.len(),
        confidence,
        "heuristic fallback scan complete"
    );

    AnalysisResult {
        analysis: format!(
            "heuristic scan of {} interactive elements ({} recognized purposes)",
            snapshot.elements.len(),
            recognized
        ),
        page_type,
        confidence,
        fields,
        checkboxes,
        honeypots,
        submit_button: submit_button.or_else(|| {
            Some(ButtonPlan {
                selector: GENERIC_SUBMIT_SELECTOR.to_string(),
                ..Default::default()
            })
        }),
        source: AnalysisSource::Fallback,
    }
}

/// Token-based purpose inference over name/id/placeholder/label text.
pub fn infer_purpose(element: &ElementSnapshot) -> FieldPurpose {
    // The input type is the strongest signal when present.
    match element.input_type.as_deref() {
        Some("email") => return FieldPurpose::Email,
        Some("password") => {
            return if has_any(element, &["confirm", "repeat", "again", "verify"]) {
                FieldPurpose::ConfirmPassword
            } else {
                FieldPurpose::Password
            }
        }
        Some("tel") => return FieldPurpose::Phone,
        _ => {}
    }

    if has_any(element, &["email", "mail"]) {
        return FieldPurpose::Email;
    }
    if has_any(element, &["password", "passwd", "pwd"]) {
        return if has_any(element, &["confirm", "repeat", "again", "verify"]) {
            FieldPurpose::ConfirmPassword
        } else {
            FieldPurpose::Password
        };
    }
    if has_any(element, &["first", "fname", "given"]) && has_any(element, &["name", "fname"]) {
        return FieldPurpose::FirstName;
    }
    if has_any(element, &["last", "lname", "surname", "family"]) {
        return FieldPurpose::LastName;
    }
    if has_any(element, &["phone", "tel", "mobile"]) {
        return FieldPurpose::Phone;
    }
    if has_any(element, &["company", "organization", "organisation", "employer"]) {
        return FieldPurpose::Company;
    }
    if has_any(element, &["username", "user", "login", "nickname", "handle"]) {
        return FieldPurpose::Username;
    }
    if element.is_select() && has_any(element, &["country", "region", "nation"]) {
        return FieldPurpose::Country;
    }
    if has_any(element, &["name", "fullname"]) {
        return FieldPurpose::FullName;
    }
    FieldPurpose::Other
}

fn importance_for(purpose: FieldPurpose, required: bool) -> Importance {
    match purpose {
        FieldPurpose::Email | FieldPurpose::Password | FieldPurpose::ConfirmPassword => {
            Importance::Critical
        }
        FieldPurpose::FirstName
        | FieldPurpose::LastName
        | FieldPurpose::FullName
        | FieldPurpose::Username => Importance::Important,
        _ if required => Importance::Important,
        _ => Importance::Optional,
    }
}

fn has_any(element: &ElementSnapshot, needles: &[&str]) -> bool {
    let tokens = element.identity_tokens();
    needles
        .iter()
        .any(|needle| tokens.iter().any(|token| token == needle))
}

fn submit_tokens_match(element: &ElementSnapshot) -> bool {
    if element.input_type.as_deref() == Some("submit") {
        return true;
    }
    let text = element.label_text().to_ascii_lowercase();
    let tokens = element.identity_tokens();
    ["submit", "register", "join", "signup", "continue", "next", "create"]
        .iter()
        .any(|needle| text.contains(needle) || tokens.iter().any(|t| t == needle))
}
