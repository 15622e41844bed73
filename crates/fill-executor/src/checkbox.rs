//! Checkbox decision policy.
//!
//! A fixed priority list, not a learned score: consent boxes get checked,
//! marketing boxes get opted out, bare required boxes get checked,
//! everything else is left alone.

use formpilot_analysis_core::CheckboxPlan;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CheckboxAction {
    Check,
    Uncheck,
    Skip,
}

const CONSENT_TOKENS: &[&str] = &[
    "terms",
    "privacy",
    "consent",
    "agree",
    "agreement",
    "tos",
    "gdpr",
    "policy",
    "conditions",
];

const MARKETING_TOKENS: &[&str] = &[
    "newsletter",
    "marketing",
    "promotional",
    "promotions",
    "promo",
    "subscribe",
    "offers",
    "deals",
    "updates",
];

/// Decide what to do with one checkbox. Priority order is fixed:
/// consent > marketing opt-out > required > skip.
pub fn decide(plan: &CheckboxPlan) -> CheckboxAction {
    let haystack = format!("{} {}", plan.label_text, plan.selector).to_ascii_lowercase();

    if CONSENT_TOKENS.iter().any(|t| haystack.contains(t)) {
        return CheckboxAction::Check;
    }
    if MARKETING_TOKENS.iter().any(|t| haystack.contains(t)) {
        return CheckboxAction::Uncheck;
    }
    if plan.required {
        return CheckboxAction::Check;
    }
    CheckboxAction::Skip
}
