//! Deterministic honeypot detection.
//!
//! `classify` is a pure function over an [`ElementSnapshot`]; rules are
//! independently sufficient and OR'd, each contributing a reason code.
//! Verdicts are recomputed every pass and always merged into the final
//! analysis: a trap verdict overrides any generative-model claim that the
//! element is safe to fill.

use std::collections::BTreeSet;

use formpilot_form_perceiver::ElementSnapshot;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Reason codes, one per independently-triggered rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrapReason {
    StyleHidden,
    ZeroOpacity,
    ZeroSize,
    ClipCollapsed,
    OffCanvasTransform,
    OffScreen,
    NegativeTabindex,
    AriaHidden,
    SuspiciousName,
    AncestorHidden,
}

impl TrapReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrapReason::StyleHidden => "style-hidden",
            TrapReason::ZeroOpacity => "zero-opacity",
            TrapReason::ZeroSize => "zero-size",
            TrapReason::ClipCollapsed => "clip-collapsed",
            TrapReason::OffCanvasTransform => "off-canvas-transform",
            TrapReason::OffScreen => "off-screen",
            TrapReason::NegativeTabindex => "negative-tabindex",
            TrapReason::AriaHidden => "aria-hidden",
            TrapReason::SuspiciousName => "suspicious-name",
            TrapReason::AncestorHidden => "ancestor-hidden",
        }
    }
}

/// Verdict for one snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrapVerdict {
    pub element_selector: String,
    pub is_trap: bool,
    pub reasons: BTreeSet<TrapReason>,
    pub confidence: f64,
}

/// Substrings of id/name that mark deliberate traps wherever they appear.
const DENYLIST_FRAGMENTS: &[&str] = &[
    "honeypot",
    "honey_pot",
    "winnie_the_pooh",
    "do_not_fill",
    "dont_fill",
    "nofill",
    "botcheck",
    "bot_field",
    "antispam",
    "anti_spam",
    "spamcheck",
];

/// Whole-token matches; short words like "bot" only count standalone so
/// "bottom" and "robotics" stay clean.
const DENYLIST_TOKENS: &[&str] = &["bot", "trap", "hpot", "pooh"];

/// Decoy names suspicious only when the whole attribute is just the word.
const STANDALONE_DECOYS: &[&str] = &["website", "url", "company"];

/// Off-screen threshold in pixels for absolute/fixed positioning.
const OFFSCREEN_PX: f64 = 1000.0;

/// Classify one element. Pure and stateless.
pub fn classify(snapshot: &ElementSnapshot) -> TrapVerdict {
    let mut reasons = BTreeSet::new();

    let vis = &snapshot.visibility;
    if vis.display == "none" || vis.visibility == "hidden" {
        reasons.insert(TrapReason::StyleHidden);
    }
    if vis.opacity <= 0.05 {
        reasons.insert(TrapReason::ZeroOpacity);
    }
    if vis.width <= 1.0 || vis.height <= 1.0 {
        reasons.insert(TrapReason::ZeroSize);
    }
    if let Some(clip) = &vis.clip {
        if clip_collapses(clip) {
            reasons.insert(TrapReason::ClipCollapsed);
        }
    }
    if let Some(transform) = &vis.transform {
        if transform_moves_off_canvas(transform) {
            reasons.insert(TrapReason::OffCanvasTransform);
        }
    }

    if matches!(vis.position.as_str(), "absolute" | "fixed")
        && (vis.offset_left.abs() > OFFSCREEN_PX || vis.offset_top.abs() > OFFSCREEN_PX)
    {
        reasons.insert(TrapReason::OffScreen);
    }

    if snapshot.tabindex.map(|t| t < 0).unwrap_or(false) {
        reasons.insert(TrapReason::NegativeTabindex);
    }
    if snapshot.aria_hidden {
        reasons.insert(TrapReason::AriaHidden);
    }
    if has_suspicious_name(snapshot) {
        reasons.insert(TrapReason::SuspiciousName);
    }
    if snapshot.ancestor_hidden {
        reasons.insert(TrapReason::AncestorHidden);
    }

    let confidence = confidence_for(reasons.len());
    let is_trap = !reasons.is_empty();
    if is_trap {
        debug!(
            selector = %snapshot.selector,
            reasons = ?reasons,
            confidence,
            "trap verdict"
        );
    }

    TrapVerdict {
        element_selector: snapshot.selector.clone(),
        is_trap,
        reasons,
        confidence,
    }
}

/// Classify every element of a pass, in snapshot order.
pub fn classify_all(snapshots: &[ElementSnapshot]) -> Vec<TrapVerdict> {
    snapshots.iter().map(classify).collect()
}

/// Reason count normalized to [0,1], saturating fast: one rule is a strong
/// signal, two or more is near-certain.
fn confidence_for(reason_count: usize) -> f64 {
    if reason_count == 0 {
        return 0.0;
    }
    1.0 - 0.3f64.powi(reason_count as i32)
}

fn clip_collapses(clip: &str) -> bool {
    let clip = clip.to_ascii_lowercase();
    clip.contains("rect(0") || clip.contains("inset(100") || clip.contains("circle(0")
}

fn transform_moves_off_canvas(transform: &str) -> bool {
    // Any translation component beyond the off-screen threshold counts;
    // scale/rotate components never reach that magnitude.
    let mut buffer = String::new();
    let mut values = Vec::new();
    for c in transform.chars() {
        if c.is_ascii_digit() || c == '.' || c == '-' {
            buffer.push(c);
        } else if !buffer.is_empty() {
            if let Ok(value) = buffer.parse::<f64>() {
                values.push(value);
            }
            buffer.clear();
        }
    }
    if let Ok(value) = buffer.parse::<f64>() {
        values.push(value);
    }
    values.iter().any(|v| v.abs() >= OFFSCREEN_PX)
}

fn has_suspicious_name(snapshot: &ElementSnapshot) -> bool {
    let raw_names: Vec<String> = snapshot
        .id
        .iter()
        .chain(snapshot.name.iter())
        .map(|s| s.to_ascii_lowercase())
        .collect();

    for raw in &raw_names {
        if DENYLIST_FRAGMENTS.iter().any(|frag| raw.contains(frag)) {
            return true;
        }
        if STANDALONE_DECOYS.iter().any(|decoy| raw == decoy) {
            return true;
        }
    }

    let class_tokens: Vec<String> = snapshot
        .class_names
        .iter()
        .flat_map(|c| c.split(|ch: char| !ch.is_ascii_alphanumeric()))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .collect();
    let name_tokens: Vec<String> = raw_names
        .iter()
        .flat_map(|n| n.split(|ch: char| !ch.is_ascii_alphanumeric()))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect();

    name_tokens
        .iter()
        .chain(class_tokens.iter())
        .any(|token| DENYLIST_TOKENS.contains(&token.as_str()))
        || class_tokens
            .iter()
            .any(|token| DENYLIST_FRAGMENTS.contains(&token.as_str()))
}
