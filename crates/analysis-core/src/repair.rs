//! Response repair & validation.
//!
//! Model output is untrusted text. This module turns it into a
//! guaranteed-complete [`AnalysisResult`] or an explicit
//! [`RepairOutcome::Unrecoverable`] - it never raises for malformed
//! output. All downstream code operates on the repaired type, never on
//! raw JSON.

use std::collections::HashSet;

use formpilot_trap_gate::TrapVerdict;
use once_cell_regex::fence_regex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::contract::{AnalysisResult, AnalysisSource, HoneypotEntry};

/// Generic guess used when the model omits the submit control.
pub const GENERIC_SUBMIT_SELECTOR: &str = "button[type=submit], input[type=submit]";

/// Explicit repair outcome, replacing ad hoc null checks with a type.
#[derive(Clone, Debug)]
pub enum RepairOutcome {
    /// Parsed cleanly and needed no fixes.
    Valid(AnalysisResult),
    /// Parsed after repair; the ledger lists every fix applied.
    Repaired(AnalysisResult, Vec<String>),
    /// Nothing JSON-shaped could be recovered from the text.
    Unrecoverable(String),
}

impl RepairOutcome {
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            RepairOutcome::Valid(result) | RepairOutcome::Repaired(result, _) => Some(result),
            RepairOutcome::Unrecoverable(_) => None,
        }
    }
}

/// Full text-to-contract pipeline: extract, validate, auto-repair.
pub fn repair_response(raw: &str) -> RepairOutcome {
    let value = match extract_json(raw) {
        Some(value) => value,
        None => {
            warn!(raw_chars = raw.len(), "no JSON object recoverable from model response");
            return RepairOutcome::Unrecoverable(
                "response contained no parseable JSON object".to_string(),
            );
        }
    };

    let (result, fixes) = validate_and_repair(value);
    if fixes.is_empty() {
        RepairOutcome::Valid(result)
    } else {
        debug!(fixes = ?fixes, "analysis response auto-repaired");
        RepairOutcome::Repaired(result, fixes)
    }
}

/// Three-strategy JSON extraction: direct parse, fence/prose stripping,
/// then balanced-brace scanning.
pub fn extract_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    if let Some(captured) = fence_regex()
        .captures(trimmed)
        .and_then(|c| c.get(1))
    {
        if let Ok(value) = serde_json::from_str::<Value>(captured.as_str().trim()) {
            if value.is_object() {
                return Some(value);
            }
        }
    }

    balanced_object(trimmed)
}

/// Scan for the first balanced `{...}` substring that parses.
fn balanced_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(open) = text[start..].find('{').map(|i| i + start) {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (offset, &byte) in bytes[open..].iter().enumerate() {
            match byte {
                _ if escaped => escaped = false,
                b'\\' if in_string => escaped = true,
                b'"' => in_string = !in_string,
                b'{' if !in_string => depth += 1,
                b'}' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        let candidate = &text[open..=open + offset];
                        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                            if value.is_object() {
                                return Some(value);
                            }
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
        start = open + 1;
    }
    None
}

/// Structural validation with auto-repair. Any violation becomes a fix,
/// never a rejection. Running this on an already-valid value applies zero
/// fixes and returns an equal result.
pub fn validate_and_repair(value: Value) -> (AnalysisResult, Vec<String>) {
    let mut fixes = Vec::new();
    let mut map = match value {
        Value::Object(map) => map,
        other => {
            fixes.push(format!("replaced non-object payload ({})", kind_of(&other)));
            Map::new()
        }
    };

    repair_string(&mut map, "analysis", "(no analysis provided)", &mut fixes);
    repair_string(&mut map, "pageType", "unknown", &mut fixes);
    repair_confidence(&mut map, &mut fixes);
    for key in ["fields", "checkboxes", "honeypots"] {
        repair_array(&mut map, key, &mut fixes);
    }
    repair_submit_button(&mut map, &mut fixes);

    let had_source = map.get("source").map(|v| v.is_string()).unwrap_or(false);
    if !fixes.is_empty() {
        map.insert("source".into(), Value::String("repaired".into()));
    } else if !had_source {
        map.insert("source".into(), Value::String("model".into()));
    }

    match serde_json::from_value::<AnalysisResult>(Value::Object(map)) {
        Ok(result) => (result, fixes),
        Err(err) => {
            // The normalized map should always deserialize; reaching this
            // arm means a repair rule above is incomplete.
            warn!(error = %err, "normalized analysis payload still undecodable");
            fixes.push(format!("discarded undecodable payload: {err}"));
            let mut sentinel = AnalysisResult::empty_fallback("analysis payload undecodable");
            sentinel.source = AnalysisSource::Repaired;
            (sentinel, fixes)
        }
    }
}

fn repair_string(map: &mut Map<String, Value>, key: &str, placeholder: &str, fixes: &mut Vec<String>) {
    match map.get(key) {
        Some(Value::String(_)) => {}
        Some(other) => {
            let kind = kind_of(other);
            map.insert(key.into(), Value::String(placeholder.into()));
            fixes.push(format!("replaced non-string '{key}' ({kind})"));
        }
        None => {
            map.insert(key.into(), Value::String(placeholder.into()));
            fixes.push(format!("defaulted missing '{key}'"));
        }
    }
}

fn repair_confidence(map: &mut Map<String, Value>, fixes: &mut Vec<String>) {
    match map.get("confidence").and_then(Value::as_f64) {
        Some(value) if (0.0..=1.0).contains(&value) => {}
        Some(out_of_range) => {
            let clamped = out_of_range.clamp(0.0, 1.0);
            map.insert("confidence".into(), json_number(clamped));
            fixes.push(format!("clamped confidence {out_of_range} to {clamped}"));
        }
        None => {
            map.insert("confidence".into(), json_number(0.5));
            fixes.push("defaulted missing confidence to 0.5".to_string());
        }
    }
}

fn repair_array(map: &mut Map<String, Value>, key: &str, fixes: &mut Vec<String>) {
    let entries = match map.get_mut(key) {
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            let kind = kind_of(other);
            map.insert(key.into(), Value::Array(Vec::new()));
            fixes.push(format!("replaced non-array '{key}' ({kind})"));
            return;
        }
        None => {
            map.insert(key.into(), Value::Array(Vec::new()));
            fixes.push(format!("defaulted missing '{key}' to empty array"));
            return;
        }
    };

    let before = entries.len();
    entries.retain(|entry| {
        entry
            .get("selector")
            .and_then(Value::as_str)
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    });
    let dropped = before - entries.len();
    if dropped > 0 {
        fixes.push(format!("dropped {dropped} '{key}' entr(ies) without a selector"));
    }
}

fn repair_submit_button(map: &mut Map<String, Value>, fixes: &mut Vec<String>) {
    let usable = map
        .get("submitButton")
        .and_then(|v| v.as_object())
        .and_then(|o| o.get("selector"))
        .and_then(Value::as_str)
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false);
    if !usable {
        map.insert(
            "submitButton".into(),
            serde_json::json!({ "selector": GENERIC_SUBMIT_SELECTOR, "text": "" }),
        );
        fixes.push("synthesized generic submit button selector".to_string());
    }
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or_else(|| Value::Number(0.into()))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Enforce detector-always-wins: any plan whose selector the detector
/// flagged is removed from the active sets and surfaced as a honeypot.
/// Returns how many plans were removed.
pub fn merge_trap_verdicts(result: &mut AnalysisResult, verdicts: &[TrapVerdict]) -> usize {
    let trap_selectors: HashSet<&str> = verdicts
        .iter()
        .filter(|v| v.is_trap)
        .map(|v| v.element_selector.as_str())
        .collect();
    if trap_selectors.is_empty() {
        return 0;
    }

    let before = result.fields.len() + result.checkboxes.len();
    result
        .fields
        .retain(|f| !trap_selectors.contains(f.selector.as_str()));
    result
        .checkboxes
        .retain(|c| !trap_selectors.contains(c.selector.as_str()));
    let removed = before - (result.fields.len() + result.checkboxes.len());

    if let Some(button) = &result.submit_button {
        if trap_selectors.contains(button.selector.as_str()) {
            warn!(selector = %button.selector, "submit button is trap-flagged, dropping it");
            result.submit_button = None;
        }
    }

    let known: HashSet<String> = result
        .honeypots
        .iter()
        .map(|h| h.selector.clone())
        .collect();
    for verdict in verdicts.iter().filter(|v| v.is_trap) {
        if !known.contains(&verdict.element_selector) {
            result.honeypots.push(HoneypotEntry::from(verdict));
        }
    }

    if removed > 0 {
        info!(
            removed,
            honeypots = result.honeypots.len(),
            "trap detector overruled model field claims"
        );
    }
    removed
}

/// Lazily-built fence matcher, kept out of the hot path.
mod once_cell_regex {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static FENCE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("static fence pattern"));

    pub fn fence_regex() -> &'static Regex {
        &FENCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{FieldPlan, PageType};
    use formpilot_trap_gate::TrapReason;
    use std::collections::BTreeSet;

    const VALID_BODY: &str = r##"{
        "analysis": "signup form with email and password",
        "pageType": "signup",
        "confidence": 0.92,
        "fields": [
            {"purpose": "email", "selector": "#email", "elementType": "input",
             "required": true, "importance": "critical"}
        ],
        "checkboxes": [],
        "honeypots": [],
        "submitButton": {"selector": "#join", "text": "Join"}
    }"##;

    #[test]
    fn clean_json_parses_as_valid_model_result() {
        let outcome = repair_response(VALID_BODY);
        match outcome {
            RepairOutcome::Valid(result) => {
                assert_eq!(result.source, AnalysisSource::Model);
                assert_eq!(result.page_type, PageType::Signup);
                assert_eq!(result.fields.len(), 1);
            }
            other => panic!("expected Valid, got {other:?}"),
        }
    }

    #[test]
    fn fenced_json_with_prose_is_recovered() {
        let wrapped = format!("Sure! Here is the analysis:\n```json\n{VALID_BODY}\n```\nDone.");
        let outcome = repair_response(&wrapped);
        match outcome {
            RepairOutcome::Valid(result) => assert_eq!(result.source, AnalysisSource::Model),
            other => panic!("expected Valid, got {other:?}"),
        }
    }

    #[test]
    fn embedded_object_in_prose_is_recovered_by_brace_scan() {
        let wrapped = format!("The page {{mentioned}} earlier gives: {VALID_BODY} hope that helps");
        // The first brace group is not valid JSON, the second is.
        let outcome = repair_response(&wrapped);
        assert!(matches!(outcome, RepairOutcome::Valid(_)));
    }

    #[test]
    fn pure_prose_is_unrecoverable() {
        let outcome = repair_response("I could not find any form on this page, sorry!");
        assert!(matches!(outcome, RepairOutcome::Unrecoverable(_)));
    }

    #[test]
    fn missing_pieces_are_repaired_not_rejected() {
        let outcome = repair_response(r##"{"fields": [{"selector": "#a"}]}"##);
        match outcome {
            RepairOutcome::Repaired(result, fixes) => {
                assert_eq!(result.source, AnalysisSource::Repaired);
                assert_eq!(result.confidence, 0.5);
                assert!(result.checkboxes.is_empty());
                assert!(result.honeypots.is_empty());
                assert_eq!(
                    result.submit_button.as_ref().unwrap().selector,
                    GENERIC_SUBMIT_SELECTOR
                );
                assert!(fixes.iter().any(|f| f.contains("confidence")));
                assert!(fixes.iter().any(|f| f.contains("checkboxes")));
            }
            other => panic!("expected Repaired, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let raw = r##"{"analysis": "x", "pageType": "login", "confidence": 7.5,
            "fields": [], "checkboxes": [], "honeypots": [],
            "submitButton": {"selector": "#go"}}"##;
        match repair_response(raw) {
            RepairOutcome::Repaired(result, fixes) => {
                assert_eq!(result.confidence, 1.0);
                assert_eq!(fixes.len(), 1);
            }
            other => panic!("expected Repaired, got {other:?}"),
        }
    }

    #[test]
    fn entries_without_selectors_are_dropped() {
        let raw = r##"{"analysis": "x", "pageType": "signup", "confidence": 0.8,
            "fields": [{"purpose": "email"}, {"purpose": "email", "selector": "#email"}],
            "checkboxes": [], "honeypots": [],
            "submitButton": {"selector": "#go"}}"##;
        match repair_response(raw) {
            RepairOutcome::Repaired(result, _) => {
                assert_eq!(result.fields.len(), 1);
                assert_eq!(result.fields[0].selector, "#email");
            }
            other => panic!("expected Repaired, got {other:?}"),
        }
    }

    #[test]
    fn repair_is_idempotent_on_valid_results() {
        let (first, fixes) = validate_and_repair(serde_json::from_str(VALID_BODY).unwrap());
        assert!(fixes.is_empty());

        let reserialized = serde_json::to_value(&first).unwrap();
        let (second, refixes) = validate_and_repair(reserialized);
        assert!(refixes.is_empty(), "second pass applied fixes: {refixes:?}");
        assert_eq!(first, second);
    }

    #[test]
    fn repaired_results_survive_a_second_pass_unchanged() {
        let (first, fixes) = validate_and_repair(serde_json::json!({"fields": []}));
        assert!(!fixes.is_empty());

        let reserialized = serde_json::to_value(&first).unwrap();
        let (second, refixes) = validate_and_repair(reserialized);
        assert!(refixes.is_empty());
        assert_eq!(first, second);
    }

    fn trap(selector: &str) -> TrapVerdict {
        let mut reasons = BTreeSet::new();
        reasons.insert(TrapReason::StyleHidden);
        reasons.insert(TrapReason::SuspiciousName);
        TrapVerdict {
            element_selector: selector.to_string(),
            is_trap: true,
            reasons,
            confidence: 0.91,
        }
    }

    #[test]
    fn detector_always_wins_over_model_claims() {
        let mut result = AnalysisResult {
            fields: vec![
                FieldPlan {
                    selector: "#email".into(),
                    ..Default::default()
                },
                FieldPlan {
                    selector: "#website".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let removed = merge_trap_verdicts(&mut result, &[trap("#website")]);

        assert_eq!(removed, 1);
        assert_eq!(result.fields.len(), 1);
        assert_eq!(result.fields[0].selector, "#email");
        assert_eq!(result.honeypots.len(), 1);
        assert_eq!(result.honeypots[0].selector, "#website");
        assert!(result.honeypots[0]
            .reasons
            .contains(&"style-hidden".to_string()));
    }

    #[test]
    fn merge_does_not_duplicate_known_honeypots() {
        let mut result = AnalysisResult {
            honeypots: vec![HoneypotEntry {
                selector: "#website".into(),
                reasons: vec!["model-claimed".into()],
                confidence: 0.4,
            }],
            ..Default::default()
        };
        merge_trap_verdicts(&mut result, &[trap("#website")]);
        assert_eq!(result.honeypots.len(), 1);
    }
}
