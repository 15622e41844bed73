//! The fill engine.
//!
//! Runs one session through the phase machine
//! `Preparing -> FillingFields -> HandlingCheckboxes -> Validating ->
//! (Retrying)? -> Submitting -> Done|Failed`. A single field failing is
//! recorded and never aborts the session; cancellation between any two
//! page operations leaves the partial outcomes valid and reportable.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use formpilot_analysis_core::{AnalysisResult, FieldPlan, FieldPurpose};
use formpilot_core_types::UserData;
use formpilot_page_adapter::PageDriver;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::checkbox::{decide, CheckboxAction};
use crate::tempo::{pause, DelayKind, DelayStrategy};
use crate::types::{FillCtx, FillOutcome, FillReport, SessionPhase};
use crate::values::{value_for, FillValue};

/// Typing switches to an atomic fill beyond this length.
const MAX_TYPED_CHARS: usize = 64;

/// Visible validation-indicator scan. The `__formpilot_validation__`
/// marker keys stub drivers.
const VALIDATION_SCRIPT: &str = r#"(() => { /* __formpilot_validation__ */
    const candidates = document.querySelectorAll(
        '[class*="error"], [class*="invalid"], [class*="validation"], [aria-invalid="true"], [role="alert"]'
    );
    const texts = [];
    for (const el of candidates) {
        if (!el.offsetParent && el.getClientRects().length === 0) { continue; }
        const text = (el.innerText || el.getAttribute('aria-label') || '').trim();
        if (text && text.length <= 200) { texts.push(text); }
        if (texts.length >= 20) { break; }
    }
    return texts;
})()"#;

pub struct FillExecutor {
    driver: Arc<dyn PageDriver>,
    tempo: Arc<dyn DelayStrategy>,
}

impl FillExecutor {
    pub fn new(driver: Arc<dyn PageDriver>, tempo: Arc<dyn DelayStrategy>) -> Self {
        Self { driver, tempo }
    }

    /// Execute one analyzed page.
    pub async fn execute(
        &self,
        ctx: &FillCtx,
        analysis: &AnalysisResult,
        user: &UserData,
    ) -> FillReport {
        let started_at = Utc::now();
        let start_instant = Instant::now();

        // Preparing: freeze the trap set and the fill order.
        let mut phase = SessionPhase::Preparing;
        info!(
            action_id = %ctx.action_id,
            route = %ctx.route,
            fields = analysis.fields.len(),
            checkboxes = analysis.checkboxes.len(),
            honeypots = analysis.honeypots.len(),
            phase = phase.as_str(),
            "fill session starting"
        );
        let trap_selectors: HashSet<&str> = analysis
            .honeypots
            .iter()
            .map(|h| h.selector.as_str())
            .collect();
        let mut ordered: Vec<&FieldPlan> = analysis.fields.iter().collect();
        // Stable sort keeps insertion order within an importance tier.
        ordered.sort_by_key(|f| f.importance.rank());

        let mut outcomes = Vec::new();
        let mut aborted = false;

        phase = SessionPhase::FillingFields;
        debug!(action_id = %ctx.action_id, phase = phase.as_str(), "phase transition");
        for field in ordered {
            if ctx.is_cancelled() || ctx.is_timeout() {
                aborted = true;
                break;
            }
            if trap_selectors.contains(field.selector.as_str()) {
                // Merge should have removed these; skipping again keeps the
                // trap-precedence invariant even against a buggy caller.
                warn!(selector = %field.selector, "trap-flagged field reached the executor, skipping");
                continue;
            }
            if !field.selector_valid || !field.actually_visible || field.suspicious {
                debug!(
                    selector = %field.selector,
                    valid = field.selector_valid,
                    visible = field.actually_visible,
                    suspicious = field.suspicious,
                    "skipping unusable field"
                );
                outcomes.push(FillOutcome {
                    selector: field.selector.clone(),
                    attempted: false,
                    ..Default::default()
                });
                continue;
            }

            let value = match value_for(field.purpose, user, &ctx.route.session) {
                Some(value) => value,
                None => {
                    debug!(selector = %field.selector, purpose = ?field.purpose, "no value for purpose, leaving blank");
                    outcomes.push(FillOutcome {
                        selector: field.selector.clone(),
                        attempted: false,
                        ..Default::default()
                    });
                    continue;
                }
            };

            let outcome = self.fill_field(ctx, field, &value).await;
            outcomes.push(outcome);
            pause(self.tempo.as_ref(), DelayKind::BetweenFields).await;
        }

        phase = SessionPhase::HandlingCheckboxes;
        debug!(action_id = %ctx.action_id, phase = phase.as_str(), "phase transition");
        let mut checkboxes_handled = 0usize;
        if !aborted {
            for checkbox in &analysis.checkboxes {
                if ctx.is_cancelled() || ctx.is_timeout() {
                    aborted = true;
                    break;
                }
                if trap_selectors.contains(checkbox.selector.as_str())
                    || !checkbox.selector_valid
                    || !checkbox.actually_visible
                    || checkbox.suspicious
                {
                    continue;
                }
                let desired = match decide(checkbox) {
                    CheckboxAction::Check => true,
                    CheckboxAction::Uncheck => false,
                    CheckboxAction::Skip => continue,
                };
                match self.toggle_checkbox(ctx, &checkbox.selector, desired).await {
                    Ok(()) => checkboxes_handled += 1,
                    Err(error) => {
                        warn!(selector = %checkbox.selector, %error, "checkbox toggle failed");
                    }
                }
            }
        }

        phase = SessionPhase::Validating;
        debug!(action_id = %ctx.action_id, phase = phase.as_str(), "phase transition");
        let mut validation_errors_found = 0usize;
        let mut validation_errors_remaining = 0usize;
        if !aborted {
            pause(self.tempo.as_ref(), DelayKind::Settle).await;
            let errors = self.scan_validation_errors().await;
            validation_errors_found = errors.len();

            if !errors.is_empty() {
                phase = SessionPhase::Retrying;
                info!(
                    action_id = %ctx.action_id,
                    errors = validation_errors_found,
                    "validation indicators found, one repair pass"
                );
                self.repair_pass(ctx, analysis, user, &errors).await;
                pause(self.tempo.as_ref(), DelayKind::Settle).await;
                validation_errors_remaining = self.scan_validation_errors().await.len();
            }
        }

        phase = SessionPhase::Submitting;
        debug!(action_id = %ctx.action_id, phase = phase.as_str(), "phase transition");
        let mut submitted = false;
        let mut submission_error = None;
        if !aborted {
            match &analysis.submit_button {
                Some(button) if button.selector_valid && button.actually_visible => {
                    match self.click_submit(ctx, &button.selector).await {
                        Ok(()) => submitted = true,
                        Err(error) => submission_error = Some(error),
                    }
                }
                Some(button) => {
                    submission_error = Some(format!(
                        "submit selector '{}' unusable (valid={}, visible={})",
                        button.selector, button.selector_valid, button.actually_visible
                    ));
                }
                None => {
                    submission_error = Some("no submit control identified".to_string());
                }
            }
            if let Some(reason) = &submission_error {
                warn!(action_id = %ctx.action_id, reason = %reason, "submission not performed");
            }
        }

        let fields_filled = outcomes.iter().filter(|o| o.succeeded).count();
        let succeeded = !aborted && fields_filled >= 1 && validation_errors_remaining == 0;
        phase = if succeeded {
            SessionPhase::Done
        } else {
            SessionPhase::Failed
        };

        let latency_ms = start_instant.elapsed().as_millis() as u64;
        info!(
            action_id = %ctx.action_id,
            phase = phase.as_str(),
            fields_filled,
            checkboxes_handled,
            submitted,
            latency_ms,
            "fill session finished"
        );

        FillReport {
            phase,
            outcomes,
            checkboxes_handled,
            honeypots_avoided: analysis.honeypots.len(),
            validation_errors_found,
            validation_errors_remaining,
            submitted,
            submission_error,
            succeeded,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
        }
    }

    /// Fill one verified field with human pacing. Secrets go in atomically;
    /// ordinary text is typed character by character with jitter.
    async fn fill_field(&self, ctx: &FillCtx, field: &FieldPlan, value: &FillValue) -> FillOutcome {
        let mut outcome = FillOutcome {
            selector: field.selector.clone(),
            attempted: true,
            value_hint: Some(value.hint.to_string()),
            ..Default::default()
        };

        if let Err(err) = self.driver.scroll_into_view(&field.selector).await {
            debug!(selector = %field.selector, error = %err, "scroll-into-view failed, trying anyway");
        }
        pause(self.tempo.as_ref(), DelayKind::BeforeAction).await;

        let result = if field.element_type == "select" {
            self.driver
                .select_option(&field.selector, &value.text, ctx.op_deadline())
                .await
        } else if value.secret || value.text.chars().count() > MAX_TYPED_CHARS {
            self.driver
                .fill(&field.selector, &value.text, ctx.op_deadline())
                .await
        } else {
            self.type_humanly(ctx, &field.selector, &value.text).await
        };

        match result {
            Ok(()) => {
                debug!(selector = %field.selector, hint = value.hint, "field filled");
                outcome.succeeded = true;
            }
            Err(err) => {
                warn!(selector = %field.selector, error = %err, "field fill failed");
                outcome.error = Some(err.to_string());
            }
        }
        outcome
    }

    async fn type_humanly(
        &self,
        ctx: &FillCtx,
        selector: &str,
        text: &str,
    ) -> Result<(), formpilot_page_adapter::DriverError> {
        let mut buffer = [0u8; 4];
        for c in text.chars() {
            if ctx.is_cancelled() {
                break;
            }
            let piece: &str = c.encode_utf8(&mut buffer);
            self.driver
                .type_text(selector, piece, ctx.op_deadline())
                .await?;
            pause(self.tempo.as_ref(), DelayKind::Keystroke).await;
        }
        Ok(())
    }

    async fn toggle_checkbox(
        &self,
        ctx: &FillCtx,
        selector: &str,
        checked: bool,
    ) -> Result<(), String> {
        if let Err(err) = self.driver.scroll_into_view(selector).await {
            debug!(selector, error = %err, "scroll-into-view failed, trying anyway");
        }
        pause(self.tempo.as_ref(), DelayKind::BeforeAction).await;
        self.driver
            .set_checked(selector, checked, ctx.op_deadline())
            .await
            .map_err(|e| e.to_string())
    }

    async fn click_submit(&self, ctx: &FillCtx, selector: &str) -> Result<(), String> {
        if let Err(err) = self.driver.scroll_into_view(selector).await {
            debug!(selector, error = %err, "scroll-into-view failed, trying anyway");
        }
        pause(self.tempo.as_ref(), DelayKind::BeforeAction).await;
        self.driver
            .click(selector, ctx.op_deadline())
            .await
            .map_err(|e| e.to_string())
    }

    async fn scan_validation_errors(&self) -> Vec<String> {
        match self.driver.evaluate(VALIDATION_SCRIPT).await {
            Ok(Value::Array(entries)) => entries
                .into_iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            Ok(_) => Vec::new(),
            Err(err) => {
                debug!(error = %err, "validation scan failed");
                Vec::new()
            }
        }
    }

    /// One bounded repair pass: re-fill fields whose purpose keywords show
    /// up in the visible error text, atomically this time.
    async fn repair_pass(
        &self,
        ctx: &FillCtx,
        analysis: &AnalysisResult,
        user: &UserData,
        errors: &[String],
    ) {
        let lowered: Vec<String> = errors.iter().map(|e| e.to_ascii_lowercase()).collect();
        for field in &analysis.fields {
            if ctx.is_cancelled() || !field.selector_valid || !field.actually_visible {
                continue;
            }
            let keywords = purpose_keywords(field.purpose);
            let implicated = keywords
                .iter()
                .any(|k| lowered.iter().any(|e| e.contains(k)));
            if !implicated {
                continue;
            }
            let Some(value) = value_for(field.purpose, user, &ctx.route.session) else {
                continue;
            };
            debug!(selector = %field.selector, "re-filling field implicated by validation text");
            pause(self.tempo.as_ref(), DelayKind::BeforeAction).await;
            if let Err(err) = self
                .driver
                .fill(&field.selector, &value.text, ctx.op_deadline())
                .await
            {
                warn!(selector = %field.selector, error = %err, "repair re-fill failed");
            }
        }
    }
}

fn purpose_keywords(purpose: FieldPurpose) -> &'static [&'static str] {
    match purpose {
        FieldPurpose::Email => &["email", "e-mail"],
        FieldPurpose::Password | FieldPurpose::ConfirmPassword => &["password"],
        FieldPurpose::Phone => &["phone", "number"],
        FieldPurpose::Username => &["username", "user name"],
        FieldPurpose::FirstName => &["first name"],
        FieldPurpose::LastName => &["last name", "surname"],
        FieldPurpose::FullName => &["name"],
        FieldPurpose::Company => &["company"],
        FieldPurpose::Country => &["country"],
        FieldPurpose::Other => &[],
    }
}
