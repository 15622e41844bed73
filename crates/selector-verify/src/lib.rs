//! Selector verification against the live page.
//!
//! Every proposed selector must resolve to exactly one usable element
//! right now. A selector that fails is marked invalid but never removed -
//! the executor is responsible for skipping invalid or invisible entries.

use std::sync::Arc;

use async_trait::async_trait;
use formpilot_analysis_core::AnalysisResult;
use formpilot_page_adapter::PageDriver;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Summary of one verification pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub checked: usize,
    pub valid: usize,
    pub visible: usize,
    /// Selectors matching more than one element (count != 1).
    pub ambiguous: usize,
    /// Selectors matching nothing.
    pub unresolved: usize,
}

/// Verification seam the pipeline consumes.
#[async_trait]
pub trait SelectorVerifier: Send + Sync {
    /// Mark `selector_valid` / `actually_visible` in place on every plan.
    async fn verify(&self, result: &mut AnalysisResult) -> VerificationReport;
}

/// Driver-backed verifier.
pub struct DefaultSelectorVerifier {
    driver: Arc<dyn PageDriver>,
}

impl DefaultSelectorVerifier {
    pub fn new(driver: Arc<dyn PageDriver>) -> Self {
        Self { driver }
    }

    /// Resolve one selector: exactly one match, then a real rendering
    /// visibility check. Driver failures mark the selector invalid rather
    /// than propagating.
    async fn probe(&self, selector: &str, report: &mut VerificationReport) -> (bool, bool) {
        report.checked += 1;
        let count = match self.driver.query_count(selector).await {
            Ok(count) => count,
            Err(err) => {
                warn!(selector, error = %err, "selector probe failed");
                report.unresolved += 1;
                return (false, false);
            }
        };

        match count {
            0 => {
                debug!(selector, "selector resolved nothing");
                report.unresolved += 1;
                (false, false)
            }
            1 => {
                report.valid += 1;
                let visible = self.driver.is_visible(selector).await.unwrap_or(false);
                if visible {
                    report.visible += 1;
                } else {
                    debug!(selector, "selector valid but element not rendered");
                }
                (true, visible)
            }
            many => {
                warn!(selector, matches = many, "ambiguous selector, count != 1");
                report.ambiguous += 1;
                (false, false)
            }
        }
    }
}

#[async_trait]
impl SelectorVerifier for DefaultSelectorVerifier {
    async fn verify(&self, result: &mut AnalysisResult) -> VerificationReport {
        let mut report = VerificationReport::default();

        for field in &mut result.fields {
            let (valid, visible) = self.probe(&field.selector, &mut report).await;
            field.selector_valid = valid;
            field.actually_visible = visible;
        }
        for checkbox in &mut result.checkboxes {
            let (valid, visible) = self.probe(&checkbox.selector, &mut report).await;
            checkbox.selector_valid = valid;
            checkbox.actually_visible = visible;
        }
        if let Some(button) = &mut result.submit_button {
            let (valid, visible) = self.probe(&button.selector, &mut report).await;
            button.selector_valid = valid;
            button.actually_visible = visible;
        }

        debug!(
            checked = report.checked,
            valid = report.valid,
            visible = report.visible,
            ambiguous = report.ambiguous,
            unresolved = report.unresolved,
            "selector verification pass done"
        );
        report
    }
}
