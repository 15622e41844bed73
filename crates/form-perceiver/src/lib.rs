//! Page state extraction.
//!
//! Walks the live document after a bounded quiescence wait and produces an
//! immutable [`PageSnapshot`] of every form-relevant element plus layout
//! and style metadata. Read-only: nothing here mutates the page.

pub mod errors;
pub mod extract;
pub mod model;
pub mod quiesce;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use formpilot_page_adapter::PageDriver;
use tracing::{debug, info};

pub use errors::PerceiverError;
pub use model::{
    ComputedVisibility, ElementSnapshot, PageContext, PageSnapshot, QuiescenceReport,
};
pub use quiesce::QuiescencePolicy;

/// Extraction seam the pipeline consumes.
#[async_trait]
pub trait FormPerceiver: Send + Sync {
    /// Capture a fresh snapshot of the page's interactive elements.
    async fn capture(&self) -> Result<PageSnapshot, PerceiverError>;
}

/// Driver-backed perceiver.
pub struct DefaultFormPerceiver {
    driver: Arc<dyn PageDriver>,
    policy: QuiescencePolicy,
}

impl DefaultFormPerceiver {
    pub fn new(driver: Arc<dyn PageDriver>) -> Self {
        Self {
            driver,
            policy: QuiescencePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: QuiescencePolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl FormPerceiver for DefaultFormPerceiver {
    async fn capture(&self) -> Result<PageSnapshot, PerceiverError> {
        let quiescence = quiesce::await_quiescence(&self.driver, &self.policy).await;
        debug!(
            waited_ms = quiescence.waited_ms,
            network_idle = quiescence.network_idle_reached,
            indicator = ?quiescence.indicator_matched,
            "quiescence gates done"
        );

        let raw = self
            .driver
            .evaluate(extract::EXTRACT_SCRIPT)
            .await
            .map_err(|err| PerceiverError::Evaluation(err.to_string()))?;

        let extraction = extract::decode_extraction(raw)?;
        info!(
            url = %extraction.context.url,
            elements = extraction.elements.len(),
            forms = extraction.context.form_count,
            "page snapshot captured"
        );

        Ok(PageSnapshot {
            context: extraction.context,
            elements: extraction.elements,
            quiescence,
            captured_at: Utc::now(),
        })
    }
}
