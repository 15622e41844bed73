//! Pre-sample quiescence waiting.
//!
//! Sampling too early yields an incomplete snapshot, so extraction first
//! waits for the page to settle: a bounded network-idle wait, a fixed
//! settle delay, and an opportunistic wait for the first of several common
//! form-indicator selectors. None of the gates is load-bearing - if every
//! one times out, extraction proceeds with whatever is present.

use std::sync::Arc;
use std::time::Duration;

use formpilot_page_adapter::PageDriver;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::model::QuiescenceReport;

/// Bounds for the pre-sample waits.
#[derive(Clone, Debug)]
pub struct QuiescencePolicy {
    /// Quiet window that counts as network idle.
    pub network_quiet: Duration,
    /// Hard cap on the network-idle wait.
    pub network_timeout: Duration,
    /// Fixed settle delay applied after the network gate.
    pub settle_delay: Duration,
    /// Hard cap on the form-indicator poll.
    pub indicator_timeout: Duration,
    /// Poll interval for the indicator selectors.
    pub indicator_poll: Duration,
    /// First match wins; order is preference order.
    pub indicator_selectors: Vec<String>,
}

impl Default for QuiescencePolicy {
    fn default() -> Self {
        Self {
            network_quiet: Duration::from_millis(500),
            network_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_millis(750),
            indicator_timeout: Duration::from_secs(5),
            indicator_poll: Duration::from_millis(100),
            indicator_selectors: vec![
                "form".to_string(),
                "input[type=email]".to_string(),
                "input[type=password]".to_string(),
                "input[name*=email]".to_string(),
                "button[type=submit]".to_string(),
            ],
        }
    }
}

/// Run the quiescence gates and report what was reached.
pub async fn await_quiescence(
    driver: &Arc<dyn PageDriver>,
    policy: &QuiescencePolicy,
) -> QuiescenceReport {
    let started = Instant::now();
    let mut report = QuiescenceReport::default();

    match driver
        .wait_for_network_idle(policy.network_quiet, policy.network_timeout)
        .await
    {
        Ok(()) => report.network_idle_reached = true,
        Err(err) => debug!(error = %err, "network idle not reached, sampling anyway"),
    }

    sleep(policy.settle_delay).await;

    report.indicator_matched = poll_indicators(driver, policy).await;
    if report.indicator_matched.is_none() {
        debug!("no form indicator appeared before the deadline");
    }

    report.waited_ms = started.elapsed().as_millis() as u64;
    report
}

async fn poll_indicators(
    driver: &Arc<dyn PageDriver>,
    policy: &QuiescencePolicy,
) -> Option<String> {
    let deadline = Instant::now() + policy.indicator_timeout;
    loop {
        for selector in &policy.indicator_selectors {
            match driver.query_count(selector).await {
                Ok(count) if count > 0 => return Some(selector.clone()),
                Ok(_) => {}
                Err(err) => {
                    debug!(selector = %selector, error = %err, "indicator probe failed");
                }
            }
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(policy.indicator_poll).await;
    }
}
