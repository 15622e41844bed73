//! Observer hook points.
//!
//! Persistence, screenshots, and reporting are external collaborators:
//! they subscribe here instead of living inside the core.

use formpilot_analysis_core::AnalysisResult;
use formpilot_core_types::SessionSummary;
use formpilot_fill_executor::FillOutcome;

/// Callbacks fired at the pipeline's milestones. All default to no-ops.
pub trait SessionObserver: Send + Sync {
    fn on_analysis_complete(&self, _analysis: &AnalysisResult) {}
    fn on_fill_outcome(&self, _outcome: &FillOutcome) {}
    fn on_session_complete(&self, _summary: &SessionSummary) {}
}

/// Default observer that does nothing.
#[derive(Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_observer_methods_are_no_ops() {
        let observer = NoopObserver;
        observer.on_analysis_complete(&AnalysisResult::default());
        observer.on_fill_outcome(&FillOutcome::default());
        observer.on_session_complete(&SessionSummary::default());
    }
}
