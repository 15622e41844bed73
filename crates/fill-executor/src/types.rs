//! Execution context and reporting types.

use chrono::{DateTime, Utc};
use formpilot_core_types::{FillRoute, SessionSummary};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Phases of one fill session, in order.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    Preparing,
    FillingFields,
    HandlingCheckboxes,
    Validating,
    Retrying,
    Submitting,
    Done,
    Failed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Preparing => "preparing",
            SessionPhase::FillingFields => "filling-fields",
            SessionPhase::HandlingCheckboxes => "handling-checkboxes",
            SessionPhase::Validating => "validating",
            SessionPhase::Retrying => "retrying",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Done => "done",
            SessionPhase::Failed => "failed",
        }
    }
}

/// Runtime context for one fill session.
#[derive(Clone)]
pub struct FillCtx {
    /// Route identifying the exclusively-owned page.
    pub route: FillRoute,

    /// Deadline for the whole session.
    pub deadline: Instant,

    /// Cooperative cancellation; checked between page operations.
    pub cancel_token: CancellationToken,

    /// Unique identifier for tracing and correlation.
    pub action_id: String,
}

impl FillCtx {
    pub fn new(route: FillRoute, deadline: Instant, cancel_token: CancellationToken) -> Self {
        Self {
            route,
            deadline,
            cancel_token,
            action_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn is_timeout(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Per-operation deadline: bounded slice of whatever session time is
    /// left.
    pub fn op_deadline(&self) -> Duration {
        self.remaining_time().min(Duration::from_secs(10))
    }
}

/// Per-field execution record. `value_hint` names the value class (never
/// the value itself - secrets must not leak into reports).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FillOutcome {
    pub selector: String,
    pub attempted: bool,
    pub succeeded: bool,
    pub value_hint: Option<String>,
    pub error: Option<String>,
}

/// Aggregate report for one executed session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FillReport {
    pub phase: SessionPhase,
    pub outcomes: Vec<FillOutcome>,
    pub checkboxes_handled: usize,
    pub honeypots_avoided: usize,
    pub validation_errors_found: usize,
    pub validation_errors_remaining: usize,
    pub submitted: bool,
    pub submission_error: Option<String>,
    pub succeeded: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,
    pub latency_ms: u64,
}

impl FillReport {
    pub fn fields_filled(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    pub fn to_summary(&self) -> SessionSummary {
        SessionSummary {
            success: self.succeeded,
            fields_processed: self.fields_filled(),
            checkboxes_processed: self.checkboxes_handled,
            honeypots_avoided: self.honeypots_avoided,
            validation_errors: self.validation_errors_remaining,
            submitted: self.submitted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formpilot_core_types::{PageId, SessionId};

    #[test]
    fn ctx_timeout_and_cancel_flags() {
        let route = FillRoute::new(SessionId::new(), PageId::new());
        let token = CancellationToken::new();
        let ctx = FillCtx::new(route, Instant::now() + Duration::from_secs(30), token.clone());

        assert!(!ctx.is_timeout());
        assert!(!ctx.is_cancelled());
        assert!(ctx.op_deadline() <= Duration::from_secs(10));

        token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn report_summary_mirrors_counts() {
        let report = FillReport {
            phase: SessionPhase::Done,
            outcomes: vec![
                FillOutcome {
                    selector: "#email".into(),
                    attempted: true,
                    succeeded: true,
                    value_hint: Some("email".into()),
                    error: None,
                },
                FillOutcome {
                    selector: "#phone".into(),
                    attempted: true,
                    succeeded: false,
                    value_hint: Some("phone".into()),
                    error: Some("target-not-found".into()),
                },
            ],
            checkboxes_handled: 2,
            honeypots_avoided: 1,
            validation_errors_found: 1,
            validation_errors_remaining: 0,
            submitted: true,
            submission_error: None,
            succeeded: true,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            latency_ms: 1200,
        };

        let summary = report.to_summary();
        assert!(summary.success);
        assert_eq!(summary.fields_processed, 1);
        assert_eq!(summary.checkboxes_processed, 2);
        assert_eq!(summary.honeypots_avoided, 1);
        assert_eq!(summary.validation_errors, 0);
        assert!(summary.submitted);
    }
}
