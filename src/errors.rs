//! Session-level error classification.

use formpilot_analysis_core::AnalysisError;
use thiserror::Error;

/// Terminal failures of one fill session. Element-level problems never
/// surface here - they live in the per-element outcome records.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Extraction could not produce any snapshot at all.
    #[error("page extraction failed: {0}")]
    Extraction(String),

    /// Credential-class analysis failure; the fallback gains nothing, so
    /// the session stops with remediation text.
    #[error("{0}")]
    AnalysisFatal(AnalysisError),

    /// Configuration was unusable before any page work started.
    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_analysis_errors_carry_remediation_text() {
        let err = SessionError::AnalysisFatal(AnalysisError::Auth("401".into()));
        assert!(err.to_string().contains("verify the API key"));
    }
}
