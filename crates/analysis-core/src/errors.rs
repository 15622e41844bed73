//! Typed failure taxonomy for the generative analysis call.

use thiserror::Error;

/// Errors emitted by the analysis client. Transport-class failures send
/// the pipeline to the heuristic fallback; credential-class failures are
/// terminal for the session since the fallback gains nothing from them
/// being retried.
#[derive(Debug, Error, Clone)]
pub enum AnalysisError {
    /// No credential configured. Surfaced before any request is attempted.
    #[error("analysis credential missing: set FORMPILOT_API_KEY or the [analysis] api_key config entry")]
    MissingCredential,

    /// Network failure, connect/read timeout, or 5xx from the service.
    #[error("analysis transport failure: {0}")]
    Transport(String),

    /// The service rejected the credential (401/403).
    #[error("analysis request unauthorized: {0}; verify the API key is valid and has access to the model")]
    Auth(String),

    /// Throttled (429) without a quota signal.
    #[error("analysis rate limited: {0}")]
    RateLimit(String),

    /// Quota exhausted for the billing period.
    #[error("analysis quota exhausted: {0}; raise the quota or switch credentials")]
    Quota(String),

    /// The service answered 2xx but the envelope was not decodable.
    #[error("analysis upstream response malformed: {0}")]
    Upstream(String),
}

impl AnalysisError {
    /// Terminal for the session - the fallback path cannot compensate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnalysisError::MissingCredential | AnalysisError::Auth(_) | AnalysisError::Quota(_)
        )
    }
}
