//! Error types for the extraction stage.

use thiserror::Error;

/// Errors emitted while sampling the page.
#[derive(Debug, Error, Clone)]
pub enum PerceiverError {
    /// The in-page extraction script failed to run.
    #[error("extraction script failed: {0}")]
    Evaluation(String),

    /// The script ran but returned a payload we could not decode.
    #[error("malformed extraction payload: {0}")]
    Malformed(String),
}
