//! Browser driver surface consumed by the fill pipeline.
//!
//! The pipeline never manages browser process lifecycle; it talks to one
//! already-open page through [`PageDriver`]. A production implementation
//! wraps a CDP or WebDriver session; tests use [`StubDriver`].

pub mod stub;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use stub::{StubDriver, StubElement, StubInteraction};

/// Coarse classification of driver failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DriverErrorKind {
    /// Selector resolved to no usable element before the deadline.
    TargetNotFound,
    /// A bounded wait expired.
    WaitTimeout,
    /// Transport or protocol failure talking to the page.
    Io,
    /// Anything that should not happen in normal operation.
    Internal,
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DriverErrorKind::TargetNotFound => "target-not-found",
            DriverErrorKind::WaitTimeout => "wait-timeout",
            DriverErrorKind::Io => "io",
            DriverErrorKind::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

/// Enriched error metadata passed back to higher layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for DriverError {}

impl DriverError {
    pub fn new(kind: DriverErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }
}

/// Geometry of an element as currently rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// Single-page automation surface the pipeline consumes.
///
/// Every method is an await-point on the session's exclusively-owned page.
/// Implementations map their own transport errors into [`DriverError`].
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Evaluate a script in the page and return its JSON result.
    async fn evaluate(&self, expression: &str) -> Result<Value, DriverError>;

    /// Number of elements the selector currently matches.
    async fn query_count(&self, selector: &str) -> Result<usize, DriverError>;

    /// Actual rendering-state visibility (layout box present, on screen,
    /// not collapsed) - not just computed style.
    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError>;

    /// Current layout geometry, `None` when the element has no box.
    async fn bounding_box(&self, selector: &str) -> Result<Option<BoundingBox>, DriverError>;

    async fn click(&self, selector: &str, deadline: Duration) -> Result<(), DriverError>;

    /// Set an input's value atomically (used for secrets).
    async fn fill(&self, selector: &str, value: &str, deadline: Duration)
        -> Result<(), DriverError>;

    /// Type text through key events (the executor paces characters).
    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        deadline: Duration,
    ) -> Result<(), DriverError>;

    async fn set_checked(
        &self,
        selector: &str,
        checked: bool,
        deadline: Duration,
    ) -> Result<(), DriverError>;

    async fn select_option(
        &self,
        selector: &str,
        value: &str,
        deadline: Duration,
    ) -> Result<(), DriverError>;

    async fn scroll_into_view(&self, selector: &str) -> Result<(), DriverError>;

    /// Resolve when the selector matches, or fail with `WaitTimeout`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<(), DriverError>;

    /// Resolve once no network request has been in flight for `quiet`,
    /// or fail with `WaitTimeout` after `timeout`.
    async fn wait_for_network_idle(
        &self,
        quiet: Duration,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    async fn page_url(&self) -> Result<String, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_display_includes_hint() {
        let err = DriverError::new(DriverErrorKind::TargetNotFound).with_hint("#email");
        assert_eq!(err.to_string(), "target-not-found: #email");
        assert!(!err.retriable);
    }

    #[test]
    fn bounding_box_area_clamps_negative() {
        let collapsed = BoundingBox {
            x: 10.0,
            y: 10.0,
            width: -4.0,
            height: 30.0,
        };
        assert_eq!(collapsed.area(), 0.0);
    }
}
