//! Scriptable in-memory driver for tests and offline development.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::{BoundingBox, DriverError, DriverErrorKind, PageDriver};

/// One simulated element behind a selector.
#[derive(Clone, Debug)]
pub struct StubElement {
    /// How many live matches the selector yields.
    pub count: usize,
    pub visible: bool,
    pub bounding_box: Option<BoundingBox>,
    pub value: String,
    pub checked: bool,
}

impl Default for StubElement {
    fn default() -> Self {
        Self {
            count: 1,
            visible: true,
            bounding_box: Some(BoundingBox {
                x: 40.0,
                y: 120.0,
                width: 220.0,
                height: 32.0,
            }),
            value: String::new(),
            checked: false,
        }
    }
}

impl StubElement {
    pub fn hidden() -> Self {
        Self {
            visible: false,
            bounding_box: None,
            ..Default::default()
        }
    }

    pub fn duplicated(count: usize) -> Self {
        Self {
            count,
            ..Default::default()
        }
    }
}

/// Interaction journal entry.
#[derive(Clone, Debug, PartialEq)]
pub enum StubInteraction {
    Click(String),
    Fill { selector: String, value: String },
    Type { selector: String, text: String },
    SetChecked { selector: String, checked: bool },
    Select { selector: String, value: String },
    Scroll(String),
}

/// In-memory [`PageDriver`] with a scriptable page model.
///
/// Evaluate calls are answered by marker matching: the first registered
/// `(marker, value)` pair whose marker occurs in the expression wins.
#[derive(Default)]
pub struct StubDriver {
    elements: Mutex<HashMap<String, StubElement>>,
    eval_results: Mutex<Vec<(String, Value)>>,
    journal: Mutex<Vec<StubInteraction>>,
    failing: Mutex<Vec<String>>,
    url: Mutex<String>,
    network_busy: Mutex<bool>,
}

impl StubDriver {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Mutex::new(url.into()),
            ..Default::default()
        }
    }

    pub fn with_element(self, selector: impl Into<String>, element: StubElement) -> Self {
        self.elements.lock().insert(selector.into(), element);
        self
    }

    pub fn on_evaluate(self, marker: impl Into<String>, result: Value) -> Self {
        self.eval_results.lock().push((marker.into(), result));
        self
    }

    /// Interactions against this selector fail with `TargetNotFound`.
    pub fn failing_on(self, selector: impl Into<String>) -> Self {
        self.failing.lock().push(selector.into());
        self
    }

    /// Keep `wait_for_network_idle` timing out.
    pub fn with_busy_network(self) -> Self {
        *self.network_busy.lock() = true;
        self
    }

    pub fn journal(&self) -> Vec<StubInteraction> {
        self.journal.lock().clone()
    }

    pub fn element_value(&self, selector: &str) -> Option<String> {
        self.elements.lock().get(selector).map(|e| e.value.clone())
    }

    pub fn element_checked(&self, selector: &str) -> Option<bool> {
        self.elements.lock().get(selector).map(|e| e.checked)
    }

    fn check_interactable(&self, selector: &str) -> Result<(), DriverError> {
        if self.failing.lock().iter().any(|s| s == selector) {
            return Err(DriverError::new(DriverErrorKind::Io)
                .with_hint(format!("scripted failure for '{selector}'"))
                .retriable(true));
        }
        let elements = self.elements.lock();
        match elements.get(selector) {
            Some(el) if el.count > 0 => Ok(()),
            _ => Err(DriverError::new(DriverErrorKind::TargetNotFound)
                .with_hint(format!("selector '{selector}' matched nothing"))),
        }
    }

    fn record(&self, interaction: StubInteraction) {
        self.journal.lock().push(interaction);
    }
}

#[async_trait]
impl PageDriver for StubDriver {
    async fn evaluate(&self, expression: &str) -> Result<Value, DriverError> {
        let results = self.eval_results.lock();
        for (marker, value) in results.iter() {
            if expression.contains(marker.as_str()) {
                return Ok(value.clone());
            }
        }
        Ok(Value::Null)
    }

    async fn query_count(&self, selector: &str) -> Result<usize, DriverError> {
        Ok(self
            .elements
            .lock()
            .get(selector)
            .map(|e| e.count)
            .unwrap_or(0))
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError> {
        Ok(self
            .elements
            .lock()
            .get(selector)
            .map(|e| e.visible)
            .unwrap_or(false))
    }

    async fn bounding_box(&self, selector: &str) -> Result<Option<BoundingBox>, DriverError> {
        Ok(self
            .elements
            .lock()
            .get(selector)
            .and_then(|e| e.bounding_box))
    }

    async fn click(&self, selector: &str, _deadline: Duration) -> Result<(), DriverError> {
        self.check_interactable(selector)?;
        self.record(StubInteraction::Click(selector.to_string()));
        Ok(())
    }

    async fn fill(
        &self,
        selector: &str,
        value: &str,
        _deadline: Duration,
    ) -> Result<(), DriverError> {
        self.check_interactable(selector)?;
        if let Some(el) = self.elements.lock().get_mut(selector) {
            el.value = value.to_string();
        }
        self.record(StubInteraction::Fill {
            selector: selector.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        _deadline: Duration,
    ) -> Result<(), DriverError> {
        self.check_interactable(selector)?;
        if let Some(el) = self.elements.lock().get_mut(selector) {
            el.value.push_str(text);
        }
        self.record(StubInteraction::Type {
            selector: selector.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn set_checked(
        &self,
        selector: &str,
        checked: bool,
        _deadline: Duration,
    ) -> Result<(), DriverError> {
        self.check_interactable(selector)?;
        if let Some(el) = self.elements.lock().get_mut(selector) {
            el.checked = checked;
        }
        self.record(StubInteraction::SetChecked {
            selector: selector.to_string(),
            checked,
        });
        Ok(())
    }

    async fn select_option(
        &self,
        selector: &str,
        value: &str,
        _deadline: Duration,
    ) -> Result<(), DriverError> {
        self.check_interactable(selector)?;
        if let Some(el) = self.elements.lock().get_mut(selector) {
            el.value = value.to_string();
        }
        self.record(StubInteraction::Select {
            selector: selector.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), DriverError> {
        self.record(StubInteraction::Scroll(selector.to_string()));
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        if self.query_count(selector).await? > 0 {
            Ok(())
        } else {
            Err(DriverError::new(DriverErrorKind::WaitTimeout)
                .with_hint(format!("'{selector}' absent after {timeout:?}")))
        }
    }

    async fn wait_for_network_idle(
        &self,
        _quiet: Duration,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        if *self.network_busy.lock() {
            Err(DriverError::new(DriverErrorKind::WaitTimeout)
                .with_hint(format!("network never idle within {timeout:?}"))
                .retriable(true))
        } else {
            Ok(())
        }
    }

    async fn page_url(&self) -> Result<String, DriverError> {
        Ok(self.url.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fill_updates_value_and_journal() {
        let driver =
            StubDriver::new("https://example.test/signup").with_element("#email", StubElement::default());

        driver
            .fill("#email", "a@b.test", Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(driver.element_value("#email").as_deref(), Some("a@b.test"));
        assert_eq!(
            driver.journal(),
            vec![StubInteraction::Fill {
                selector: "#email".into(),
                value: "a@b.test".into()
            }]
        );
    }

    #[tokio::test]
    async fn missing_selector_is_target_not_found() {
        let driver = StubDriver::new("https://example.test");
        let err = driver
            .click("#ghost", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::TargetNotFound);
    }

    #[tokio::test]
    async fn evaluate_answers_by_marker() {
        let driver = StubDriver::new("https://example.test")
            .on_evaluate("__formpilot_extract", serde_json::json!({"elements": []}));

        let hit = driver
            .evaluate("(() => { /* __formpilot_extract */ })()")
            .await
            .unwrap();
        assert!(hit.get("elements").is_some());

        let miss = driver.evaluate("1 + 1").await.unwrap();
        assert!(miss.is_null());
    }
}
