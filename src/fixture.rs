//! Recorded-page fixtures.
//!
//! The binary never manages a browser; live integrations inject their own
//! [`PageDriver`](formpilot_page_adapter::PageDriver). For operator
//! debugging and offline runs, a fixture file replays a recorded page:
//! the extraction payload, per-selector element state, and any validation
//! indicators the page would show.

use std::collections::HashMap;
use std::path::Path;

use formpilot_page_adapter::{StubDriver, StubElement};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::SessionError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFixture {
    pub url: String,
    /// Payload the extraction script would have returned on this page.
    pub extraction: Value,
    /// Per-selector overrides; selectors present in the extraction payload
    /// are registered automatically.
    #[serde(default)]
    pub elements: HashMap<String, FixtureElement>,
    /// Visible validation-indicator texts after a fill attempt.
    #[serde(default)]
    pub validation_errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FixtureElement {
    pub count: usize,
    pub visible: bool,
    pub value: String,
    pub checked: bool,
}

impl Default for FixtureElement {
    fn default() -> Self {
        Self {
            count: 1,
            visible: true,
            value: String::new(),
            checked: false,
        }
    }
}

pub fn load(path: &Path) -> Result<PageFixture, SessionError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SessionError::Config(format!("cannot read fixture {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| SessionError::Config(format!("cannot parse fixture {}: {e}", path.display())))
}

/// Build the replay driver: extraction answer, validation answer, and one
/// stub element per selector.
pub fn driver_for(fixture: &PageFixture) -> StubDriver {
    let mut driver = StubDriver::new(fixture.url.clone())
        .on_evaluate("__formpilot_extract__", fixture.extraction.clone())
        .on_evaluate(
            "__formpilot_validation__",
            Value::Array(
                fixture
                    .validation_errors
                    .iter()
                    .map(|e| Value::String(e.clone()))
                    .collect(),
            ),
        );

    for element in extraction_elements(&fixture.extraction) {
        let Some(selector) = element.get("selector").and_then(Value::as_str) else {
            continue;
        };
        if fixture.elements.contains_key(selector) {
            continue;
        }
        let hidden = element
            .pointer("/visibility/display")
            .and_then(Value::as_str)
            .map(|d| d == "none")
            .unwrap_or(false);
        let stub = if hidden {
            StubElement::hidden()
        } else {
            StubElement::default()
        };
        driver = driver.with_element(selector.to_string(), stub);
    }

    for (selector, element) in &fixture.elements {
        driver = driver.with_element(
            selector.clone(),
            StubElement {
                count: element.count,
                visible: element.visible,
                bounding_box: if element.visible {
                    StubElement::default().bounding_box
                } else {
                    None
                },
                value: element.value.clone(),
                checked: element.checked,
            },
        );
    }

    driver
}

fn extraction_elements(extraction: &Value) -> &[Value] {
    extraction
        .get("elements")
        .and_then(Value::as_array)
        .map(|a| a.as_slice())
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use formpilot_page_adapter::PageDriver;
    use serde_json::json;

    fn fixture_json() -> String {
        json!({
            "url": "https://example.test/signup",
            "extraction": {
                "context": { "url": "https://example.test/signup", "formCount": 1 },
                "elements": [
                    { "tag": "input", "inputType": "email", "selector": "#email" },
                    { "tag": "input", "inputType": "text", "selector": "#website",
                      "visibility": { "display": "none" } }
                ]
            },
            "elements": {
                "#join": { "count": 1 }
            },
            "validationErrors": ["Email is required"]
        })
        .to_string()
    }

    #[tokio::test]
    async fn fixture_driver_replays_page_state() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), fixture_json()).unwrap();

        let fixture = load(file.path()).unwrap();
        let driver = driver_for(&fixture);

        assert_eq!(driver.query_count("#email").await.unwrap(), 1);
        assert!(driver.is_visible("#email").await.unwrap());
        assert!(!driver.is_visible("#website").await.unwrap());
        assert_eq!(driver.query_count("#join").await.unwrap(), 1);

        let errors = driver
            .evaluate("/* __formpilot_validation__ */")
            .await
            .unwrap();
        assert_eq!(errors.as_array().unwrap().len(), 1);
    }

    #[test]
    fn missing_fixture_is_a_config_error() {
        let err = load(Path::new("/no/such/fixture.json")).unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }
}
