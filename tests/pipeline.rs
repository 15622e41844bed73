//! End-to-end pipeline tests: stub driver + mock provider through the
//! whole session.

use std::sync::Arc;
use std::time::Duration;

use formpilot_analysis_core::{
    AnalysisCache, AnalysisError, AnalysisSource, MockAnalysisProvider,
};
use formpilot_cli::hooks::SessionObserver;
use formpilot_cli::{FillSession, SessionError};
use formpilot_core_types::UserData;
use formpilot_fill_executor::ZeroDelay;
use formpilot_form_perceiver::QuiescencePolicy;
use formpilot_page_adapter::{PageDriver, StubDriver, StubElement, StubInteraction};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

fn extraction_payload() -> Value {
    json!({
        "context": {
            "url": "https://example.test/signup",
            "title": "Create your account",
            "looksLikeSignup": true,
            "formCount": 1,
            "htmlExcerpt": "<form>...</form>"
        },
        "elements": [
            { "tag": "input", "inputType": "email", "name": "email", "required": true,
              "selector": "#email", "nearbyLabels": ["Email address"],
              "visibility": { "display": "block", "visibility": "visible", "opacity": 1.0,
                              "position": "static", "width": 220.0, "height": 32.0 } },
            { "tag": "input", "inputType": "password", "name": "password", "required": true,
              "selector": "#pw", "nearbyLabels": ["Password"],
              "visibility": { "display": "block", "visibility": "visible", "opacity": 1.0,
                              "position": "static", "width": 220.0, "height": 32.0 } },
            { "tag": "input", "inputType": "text", "name": "website",
              "selector": "#website",
              "visibility": { "display": "block", "visibility": "visible", "opacity": 1.0,
                              "position": "absolute", "offsetLeft": -9999.0,
                              "width": 220.0, "height": 32.0 } },
            { "tag": "input", "inputType": "checkbox", "name": "tos",
              "selector": "#terms", "nearbyLabels": ["I agree to the Terms of Service"],
              "required": true,
              "visibility": { "display": "block", "visibility": "visible", "opacity": 1.0,
                              "position": "static", "width": 16.0, "height": 16.0 } },
            { "tag": "input", "inputType": "checkbox", "name": "newsletter",
              "selector": "#news", "nearbyLabels": ["Subscribe to our newsletter"],
              "visibility": { "display": "block", "visibility": "visible", "opacity": 1.0,
                              "position": "static", "width": 16.0, "height": 16.0 } },
            { "tag": "button", "selector": "#join", "nearbyLabels": ["Create account"],
              "visibility": { "display": "block", "visibility": "visible", "opacity": 1.0,
                              "position": "static", "width": 120.0, "height": 40.0 } }
        ]
    })
}

fn signup_driver() -> StubDriver {
    StubDriver::new("https://example.test/signup")
        .on_evaluate("__formpilot_extract__", extraction_payload())
        .with_element("form", StubElement::default())
        .with_element("#email", StubElement::default())
        .with_element("#pw", StubElement::default())
        .with_element("#website", StubElement::hidden())
        .with_element(
            "#news",
            StubElement {
                checked: true,
                ..Default::default()
            },
        )
        .with_element("#terms", StubElement::default())
        .with_element("#join", StubElement::default())
}

/// Model response that wrongly claims the off-screen decoy is fillable.
fn model_response() -> String {
    let body = json!({
        "analysis": "signup form with email, password, and two checkboxes",
        "pageType": "signup",
        "confidence": 0.93,
        "fields": [
            { "purpose": "email", "selector": "#email", "elementType": "input",
              "required": true, "importance": "critical" },
            { "purpose": "password", "selector": "#pw", "elementType": "input",
              "required": true, "importance": "critical" },
            { "purpose": "other", "selector": "#website", "elementType": "input",
              "required": false, "importance": "optional" }
        ],
        "checkboxes": [
            { "selector": "#terms", "labelText": "I agree to the Terms of Service",
              "required": true },
            { "selector": "#news", "labelText": "Subscribe to our newsletter" }
        ],
        "honeypots": [],
        "submitButton": { "selector": "#join", "text": "Create account" }
    });
    format!("Sure! Here is my analysis:\n```json\n{body}\n```")
}

fn user() -> UserData {
    UserData {
        email: "jane@example.com".into(),
        password: Some("hunter2hunter2".into()),
        first_name: "Jane".into(),
        last_name: "Doe".into(),
        ..Default::default()
    }
}

fn fast_quiescence() -> QuiescencePolicy {
    QuiescencePolicy {
        network_quiet: Duration::from_millis(1),
        network_timeout: Duration::from_millis(5),
        settle_delay: Duration::from_millis(1),
        indicator_timeout: Duration::from_millis(20),
        indicator_poll: Duration::from_millis(2),
        ..Default::default()
    }
}

fn session_for(driver: Arc<StubDriver>) -> FillSession {
    FillSession::new(driver)
        .with_tempo(Arc::new(ZeroDelay))
        .with_quiescence(fast_quiescence())
}

#[tokio::test]
async fn model_path_fills_form_and_avoids_detector_flagged_trap() {
    let driver = Arc::new(signup_driver());
    let provider = Arc::new(MockAnalysisProvider::replying(model_response()));
    let session = session_for(driver.clone()).with_provider(provider);

    let outcome = session
        .run(&user(), CancellationToken::new())
        .await
        .unwrap();

    // The model's fenced response was recovered without repair.
    assert_eq!(outcome.analysis.source, AnalysisSource::Model);

    // Detector-always-wins: the model listed #website as fillable, the
    // detector's off-screen + decoy-name verdict removed it.
    assert!(outcome.analysis.fields.iter().all(|f| f.selector != "#website"));
    assert!(outcome
        .analysis
        .honeypots
        .iter()
        .any(|h| h.selector == "#website"));
    assert!(driver.journal().iter().all(|i| {
        !matches!(i, StubInteraction::Fill { selector, .. } if selector == "#website")
            && !matches!(i, StubInteraction::Type { selector, .. } if selector == "#website")
    }));

    // Fill results: both real fields filled, terms checked, newsletter
    // opted out, form submitted.
    assert!(outcome.summary.success);
    assert!(outcome.summary.submitted);
    assert_eq!(outcome.summary.fields_processed, 2);
    assert_eq!(outcome.summary.checkboxes_processed, 2);
    assert!(outcome.summary.honeypots_avoided >= 1);
    assert_eq!(driver.element_value("#email").as_deref(), Some("jane@example.com"));
    assert_eq!(driver.element_value("#pw").as_deref(), Some("hunter2hunter2"));
    assert_eq!(driver.element_checked("#terms"), Some(true));
    assert_eq!(driver.element_checked("#news"), Some(false));
}

#[tokio::test]
async fn transport_failure_fails_over_to_heuristic_scan() {
    let driver = Arc::new(signup_driver());
    let provider = Arc::new(MockAnalysisProvider::failing(AnalysisError::Transport(
        "connection reset".into(),
    )));
    let session = session_for(driver.clone()).with_provider(provider);

    let outcome = session
        .run(&user(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.analysis.source, AnalysisSource::Fallback);
    assert!(outcome.analysis.confidence <= 0.8);
    // The heuristic scan still recognizes the form and avoids the trap.
    assert!(outcome.summary.success);
    assert!(outcome.summary.fields_processed >= 2);
    assert!(outcome.analysis.honeypots.iter().any(|h| h.selector == "#website"));
}

#[tokio::test]
async fn prose_only_model_output_also_fails_over() {
    let driver = Arc::new(signup_driver());
    let provider = Arc::new(MockAnalysisProvider::replying(
        "I looked at the page but cannot produce JSON right now, apologies!",
    ));
    let session = session_for(driver).with_provider(provider);

    let outcome = session
        .run(&user(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.analysis.source, AnalysisSource::Fallback);
}

#[tokio::test]
async fn auth_failure_is_terminal_with_remediation_text() {
    let driver = Arc::new(signup_driver());
    let provider = Arc::new(MockAnalysisProvider::failing(AnalysisError::Auth(
        "401 unauthorized".into(),
    )));
    let session = session_for(driver).with_provider(provider);

    let err = session
        .run(&user(), CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        SessionError::AnalysisFatal(inner) => {
            assert!(inner.to_string().contains("verify the API key"));
        }
        other => panic!("expected AnalysisFatal, got {other}"),
    }
}

#[tokio::test]
async fn second_run_against_same_site_hits_the_cache() {
    let driver = Arc::new(signup_driver());
    let provider = Arc::new(MockAnalysisProvider::replying(model_response()));
    let cache = Arc::new(AnalysisCache::new(Duration::from_secs(600), 8));
    let session = session_for(driver)
        .with_provider(provider.clone())
        .with_cache(cache.clone());

    session.run(&user(), CancellationToken::new()).await.unwrap();
    session.run(&user(), CancellationToken::new()).await.unwrap();

    assert_eq!(provider.calls(), 1, "second session must reuse the cached analysis");
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn observer_hooks_fire_in_order() {
    #[derive(Default)]
    struct CountingObserver {
        events: parking_lot::Mutex<Vec<&'static str>>,
    }
    impl SessionObserver for CountingObserver {
        fn on_analysis_complete(&self, _: &formpilot_analysis_core::AnalysisResult) {
            self.events.lock().push("analysis");
        }
        fn on_fill_outcome(&self, _: &formpilot_fill_executor::FillOutcome) {
            self.events.lock().push("outcome");
        }
        fn on_session_complete(&self, _: &formpilot_core_types::SessionSummary) {
            self.events.lock().push("summary");
        }
    }

    let driver = Arc::new(signup_driver());
    let observer = Arc::new(CountingObserver::default());
    let session = session_for(driver)
        .with_provider(Arc::new(MockAnalysisProvider::replying(model_response())))
        .with_observer(observer.clone());

    session.run(&user(), CancellationToken::new()).await.unwrap();

    let events = observer.events.lock().clone();
    assert_eq!(events.first(), Some(&"analysis"));
    assert_eq!(events.last(), Some(&"summary"));
    assert!(events.iter().filter(|e| **e == "outcome").count() >= 2);
}

#[tokio::test]
async fn offline_session_without_provider_uses_fallback_directly() {
    let driver = Arc::new(signup_driver());
    let session = session_for(driver);

    let analysis = session.scan().await.unwrap();

    assert_eq!(analysis.source, AnalysisSource::Fallback);
    assert!(analysis.fields.iter().any(|f| f.selector == "#email"));
    // Scan marks selector validity against the live (stubbed) page.
    let email = analysis.fields.iter().find(|f| f.selector == "#email").unwrap();
    assert!(email.selector_valid && email.actually_visible);
}
