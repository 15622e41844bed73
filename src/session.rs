//! Session orchestration.
//!
//! One [`FillSession`] owns one page for its whole duration and runs the
//! pipeline strictly in order: extract, classify traps, analyze (model or
//! heuristic fallback), merge, verify selectors, execute. The generative
//! call is the only page-free step; everything else is an await-point on
//! the exclusively-owned page.

use std::sync::Arc;
use std::time::Instant;

use formpilot_analysis_core::{
    fallback, merge_trap_verdicts, prompt, repair_response, AnalysisCache, AnalysisProvider,
    AnalysisResult, AnalysisSource, RepairOutcome,
};
use formpilot_core_types::{FillRoute, PageId, SessionId, UserData};
use formpilot_fill_executor::{
    DelayStrategy, FillCtx, FillExecutor, FillReport, HumanTempo, TempoPlan,
};
use formpilot_form_perceiver::{
    DefaultFormPerceiver, FormPerceiver, PageSnapshot, QuiescencePolicy,
};
use formpilot_page_adapter::PageDriver;
use formpilot_selector_verify::{DefaultSelectorVerifier, SelectorVerifier, VerificationReport};
use formpilot_trap_gate::{classify_all, TrapVerdict};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::errors::SessionError;
use crate::hooks::{NoopObserver, SessionObserver};

/// Everything one finished session hands back to the caller.
#[derive(Debug)]
pub struct SessionOutcome {
    pub summary: formpilot_core_types::SessionSummary,
    pub report: FillReport,
    pub analysis: AnalysisResult,
    pub verification: VerificationReport,
}

/// One page, one pipeline run.
pub struct FillSession {
    driver: Arc<dyn PageDriver>,
    perceiver: Arc<dyn FormPerceiver>,
    verifier: Arc<dyn SelectorVerifier>,
    provider: Option<Arc<dyn AnalysisProvider>>,
    cache: Option<Arc<AnalysisCache>>,
    observer: Arc<dyn SessionObserver>,
    tempo: Arc<dyn DelayStrategy>,
    config: AppConfig,
}

impl FillSession {
    pub fn new(driver: Arc<dyn PageDriver>) -> Self {
        Self {
            perceiver: Arc::new(DefaultFormPerceiver::new(driver.clone())),
            verifier: Arc::new(DefaultSelectorVerifier::new(driver.clone())),
            driver,
            provider: None,
            cache: None,
            observer: Arc::new(NoopObserver),
            tempo: Arc::new(HumanTempo::new(TempoPlan::default())),
            config: AppConfig::default(),
        }
    }

    /// Without a provider the session goes straight to the heuristic scan.
    pub fn with_provider(mut self, provider: Arc<dyn AnalysisProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_cache(mut self, cache: Arc<AnalysisCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_tempo(mut self, tempo: Arc<dyn DelayStrategy>) -> Self {
        self.tempo = tempo;
        self
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_quiescence(mut self, policy: QuiescencePolicy) -> Self {
        self.perceiver = Arc::new(
            DefaultFormPerceiver::new(self.driver.clone()).with_policy(policy),
        );
        self
    }

    /// Run the whole pipeline and fill the page.
    pub async fn run(
        &self,
        user: &UserData,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome, SessionError> {
        let route = FillRoute::new(SessionId::new(), PageId::new());
        info!(route = %route, "fill session begins");

        let snapshot = self
            .perceiver
            .capture()
            .await
            .map_err(|e| SessionError::Extraction(e.to_string()))?;
        let verdicts = classify_all(&snapshot.elements);

        let mut analysis = self.analyze(&snapshot, &verdicts).await?;
        let removed = merge_trap_verdicts(&mut analysis, &verdicts);
        if removed > 0 {
            info!(removed, "detector removed model-claimed plans");
        }
        self.observer.on_analysis_complete(&analysis);

        let verification = self.verifier.verify(&mut analysis).await;

        let ctx = FillCtx::new(
            route,
            Instant::now() + self.config.session_timeout(),
            cancel,
        );
        let executor = FillExecutor::new(self.driver.clone(), self.tempo.clone());
        let report = executor.execute(&ctx, &analysis, user).await;

        for outcome in &report.outcomes {
            self.observer.on_fill_outcome(outcome);
        }
        let summary = report.to_summary();
        self.observer.on_session_complete(&summary);
        info!(
            success = summary.success,
            fields = summary.fields_processed,
            honeypots = summary.honeypots_avoided,
            submitted = summary.submitted,
            "fill session ends"
        );

        Ok(SessionOutcome {
            summary,
            report,
            analysis,
            verification,
        })
    }

    /// Analysis-only dry run: extract, classify, analyze, verify - no fill.
    pub async fn scan(&self) -> Result<AnalysisResult, SessionError> {
        let snapshot = self
            .perceiver
            .capture()
            .await
            .map_err(|e| SessionError::Extraction(e.to_string()))?;
        let verdicts = classify_all(&snapshot.elements);
        let mut analysis = self.analyze(&snapshot, &verdicts).await?;
        merge_trap_verdicts(&mut analysis, &verdicts);
        self.verifier.verify(&mut analysis).await;
        Ok(analysis)
    }

    /// Generative analysis with the single built-in failover: transport or
    /// unrecoverable-parse failures drop to the heuristic scanner;
    /// credential-class failures are terminal.
    async fn analyze(
        &self,
        snapshot: &PageSnapshot,
        verdicts: &[TrapVerdict],
    ) -> Result<AnalysisResult, SessionError> {
        let site = site_key(&snapshot.context.url);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&site) {
                info!(site = %site, "using cached analysis");
                return Ok(hit);
            }
        }

        let provider = match &self.provider {
            Some(provider) => provider,
            None => return Ok(fallback::scan(snapshot, verdicts)),
        };

        let request = prompt::build_analysis_request(&snapshot.context, &snapshot.elements);
        let analysis = match provider.analyze(&request).await {
            Ok(raw) => match repair_response(&raw) {
                RepairOutcome::Valid(result) => result,
                RepairOutcome::Repaired(result, fixes) => {
                    info!(fixes = fixes.len(), "analysis response repaired");
                    result
                }
                RepairOutcome::Unrecoverable(reason) => {
                    warn!(reason = %reason, "model output unrecoverable, using heuristic scan");
                    fallback::scan(snapshot, verdicts)
                }
            },
            Err(err) if err.is_fatal() => {
                return Err(SessionError::AnalysisFatal(err));
            }
            Err(err) => {
                warn!(error = %err, "analysis call failed, using heuristic scan");
                fallback::scan(snapshot, verdicts)
            }
        };

        if let Some(cache) = &self.cache {
            if analysis.source != AnalysisSource::Fallback {
                cache.put(site, analysis.clone());
            }
        }
        Ok(analysis)
    }
}

/// Cache key: host when the URL parses, whole string otherwise.
fn site_key(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_key_extracts_host() {
        assert_eq!(site_key("https://example.test/signup?x=1"), "example.test");
        assert_eq!(site_key("not a url"), "not a url");
    }
}
