//! Hybrid form analysis.
//!
//! Fuses hosted generative-model output with the deterministic trap
//! detector: prompt construction, the one-shot analysis client, response
//! repair/validation, the heuristic fallback scanner, and the per-site
//! result cache. Everything downstream consumes the single
//! [`AnalysisResult`] contract.

pub mod cache;
pub mod client;
pub mod contract;
pub mod errors;
pub mod fallback;
pub mod prompt;
pub mod provider;
pub mod repair;

pub use cache::{AnalysisCache, Clock, SystemClock};
pub use client::HostedAnalysisClient;
pub use contract::{
    AnalysisResult, AnalysisSource, ButtonPlan, CheckboxPlan, FieldPlan, FieldPurpose,
    HoneypotEntry, Importance, PageType,
};
pub use errors::AnalysisError;
pub use fallback::FALLBACK_CONFIDENCE_CAP;
pub use prompt::{build_analysis_request, ANALYSIS_SYSTEM_PROMPT, HTML_EXCERPT_CAP};
pub use provider::{AnalysisProvider, AnalysisRequest, MockAnalysisProvider};
pub use repair::{merge_trap_verdicts, repair_response, RepairOutcome, GENERIC_SUBMIT_SELECTOR};
