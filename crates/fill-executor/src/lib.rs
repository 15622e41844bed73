//! Fill execution engine.
//!
//! Consumes a verified [`AnalysisResult`](formpilot_analysis_core::AnalysisResult)
//! and applies values and checkbox actions to the live page with
//! human-plausible pacing, reporting per-element outcomes.

pub mod checkbox;
pub mod executor;
pub mod tempo;
pub mod types;
pub mod values;

pub use checkbox::{decide, CheckboxAction};
pub use executor::FillExecutor;
pub use tempo::{pause, DelayKind, DelayStrategy, HumanTempo, TempoPlan, ZeroDelay};
pub use types::{FillCtx, FillOutcome, FillReport, SessionPhase};
pub use values::{value_for, FillValue};
