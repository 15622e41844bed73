//! Configuration loading.
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `FORMPILOT_*` environment overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub timing: TimingConfig,
    pub cache: CacheConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Hosted-model credential. Empty means the generative stage is
    /// unavailable and `fill` refuses to start; `scan --offline` still works.
    pub api_key: String,
    pub model: String,
    /// Hard timeout for the analysis call, seconds.
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Tempo profile: "human" or "brisk".
    pub tempo: String,
    /// Optional fixed seed so a run's pacing is reproducible.
    pub tempo_seed: Option<u64>,
    /// Whole-session deadline, seconds.
    pub session_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 45,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tempo: "human".to_string(),
            tempo_seed: None,
            session_timeout_secs: 180,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 1800,
            capacity: 64,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            timing: TimingConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis.timeout_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.session_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

/// Load configuration: defaults, optional file, env overrides, in that
/// order.
pub fn load_configuration(config_file: Option<&Path>) -> Result<AppConfig, SessionError> {
    let mut config = AppConfig::default();

    if let Some(path) = config_file {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("cannot read {}: {e}", path.display())))?;
        config = toml::from_str(&content)
            .map_err(|e| SessionError::Config(format!("cannot parse {}: {e}", path.display())))?;
    }

    if let Ok(api_key) = std::env::var("FORMPILOT_API_KEY") {
        config.analysis.api_key = api_key;
    }
    if let Ok(model) = std::env::var("FORMPILOT_MODEL") {
        config.analysis.model = model;
    }
    if let Ok(tempo) = std::env::var("FORMPILOT_TEMPO") {
        config.timing.tempo = tempo;
    }
    if let Ok(timeout) = std::env::var("FORMPILOT_SESSION_TIMEOUT_SECS") {
        if let Ok(secs) = timeout.parse() {
            config.timing.session_timeout_secs = secs;
        }
    }

    Ok(config)
}
