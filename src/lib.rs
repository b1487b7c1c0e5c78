//! Ecocode - energy hotspot finder.
//!
//! Ecocode ranks the functions of a Python source by a deterministic
//! structural cost score and asks AI providers for behavior-preserving,
//! leaner rewrites of the worst offenders.
//!
//! # Architecture
//!
//! The pipeline is synchronous up to the provider call:
//!
//! - `analysis`: tree-sitter parsing and per-function structural facts
//! - `score`: cost formula, dense ranking and energy estimates
//! - `session`: one submitted source with its ranked hotspots
//! - `suggest`: prompt building, provider fallback, timeouts and cancellation
//! - `config`: YAML configuration schema and discovery
//! - `report`: output formatting (text, JSON)
//!
//! # Example
//!
//! ```no_run
//! use ecocode::{analyze, AnalysisConfig};
//!
//! let report = analyze("def f(xs):\n    for x in xs:\n        pass\n", &AnalysisConfig::default())?;
//! assert_eq!(report.hotspots[0].rank, 1);
//! # Ok::<(), ecocode::AnalysisError>(())
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod logging;
pub mod report;
pub mod score;
pub mod session;
pub mod suggest;

pub use analysis::{
    register_analyzers, AnalysisError, AnalysisResult, FunctionId, FunctionRecord,
    LanguageAnalyzer, SourceUnit,
};
pub use config::{AnalysisConfig, Config, SuggestionConfig};
pub use score::{HotspotScore, ScoreBreakdown};
pub use session::{AnalysisReport, AnalysisSession, Hotspot};
pub use suggest::{
    Orchestrator, Provider, ProviderError, ProviderLedger, ProviderSlot, SuggestionResult,
    SuggestionStatus,
};

/// Analyze a Python source text and return its ranked hotspot report.
///
/// Fails with `AnalysisError::Syntax` (no partial list) when the text does
/// not parse.
pub fn analyze(text: &str, config: &AnalysisConfig) -> AnalysisResult<AnalysisReport> {
    AnalysisSession::submit(text, config).map(|s| s.report())
}

/// Initialize all subsystems.
///
/// Call this once at startup.
pub fn init() {
    register_analyzers();
}
