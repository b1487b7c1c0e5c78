//! AST-backed structural analysis.
//!
//! Turns a submitted snippet into one `FunctionRecord` per function
//! definition, using tree-sitter. Records carry the structural features the
//! scorer consumes:
//! - loop nesting depth
//! - self-recursion
//! - container growth inside loops
//! - call fan-out
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌────────────────┐
//! │ SourceUnit  │────▶│ Analyzer     │────▶│ FunctionRecord │
//! └─────────────┘     │ parse()      │     │ (per function) │
//!                     │ extract()    │     └────────────────┘
//!                     └──────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! Implement `LanguageAnalyzer` in `src/analysis/languages/` and register it
//! in `languages/mod.rs`.

mod error;
mod facts;
mod languages;
mod traits;

pub use error::{AnalysisError, AnalysisResult};
pub use facts::{FunctionId, FunctionRecord, LoopIssue, SourceUnit, Span, DEFAULT_FILENAME};
pub use languages::{get_analyzer, register_analyzers, PythonAnalyzer};
pub use traits::{LanguageAnalyzer, ParsedSource};

use tracing::debug;

/// Default upper bound on submitted source size.
pub const DEFAULT_MAX_SOURCE_BYTES: usize = 512 * 1024;

/// Parse and extract a source unit.
///
/// Rejects oversized input before parsing.
pub fn extract(unit: &SourceUnit, max_source_bytes: usize) -> AnalysisResult<Vec<FunctionRecord>> {
    if unit.len() > max_source_bytes {
        debug!(size = unit.len(), limit = max_source_bytes, "rejecting oversized source");
        return Err(AnalysisError::SizeLimitExceeded {
            size: unit.len(),
            limit: max_source_bytes,
        });
    }

    let analyzer = get_analyzer(unit.language())
        .ok_or_else(|| AnalysisError::UnsupportedLanguage(unit.language().to_string()))?;

    let parsed = analyzer.parse(unit.text())?;
    let records = analyzer.extract_functions(&parsed)?;
    debug!(
        file = unit.filename(),
        functions = records.len(),
        "extracted function records"
    );
    Ok(records)
}
