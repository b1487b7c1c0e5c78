//! Language-specific analyzer implementations.

mod python;

pub use python::PythonAnalyzer;

use super::LanguageAnalyzer;
use once_cell::sync::OnceCell;

/// Static storage for Python analyzer.
static PYTHON_ANALYZER: OnceCell<PythonAnalyzer> = OnceCell::new();

/// Register all available language analyzers.
///
/// Idempotent; `get_analyzer` calls it lazily as well.
pub fn register_analyzers() {
    PYTHON_ANALYZER.get_or_init(PythonAnalyzer::new);
}

/// Get the analyzer for a language id ("python") or file extension ("py").
pub fn get_analyzer(language: &str) -> Option<&'static dyn LanguageAnalyzer> {
    register_analyzers();

    let language = language.trim_start_matches('.');
    let python = PYTHON_ANALYZER.get()?;
    if python.language_id() == language || python.handles_extension(language) {
        return Some(python as &dyn LanguageAnalyzer);
    }

    None
}
