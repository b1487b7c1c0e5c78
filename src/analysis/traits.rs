//! Core traits for language analysis.

use super::{AnalysisResult, FunctionRecord};

/// Holds a parsed tree-sitter tree and associated metadata.
///
/// Only syntactically valid sources produce a `ParsedSource`; parsers never
/// hand out trees containing error nodes.
pub struct ParsedSource {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// Source bytes, kept for node text extraction.
    pub source: Vec<u8>,
}

impl ParsedSource {
    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }
}

/// Language-specific analyzer trait.
///
/// # Thread Safety
///
/// tree_sitter::Parser is not Sync, so implementations create a parser per
/// call instead of holding one.
pub trait LanguageAnalyzer: Send + Sync {
    /// Returns the language identifier (e.g., "python").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this analyzer handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Parse source text into a tree.
    ///
    /// Fails with `AnalysisError::Syntax` on any malformed construct; a
    /// partially valid tree is never returned.
    fn parse(&self, source: &str) -> AnalysisResult<ParsedSource>;

    /// Extract one record per function definition, in appearance order.
    fn extract_functions(&self, parsed: &ParsedSource) -> AnalysisResult<Vec<FunctionRecord>>;

    /// Check if this analyzer handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}
