//! Errors raised by the analysis pipeline.

use thiserror::Error;

use super::FunctionId;

/// Errors that abort an `analyze` call or a hotspot lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("SyntaxError at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("source is {size} bytes, limit is {limit}")]
    SizeLimitExceeded { size: usize, limit: usize },
    #[error("function {0} not found in this session")]
    NotFound(FunctionId),
    #[error("no analyzer for language {0:?}")]
    UnsupportedLanguage(String),
    #[error("grammar error: {0}")]
    Grammar(String),
}

impl AnalysisError {
    /// Line of a syntax error, if this is one.
    pub fn line(&self) -> Option<usize> {
        match self {
            AnalysisError::Syntax { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// Stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Syntax { .. } => "syntax_error",
            AnalysisError::SizeLimitExceeded { .. } => "size_limit_exceeded",
            AnalysisError::NotFound(_) => "not_found",
            AnalysisError::UnsupportedLanguage(_) => "unsupported_language",
            AnalysisError::Grammar(_) => "grammar_error",
        }
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
