//! Fact structures extracted from AST analysis.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default display name for snippets submitted without a filename.
pub const DEFAULT_FILENAME: &str = "main.py";

/// Source location span with byte offsets and line/column positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// Start column (1-indexed).
    pub start_col: usize,
    /// End line (1-indexed).
    pub end_line: usize,
    /// End column (1-indexed).
    pub end_col: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: start.row + 1, // tree-sitter is 0-indexed
            start_col: start.column + 1,
            end_line: end.row + 1,
            end_col: end.column + 1,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_line, self.end_line)
    }
}

/// Submitted snippet. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    text: String,
    language: String,
    filename: String,
}

impl SourceUnit {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
            filename: DEFAULT_FILENAME.to_string(),
        }
    }

    /// Set the display filename (used only in reports).
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Size of the snippet in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Stable identifier of a function within one session: `<qualified_name>@<start_line>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionId(String);

impl FunctionId {
    pub fn new(qualified_name: &str, start_line: usize) -> Self {
        Self(format!("{}@{}", qualified_name, start_line))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FunctionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FunctionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Structural record for one function definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub id: FunctionId,
    /// Bare function name.
    pub name: String,
    /// Name qualified with enclosing classes/functions (e.g. `Cache.get`).
    pub qualified_name: String,
    /// Span of the `def` (decorators excluded).
    pub span: Span,
    /// Maximum nesting depth of `for`/`while` loops in the body.
    pub loop_depth: u32,
    /// The function calls itself somewhere in its body.
    pub has_recursion: bool,
    /// Container growth calls (`append`, `insert`, ...) located inside a loop.
    pub growth_ops: u32,
    /// Number of call expressions in the body.
    pub call_fanout: u32,
    /// Known expensive calls (`sorted`, `open`, `print`, `sort()`), sorted and deduplicated.
    pub expensive_calls: Vec<String>,
    /// Loop-local issues, sorted and deduplicated.
    pub loop_issues: Vec<LoopIssue>,
    /// Raw source text of just this function.
    pub source: String,
}

impl FunctionRecord {
    pub fn start_line(&self) -> usize {
        self.span.start_line
    }

    pub fn end_line(&self) -> usize {
        self.span.end_line
    }

    /// Whether the function performs file I/O.
    pub fn does_io(&self) -> bool {
        self.expensive_calls.iter().any(|c| c == "open")
    }
}

/// Inefficiencies found inside loop bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopIssue {
    /// `x += ...` inside a loop.
    ConcatInLoop,
    /// `x.append(...)` and friends inside a loop.
    GrowthInLoop,
}

impl LoopIssue {
    pub fn description(&self) -> &'static str {
        match self {
            LoopIssue::ConcatInLoop => "string concatenation in loop (+=)",
            LoopIssue::GrowthInLoop => "collection growth in loop (.append/.insert)",
        }
    }
}

impl fmt::Display for LoopIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
