//! Python language analyzer using tree-sitter.

use std::collections::BTreeSet;

use phf::phf_set;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::analysis::{
    AnalysisError, AnalysisResult, FunctionId, FunctionRecord, LanguageAnalyzer, LoopIssue,
    ParsedSource, Span,
};

const FUNCTION_QUERY: &str = r#"
(function_definition
  name: (identifier) @func_name
) @function
"#;

/// Methods that grow a container in place.
static GROWTH_METHODS: phf::Set<&'static str> = phf_set! {
    "append",
    "appendleft",
    "extend",
    "insert",
    "add",
    "update",
};

/// Builtins that are costly enough to call out in reasons.
static EXPENSIVE_BUILTINS: phf::Set<&'static str> = phf_set! {
    "sorted",
    "open",
    "print",
};

/// Longest slice of offending source quoted in a syntax error message.
const ERROR_SNIPPET_LEN: usize = 24;

pub struct PythonAnalyzer {
    language: Language,
}

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    fn create_parser(&self) -> AnalysisResult<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| AnalysisError::Grammar(e.to_string()))?;
        Ok(parser)
    }

    fn build_record(&self, parsed: &ParsedSource, func_node: Node, name: String) -> FunctionRecord {
        let span = Span::from_node(func_node);
        let qualified_name = qualified_name(parsed, func_node, &name);
        let metrics = match func_node.child_by_field_name("body") {
            Some(body) => BodyMetrics::collect(parsed, body, &name, is_method(func_node)),
            None => BodyMetrics::default(),
        };

        FunctionRecord {
            id: FunctionId::new(&qualified_name, span.start_line),
            name,
            qualified_name,
            loop_depth: metrics.max_loop_depth,
            has_recursion: metrics.has_recursion,
            growth_ops: metrics.growth_ops,
            call_fanout: metrics.call_fanout,
            expensive_calls: metrics.expensive_calls.into_iter().collect(),
            loop_issues: metrics.loop_issues.into_iter().collect(),
            source: parsed.node_text(func_node).to_string(),
            span,
        }
    }
}

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py", "pyw"]
    }

    fn parse(&self, source: &str) -> AnalysisResult<ParsedSource> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| AnalysisError::Grammar("parser returned no tree".to_string()))?;

        let parsed = ParsedSource {
            tree,
            source: source.as_bytes().to_vec(),
        };

        if let Some(err) = first_syntax_error(&parsed) {
            return Err(err);
        }
        if let Some(err) = first_python3_violation(&parsed) {
            return Err(err);
        }

        Ok(parsed)
    }

    fn extract_functions(&self, parsed: &ParsedSource) -> AnalysisResult<Vec<FunctionRecord>> {
        let query = Query::new(&self.language, FUNCTION_QUERY)
            .map_err(|e| AnalysisError::Grammar(e.to_string()))?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut found: Vec<(Node, String)> = Vec::new();

        while let Some(m) = matches.next() {
            let mut name = String::new();
            let mut func_node = None;

            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "func_name" => name = parsed.node_text(capture.node).to_string(),
                    "function" => func_node = Some(capture.node),
                    _ => {}
                }
            }

            if let Some(node) = func_node {
                if !name.is_empty() {
                    found.push((node, name));
                }
            }
        }

        found.sort_by_key(|(node, _)| node.start_byte());
        found.dedup_by_key(|(node, _)| node.start_byte());

        Ok(found
            .into_iter()
            .map(|(node, name)| self.build_record(parsed, node, name))
            .collect())
    }
}

/// Locate the first ERROR or MISSING node in document order.
fn first_syntax_error(parsed: &ParsedSource) -> Option<AnalysisError> {
    let root = parsed.tree.root_node();
    if !root.has_error() {
        return None;
    }

    let mut node = root;
    'descend: loop {
        if node.is_error() || node.is_missing() {
            break;
        }
        let mut walker = node.walk();
        for child in node.children(&mut walker) {
            if child.is_error() || child.is_missing() || child.has_error() {
                node = child;
                continue 'descend;
            }
        }
        // has_error() without a flagged child; report the node itself.
        break;
    }

    let pos = node.start_position();
    let message = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        let text = parsed.node_text(node);
        let snippet: String = text
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .chars()
            .take(ERROR_SNIPPET_LEN)
            .collect();
        if snippet.is_empty() {
            "invalid syntax".to_string()
        } else {
            format!("invalid syntax near `{}`", snippet)
        }
    };

    Some(AnalysisError::Syntax {
        line: pos.row + 1,
        column: pos.column + 1,
        message,
    })
}

/// Earliest violation found while walking a tree with no ERROR nodes.
#[derive(Default)]
struct Violations {
    first: Option<(usize, AnalysisError)>,
}

impl Violations {
    fn report(&mut self, byte: usize, row: usize, column: usize, message: impl Into<String>) {
        if self.first.as_ref().is_some_and(|(b, _)| *b <= byte) {
            return;
        }
        self.first = Some((
            byte,
            AnalysisError::Syntax {
                line: row + 1,
                column: column + 1,
                message: message.into(),
            },
        ));
    }

    fn report_node(&mut self, node: Node, message: impl Into<String>) {
        let pos = node.start_position();
        self.report(node.start_byte(), pos.row, pos.column, message);
    }
}

/// Reject constructs tree-sitter recovers from without an ERROR node but
/// Python 3 does not accept: Python 2 statements, backtick repr, empty
/// suites and inconsistent indentation.
fn first_python3_violation(parsed: &ParsedSource) -> Option<AnalysisError> {
    let mut violations = Violations::default();
    let mut stack = vec![parsed.tree.root_node()];

    while let Some(node) = stack.pop() {
        match node.kind() {
            "print_statement" => {
                violations.report_node(node, "Missing parentheses in call to 'print'")
            }
            "exec_statement" => {
                violations.report_node(node, "Missing parentheses in call to 'exec'")
            }
            "string" if parsed.node_text(node).starts_with('`') => {
                violations.report_node(node, "invalid syntax near `` ` ``")
            }
            "module" => check_suite(parsed, node, None, &mut violations),
            "block" => {
                let header = node.parent().map(|p| p.start_byte()).unwrap_or(0);
                let outer = line_indent(&parsed.source, header);
                check_suite(parsed, node, Some(outer), &mut violations);
            }
            _ => {}
        }

        let mut walker = node.walk();
        for child in node.children(&mut walker) {
            stack.push(child);
        }
    }

    violations.first.map(|(_, err)| err)
}

/// Check the statements of a module (`outer == None`) or a block.
fn check_suite(parsed: &ParsedSource, suite: Node, outer: Option<usize>, violations: &mut Violations) {
    let mut walker = suite.walk();
    let statements: Vec<Node> = suite
        .named_children(&mut walker)
        .filter(|n| n.kind() != "comment")
        .collect();

    if suite.kind() == "block" && statements.is_empty() {
        // Point at the line after the header's colon.
        let header_end = suite
            .prev_sibling()
            .map(|n| n.end_position().row)
            .unwrap_or(suite.start_position().row);
        let row = suite.start_position().row.max(header_end + 1);
        violations.report(suite.start_byte(), row, 0, "expected an indented block");
        return;
    }

    let mut indent: Option<usize> = None;
    for stmt in statements {
        // Inline suites and `a; b` put statements after other code on a line.
        let Some(col) = leading_column(&parsed.source, stmt.start_byte()) else {
            continue;
        };
        match (indent, outer) {
            (None, None) if col != 0 => violations.report_node(stmt, "unexpected indent"),
            (None, Some(o)) if col <= o => violations.report_node(stmt, "expected an indented block"),
            (None, _) => indent = Some(col),
            (Some(expected), _) if col > expected => violations.report_node(stmt, "unexpected indent"),
            (Some(expected), _) if col < expected => {
                violations.report_node(stmt, "unindent does not match any outer indentation level")
            }
            _ => {}
        }
    }
}

/// Column of `byte` if only whitespace precedes it on its line.
fn leading_column(source: &[u8], byte: usize) -> Option<usize> {
    let line_start = source[..byte]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    source[line_start..byte]
        .iter()
        .all(|b| matches!(b, b' ' | b'\t' | b'\x0c'))
        .then_some(byte - line_start)
}

/// Width of the leading whitespace on the line containing `byte`.
fn line_indent(source: &[u8], byte: usize) -> usize {
    let line_start = source[..byte]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    source[line_start..]
        .iter()
        .take_while(|b| matches!(b, b' ' | b'\t' | b'\x0c'))
        .count()
}

/// Prefix the name with enclosing class and function names.
fn qualified_name(parsed: &ParsedSource, func_node: Node, name: &str) -> String {
    let mut parts = vec![name.to_string()];
    let mut current = func_node.parent();

    while let Some(node) = current {
        if matches!(node.kind(), "function_definition" | "class_definition") {
            if let Some(name_node) = node.child_by_field_name("name") {
                parts.push(parsed.node_text(name_node).to_string());
            }
        }
        current = node.parent();
    }

    parts.reverse();
    parts.join(".")
}

/// Whether the function is defined directly in a class body.
fn is_method(func_node: Node) -> bool {
    let mut parent = func_node.parent();
    // Skip a decorated_definition wrapper.
    if let Some(p) = parent {
        if p.kind() == "decorated_definition" {
            parent = p.parent();
        }
    }
    // function_definition -> block -> class_definition
    parent
        .filter(|p| p.kind() == "block")
        .and_then(|block| block.parent())
        .map(|p| p.kind() == "class_definition")
        .unwrap_or(false)
}

/// Structural metrics of one function body.
#[derive(Debug, Default)]
struct BodyMetrics {
    max_loop_depth: u32,
    has_recursion: bool,
    growth_ops: u32,
    call_fanout: u32,
    expensive_calls: BTreeSet<String>,
    loop_issues: BTreeSet<LoopIssue>,
}

impl BodyMetrics {
    /// Walk the body, nested definitions included.
    fn collect(parsed: &ParsedSource, body: Node, func_name: &str, is_method: bool) -> Self {
        let mut metrics = Self::default();
        let mut stack: Vec<(Node, u32)> = vec![(body, 0)];

        while let Some((node, depth)) = stack.pop() {
            let depth = match node.kind() {
                "for_statement" | "while_statement" => {
                    let d = depth + 1;
                    metrics.max_loop_depth = metrics.max_loop_depth.max(d);
                    d
                }
                _ => depth,
            };

            match node.kind() {
                "call" => metrics.visit_call(parsed, node, depth, func_name, is_method),
                "augmented_assignment" if depth > 0 => {
                    let is_add = node
                        .child_by_field_name("operator")
                        .map(|op| op.kind() == "+=")
                        .unwrap_or(false);
                    if is_add {
                        metrics.loop_issues.insert(LoopIssue::ConcatInLoop);
                    }
                }
                _ => {}
            }

            let mut walker = node.walk();
            for child in node.children(&mut walker) {
                stack.push((child, depth));
            }
        }

        metrics
    }

    fn visit_call(
        &mut self,
        parsed: &ParsedSource,
        call: Node,
        loop_depth: u32,
        func_name: &str,
        is_method: bool,
    ) {
        self.call_fanout += 1;

        let Some(target) = call.child_by_field_name("function") else {
            return;
        };

        match target.kind() {
            "identifier" => {
                let callee = parsed.node_text(target);
                if callee == func_name {
                    self.has_recursion = true;
                }
                if EXPENSIVE_BUILTINS.contains(callee) {
                    self.expensive_calls.insert(callee.to_string());
                }
            }
            "attribute" => {
                let attr = target
                    .child_by_field_name("attribute")
                    .map(|n| parsed.node_text(n))
                    .unwrap_or("");
                let object = target
                    .child_by_field_name("object")
                    .map(|n| parsed.node_text(n))
                    .unwrap_or("");

                if is_method && attr == func_name && matches!(object, "self" | "cls") {
                    self.has_recursion = true;
                }
                if attr == "sort" {
                    self.expensive_calls.insert("sort()".to_string());
                }
                if loop_depth > 0 && GROWTH_METHODS.contains(attr) {
                    self.growth_ops += 1;
                    self.loop_issues.insert(LoopIssue::GrowthInLoop);
                }
            }
            _ => {}
        }
    }
}
