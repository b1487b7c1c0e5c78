//! Output formatting for ecocode results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::session::{AnalysisReport, Hotspot};
use crate::suggest::{SuggestionResult, SuggestionStatus};

/// Why one input file produced no report.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl FileError {
    pub fn kind(&self) -> &'static str {
        match self {
            FileError::Read { .. } => "read_error",
            FileError::Analysis(e) => e.kind(),
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            FileError::Read { .. } => None,
            FileError::Analysis(e) => e.line(),
        }
    }
}

/// Analysis outcome for one input file.
#[derive(Debug)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub outcome: Result<AnalysisReport, FileError>,
}

// =============================================================================
// JSON Format
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonAnalyzeReport {
    pub version: String,
    pub files_analyzed: usize,
    pub files_failed: usize,
    pub files: Vec<JsonFileReport>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonFileReport {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<AnalysisReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonError>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonError {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl From<&FileError> for JsonError {
    fn from(e: &FileError) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
            line: e.line(),
        }
    }
}

/// Build the JSON document for an `analyze` run.
pub fn analyze_json(results: &[FileAnalysis]) -> JsonAnalyzeReport {
    let files: Vec<JsonFileReport> = results
        .iter()
        .map(|r| match &r.outcome {
            Ok(report) => JsonFileReport {
                path: r.path.display().to_string(),
                report: Some(report.clone()),
                error: None,
            },
            Err(e) => JsonFileReport {
                path: r.path.display().to_string(),
                report: None,
                error: Some(e.into()),
            },
        })
        .collect();

    let files_failed = files.iter().filter(|f| f.error.is_some()).count();
    JsonAnalyzeReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        files_analyzed: files.len(),
        files_failed,
        files,
    }
}

/// Write analysis results in JSON format.
pub fn write_analyze_json(results: &[FileAnalysis]) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&analyze_json(results))?;
    println!("{}", json);
    Ok(())
}

/// Write a suggestion result in JSON format.
pub fn write_suggestion_json(result: &SuggestionResult) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write analysis results with colors.
pub fn write_analyze_pretty(results: &[FileAnalysis], max_rows: Option<usize>) {
    write_header();

    for result in results {
        print!("  {}", "File: ".dimmed());
        println!("{}", result.path.display());

        match &result.outcome {
            Ok(report) => write_report(report, max_rows),
            Err(e) => {
                println!("    {} {}", "ERROR".red(), e);
                println!();
            }
        }
    }

    let failed = results.iter().filter(|r| r.outcome.is_err()).count();
    if failed > 0 {
        println!(
            "  {}",
            format!("{} of {} file(s) failed to analyze", failed, results.len()).red()
        );
    } else {
        println!(
            "  {}",
            format!("{} file(s) analyzed", results.len()).green()
        );
    }
    println!();
}

fn write_header() {
    println!();
    print!("  ");
    print!("{}", "ecocode".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();
}

fn write_report(report: &AnalysisReport, max_rows: Option<usize>) {
    let summary = &report.summary;
    println!(
        "  {} function(s), {} above baseline",
        summary.function_count, summary.hotspot_count
    );
    println!();

    if report.hotspots.is_empty() {
        println!("    {}", "No functions found".dimmed());
        println!();
        return;
    }

    let shown = max_rows.unwrap_or(report.hotspots.len());
    for hotspot in report.hotspots.iter().take(shown) {
        write_hotspot(hotspot);
    }
    if report.hotspots.len() > shown {
        println!(
            "    {}",
            format!("... {} more", report.hotspots.len() - shown).dimmed()
        );
        println!();
    }

    println!(
        "  {}",
        format!(
            "Cost at {} per kWh. {}",
            summary.electricity_rate_per_kwh, summary.note
        )
        .dimmed()
    );
    println!();
}

fn write_hotspot(h: &Hotspot) {
    print!("    {:>3}. ", h.rank);
    write_colored_score(h.score);
    print!("  {:<5}", h.category.as_str().dimmed());
    print!("{}", h.name.bold());
    println!("{}", format!("  lines {}-{}  [{}]", h.start_line, h.end_line, h.function_id).dimmed());

    for reason in &h.reasons {
        println!("           - {}", reason);
    }
    println!(
        "           {}",
        format!(
            "~{} J/run, {} per 1M runs",
            h.energy.joules_per_run, h.energy.cost_per_1m_runs
        )
        .dimmed()
    );
    println!();
}

fn write_colored_score(s: u64) {
    let text = format!("{:>5}", s);
    match s {
        s if s <= 1 => print!("{}", text.green()),
        s if s <= 4 => print!("{}", text.yellow()),
        s if s <= 16 => print!("{}", text.yellow().bold()),
        _ => print!("{}", text.red().bold()),
    }
}

/// Write a suggestion result with colors.
pub fn write_suggestion_pretty(result: &SuggestionResult) {
    write_header();

    print!("  {}", "Function: ".dimmed());
    println!("{}", result.function_id);

    print!("  ");
    match result.status {
        SuggestionStatus::Succeeded => print!("{}", "✓ SUCCEEDED".green()),
        SuggestionStatus::Failed => print!("{}", "✗ FAILED".red()),
        SuggestionStatus::Cancelled => print!("{}", "CANCELLED".yellow()),
    }
    if let (Some(slot), Some(name)) = (result.provider_used, &result.provider_name) {
        print!("  {}", format!("via {} ({})", name, slot).dimmed());
    }
    println!();
    println!();

    match result.status {
        SuggestionStatus::Succeeded => {
            if !result.rationale_text.is_empty() {
                println!("  {}", "Rationale:".bold());
                for line in result.rationale_text.lines() {
                    println!("    {}", line);
                }
                println!();
            }
            if result.improved_code.is_empty() {
                println!("  {}", "(no code block in the response)".dimmed());
            } else {
                println!("  {}", "Improved code:".bold());
                for line in result.improved_code.lines() {
                    println!("    {}", line.cyan());
                }
            }
            println!();
        }
        SuggestionStatus::Failed => {
            println!("  {}", "All providers failed; run with -v for details.".dimmed());
            println!();
        }
        SuggestionStatus::Cancelled => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::session::AnalysisSession;

    #[test]
    fn test_analyze_json_mixes_success_and_failure() {
        let ok = AnalysisSession::submit("def f(xs):\n    for x in xs:\n        pass\n", &AnalysisConfig::default())
            .unwrap()
            .report();
        let results = vec![
            FileAnalysis {
                path: PathBuf::from("good.py"),
                outcome: Ok(ok),
            },
            FileAnalysis {
                path: PathBuf::from("bad.py"),
                outcome: Err(AnalysisError::Syntax {
                    line: 3,
                    column: 1,
                    message: "invalid syntax".to_string(),
                }
                .into()),
            },
            FileAnalysis {
                path: PathBuf::from("latin1.py"),
                outcome: Err(FileError::Read {
                    path: PathBuf::from("latin1.py"),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidData, "stream did not contain valid UTF-8"),
                }),
            },
        ];

        let doc = analyze_json(&results);
        assert_eq!(doc.files_analyzed, 3);
        assert_eq!(doc.files_failed, 2);

        let value = serde_json::to_value(&doc).unwrap();
        let hotspot = &value["files"][0]["report"]["hotspots"][0];
        assert_eq!(hotspot["function_id"], "f@1");
        assert_eq!(hotspot["rank"], 1);
        assert_eq!(hotspot["score"], 2);
        assert_eq!(hotspot["category"], "CPU");
        assert_eq!(value["files"][1]["error"]["kind"], "syntax_error");
        assert_eq!(value["files"][1]["error"]["line"], 3);
        assert!(value["files"][1].get("report").is_none());
        assert_eq!(value["files"][2]["error"]["kind"], "read_error");
        assert!(value["files"][2]["error"].get("line").is_none());
    }

    #[test]
    fn test_suggestion_json_shape() {
        let result = SuggestionResult {
            function_id: "f@1".into(),
            status: SuggestionStatus::Failed,
            provider_used: None,
            provider_name: None,
            rationale_text: String::new(),
            improved_code: String::new(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "failed");
        assert!(value["provider_used"].is_null());
    }
}
