//! One analysis session: a submitted source, its functions and their ranks.
//!
//! A session owns everything derived from one source text. Sessions share
//! nothing with each other; only the provider ledger behind an `Orchestrator`
//! is process-wide.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::analysis::{self, AnalysisError, AnalysisResult, FunctionId, FunctionRecord, SourceUnit};
use crate::config::AnalysisConfig;
use crate::score::{self, energy, Category, EnergyEstimate, HotspotScore};
use crate::suggest::{Orchestrator, SuggestionResult};

/// One row of the ranked hotspot list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub function_id: FunctionId,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: u64,
    pub rank: usize,
    pub category: Category,
    pub reasons: Vec<String>,
    pub energy: EnergyEstimate,
    /// The function's own source text.
    pub source: String,
}

/// Summary block of an analysis report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub filename: String,
    pub language: String,
    pub function_count: usize,
    /// Functions scoring above the baseline.
    pub hotspot_count: usize,
    pub electricity_rate_per_kwh: f64,
    pub note: String,
}

/// Output of `analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: ReportSummary,
    pub hotspots: Vec<Hotspot>,
}

#[derive(Debug)]
pub struct AnalysisSession {
    source: SourceUnit,
    records: Vec<FunctionRecord>,
    /// Ordered by rank.
    scores: Vec<HotspotScore>,
    by_id: HashMap<FunctionId, usize>,
    electricity_rate_per_kwh: f64,
    created_at: Instant,
    last_access: Mutex<Instant>,
}

impl AnalysisSession {
    /// Parse, extract and score a Python source text.
    pub fn submit(text: impl Into<String>, config: &AnalysisConfig) -> AnalysisResult<Self> {
        Self::submit_unit(SourceUnit::new(text, "python"), config)
    }

    /// Same as `submit` for an already-built unit (custom filename or language).
    pub fn submit_unit(source: SourceUnit, config: &AnalysisConfig) -> AnalysisResult<Self> {
        let records = analysis::extract(&source, config.max_source_bytes)?;
        let scores = score::score(&records);
        let by_id = records
            .iter()
            .enumerate()
            .map(|(idx, r)| (r.id.clone(), idx))
            .collect();

        info!(
            file = source.filename(),
            functions = records.len(),
            "analysis complete"
        );

        let now = Instant::now();
        Ok(Self {
            source,
            records,
            scores,
            by_id,
            electricity_rate_per_kwh: config.electricity_rate_per_kwh,
            created_at: now,
            last_access: Mutex::new(now),
        })
    }

    pub fn source(&self) -> &SourceUnit {
        &self.source
    }

    /// Function records in source order.
    pub fn records(&self) -> &[FunctionRecord] {
        &self.records
    }

    /// Scores in rank order.
    pub fn scores(&self) -> &[HotspotScore] {
        &self.scores
    }

    /// Ranked hotspot list, rank 1 first.
    pub fn hotspots(&self) -> Vec<Hotspot> {
        self.touch();
        self.scores
            .iter()
            .filter_map(|s| {
                let record = self.record(&s.function_id)?;
                Some(Hotspot {
                    function_id: s.function_id.clone(),
                    name: record.qualified_name.clone(),
                    start_line: record.start_line(),
                    end_line: record.end_line(),
                    score: s.score,
                    rank: s.rank,
                    category: Category::for_record(record),
                    reasons: score::reasons(record),
                    energy: energy::estimate(s.score, self.electricity_rate_per_kwh),
                    source: record.source.clone(),
                })
            })
            .collect()
    }

    pub fn report(&self) -> AnalysisReport {
        let hotspots = self.hotspots();
        AnalysisReport {
            summary: ReportSummary {
                filename: self.source.filename().to_string(),
                language: self.source.language().to_string(),
                function_count: self.records.len(),
                hotspot_count: hotspots
                    .iter()
                    .filter(|h| h.score > score::BASELINE_SCORE)
                    .count(),
                electricity_rate_per_kwh: self.electricity_rate_per_kwh,
                note: energy::ESTIMATE_NOTE.to_string(),
            },
            hotspots,
        }
    }

    /// Look up a function by id.
    pub fn select_hotspot(&self, id: &FunctionId) -> AnalysisResult<&FunctionRecord> {
        self.touch();
        self.record(id)
            .ok_or_else(|| AnalysisError::NotFound(id.clone()))
    }

    pub fn score_for(&self, id: &FunctionId) -> Option<&HotspotScore> {
        self.scores.iter().find(|s| &s.function_id == id)
    }

    /// Request an improved version of one function.
    ///
    /// Fails only with `NotFound`, before any provider is contacted. Provider
    /// failures and cancellation are reported in the result's status.
    pub async fn suggest(
        &self,
        id: &FunctionId,
        orchestrator: &Orchestrator,
        cancel: &CancellationToken,
    ) -> AnalysisResult<SuggestionResult> {
        let record = self.select_hotspot(id)?;
        let score = self
            .score_for(id)
            .ok_or_else(|| AnalysisError::NotFound(id.clone()))?;
        Ok(orchestrator.request_suggestion(record, score, cancel).await)
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since the session was last queried.
    pub fn idle_for(&self) -> Duration {
        self.last_access
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }

    pub fn is_expired(&self, max_idle: Duration) -> bool {
        self.idle_for() >= max_idle
    }

    fn record(&self, id: &FunctionId) -> Option<&FunctionRecord> {
        self.by_id.get(id).map(|&idx| &self.records[idx])
    }

    fn touch(&self) {
        *self.last_access.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }
}
