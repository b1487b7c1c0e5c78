//! Hotspot scoring and ranking.
//!
//! Each function gets a deterministic cost score from its structural features:
//!
//! ```text
//! score = 2^loop_depth * (1 + growth_ops)
//!       + (has_recursion ? RECURSION_BONUS : 0)
//!       + call_fanout * CALL_WEIGHT
//! ```
//!
//! Higher scores rank first (rank 1). Equal scores rank by source order, the
//! earlier definition taking the lower rank number.

pub mod energy;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::{FunctionId, FunctionRecord};

pub use energy::EnergyEstimate;

/// Point weights for the scoring formula.
pub mod weights {
    /// Flat penalty for a self-recursive function.
    pub const RECURSION_BONUS: u64 = 20;
    /// Cost of each call expression in the body.
    pub const CALL_WEIGHT: u64 = 1;
}

/// Score of a function with no loops, recursion, growth or calls.
pub const BASELINE_SCORE: u64 = 1;

/// Contributions that make up a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// `2^loop_depth`
    pub loop_factor: u64,
    /// `1 + growth_ops`
    pub growth_factor: u64,
    /// `RECURSION_BONUS` or 0
    pub recursion_bonus: u64,
    /// `call_fanout * CALL_WEIGHT`
    pub fanout_cost: u64,
}

impl ScoreBreakdown {
    /// Compute the contributions for one record.
    pub fn for_record(record: &FunctionRecord) -> Self {
        let loop_factor = 1u64.checked_shl(record.loop_depth).unwrap_or(u64::MAX);
        Self {
            loop_factor,
            growth_factor: 1 + u64::from(record.growth_ops),
            recursion_bonus: if record.has_recursion {
                weights::RECURSION_BONUS
            } else {
                0
            },
            fanout_cost: u64::from(record.call_fanout).saturating_mul(weights::CALL_WEIGHT),
        }
    }

    pub fn total(&self) -> u64 {
        self.loop_factor
            .saturating_mul(self.growth_factor)
            .saturating_add(self.recursion_bonus)
            .saturating_add(self.fanout_cost)
    }
}

/// Score and rank of one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotScore {
    pub function_id: FunctionId,
    pub score: u64,
    /// 1-based, dense, unique within a session.
    pub rank: usize,
    pub breakdown: ScoreBreakdown,
}

/// Coarse workload category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "CPU")]
    Cpu,
    #[serde(rename = "I/O")]
    Io,
}

impl Category {
    pub fn for_record(record: &FunctionRecord) -> Self {
        if record.does_io() {
            Category::Io
        } else {
            Category::Cpu
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cpu => "CPU",
            Category::Io => "I/O",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score and rank all records.
///
/// Returns one entry per record, ordered by rank (highest cost first).
pub fn score(records: &[FunctionRecord]) -> Vec<HotspotScore> {
    let mut scored: Vec<(usize, &FunctionRecord, ScoreBreakdown)> = records
        .iter()
        .enumerate()
        .map(|(idx, r)| (idx, r, ScoreBreakdown::for_record(r)))
        .collect();

    scored.sort_by(|(ia, a, ba), (ib, b, bb)| {
        bb.total()
            .cmp(&ba.total())
            .then_with(|| a.start_line().cmp(&b.start_line()))
            .then_with(|| ia.cmp(ib))
    });

    scored
        .into_iter()
        .enumerate()
        .map(|(pos, (_, record, breakdown))| HotspotScore {
            function_id: record.id.clone(),
            score: breakdown.total(),
            rank: pos + 1,
            breakdown,
        })
        .collect()
}

/// Human-readable reasons behind a score.
pub fn reasons(record: &FunctionRecord) -> Vec<String> {
    let mut reasons = Vec::new();

    if record.loop_depth > 0 {
        reasons.push(format!("Loop nesting depth = {}", record.loop_depth));
    }
    if record.has_recursion {
        reasons.push("Recursion detected".to_string());
    }
    if record.growth_ops > 0 {
        reasons.push(format!("{} collection growth call(s) inside loops", record.growth_ops));
    }
    if !record.expensive_calls.is_empty() {
        reasons.push(format!("Expensive calls: {}", record.expensive_calls.join(", ")));
    }
    for issue in &record.loop_issues {
        reasons.push(issue.to_string());
    }

    reasons
}
