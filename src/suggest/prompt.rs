//! Provider-agnostic prompt construction.

use crate::analysis::FunctionRecord;
use crate::score::{self, HotspotScore};

const INSTRUCTIONS: &str = "\
Respond in two parts:
1. Explain briefly why this function is inefficient in time or energy.
2. Give a rewritten version that preserves its behavior exactly, in a single fenced code block.
Keep the function name and signature unchanged. Do not include more than one code block.";

/// Build the prompt for one hotspot.
pub fn build(record: &FunctionRecord, score: &HotspotScore, language: &str) -> String {
    let breakdown = &score.breakdown;

    let reasons = score::reasons(record);
    let signals = if reasons.is_empty() {
        String::new()
    } else {
        let lines: String = reasons.iter().map(|r| format!("- {}\n", r)).collect();
        format!("Signals:\n{}", lines)
    };

    format!(
        "You are an expert in writing fast, energy-efficient {language} code.\n\
         \n\
         Static analysis ranked the function below as energy hotspot #{rank} with score {total}.\n\
         Score breakdown:\n\
         - loop factor: {loop_factor} (loop nesting depth {loop_depth})\n\
         - growth factor: {growth_factor} ({growth_ops} container growth calls inside loops)\n\
         - recursion bonus: {recursion_bonus}\n\
         - call fan-out cost: {fanout_cost} ({call_fanout} calls)\n\
         {signals}\
         \n\
         Function `{name}` (lines {start}-{end}):\n\
         ```{language}\n\
         {source}\n\
         ```\n\
         \n\
         {INSTRUCTIONS}",
        rank = score.rank,
        total = score.score,
        loop_factor = breakdown.loop_factor,
        loop_depth = record.loop_depth,
        growth_factor = breakdown.growth_factor,
        growth_ops = record.growth_ops,
        recursion_bonus = breakdown.recursion_bonus,
        fanout_cost = breakdown.fanout_cost,
        call_fanout = record.call_fanout,
        name = record.qualified_name,
        start = record.start_line(),
        end = record.end_line(),
        source = record.source.trim_end(),
    )
}
