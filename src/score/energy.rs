//! Heuristic energy and cost estimate derived from a hotspot score.
//!
//! These are static estimates, not hardware power counters.

use serde::{Deserialize, Serialize};

/// A score of 100 maps to 5 joules per run.
pub const JOULES_PER_SCORE_POINT: f64 = 0.05;

pub const JOULES_PER_KWH: f64 = 3_600_000.0;

/// Default electricity price per kWh (currency left to the caller).
pub const DEFAULT_ELECTRICITY_RATE_PER_KWH: f64 = 8.0;

/// Disclaimer attached to every report.
pub const ESTIMATE_NOTE: &str =
    "Energy and cost are heuristic estimates from static analysis (not hardware power counters).";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyEstimate {
    pub joules_per_run: f64,
    pub cost_per_1000_runs: f64,
    pub cost_per_1m_runs: f64,
}

/// Estimate per-run energy and cost for a score at the given electricity rate.
pub fn estimate(score: u64, rate_per_kwh: f64) -> EnergyEstimate {
    let joules_per_run = round_to(score as f64 * JOULES_PER_SCORE_POINT, 4);
    let cost_per_run = joules_per_run / JOULES_PER_KWH * rate_per_kwh;

    EnergyEstimate {
        joules_per_run,
        cost_per_1000_runs: round_to(cost_per_run * 1_000.0, 6),
        cost_per_1m_runs: round_to(cost_per_run * 1_000_000.0, 4),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_estimate() {
        let e = estimate(100, DEFAULT_ELECTRICITY_RATE_PER_KWH);
        assert!(approx(e.joules_per_run, 5.0));
        // 5 J / 3.6e6 * 8 = 1.111e-5 per run
        assert!(approx(e.cost_per_1000_runs, 0.011111));
        assert!(approx(e.cost_per_1m_runs, 11.1111));
    }

    #[test]
    fn test_zero_rate() {
        let e = estimate(40, 0.0);
        assert!(approx(e.joules_per_run, 2.0));
        assert!(approx(e.cost_per_1m_runs, 0.0));
    }
}
