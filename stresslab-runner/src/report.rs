//! Report synthesizer: a read-only aggregate of every stage's results.
//!
//! Synthesis is pure aggregation over borrowed outcomes; the strategy is
//! never invoked. Each section is optional so a partial run still reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use stresslab_core::ParamSet;

use crate::evaluate::EvaluationResult;
use crate::fitness::FitnessMetric;
use crate::monte_carlo::{MonteCarloOutcome, MonteCarloSummary};
use crate::stats::DistributionSummary;
use crate::stress::StressOutcome;
use crate::sweep::SweepOutcome;
use crate::walk_forward::{WalkForwardOutcome, WalkForwardSummary};

/// Current report schema version. Bump on breaking layout changes.
pub const SCHEMA_VERSION: u32 = 2;

/// Fixed caveats rendered in the last report section.
pub const RISK_NOTES: [&str; 3] = [
    "Backtest results do not guarantee future performance.",
    "Live trading adds slippage and fees that these backtests do not model.",
    "Validate with small capital before scaling up.",
];

fn parameters_cell(parameters: Option<&ParamSet>) -> String {
    parameters.map_or_else(|| "strategy defaults".to_string(), ParamSet::to_string)
}

// ─── Sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSection {
    pub metric: FitnessMetric,
    pub tested: usize,
    pub failed: usize,
    pub best_parameters: Option<ParamSet>,
    pub best_value: Option<f64>,
    /// Sharpe across non-failing combinations: parameter sensitivity.
    pub sharpe: Option<DistributionSummary>,
}

impl OptimizationSection {
    /// (min, max) Sharpe over non-failing combinations.
    pub fn sharpe_range(&self) -> Option<(f64, f64)> {
        self.sharpe.as_ref().map(|s| (s.min, s.max))
    }
}

/// Core metrics of one stress scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
}

impl From<&EvaluationResult> for ScenarioMetrics {
    fn from(r: &EvaluationResult) -> Self {
        Self {
            total_return: r.total_return,
            sharpe_ratio: r.sharpe_ratio,
            max_drawdown: r.max_drawdown,
            win_rate: r.win_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressSection {
    pub parameters: Option<ParamSet>,
    /// `None` marks a scenario whose evaluation failed.
    pub scenarios: BTreeMap<String, Option<ScenarioMetrics>>,
}

/// Borrowed inputs to [`AggregateReport::synthesize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportInputs<'a> {
    pub sweep: Option<&'a SweepOutcome>,
    pub stress: Option<&'a StressOutcome>,
    pub monte_carlo: Option<&'a MonteCarloOutcome>,
    pub walk_forward: Option<&'a WalkForwardOutcome>,
}

// ─── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub schema_version: u32,
    pub strategy: String,
    pub generated_at: DateTime<Utc>,
    pub optimization: Option<OptimizationSection>,
    pub stress: Option<StressSection>,
    pub monte_carlo: Option<MonteCarloSummary>,
    pub walk_forward: Option<WalkForwardSummary>,
}

impl AggregateReport {
    pub fn synthesize(strategy: &str, inputs: ReportInputs<'_>) -> Self {
        let optimization = inputs.sweep.map(|s| {
            let sharpes: Vec<f64> = s.results().map(|r| r.sharpe_ratio).collect();
            OptimizationSection {
                metric: s.metric,
                tested: s.attempted(),
                failed: s.failed(),
                best_parameters: s.best.as_ref().map(|b| b.parameters.clone()),
                best_value: s.best.as_ref().map(|b| b.value),
                sharpe: DistributionSummary::from_values(&sharpes),
            }
        });
        let stress = inputs.stress.map(|s| StressSection {
            parameters: s.parameters.clone(),
            scenarios: s
                .results
                .iter()
                .map(|(name, r)| (name.clone(), r.as_ref().map(ScenarioMetrics::from)))
                .collect(),
        });

        Self {
            schema_version: SCHEMA_VERSION,
            strategy: strategy.to_string(),
            generated_at: Utc::now(),
            optimization,
            stress,
            monte_carlo: inputs.monte_carlo.map(MonteCarloOutcome::summary),
            walk_forward: inputs.walk_forward.map(WalkForwardOutcome::summary),
        }
    }

    /// Human-readable Markdown rendering.
    pub fn to_markdown(&self) -> String {
        let mut md = String::with_capacity(2048);
        md.push_str(&format!("# {} Validation Report\n\n", self.strategy));

        // Optimization
        md.push_str("## 1. Parameter Optimization\n\n");
        match &self.optimization {
            Some(o) => {
                md.push_str("| Field | Value |\n");
                md.push_str("| --- | --- |\n");
                md.push_str(&format!("| Metric | {} |\n", o.metric));
                md.push_str(&format!("| Combinations Tested | {} |\n", o.tested));
                md.push_str(&format!("| Failed | {} |\n", o.failed));
                match (&o.best_parameters, o.best_value) {
                    (Some(p), Some(v)) => {
                        md.push_str(&format!("| Best Value | {v:.3} |\n"));
                        md.push_str(&format!("| Best Parameters | {p} |\n"));
                    }
                    _ => md.push_str("| Best Parameters | none (every combination failed) |\n"),
                }
                if let Some((lo, hi)) = o.sharpe_range() {
                    md.push_str(&format!("| Sharpe Range | {lo:.3} ~ {hi:.3} |\n"));
                }
                if let Some(s) = &o.sharpe {
                    md.push_str(&format!(
                        "| Sharpe Mean / Std | {:.3} / {:.3} |\n",
                        s.mean, s.std_dev
                    ));
                }
            }
            None => md.push_str("_Not run._\n"),
        }
        md.push('\n');

        // Stress
        md.push_str("## 2. Stress Test\n\n");
        match &self.stress {
            Some(s) => {
                md.push_str(&format!(
                    "Parameters: {}\n\n",
                    parameters_cell(s.parameters.as_ref())
                ));
                md.push_str("| Scenario | Total Return | Sharpe | Max Drawdown | Win Rate |\n");
                md.push_str("| --- | ---: | ---: | ---: | ---: |\n");
                for (name, m) in &s.scenarios {
                    match m {
                        Some(m) => md.push_str(&format!(
                            "| {name} | {:.2}% | {:.3} | {:.2}% | {:.1}% |\n",
                            m.total_return * 100.0,
                            m.sharpe_ratio,
                            m.max_drawdown * 100.0,
                            m.win_rate * 100.0
                        )),
                        None => md.push_str(&format!("| {name} | FAILED | | | |\n")),
                    }
                }
            }
            None => md.push_str("_Not run._\n"),
        }
        md.push('\n');

        // Monte Carlo
        md.push_str("## 3. Monte Carlo Simulation\n\n");
        match &self.monte_carlo {
            Some(mc) => {
                md.push_str("| Field | Value |\n");
                md.push_str("| --- | --- |\n");
                md.push_str(&format!(
                    "| Parameters | {} |\n",
                    parameters_cell(mc.parameters.as_ref())
                ));
                md.push_str(&format!(
                    "| Simulations | {} valid / {} requested ({} failed) |\n",
                    mc.valid, mc.requested, mc.failed
                ));
                if let Some(r) = &mc.total_return {
                    md.push_str(&format!("| Mean Return | {:.2}% |\n", r.mean * 100.0));
                    md.push_str(&format!("| Return Std | {:.2}% |\n", r.std_dev * 100.0));
                    md.push_str(&format!(
                        "| Return 95% Interval | [{:.2}%, {:.2}%] |\n",
                        r.p2_5 * 100.0,
                        r.p97_5 * 100.0
                    ));
                }
                if let Some(s) = &mc.sharpe_ratio {
                    md.push_str(&format!("| Mean Sharpe | {:.3} |\n", s.mean));
                }
                if let Some(p) = mc.profit_probability {
                    md.push_str(&format!("| Profit Probability | {:.1}% |\n", p * 100.0));
                }
            }
            None => md.push_str("_Not run._\n"),
        }
        md.push('\n');

        // Walk-forward
        md.push_str("## 4. Walk-Forward Analysis\n\n");
        match &self.walk_forward {
            Some(wf) => {
                md.push_str("| Field | Value |\n");
                md.push_str("| --- | --- |\n");
                md.push_str(&format!(
                    "| Parameters | {} |\n",
                    parameters_cell(wf.parameters.as_ref())
                ));
                md.push_str(&format!(
                    "| Windows | {} valid / {} planned ({} failed) |\n",
                    wf.windows, wf.planned, wf.failed
                ));
                match &wf.total_return {
                    Some(r) => {
                        md.push_str(&format!("| Mean Window Return | {:.2}% |\n", r.mean * 100.0));
                        md.push_str(&format!(
                            "| Return Stability (std) | {:.2}% |\n",
                            r.std_dev * 100.0
                        ));
                    }
                    None if wf.planned > 0 => {
                        md.push_str("| Mean Window Return | none (every window failed) |\n")
                    }
                    None => md.push_str("| Mean Window Return | none (window longer than series) |\n"),
                }
                if let Some(s) = &wf.sharpe_ratio {
                    md.push_str(&format!("| Mean Window Sharpe | {:.3} |\n", s.mean));
                }
                if let Some(p) = wf.positive_ratio {
                    md.push_str(&format!("| Positive Windows | {:.1}% |\n", p * 100.0));
                }
                if let Some(slope) = wf.sharpe_slope {
                    md.push_str(&format!("| Sharpe Trend (per window) | {slope:+.4} |\n"));
                }
            }
            None => md.push_str("_Not run._\n"),
        }
        md.push('\n');

        md.push_str("## 5. Risk Notes\n\n");
        for note in RISK_NOTES {
            md.push_str(&format!("- {note}\n"));
        }
        md.push('\n');

        md.push_str("---\n\n");
        md.push_str(&format!(
            "Generated {} (schema v{})\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.schema_version
        ));
        md
    }
}
