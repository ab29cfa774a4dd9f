//! Walk-forward analyzer: a fixed-size window slid across one series.
//!
//! Windows start at bar offsets `0, S, 2S, ...` and are kept while
//! `start + W <= len`, so a series of `L` bars yields
//! `#{k >= 0 : k*S + W <= L}` windows. A window longer than the series
//! yields none. Each window is evaluated independently; a failing window is
//! logged and skipped.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use stresslab_core::{ParamSet, Series};

use crate::dispatch::map_units;
use crate::evaluate::{EvaluationContext, EvaluationFailure, EvaluationResult, Evaluator};
use crate::stats::{least_squares_slope, DistributionSummary};

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// Bars per window (default 60).
    pub window_size: usize,
    /// Bars between consecutive window starts (default 20).
    pub step_size: usize,
    /// Evaluate windows on the rayon pool (default false).
    pub parallel: bool,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            window_size: 60,
            step_size: 20,
            parallel: false,
        }
    }
}

impl WalkForwardConfig {
    pub fn validate(&self) -> Result<(), WalkForwardError> {
        if self.window_size == 0 {
            return Err(WalkForwardError::ZeroWindow);
        }
        if self.step_size == 0 {
            return Err(WalkForwardError::ZeroStep);
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WalkForwardError {
    #[error("window size must be at least 1 bar")]
    ZeroWindow,
    #[error("step size must be at least 1 bar")]
    ZeroStep,
}

/// `(start, end)` bar offsets of every window, `end` exclusive.
pub fn window_offsets(len: usize, window: usize, step: usize) -> Vec<(usize, usize)> {
    if window == 0 || step == 0 || window > len {
        return Vec::new();
    }
    (0..=len - window)
        .step_by(step)
        .map(|start| (start, start + window))
        .collect()
}

// ─── Result types ────────────────────────────────────────────────────

/// Planned and failed counts are always present so a run where every
/// window failed still shows up in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardSummary {
    pub parameters: Option<ParamSet>,
    pub planned: usize,
    pub windows: usize,
    pub failed: usize,
    /// Window returns; `std_dev` is the stability measure, lower is steadier.
    pub total_return: Option<DistributionSummary>,
    pub sharpe_ratio: Option<DistributionSummary>,
    /// Fraction of windows with a positive return.
    pub positive_ratio: Option<f64>,
    /// Least-squares slope of Sharpe over window index; negative means the
    /// edge decays through the sample.
    pub sharpe_slope: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardOutcome {
    pub config: WalkForwardConfig,
    pub parameters: Option<ParamSet>,
    /// Windows planned from the series length.
    pub planned: usize,
    /// Successful windows in window order.
    pub results: Vec<EvaluationResult>,
    pub failures: Vec<EvaluationFailure>,
}

impl WalkForwardOutcome {
    pub fn summary(&self) -> WalkForwardSummary {
        let returns: Vec<f64> = self.results.iter().map(|r| r.total_return).collect();
        let sharpes: Vec<f64> = self.results.iter().map(|r| r.sharpe_ratio).collect();
        let positive_ratio = (!returns.is_empty()).then(|| {
            returns.iter().filter(|&&r| r > 0.0).count() as f64 / returns.len() as f64
        });
        WalkForwardSummary {
            parameters: self.parameters.clone(),
            planned: self.planned,
            windows: self.results.len(),
            failed: self.failures.len(),
            total_return: DistributionSummary::from_values(&returns),
            sharpe_ratio: DistributionSummary::from_values(&sharpes),
            positive_ratio,
            sharpe_slope: least_squares_slope(&sharpes),
        }
    }
}

// ─── Analyzer ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WalkForwardAnalyzer {
    evaluator: Evaluator,
    config: WalkForwardConfig,
}

impl WalkForwardAnalyzer {
    pub fn new(evaluator: Evaluator, config: WalkForwardConfig) -> Self {
        Self { evaluator, config }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn run(
        &self,
        series: &Series,
        params: Option<&ParamSet>,
    ) -> Result<WalkForwardOutcome, WalkForwardError> {
        self.config.validate()?;
        let offsets = window_offsets(series.len(), self.config.window_size, self.config.step_size);
        info!(
            strategy = self.evaluator.strategy_name(),
            bars = series.len(),
            window = self.config.window_size,
            step = self.config.step_size,
            windows = offsets.len(),
            "starting walk-forward analysis"
        );

        let outcomes = map_units(&offsets, self.config.parallel, |index, &(start, end)| {
            let window = series.slice(start, end);
            let context = EvaluationContext::Window {
                index,
                start_offset: start,
                end_offset: end,
                start: series.bars()[start].timestamp,
                end: series.bars()[end - 1].timestamp,
            };
            self.evaluator.evaluate(&window, params, context)
        });

        let (mut results, mut failures) = (Vec::new(), Vec::new());
        for outcome in outcomes {
            match outcome {
                Ok(r) => results.push(r),
                Err(f) => failures.push(f),
            }
        }
        let outcome = WalkForwardOutcome {
            config: self.config.clone(),
            parameters: params.cloned(),
            planned: offsets.len(),
            results,
            failures,
        };
        info!(
            windows = outcome.results.len(),
            failed = outcome.failures.len(),
            "walk-forward analysis finished"
        );
        Ok(outcome)
    }
}
