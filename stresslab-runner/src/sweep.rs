//! Parameter sweep optimizer: evaluate every grid combination on one series
//! and track the best by a chosen fitness metric.

use serde::{Deserialize, Serialize};
use tracing::info;

use stresslab_core::{ParamSet, Series};

use crate::dispatch::{map_units, Progress};
use crate::evaluate::{EvaluationContext, EvaluationFailure, EvaluationResult, Evaluator};
use crate::fitness::FitnessMetric;
use crate::grid::{ConfigurationError, ParamGrid};

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Metric maximized when picking the best combination (default Sharpe).
    pub metric: FitnessMetric,
    /// Log progress every N completed combinations (default 10).
    pub progress_every: usize,
    /// Evaluate combinations on the rayon pool (default false).
    pub parallel: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            metric: FitnessMetric::Sharpe,
            progress_every: 10,
            parallel: false,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// One attempted combination and what happened to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub index: usize,
    pub parameters: ParamSet,
    pub outcome: Result<EvaluationResult, EvaluationFailure>,
}

impl SweepEntry {
    pub fn is_failure(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn result(&self) -> Option<&EvaluationResult> {
        self.outcome.as_ref().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestCombination {
    pub index: usize,
    pub parameters: ParamSet,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub metric: FitnessMetric,
    /// Every attempted combination in enumeration order.
    pub entries: Vec<SweepEntry>,
    /// Best non-failing combination; `None` when every combination failed.
    pub best: Option<BestCombination>,
}

impl SweepOutcome {
    fn from_entries(metric: FitnessMetric, entries: Vec<SweepEntry>) -> Self {
        let mut best: Option<BestCombination> = None;
        for entry in &entries {
            let Some(result) = entry.result() else { continue };
            let value = metric.extract(result);
            let improves = best.as_ref().map_or(true, |b| metric.is_better(value, b.value));
            if improves {
                best = Some(BestCombination {
                    index: entry.index,
                    parameters: entry.parameters.clone(),
                    value,
                });
            }
        }
        Self {
            metric,
            entries,
            best,
        }
    }

    pub fn attempted(&self) -> usize {
        self.entries.len()
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn results(&self) -> impl Iterator<Item = &EvaluationResult> {
        self.entries.iter().filter_map(SweepEntry::result)
    }

    pub fn failures(&self) -> impl Iterator<Item = &EvaluationFailure> {
        self.entries.iter().filter_map(|e| e.outcome.as_ref().err())
    }

    pub fn best_params(&self) -> Option<&ParamSet> {
        self.best.as_ref().map(|b| &b.parameters)
    }
}

// ─── Optimizer ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SweepOptimizer {
    evaluator: Evaluator,
    config: SweepConfig,
}

impl SweepOptimizer {
    pub fn new(evaluator: Evaluator, config: SweepConfig) -> Self {
        Self { evaluator, config }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn with_metric(mut self, metric: FitnessMetric) -> Self {
        self.config.metric = metric;
        self
    }

    pub fn run(&self, grid: &ParamGrid, series: &Series) -> Result<SweepOutcome, ConfigurationError> {
        self.run_with_progress(grid, series, |_, _, _| {})
    }

    /// Run the sweep, calling `progress(completed, total, entry)` after each
    /// combination finishes. `completed` counts from 1.
    pub fn run_with_progress<F>(
        &self,
        grid: &ParamGrid,
        series: &Series,
        progress: F,
    ) -> Result<SweepOutcome, ConfigurationError>
    where
        F: Fn(usize, usize, &SweepEntry) + Send + Sync,
    {
        if self.config.progress_every == 0 {
            return Err(ConfigurationError::ZeroProgressInterval);
        }
        let combos = grid.combinations()?;
        let total = combos.len();
        info!(
            strategy = self.evaluator.strategy_name(),
            combinations = total,
            metric = %self.config.metric,
            parallel = self.config.parallel,
            "starting parameter sweep"
        );

        let counter = Progress::new("sweep", total, self.config.progress_every);
        let entries = map_units(&combos, self.config.parallel, |index, params| {
            let outcome = self.evaluator.evaluate(
                series,
                Some(params),
                EvaluationContext::Sweep { index },
            );
            let entry = SweepEntry {
                index,
                parameters: params.clone(),
                outcome,
            };
            let done = counter.tick();
            progress(done, total, &entry);
            entry
        });

        let outcome = SweepOutcome::from_entries(self.config.metric, entries);
        match &outcome.best {
            Some(best) => info!(
                attempted = outcome.attempted(),
                failed = outcome.failed(),
                best_value = best.value,
                best_params = %best.parameters,
                "parameter sweep finished"
            ),
            None => info!(
                attempted = outcome.attempted(),
                failed = outcome.failed(),
                "parameter sweep finished without a valid combination"
            ),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::test_support::ScriptedFactory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use stresslab_core::scenario::{Regime, RegimeParams, ScenarioConfig, ScenarioGenerator};

    /// Noise-free rising series, so the scripted return is strictly positive.
    fn uptrend() -> Series {
        let params = RegimeParams {
            drift: 0.01,
            volatility: 0.0,
            mean_reversion: None,
            cycle: None,
        };
        ScenarioGenerator::new(ScenarioConfig::default())
            .unwrap()
            .generate_custom("steady", Regime::TrendingUp, params, 60, 1)
            .unwrap()
            .series
    }

    fn optimizer() -> SweepOptimizer {
        SweepOptimizer::new(Evaluator::new(Arc::new(ScriptedFactory)), SweepConfig::default())
    }

    // ─── Best selection ──────────────────────────────────────────────

    #[test]
    fn best_has_maximal_metric() {
        let series = uptrend();
        let grid = ParamGrid::new().param("leverage", [1.0, 3.0, 2.0]);
        let outcome = optimizer().run(&grid, &series).unwrap();
        let best = outcome.best.clone().unwrap();
        assert_eq!(best.index, 1);
        assert!(outcome.results().all(|r| r.sharpe_ratio <= best.value));
    }

    #[test]
    fn ties_go_to_first_enumerated() {
        let series = uptrend();
        let grid = ParamGrid::new()
            .param("leverage", [2.0])
            .param("tag", ["a", "b", "c"]);
        // The scripted strategy ignores "tag", so every combination ties.
        let outcome = optimizer().run(&grid, &series).unwrap();
        assert_eq!(outcome.best.unwrap().index, 0);
    }

    #[test]
    fn failures_are_flagged_and_excluded_from_best() {
        let series = uptrend();
        let grid = ParamGrid::new()
            .param("mode", ["error", "ok", "panic", "nan", "reject"])
            .param("leverage", [1.0]);
        let outcome = optimizer().run(&grid, &series).unwrap();
        assert_eq!(outcome.attempted(), 5);
        assert_eq!(outcome.failed(), 4);
        assert_eq!(outcome.best.unwrap().index, 1);
        assert!(outcome.entries[0].is_failure());
    }

    #[test]
    fn all_failing_has_no_best() {
        let grid = ParamGrid::new().param("mode", ["error", "panic"]);
        let outcome = optimizer().run(&grid, &uptrend()).unwrap();
        assert!(outcome.best.is_none());
        assert_eq!(outcome.failed(), 2);
    }

    // ─── Configuration ───────────────────────────────────────────────

    #[test]
    fn configuration_errors_raised_before_evaluation() {
        let calls = AtomicUsize::new(0);
        let err = optimizer()
            .run_with_progress(&ParamGrid::new(), &uptrend(), |_, _, _| {
                calls.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap_err();
        assert_eq!(err, ConfigurationError::EmptyGrid);
        assert_eq!(calls.load(Ordering::Relaxed), 0);

        let zero = SweepOptimizer::new(
            Evaluator::new(Arc::new(ScriptedFactory)),
            SweepConfig {
                progress_every: 0,
                ..SweepConfig::default()
            },
        );
        assert_eq!(
            zero.run(&ParamGrid::new().param("leverage", [1.0]), &uptrend()),
            Err(ConfigurationError::ZeroProgressInterval)
        );
    }

    // ─── Progress and parallelism ────────────────────────────────────

    #[test]
    fn progress_callback_sees_every_completion() {
        let grid = ParamGrid::new().param("leverage", [1.0, 2.0, 3.0, 4.0]);
        let seen = AtomicUsize::new(0);
        optimizer()
            .run_with_progress(&grid, &uptrend(), |done, total, _| {
                assert!(done >= 1 && done <= total);
                assert_eq!(total, 4);
                seen.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        assert_eq!(seen.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn parallel_matches_sequential() {
        let series = uptrend();
        let grid = ParamGrid::new()
            .param("leverage", (1..=20).map(|i| i as f64 / 4.0).collect::<Vec<_>>())
            .param("mode", ["ok", "error"]);
        let seq = optimizer().run(&grid, &series).unwrap();
        let par = optimizer().with_parallelism(true).run(&grid, &series).unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn metric_selects_comparison_field() {
        let grid = ParamGrid::new().param("leverage", [1.0, 2.0]);
        let outcome = optimizer()
            .with_metric(FitnessMetric::WinRate)
            .run(&grid, &uptrend())
            .unwrap();
        // Scripted win rate is constant, so the first combination wins.
        assert_eq!(outcome.best.unwrap().index, 0);
        assert_eq!(outcome.metric, FitnessMetric::WinRate);
    }
}
