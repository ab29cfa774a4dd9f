//! End-to-end validation run.
//!
//! Generates the standard scenario set, sweeps the configured grid, then
//! stress-tests, resamples and walks forward with the best parameters found
//! (the strategy's resolved defaults when the sweep is disabled or found
//! nothing), and finally synthesizes the report.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use stresslab_core::{ParamSet, Scenario, ScenarioError, ScenarioGenerator, StrategyFactory};

use crate::config::{ConfigError, ValidationConfig};
use crate::evaluate::Evaluator;
use crate::grid::ConfigurationError;
use crate::monte_carlo::{MonteCarloError, MonteCarloOutcome, MonteCarloSimulator};
use crate::report::{AggregateReport, ReportInputs};
use crate::stress::{StressOutcome, StressTester};
use crate::sweep::{SweepOptimizer, SweepOutcome};
use crate::walk_forward::{WalkForwardAnalyzer, WalkForwardError, WalkForwardOutcome};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("scenario generation failed: {0}")]
    Scenario(#[from] ScenarioError),
    #[error("sweep error: {0}")]
    Sweep(#[from] ConfigurationError),
    #[error("monte carlo error: {0}")]
    MonteCarlo(#[from] MonteCarloError),
    #[error("walk-forward error: {0}")]
    WalkForward(#[from] WalkForwardError),
    #[error("scenario '{0}' was not generated")]
    MissingScenario(String),
}

/// Where the parameters of the later stages came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSource {
    /// Best combination of the sweep.
    Sweep,
    /// `StrategyFactory::default_params`, because the sweep was disabled or
    /// every combination failed.
    Defaults,
}

/// Everything a validation run produced.
#[derive(Debug, Clone)]
pub struct ValidationRun {
    pub config: ValidationConfig,
    pub scenarios: BTreeMap<String, Scenario>,
    pub sweep: Option<SweepOutcome>,
    /// Parameters used by the stress, Monte Carlo and walk-forward stages.
    pub selected_parameters: ParamSet,
    pub parameter_source: ParameterSource,
    pub stress: Option<StressOutcome>,
    pub monte_carlo: Option<MonteCarloOutcome>,
    pub walk_forward: Option<WalkForwardOutcome>,
    pub report: AggregateReport,
}

fn scenario<'a>(
    scenarios: &'a BTreeMap<String, Scenario>,
    name: &str,
) -> Result<&'a Scenario, PipelineError> {
    scenarios
        .get(name)
        .ok_or_else(|| PipelineError::MissingScenario(name.to_string()))
}

pub fn run_validation(
    config: &ValidationConfig,
    factory: Arc<dyn StrategyFactory>,
) -> Result<ValidationRun, PipelineError> {
    config.validate()?;
    let start = Instant::now();
    let evaluator = Evaluator::new(factory).with_symbol(config.run.symbol.as_str());
    info!(
        strategy = evaluator.strategy_name(),
        symbol = evaluator.symbol(),
        bars = config.run.bars,
        "starting validation run"
    );

    let generator = ScenarioGenerator::new(config.scenarios.clone())?;
    let scenarios = generator.standard_set(config.run.bars)?;
    info!(count = scenarios.len(), "generated scenarios");

    // 1. Sweep
    let sweep = if config.sweep.enabled {
        let base = scenario(&scenarios, &config.sweep.scenario)?;
        let outcome = SweepOptimizer::new(evaluator.clone(), config.sweep.sweep_config())
            .run(&config.sweep.grid(), &base.series)?;
        Some(outcome)
    } else {
        None
    };
    let (selected_parameters, parameter_source) =
        match sweep.as_ref().and_then(|s| s.best_params()) {
            Some(best) => (best.clone(), ParameterSource::Sweep),
            None => {
                if let Some(s) = &sweep {
                    warn!(
                        failed = s.failed(),
                        "sweep found no valid combination; later stages use strategy defaults"
                    );
                }
                (evaluator.default_params(), ParameterSource::Defaults)
            }
        };
    info!(
        parameters = %selected_parameters,
        source = ?parameter_source,
        "selected parameters for later stages"
    );
    let params = Some(&selected_parameters);

    // 2. Stress
    let stress = config.stress.enabled.then(|| {
        StressTester::new(evaluator.clone())
            .with_parallelism(config.stress.parallel)
            .run(&scenarios, params)
    });

    // 3. Monte Carlo
    let monte_carlo = if config.monte_carlo.enabled {
        let base = scenario(&scenarios, &config.monte_carlo.scenario)?;
        let outcome = MonteCarloSimulator::new(evaluator.clone(), config.monte_carlo_config())
            .run(&base.series, params)?;
        Some(outcome)
    } else {
        None
    };

    // 4. Walk-forward
    let walk_forward = if config.walk_forward.enabled {
        let base = scenario(&scenarios, &config.walk_forward.scenario)?;
        let outcome =
            WalkForwardAnalyzer::new(evaluator.clone(), config.walk_forward.walk_forward_config())
                .run(&base.series, params)?;
        Some(outcome)
    } else {
        None
    };

    let report = AggregateReport::synthesize(
        evaluator.strategy_name(),
        ReportInputs {
            sweep: sweep.as_ref(),
            stress: stress.as_ref(),
            monte_carlo: monte_carlo.as_ref(),
            walk_forward: walk_forward.as_ref(),
        },
    );
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        "validation run finished"
    );

    Ok(ValidationRun {
        config: config.clone(),
        scenarios,
        sweep,
        selected_parameters,
        parameter_source,
        stress,
        monte_carlo,
        walk_forward,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::test_support::ScriptedFactory;
    use stresslab_core::strategies::DualMaFactory;

    fn small_config() -> ValidationConfig {
        let mut c = ValidationConfig::default();
        c.run.bars = 120;
        c.monte_carlo.simulations = 8;
        c
    }

    #[test]
    fn default_run_fills_every_section() {
        let run = run_validation(&small_config(), Arc::new(DualMaFactory)).unwrap();
        assert_eq!(run.scenarios.len(), 5);
        assert_eq!(run.sweep.as_ref().unwrap().attempted(), 32);
        assert_eq!(Some(&run.selected_parameters), run.sweep.as_ref().unwrap().best_params());
        assert_eq!(run.parameter_source, ParameterSource::Sweep);
        assert!(run.report.optimization.is_some());
        assert_eq!(run.report.stress.as_ref().unwrap().scenarios.len(), 5);
        assert_eq!(run.report.monte_carlo.as_ref().unwrap().requested, 8);
        // 120 bars, window 50, step 10: starts 0..=70.
        assert_eq!(run.walk_forward.as_ref().unwrap().planned, 8);
    }

    #[test]
    fn stages_use_best_parameters() {
        let run = run_validation(&small_config(), Arc::new(DualMaFactory)).unwrap();
        let best = Some(run.selected_parameters.clone());
        for r in run.stress.as_ref().unwrap().results.values().flatten() {
            assert_eq!(r.parameters, best);
        }
        for r in &run.walk_forward.as_ref().unwrap().results {
            assert_eq!(r.parameters, best);
        }
    }

    #[test]
    fn failed_sweep_falls_back_to_defaults() {
        let mut c = small_config();
        c.sweep.parameters = crate::ParamGrid::new().param("mode", ["error"]).parameters;
        c.sweep.constraints.clear();
        let run = run_validation(&c, Arc::new(ScriptedFactory)).unwrap();
        assert_eq!(run.parameter_source, ParameterSource::Defaults);
        assert_eq!(run.selected_parameters, ScriptedFactory.default_params());
        assert!(run.report.optimization.as_ref().unwrap().best_parameters.is_none());
        assert_eq!(run.stress.as_ref().unwrap().passed(), 5);

        // The resolved defaults are recorded wherever they ran.
        let defaults = Some(ScriptedFactory.default_params());
        let report = &run.report;
        assert_eq!(report.stress.as_ref().unwrap().parameters, defaults);
        assert_eq!(report.monte_carlo.as_ref().unwrap().parameters, defaults);
        assert_eq!(report.walk_forward.as_ref().unwrap().parameters, defaults);
        assert!(report.to_markdown().contains("| Parameters | leverage=1 |"));
    }

    #[test]
    fn disabled_stages_are_skipped() {
        let mut c = small_config();
        c.sweep.enabled = false;
        c.monte_carlo.enabled = false;
        c.walk_forward.enabled = false;
        let run = run_validation(&c, Arc::new(DualMaFactory)).unwrap();
        assert!(run.sweep.is_none() && run.monte_carlo.is_none() && run.walk_forward.is_none());
        assert_eq!(run.parameter_source, ParameterSource::Defaults);
        assert_eq!(run.selected_parameters, DualMaFactory.default_params());
        assert!(run.report.stress.is_some());
        assert!(run.report.optimization.is_none());
    }

    #[test]
    fn invalid_config_fails_before_work() {
        let mut c = small_config();
        c.walk_forward.step_size = 0;
        assert!(matches!(
            run_validation(&c, Arc::new(DualMaFactory)),
            Err(PipelineError::Config(_))
        ));
    }
}
