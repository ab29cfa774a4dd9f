//! StressLab Runner: strategy robustness validation on synthetic data.
//!
//! This crate builds on `stresslab-core` to provide:
//! - An evaluation adapter that turns collaborator errors and panics into
//!   recorded failures
//! - Parameter grids and the sweep optimizer
//! - Stress testing across the standard market scenarios
//! - Bootstrap Monte Carlo resampling
//! - Walk-forward window analysis
//! - Report synthesis, TOML configuration, and JSON/CSV/Markdown export
//! - `run_validation`, the end-to-end pipeline

mod dispatch;

pub mod config;
pub mod evaluate;
pub mod export;
pub mod fitness;
pub mod grid;
pub mod monte_carlo;
pub mod pipeline;
pub mod report;
pub mod stats;
pub mod stress;
pub mod sweep;
pub mod walk_forward;

pub use config::{ConfigError, ValidationConfig};
pub use evaluate::{
    EvaluationContext, EvaluationFailure, EvaluationResult, Evaluator, FailureKind,
    DEFAULT_SYMBOL,
};
pub use fitness::FitnessMetric;
pub use grid::{ConfigurationError, Constraint, ParamGrid, ParamRange};
pub use monte_carlo::{
    resample_series, MonteCarloConfig, MonteCarloError, MonteCarloOutcome, MonteCarloSimulator,
    MonteCarloSummary,
};
pub use pipeline::{run_validation, ParameterSource, PipelineError, ValidationRun};
pub use report::{AggregateReport, ReportInputs, SCHEMA_VERSION};
pub use stats::DistributionSummary;
pub use stress::{StressOutcome, StressTester};
pub use sweep::{BestCombination, SweepConfig, SweepEntry, SweepOptimizer, SweepOutcome};
pub use walk_forward::{
    window_offsets, WalkForwardAnalyzer, WalkForwardConfig, WalkForwardError,
    WalkForwardOutcome, WalkForwardSummary,
};
