//! Monte Carlo simulator: bootstrap-resampled alternate price paths.
//!
//! Each simulation draws the base series' close-to-close returns with
//! replacement, compounds them from the first base close, and re-dresses
//! open/high/low around the new closes. Timestamps and volumes are kept from
//! the base series. The return distribution is preserved while its ordering
//! (trends, volatility clusters) is destroyed.
//!
//! Simulation `i` is seeded with `RngHierarchy(seed).sub_seed("monte_carlo", i)`
//! before dispatch, so results do not depend on thread scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use stresslab_core::metrics::pct_change;
use stresslab_core::{
    Bar, BarSampler, BarShape, ParamSet, RngHierarchy, ScenarioError, Series, SeriesError,
};

use crate::dispatch::{map_units, Progress};
use crate::evaluate::{EvaluationContext, EvaluationFailure, EvaluationResult, Evaluator};
use crate::stats::DistributionSummary;

/// Label under which simulation seeds are derived.
pub const SEED_LABEL: &str = "monte_carlo";

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    /// Number of simulations (default 100).
    pub simulations: usize,
    /// Master seed for per-simulation seed derivation (default 42).
    pub seed: u64,
    /// Log progress every N completed simulations (default 20).
    pub progress_every: usize,
    /// Run simulations on the rayon pool (default false).
    pub parallel: bool,
    /// Envelope used to rebuild open/high/low.
    pub bar_shape: BarShape,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            simulations: 100,
            seed: 42,
            progress_every: 20,
            parallel: false,
            bar_shape: BarShape::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum MonteCarloError {
    #[error("base series has {bars} bars; at least 2 are needed to form a return")]
    InsufficientData { bars: usize },

    #[error("progress interval must be at least 1")]
    ZeroProgressInterval,

    #[error("invalid bar shape: {0}")]
    BarShape(#[from] ScenarioError),

    #[error("resampled series is malformed: {0}")]
    Series(#[from] SeriesError),
}

// ─── Resampling ──────────────────────────────────────────────────────

/// Resize `prices` to `len`: truncate, or pad with the last price.
fn fit_length(mut prices: Vec<f64>, len: usize) -> Vec<f64> {
    if let Some(last) = prices.last().copied() {
        prices.resize(len, last);
    }
    prices
}

/// Build one bootstrap path from `base`.
pub fn resample_series<R: Rng + ?Sized>(
    base: &Series,
    sampler: &BarSampler,
    rng: &mut R,
) -> Result<Series, MonteCarloError> {
    let closes = base.closes();
    let first = match closes.first() {
        Some(&c) if closes.len() >= 2 => c,
        _ => return Err(MonteCarloError::InsufficientData { bars: closes.len() }),
    };
    let returns = pct_change(&closes);

    let mut prices = Vec::with_capacity(closes.len());
    prices.push(first);
    let mut price = first;
    for _ in 0..returns.len() {
        price *= 1.0 + returns[rng.gen_range(0..returns.len())];
        prices.push(price);
    }
    let prices = fit_length(prices, base.len());

    let bars = base
        .bars()
        .iter()
        .zip(prices)
        .map(|(b, close)| {
            let (open, high, low) = sampler.envelope(close, rng);
            Bar {
                timestamp: b.timestamp,
                open,
                high,
                low,
                close,
                volume: b.volume,
            }
        })
        .collect();
    Ok(Series::new(bars)?)
}

// ─── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub parameters: Option<ParamSet>,
    pub requested: usize,
    pub valid: usize,
    pub failed: usize,
    pub total_return: Option<DistributionSummary>,
    pub sharpe_ratio: Option<DistributionSummary>,
    /// count(total_return > 0) / valid.
    pub profit_probability: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloOutcome {
    pub requested: usize,
    pub seed: u64,
    pub parameters: Option<ParamSet>,
    /// Successful simulations in simulation-index order.
    pub results: Vec<EvaluationResult>,
    pub failures: Vec<EvaluationFailure>,
}

impl MonteCarloOutcome {
    pub fn summary(&self) -> MonteCarloSummary {
        let returns: Vec<f64> = self.results.iter().map(|r| r.total_return).collect();
        let sharpes: Vec<f64> = self.results.iter().map(|r| r.sharpe_ratio).collect();
        let profit_probability = (!returns.is_empty()).then(|| {
            returns.iter().filter(|&&r| r > 0.0).count() as f64 / returns.len() as f64
        });
        MonteCarloSummary {
            parameters: self.parameters.clone(),
            requested: self.requested,
            valid: self.results.len(),
            failed: self.failures.len(),
            total_return: DistributionSummary::from_values(&returns),
            sharpe_ratio: DistributionSummary::from_values(&sharpes),
            profit_probability,
        }
    }
}

// ─── Simulator ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    evaluator: Evaluator,
    config: MonteCarloConfig,
}

impl MonteCarloSimulator {
    pub fn new(evaluator: Evaluator, config: MonteCarloConfig) -> Self {
        Self { evaluator, config }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn run(
        &self,
        base: &Series,
        params: Option<&ParamSet>,
    ) -> Result<MonteCarloOutcome, MonteCarloError> {
        let cfg = &self.config;
        if base.len() < 2 {
            return Err(MonteCarloError::InsufficientData { bars: base.len() });
        }
        if cfg.progress_every == 0 {
            return Err(MonteCarloError::ZeroProgressInterval);
        }
        let sampler = cfg.bar_shape.sampler()?;
        let hierarchy = RngHierarchy::new(cfg.seed);
        let seeds: Vec<u64> = (0..cfg.simulations as u64)
            .map(|i| hierarchy.sub_seed(SEED_LABEL, i))
            .collect();

        info!(
            strategy = self.evaluator.strategy_name(),
            simulations = cfg.simulations,
            bars = base.len(),
            seed = cfg.seed,
            parallel = cfg.parallel,
            "starting monte carlo simulation"
        );

        let progress = Progress::new("monte_carlo", cfg.simulations, cfg.progress_every);
        let outcomes = map_units(&seeds, cfg.parallel, |index, &seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let path = resample_series(base, &sampler, &mut rng)?;
            let outcome = self.evaluator.evaluate(
                &path,
                params,
                EvaluationContext::Simulation { index, seed },
            );
            progress.tick();
            Ok::<_, MonteCarloError>(outcome)
        });

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome? {
                Ok(r) => results.push(r),
                Err(f) => failures.push(f),
            }
        }
        let outcome = MonteCarloOutcome {
            requested: cfg.simulations,
            seed: cfg.seed,
            parameters: params.cloned(),
            results,
            failures,
        };
        info!(
            valid = outcome.results.len(),
            failed = outcome.failures.len(),
            "monte carlo simulation finished"
        );
        Ok(outcome)
    }
}
