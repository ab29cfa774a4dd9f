//! Strategy collaborator interface.
//!
//! A strategy under test is reached only through these two traits. The
//! validation stages build one `Strategy` per evaluation unit from a shared
//! `StrategyFactory`, feed it a series and read back a `BacktestReport`.

use crate::bar::Series;
use crate::params::ParamSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StrategyError {
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParams { name: String, reason: String },

    #[error("insufficient data: need at least {required} bars, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("backtest run before any data was added")]
    NoData,

    #[error("backtest failed: {0}")]
    Backtest(String),
}

/// Result of one backtest as reported by the collaborator.
///
/// `max_drawdown` is a non-positive fraction and `win_rate` a fraction in
/// [0, 1]. Fields in `extra` are passed through to evaluation results
/// unmodified.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BacktestReport {
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl BacktestReport {
    /// True when all four core metrics are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.total_return.is_finite()
            && self.sharpe_ratio.is_finite()
            && self.max_drawdown.is_finite()
            && self.win_rate.is_finite()
    }
}

/// A single configured strategy instance.
pub trait Strategy {
    fn add_data(&mut self, series: &Series);
    fn run_backtest(&mut self) -> Result<BacktestReport, StrategyError>;
}

/// Builds strategy instances. Shared across worker threads.
pub trait StrategyFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Build an instance for `symbol`; `None` means the strategy's defaults.
    fn build(
        &self,
        symbol: &str,
        params: Option<&ParamSet>,
    ) -> Result<Box<dyn Strategy>, StrategyError>;

    /// The parameter set `build(symbol, None)` would use.
    fn default_params(&self) -> ParamSet;
}
