//! Dual moving-average crossover.
//!
//! Long while the fast SMA is above the slow SMA, short while it is below,
//! flat when they are equal. The position held over bar `t` is decided from
//! the SMAs through bar `t - 1`, so no bar's close influences its own return.
//! Exposure is `leverage` times equity.

use super::{read_f64, read_usize, reject_unknown};
use crate::bar::Series;
use crate::metrics;
use crate::params::ParamSet;
use crate::strategy::{BacktestReport, Strategy, StrategyError, StrategyFactory};
use serde_json::json;

pub const NAME: &str = "dual_ma";

const KNOWN: [&str; 4] = ["fast_period", "slow_period", "leverage", "initial_capital"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualMaParams {
    /// Fast SMA lookback (default 10).
    pub fast_period: usize,
    /// Slow SMA lookback (default 30).
    pub slow_period: usize,
    /// Exposure multiple (default 1.0).
    pub leverage: f64,
    /// Starting equity (default 100 000).
    pub initial_capital: f64,
}

impl Default for DualMaParams {
    fn default() -> Self {
        Self {
            fast_period: 10,
            slow_period: 30,
            leverage: 1.0,
            initial_capital: 100_000.0,
        }
    }
}

impl DualMaParams {
    pub fn from_params(params: Option<&ParamSet>) -> Result<Self, StrategyError> {
        let d = Self::default();
        let parsed = match params {
            None => d,
            Some(p) => {
                reject_unknown(p, &KNOWN)?;
                Self {
                    fast_period: read_usize(p, "fast_period", d.fast_period)?,
                    slow_period: read_usize(p, "slow_period", d.slow_period)?,
                    leverage: read_f64(p, "leverage", d.leverage)?,
                    initial_capital: read_f64(p, "initial_capital", d.initial_capital)?,
                }
            }
        };
        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> Result<(), StrategyError> {
        let invalid = |name: &str, reason: String| StrategyError::InvalidParams {
            name: name.to_string(),
            reason,
        };
        if self.fast_period == 0 {
            return Err(invalid("fast_period", "must be at least 1".into()));
        }
        if self.fast_period >= self.slow_period {
            return Err(invalid(
                "fast_period",
                format!(
                    "must be below slow_period ({} >= {})",
                    self.fast_period, self.slow_period
                ),
            ));
        }
        if self.leverage <= 0.0 {
            return Err(invalid("leverage", format!("must be positive, got {}", self.leverage)));
        }
        if self.initial_capital <= 0.0 {
            return Err(invalid(
                "initial_capital",
                format!("must be positive, got {}", self.initial_capital),
            ));
        }
        Ok(())
    }

    pub fn to_param_set(&self) -> ParamSet {
        ParamSet::new()
            .with("fast_period", self.fast_period)
            .with("slow_period", self.slow_period)
            .with("leverage", self.leverage)
            .with("initial_capital", self.initial_capital)
    }
}

#[derive(Debug, Clone)]
pub struct DualMa {
    symbol: String,
    params: DualMaParams,
    series: Option<Series>,
}

impl DualMa {
    pub fn new(symbol: &str, params: DualMaParams) -> Self {
        Self {
            symbol: symbol.to_string(),
            params,
            series: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Trailing simple moving average; `None` until `period` values are available.
fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, &v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        out.push((i + 1 >= period).then(|| sum / period as f64));
    }
    out
}

impl Strategy for DualMa {
    fn add_data(&mut self, series: &Series) {
        self.series = Some(series.clone());
    }

    fn run_backtest(&mut self) -> Result<BacktestReport, StrategyError> {
        let series = self.series.as_ref().ok_or(StrategyError::NoData)?;
        let p = self.params;
        let required = p.slow_period + 1;
        if series.len() < required {
            return Err(StrategyError::InsufficientData {
                required,
                available: series.len(),
            });
        }

        let closes = series.closes();
        let fast = sma(&closes, p.fast_period);
        let slow = sma(&closes, p.slow_period);

        let mut equity = Vec::with_capacity(closes.len());
        equity.push(p.initial_capital);
        let mut trade_pnls = Vec::new();
        let mut position = 0.0_f64;
        let mut entry_equity = p.initial_capital;

        for t in 1..closes.len() {
            let prev = equity[t - 1];
            let signal = match (fast[t - 1], slow[t - 1]) {
                (Some(f), Some(s)) if f > s => 1.0,
                (Some(f), Some(s)) if f < s => -1.0,
                _ => 0.0,
            };
            if signal != position {
                if position != 0.0 {
                    trade_pnls.push(prev - entry_equity);
                }
                position = signal;
                entry_equity = prev;
            }
            let bar_return = if closes[t - 1] > 0.0 {
                closes[t] / closes[t - 1] - 1.0
            } else {
                0.0
            };
            let next = prev * (1.0 + position * p.leverage * bar_return);
            equity.push(next.max(0.0));
        }
        if position != 0.0 {
            if let Some(&last) = equity.last() {
                trade_pnls.push(last - entry_equity);
            }
        }

        let final_equity = equity.last().copied().unwrap_or(p.initial_capital);
        let mut report = BacktestReport {
            total_return: metrics::total_return(&equity),
            sharpe_ratio: metrics::sharpe_ratio(&equity),
            max_drawdown: metrics::max_drawdown(&equity),
            win_rate: metrics::win_rate(&trade_pnls),
            ..BacktestReport::default()
        };
        report.extra.insert("trade_count".into(), json!(trade_pnls.len()));
        report
            .extra
            .insert("profit_factor".into(), json!(metrics::profit_factor(&trade_pnls)));
        report.extra.insert("final_equity".into(), json!(final_equity));
        Ok(report)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DualMaFactory;

impl StrategyFactory for DualMaFactory {
    fn name(&self) -> &str {
        NAME
    }

    fn build(
        &self,
        symbol: &str,
        params: Option<&ParamSet>,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        let params = DualMaParams::from_params(params)?;
        Ok(Box::new(DualMa::new(symbol, params)))
    }

    fn default_params(&self) -> ParamSet {
        DualMaParams::default().to_param_set()
    }
}
