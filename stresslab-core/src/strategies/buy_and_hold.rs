//! Buy-and-hold baseline: fully invested from the first close to the last.

use super::{read_f64, reject_unknown};
use crate::bar::Series;
use crate::metrics;
use crate::params::ParamSet;
use crate::strategy::{BacktestReport, Strategy, StrategyError, StrategyFactory};
use serde_json::json;

pub const NAME: &str = "buy_and_hold";

const DEFAULT_CAPITAL: f64 = 100_000.0;

#[derive(Debug, Clone)]
pub struct BuyAndHold {
    initial_capital: f64,
    series: Option<Series>,
}

impl Strategy for BuyAndHold {
    fn add_data(&mut self, series: &Series) {
        self.series = Some(series.clone());
    }

    fn run_backtest(&mut self) -> Result<BacktestReport, StrategyError> {
        let series = self.series.as_ref().ok_or(StrategyError::NoData)?;
        let first = match series.first_close() {
            Some(c) if series.len() >= 2 => c,
            _ => {
                return Err(StrategyError::InsufficientData {
                    required: 2,
                    available: series.len(),
                })
            }
        };
        if first <= 0.0 {
            return Err(StrategyError::Backtest(format!(
                "first close must be positive, got {first}"
            )));
        }
        let units = self.initial_capital / first;
        let equity: Vec<f64> = series.closes().iter().map(|c| c * units).collect();
        let pnl = equity.last().copied().unwrap_or(self.initial_capital) - self.initial_capital;

        let mut report = BacktestReport {
            total_return: metrics::total_return(&equity),
            sharpe_ratio: metrics::sharpe_ratio(&equity),
            max_drawdown: metrics::max_drawdown(&equity),
            win_rate: metrics::win_rate(&[pnl]),
            ..BacktestReport::default()
        };
        report.extra.insert("trade_count".into(), json!(1));
        Ok(report)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuyAndHoldFactory;

impl StrategyFactory for BuyAndHoldFactory {
    fn name(&self) -> &str {
        NAME
    }

    fn build(
        &self,
        _symbol: &str,
        params: Option<&ParamSet>,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        let initial_capital = match params {
            Some(p) => {
                reject_unknown(p, &["initial_capital"])?;
                read_f64(p, "initial_capital", DEFAULT_CAPITAL)?
            }
            None => DEFAULT_CAPITAL,
        };
        if initial_capital <= 0.0 {
            return Err(StrategyError::InvalidParams {
                name: "initial_capital".into(),
                reason: format!("must be positive, got {initial_capital}"),
            });
        }
        Ok(Box::new(BuyAndHold {
            initial_capital,
            series: None,
        }))
    }

    fn default_params(&self) -> ParamSet {
        ParamSet::new().with("initial_capital", DEFAULT_CAPITAL)
    }
}
