//! Strategy evaluation adapter.
//!
//! Turns one `(series, parameters, context)` unit into either an
//! [`EvaluationResult`] or an [`EvaluationFailure`]. Collaborator errors,
//! panics and non-finite metrics are all converted into failures here so a
//! batch never aborts because of a single unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use stresslab_core::{BacktestReport, ParamSet, Series, StrategyFactory};

/// Default symbol handed to the strategy factory.
pub const DEFAULT_SYMBOL: &str = "BTCUSDT";

// ─── Context ─────────────────────────────────────────────────────────

/// Which unit of which stage an evaluation belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum EvaluationContext {
    Sweep {
        index: usize,
    },
    Scenario {
        name: String,
    },
    Simulation {
        index: usize,
        seed: u64,
    },
    Window {
        index: usize,
        start_offset: usize,
        end_offset: usize,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl fmt::Display for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sweep { index } => write!(f, "sweep combination {index}"),
            Self::Scenario { name } => write!(f, "scenario {name}"),
            Self::Simulation { index, seed } => write!(f, "simulation {index} (seed {seed})"),
            Self::Window {
                index,
                start_offset,
                end_offset,
                ..
            } => write!(f, "window {index} [{start_offset}, {end_offset})"),
        }
    }
}

// ─── Results ─────────────────────────────────────────────────────────

/// Normalized metrics of one successful evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Parameters passed to the factory; `None` means strategy defaults.
    pub parameters: Option<ParamSet>,
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    /// Collaborator fields passed through unmodified.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
    pub context: EvaluationContext,
}

impl EvaluationResult {
    fn from_report(
        report: BacktestReport,
        parameters: Option<ParamSet>,
        context: EvaluationContext,
    ) -> Self {
        Self {
            parameters,
            total_return: report.total_return,
            sharpe_ratio: report.sharpe_ratio,
            max_drawdown: report.max_drawdown,
            win_rate: report.win_rate,
            extra: report.extra,
            context,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The factory rejected the parameters.
    Construction,
    /// The backtest returned an error.
    Backtest,
    /// The collaborator panicked.
    Panic,
    /// The backtest returned NaN or infinite core metrics.
    InvalidMetrics,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Construction => "construction",
            Self::Backtest => "backtest",
            Self::Panic => "panic",
            Self::InvalidMetrics => "invalid metrics",
        };
        f.write_str(s)
    }
}

/// A unit that produced no result.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{context}: {kind} failure: {message}")]
pub struct EvaluationFailure {
    pub parameters: Option<ParamSet>,
    pub context: EvaluationContext,
    pub kind: FailureKind,
    pub message: String,
}

// ─── Evaluator ───────────────────────────────────────────────────────

/// Builds, feeds and runs one strategy instance per unit.
#[derive(Clone)]
pub struct Evaluator {
    factory: Arc<dyn StrategyFactory>,
    symbol: String,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("strategy", &self.factory.name())
            .field("symbol", &self.symbol)
            .finish()
    }
}

impl Evaluator {
    pub fn new(factory: Arc<dyn StrategyFactory>) -> Self {
        Self {
            factory,
            symbol: DEFAULT_SYMBOL.to_string(),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn strategy_name(&self) -> &str {
        self.factory.name()
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn default_params(&self) -> ParamSet {
        self.factory.default_params()
    }

    /// Evaluate one unit. Never panics and never propagates collaborator
    /// errors; every failure is logged at `warn` and returned.
    pub fn evaluate(
        &self,
        series: &Series,
        parameters: Option<&ParamSet>,
        context: EvaluationContext,
    ) -> Result<EvaluationResult, EvaluationFailure> {
        let run = catch_unwind(AssertUnwindSafe(|| {
            let mut strategy = self
                .factory
                .build(&self.symbol, parameters)
                .map_err(|e| (FailureKind::Construction, e.to_string()))?;
            strategy.add_data(series);
            strategy
                .run_backtest()
                .map_err(|e| (FailureKind::Backtest, e.to_string()))
        }));

        let outcome = match run {
            Ok(Ok(report)) if report.is_finite() => Ok(report),
            Ok(Ok(report)) => Err((
                FailureKind::InvalidMetrics,
                format!(
                    "non-finite metrics: total_return={}, sharpe_ratio={}, max_drawdown={}, win_rate={}",
                    report.total_return, report.sharpe_ratio, report.max_drawdown, report.win_rate
                ),
            )),
            Ok(Err(e)) => Err(e),
            Err(payload) => Err((FailureKind::Panic, panic_message(payload.as_ref()))),
        };

        match outcome {
            Ok(report) => {
                debug!(
                    %context,
                    total_return = report.total_return,
                    sharpe = report.sharpe_ratio,
                    "evaluation complete"
                );
                Ok(EvaluationResult::from_report(
                    report,
                    parameters.cloned(),
                    context,
                ))
            }
            Err((kind, message)) => {
                let failure = EvaluationFailure {
                    parameters: parameters.cloned(),
                    context,
                    kind,
                    message,
                };
                let params = failure
                    .parameters
                    .as_ref()
                    .map_or_else(|| "defaults".to_string(), ToString::to_string);
                warn!(
                    strategy = self.factory.name(),
                    context = %failure.context,
                    kind = %failure.kind,
                    %params,
                    "evaluation failed: {}",
                    failure.message
                );
                Err(failure)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "strategy panicked".to_string()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Collaborators with scripted behavior for exercising failure paths.

    use stresslab_core::{
        BacktestReport, ParamSet, Series, Strategy, StrategyError, StrategyFactory,
    };

    /// Reports `total_return = sharpe = leverage * (last/first - 1)`, and
    /// misbehaves on request via the `mode` parameter:
    /// `"error"`, `"panic"`, `"nan"`, or `"reject"` (fails to build).
    pub struct ScriptedFactory;

    struct Scripted {
        mode: String,
        leverage: f64,
        series: Option<Series>,
    }

    impl Strategy for Scripted {
        fn add_data(&mut self, series: &Series) {
            self.series = Some(series.clone());
        }

        fn run_backtest(&mut self) -> Result<BacktestReport, StrategyError> {
            let series = self.series.as_ref().ok_or(StrategyError::NoData)?;
            match self.mode.as_str() {
                "error" => return Err(StrategyError::Backtest("scripted error".into())),
                "panic" => panic!("scripted panic"),
                _ => {}
            }
            let closes = series.closes();
            let ret = match (closes.first(), closes.last()) {
                (Some(f), Some(l)) => l / f - 1.0,
                _ => 0.0,
            };
            let value = if self.mode == "nan" { f64::NAN } else { self.leverage * ret };
            Ok(BacktestReport {
                total_return: value,
                sharpe_ratio: value,
                max_drawdown: 0.0,
                win_rate: 0.5,
                extra: Default::default(),
            })
        }
    }

    impl StrategyFactory for ScriptedFactory {
        fn name(&self) -> &str {
            "scripted"
        }

        fn build(
            &self,
            _symbol: &str,
            params: Option<&ParamSet>,
        ) -> Result<Box<dyn Strategy>, StrategyError> {
            let mode = params
                .and_then(|p| p.get("mode"))
                .and_then(|v| v.as_str())
                .unwrap_or("ok")
                .to_string();
            if mode == "reject" {
                return Err(StrategyError::InvalidParams {
                    name: "mode".into(),
                    reason: "rejected".into(),
                });
            }
            let leverage = params
                .and_then(|p| p.get("leverage"))
                .and_then(|v| v.as_f64())
                .unwrap_or(1.0);
            Ok(Box::new(Scripted {
                mode,
                leverage,
                series: None,
            }))
        }

        fn default_params(&self) -> ParamSet {
            ParamSet::new().with("leverage", 1.0)
        }
    }
}
