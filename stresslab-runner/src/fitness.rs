//! Fitness function: which metric the sweep optimizer maximizes.

use crate::evaluate::EvaluationResult;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMetric {
    #[default]
    Sharpe,
    TotalReturn,
    MaxDrawdown,
    WinRate,
}

impl FitnessMetric {
    pub fn extract(&self, result: &EvaluationResult) -> f64 {
        match self {
            Self::Sharpe => result.sharpe_ratio,
            Self::TotalReturn => result.total_return,
            Self::MaxDrawdown => result.max_drawdown,
            Self::WinRate => result.win_rate,
        }
    }

    /// Returns true if `a` is strictly better than `b`.
    ///
    /// Drawdowns are negative fractions, so `a > b` also prefers the
    /// shallower drawdown.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        a > b
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Sharpe => "sharpe_ratio",
            Self::TotalReturn => "total_return",
            Self::MaxDrawdown => "max_drawdown",
            Self::WinRate => "win_rate",
        }
    }
}

impl fmt::Display for FitnessMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::EvaluationContext;

    fn sample() -> EvaluationResult {
        EvaluationResult {
            parameters: None,
            total_return: 0.15,
            sharpe_ratio: 1.5,
            max_drawdown: -0.10,
            win_rate: 0.55,
            extra: Default::default(),
            context: EvaluationContext::Sweep { index: 0 },
        }
    }

    #[test]
    fn extract_each_metric() {
        let r = sample();
        assert_eq!(FitnessMetric::Sharpe.extract(&r), 1.5);
        assert_eq!(FitnessMetric::TotalReturn.extract(&r), 0.15);
        assert_eq!(FitnessMetric::MaxDrawdown.extract(&r), -0.10);
        assert_eq!(FitnessMetric::WinRate.extract(&r), 0.55);
    }

    #[test]
    fn default_is_sharpe() {
        assert_eq!(FitnessMetric::default(), FitnessMetric::Sharpe);
    }

    #[test]
    fn shallower_drawdown_is_better() {
        assert!(FitnessMetric::MaxDrawdown.is_better(-0.05, -0.20));
        assert!(!FitnessMetric::MaxDrawdown.is_better(-0.20, -0.05));
    }

    #[test]
    fn ties_are_not_better() {
        assert!(!FitnessMetric::Sharpe.is_better(1.0, 1.0));
    }

    #[test]
    fn deserializes_from_snake_case() {
        let m: FitnessMetric = serde_json::from_str("\"total_return\"").unwrap();
        assert_eq!(m, FitnessMetric::TotalReturn);
    }
}
