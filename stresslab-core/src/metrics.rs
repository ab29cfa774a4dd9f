//! Performance metrics: pure functions from an equity curve or trade P&L list
//! to a scalar.
//!
//! The reference strategies use these to fill a `BacktestReport`; the Monte
//! Carlo simulator uses `pct_change` to extract the return population it
//! resamples.

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Bar-to-bar fractional changes. Length is `values.len() - 1`.
///
/// A non-positive previous value yields a 0.0 change rather than a division
/// blow-up.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Annualized Sharpe ratio with a zero risk-free rate.
///
/// mean(daily returns) / std(daily returns) * sqrt(252). Returns 0.0 for
/// fewer than two returns or zero variance.
pub fn sharpe_ratio(equity_curve: &[f64]) -> f64 {
    let returns = pct_change(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean(&returns) / std * TRADING_DAYS.sqrt()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = match equity_curve.first() {
        Some(&p) => p,
        None => return 0.0,
    };
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Fraction of closed trades with positive P&L.
pub fn win_rate(trade_pnls: &[f64]) -> f64 {
    if trade_pnls.is_empty() {
        return 0.0;
    }
    let winners = trade_pnls.iter().filter(|&&p| p > 0.0).count();
    winners as f64 / trade_pnls.len() as f64
}

/// Gross profit / gross loss, capped at 100.0 when there are no losers.
pub fn profit_factor(trade_pnls: &[f64]) -> f64 {
    let gross_profit: f64 = trade_pnls.iter().filter(|&&p| p > 0.0).sum();
    let gross_loss: f64 = trade_pnls.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-10;

    #[test]
    fn total_return_basic() {
        assert!((total_return(&[100.0, 110.0, 120.0]) - 0.2).abs() < EPS);
        assert_eq!(total_return(&[100.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
        assert_eq!(total_return(&[0.0, 10.0]), 0.0);
    }

    #[test]
    fn pct_change_length_and_values() {
        let r = pct_change(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.1).abs() < EPS);
        assert!((r[1] + 0.1).abs() < EPS);
        assert!(pct_change(&[5.0]).is_empty());
    }

    #[test]
    fn sharpe_zero_for_flat_equity() {
        assert_eq!(sharpe_ratio(&[100.0; 10]), 0.0);
    }

    #[test]
    fn sharpe_positive_for_rising_noisy_equity() {
        let eq = [100.0, 101.0, 101.5, 103.0, 103.2, 105.0];
        assert!(sharpe_ratio(&eq) > 0.0);
    }

    #[test]
    fn max_drawdown_is_negative_fraction() {
        let dd = max_drawdown(&[100.0, 120.0, 90.0, 130.0]);
        assert!((dd + 0.25).abs() < EPS);
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn win_rate_and_profit_factor() {
        let pnls = [10.0, -5.0, 3.0, -1.0];
        assert!((win_rate(&pnls) - 0.5).abs() < EPS);
        assert!((profit_factor(&pnls) - 13.0 / 6.0).abs() < EPS);
        assert_eq!(profit_factor(&[1.0]), 100.0);
        assert_eq!(win_rate(&[]), 0.0);
    }

    #[test]
    fn std_dev_uses_sample_denominator() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&v) - (32.0_f64 / 7.0).sqrt()).abs() < EPS);
    }
}
