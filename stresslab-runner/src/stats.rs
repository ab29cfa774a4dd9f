//! Distribution statistics over populations of evaluation metrics.

use serde::{Deserialize, Serialize};

/// Summary of one metric across many evaluations.
///
/// Only finite values enter the summary. The standard deviation is the
/// population form (divide by n), and percentiles interpolate linearly
/// between order statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    /// 2.5th percentile, lower bound of the 95% interval.
    pub p2_5: f64,
    /// 97.5th percentile, upper bound of the 95% interval.
    pub p97_5: f64,
}

impl DistributionSummary {
    /// Summarize the finite values of `values`. `None` when there are none.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            count: sorted.len(),
            mean,
            std_dev: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median: percentile_sorted(&sorted, 50.0),
            p2_5: percentile_sorted(&sorted, 2.5),
            p97_5: percentile_sorted(&sorted, 97.5),
        })
    }

    /// The (p2.5, p97.5) interval.
    pub fn ci_95(&self) -> (f64, f64) {
        (self.p2_5, self.p97_5)
    }
}

/// Linear-interpolation percentile of an ascending slice; `p` in [0, 100].
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// Least-squares slope of `ys` against their index 0, 1, 2, ...
///
/// `None` for fewer than two points.
pub fn least_squares_slope(ys: &[f64]) -> Option<f64> {
    if ys.len() < 2 {
        return None;
    }
    let n = ys.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = ys.iter().sum::<f64>() / n;
    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn summary_of_one_to_five() {
        let s = DistributionSummary::from_values(&[5.0, 1.0, 3.0, 2.0, 4.0]).unwrap();
        assert_eq!(s.count, 5);
        assert_eq!(s.mean, 3.0);
        assert_eq!(s.median, 3.0);
        assert_eq!((s.min, s.max), (1.0, 5.0));
        assert!((s.std_dev - 2.0_f64.sqrt()).abs() < EPS);
        assert!((s.p2_5 - 1.1).abs() < EPS);
        assert!((s.p97_5 - 4.9).abs() < EPS);
    }

    #[test]
    fn interval_brackets_mean() {
        let values: Vec<f64> = (0..50).map(|i| ((i * 37) % 17) as f64 - 8.0).collect();
        let s = DistributionSummary::from_values(&values).unwrap();
        let (lo, hi) = s.ci_95();
        assert!(lo <= s.mean && s.mean <= hi);
    }

    #[test]
    fn non_finite_values_are_ignored() {
        let s = DistributionSummary::from_values(&[1.0, f64::NAN, 3.0, f64::INFINITY]).unwrap();
        assert_eq!(s.count, 2);
        assert_eq!(s.mean, 2.0);
        assert!(DistributionSummary::from_values(&[f64::NAN]).is_none());
        assert!(DistributionSummary::from_values(&[]).is_none());
    }

    #[test]
    fn single_value_summary() {
        let s = DistributionSummary::from_values(&[0.7]).unwrap();
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.ci_95(), (0.7, 0.7));
    }

    #[test]
    fn percentile_endpoints() {
        let v = [1.0, 2.0, 3.0];
        assert_eq!(percentile_sorted(&v, 0.0), 1.0);
        assert_eq!(percentile_sorted(&v, 100.0), 3.0);
        assert_eq!(percentile_sorted(&v, 50.0), 2.0);
        assert_eq!(percentile_sorted(&[], 50.0), 0.0);
    }

    #[test]
    fn slope_of_line_and_flat() {
        assert!((least_squares_slope(&[1.0, 3.0, 5.0, 7.0]).unwrap() - 2.0).abs() < EPS);
        assert_eq!(least_squares_slope(&[2.0, 2.0, 2.0]), Some(0.0));
        assert_eq!(least_squares_slope(&[1.0]), None);
    }
}
