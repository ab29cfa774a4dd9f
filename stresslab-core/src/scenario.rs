//! Scenario generator: synthetic OHLCV series under named market regimes.
//!
//! Closes follow a multiplicative random walk
//! `price[t] = max(price[t-1] * (1 + r[t]), floor)` where
//!
//! ```text
//! r[t] = drift
//!      - k * (price[t-1] - center) / center     (mean reversion, optional)
//!      + N(0, volatility)
//!      + A * sin(t / P)                         (cycle, optional)
//! ```
//!
//! Once the closes exist each bar is dressed with an open/high/low envelope
//! and a log-normal volume (see [`BarShape`]). All randomness comes from one
//! `StdRng` seeded per call, so the same regime, bar count and seed always
//! produce a bit-identical series.

use crate::bar::{Bar, Series, SeriesError};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, LogNormal, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    #[error("scenario needs at least one bar")]
    ZeroBars,

    #[error("initial price must be positive and finite, got {0}")]
    InvalidInitialPrice(f64),

    #[error("price floor {floor} must be non-negative and not above the initial price {initial}")]
    InvalidFloor { floor: f64, initial: f64 },

    #[error("regime {regime}: {field} must be {expected}, got {value}")]
    InvalidRegimeParam {
        regime: Regime,
        field: &'static str,
        expected: &'static str,
        value: f64,
    },

    #[error("daily_vol must lie in [0, 1), got {0}")]
    InvalidDailyVol(f64),

    #[error("volume distribution parameters invalid: mu={mu}, sigma={sigma}")]
    InvalidVolume { mu: f64, sigma: f64 },

    #[error("bar interval must be between 1 second and 366 days, got {0}s")]
    InvalidInterval(u64),

    #[error("timestamp overflow after {0} bars")]
    TimestampOverflow(usize),

    #[error(transparent)]
    Series(#[from] SeriesError),
}

// ─── Regimes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    TrendingUp,
    TrendingDown,
    Sideways,
    HighVolatility,
    LowVolatility,
}

impl Regime {
    pub const ALL: [Regime; 5] = [
        Regime::TrendingUp,
        Regime::TrendingDown,
        Regime::Sideways,
        Regime::HighVolatility,
        Regime::LowVolatility,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Regime::TrendingUp => "trending_up",
            Regime::TrendingDown => "trending_down",
            Regime::Sideways => "sideways",
            Regime::HighVolatility => "high_volatility",
            Regime::LowVolatility => "low_volatility",
        }
    }

    /// Name of this regime's entry in the standard scenario set.
    pub fn scenario_name(&self) -> &'static str {
        match self {
            Regime::TrendingUp => "bull_market",
            Regime::TrendingDown => "bear_market",
            Regime::Sideways => "sideways_market",
            Regime::HighVolatility => "high_volatility",
            Regime::LowVolatility => "low_volatility",
        }
    }

    pub fn default_params(&self) -> RegimeParams {
        match self {
            Regime::TrendingUp => RegimeParams::trending(0.001, 0.02),
            Regime::TrendingDown => RegimeParams::trending(-0.001, 0.025),
            Regime::Sideways => RegimeParams {
                drift: 0.0,
                volatility: 0.02,
                mean_reversion: Some(0.001),
                cycle: None,
            },
            Regime::HighVolatility => RegimeParams::trending(0.0002, 0.05),
            Regime::LowVolatility => RegimeParams::trending(0.0001, 0.01),
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sinusoidal component `amplitude * sin(t / period)` added to each return.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub amplitude: f64,
    pub period: f64,
}

impl Default for Cycle {
    fn default() -> Self {
        Self {
            amplitude: 0.0005,
            period: 20.0,
        }
    }
}

/// Stochastic parameters of one regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeParams {
    /// Per-bar drift added to every return.
    pub drift: f64,
    /// Standard deviation of the Gaussian shock.
    pub volatility: f64,
    /// Pull strength `k` toward the initial price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_reversion: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<Cycle>,
}

impl RegimeParams {
    /// Drift + noise + default cycle, no mean reversion.
    pub fn trending(drift: f64, volatility: f64) -> Self {
        Self {
            drift,
            volatility,
            mean_reversion: None,
            cycle: Some(Cycle::default()),
        }
    }

    fn validate(&self, regime: Regime) -> Result<(), ScenarioError> {
        let bad = |field, expected, value| ScenarioError::InvalidRegimeParam {
            regime,
            field,
            expected,
            value,
        };
        if !self.drift.is_finite() {
            return Err(bad("drift", "finite", self.drift));
        }
        if !self.volatility.is_finite() || self.volatility < 0.0 {
            return Err(bad("volatility", "finite and non-negative", self.volatility));
        }
        if let Some(k) = self.mean_reversion {
            if !k.is_finite() {
                return Err(bad("mean_reversion", "finite", k));
            }
        }
        if let Some(c) = self.cycle {
            if !c.amplitude.is_finite() {
                return Err(bad("cycle.amplitude", "finite", c.amplitude));
            }
            if !c.period.is_finite() || c.period <= 0.0 {
                return Err(bad("cycle.period", "positive", c.period));
            }
        }
        Ok(())
    }
}

/// Per-regime parameter table; each entry defaults to the regime's defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeTable {
    pub trending_up: RegimeParams,
    pub trending_down: RegimeParams,
    pub sideways: RegimeParams,
    pub high_volatility: RegimeParams,
    pub low_volatility: RegimeParams,
}

impl Default for RegimeTable {
    fn default() -> Self {
        Self {
            trending_up: Regime::TrendingUp.default_params(),
            trending_down: Regime::TrendingDown.default_params(),
            sideways: Regime::Sideways.default_params(),
            high_volatility: Regime::HighVolatility.default_params(),
            low_volatility: Regime::LowVolatility.default_params(),
        }
    }
}

impl RegimeTable {
    pub fn get(&self, regime: Regime) -> &RegimeParams {
        match regime {
            Regime::TrendingUp => &self.trending_up,
            Regime::TrendingDown => &self.trending_down,
            Regime::Sideways => &self.sideways,
            Regime::HighVolatility => &self.high_volatility,
            Regime::LowVolatility => &self.low_volatility,
        }
    }
}

// ─── Bar dressing ────────────────────────────────────────────────────

/// Lower bound on `open / close`. Keeps opens positive for any accepted
/// `daily_vol`, so the low envelope stays below the open.
pub const MIN_OPEN_FACTOR: f64 = 0.01;

/// How a close price is dressed into a full bar.
///
/// `open = close * max(1 + N(0, daily_vol / 3), MIN_OPEN_FACTOR)`,
/// `high = max(open, close) * (1 + U(0, daily_vol))`,
/// `low = min(open, close) * (1 - U(0, daily_vol))`,
/// `volume ~ LogNormal(volume_mu, volume_sigma)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarShape {
    /// Envelope scale (default 0.015).
    pub daily_vol: f64,
    /// Mean of log volume (default 15.0).
    pub volume_mu: f64,
    /// Std dev of log volume (default 0.5).
    pub volume_sigma: f64,
}

impl Default for BarShape {
    fn default() -> Self {
        Self {
            daily_vol: 0.015,
            volume_mu: 15.0,
            volume_sigma: 0.5,
        }
    }
}

impl BarShape {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !self.daily_vol.is_finite() || !(0.0..1.0).contains(&self.daily_vol) {
            return Err(ScenarioError::InvalidDailyVol(self.daily_vol));
        }
        if !self.volume_mu.is_finite() || !self.volume_sigma.is_finite() || self.volume_sigma < 0.0
        {
            return Err(ScenarioError::InvalidVolume {
                mu: self.volume_mu,
                sigma: self.volume_sigma,
            });
        }
        Ok(())
    }

    /// Build the distributions used for dressing.
    pub fn sampler(&self) -> Result<BarSampler, ScenarioError> {
        self.validate()?;
        let open_noise = Normal::new(0.0, self.daily_vol / 3.0)
            .map_err(|_| ScenarioError::InvalidDailyVol(self.daily_vol))?;
        let volume = LogNormal::new(self.volume_mu, self.volume_sigma).map_err(|_| {
            ScenarioError::InvalidVolume {
                mu: self.volume_mu,
                sigma: self.volume_sigma,
            }
        })?;
        Ok(BarSampler {
            daily_vol: self.daily_vol,
            open_noise,
            volume,
        })
    }
}

/// Ready-to-draw form of a [`BarShape`].
#[derive(Debug, Clone, Copy)]
pub struct BarSampler {
    daily_vol: f64,
    open_noise: Normal<f64>,
    volume: LogNormal<f64>,
}

impl BarSampler {
    /// Draw `(open, high, low)` around `close`.
    pub fn envelope<R: Rng + ?Sized>(&self, close: f64, rng: &mut R) -> (f64, f64, f64) {
        let open = close * (1.0 + self.open_noise.sample(rng)).max(MIN_OPEN_FACTOR);
        let high = open.max(close) * (1.0 + rng.gen::<f64>() * self.daily_vol);
        let low = open.min(close) * (1.0 - rng.gen::<f64>() * self.daily_vol);
        (open, high, low)
    }

    pub fn volume<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.volume.sample(rng)
    }

    /// Dress closes into bars with freshly drawn volumes.
    pub fn dress<R: Rng + ?Sized>(
        &self,
        closes: &[f64],
        timestamps: &[NaiveDateTime],
        rng: &mut R,
    ) -> Vec<Bar> {
        closes
            .iter()
            .zip(timestamps)
            .map(|(&close, &timestamp)| {
                let (open, high, low) = self.envelope(close, rng);
                Bar {
                    timestamp,
                    open,
                    high,
                    low,
                    close,
                    volume: self.volume(rng),
                }
            })
            .collect()
    }
}

// ─── Configuration ───────────────────────────────────────────────────

fn default_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

const MAX_INTERVAL_SECS: u64 = 366 * 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Seed used when the caller does not pass one (default 42).
    pub seed: u64,
    /// First close of every series (default 50 000).
    pub initial_price: f64,
    /// Lowest close the walk may reach (default 1 000).
    pub price_floor: f64,
    /// Timestamp of the first bar (default 2023-01-01T00:00:00).
    pub start: NaiveDateTime,
    /// Seconds between bars (default 86 400).
    pub interval_secs: u64,
    pub bar_shape: BarShape,
    pub regimes: RegimeTable,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            initial_price: 50_000.0,
            price_floor: 1_000.0,
            start: default_start(),
            interval_secs: 86_400,
            bar_shape: BarShape::default(),
            regimes: RegimeTable::default(),
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !self.initial_price.is_finite() || self.initial_price <= 0.0 {
            return Err(ScenarioError::InvalidInitialPrice(self.initial_price));
        }
        if !self.price_floor.is_finite()
            || self.price_floor < 0.0
            || self.price_floor > self.initial_price
        {
            return Err(ScenarioError::InvalidFloor {
                floor: self.price_floor,
                initial: self.initial_price,
            });
        }
        if self.interval_secs == 0 || self.interval_secs > MAX_INTERVAL_SECS {
            return Err(ScenarioError::InvalidInterval(self.interval_secs));
        }
        self.bar_shape.validate()?;
        for regime in Regime::ALL {
            self.regimes.get(regime).validate(regime)?;
        }
        Ok(())
    }
}

// ─── Scenario ────────────────────────────────────────────────────────

/// A named, generated series. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub regime: Regime,
    pub params: RegimeParams,
    pub seed: u64,
    pub series: Series,
}

// ─── Generator ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ScenarioGenerator {
    config: ScenarioConfig,
    sampler: BarSampler,
}

impl ScenarioGenerator {
    pub fn new(config: ScenarioConfig) -> Result<Self, ScenarioError> {
        config.validate()?;
        let sampler = config.bar_shape.sampler()?;
        Ok(Self { config, sampler })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Generate `bars` bars of `regime` with the configured seed.
    pub fn generate(&self, regime: Regime, bars: usize) -> Result<Scenario, ScenarioError> {
        self.generate_with_seed(regime, bars, self.config.seed)
    }

    pub fn generate_with_seed(
        &self,
        regime: Regime,
        bars: usize,
        seed: u64,
    ) -> Result<Scenario, ScenarioError> {
        let params = *self.config.regimes.get(regime);
        self.generate_custom(regime.scenario_name(), regime, params, bars, seed)
    }

    /// Generate with explicit regime parameters, bypassing the table.
    pub fn generate_custom(
        &self,
        name: &str,
        regime: Regime,
        params: RegimeParams,
        bars: usize,
        seed: u64,
    ) -> Result<Scenario, ScenarioError> {
        if bars == 0 {
            return Err(ScenarioError::ZeroBars);
        }
        params.validate(regime)?;
        let noise = Normal::new(0.0, params.volatility).map_err(|_| {
            ScenarioError::InvalidRegimeParam {
                regime,
                field: "volatility",
                expected: "finite and non-negative",
                value: params.volatility,
            }
        })?;

        let mut rng = StdRng::seed_from_u64(seed);
        let closes = self.walk(&params, &noise, bars, &mut rng);
        let timestamps = self.timestamps(bars)?;
        let series = Series::new(self.sampler.dress(&closes, &timestamps, &mut rng))?;

        Ok(Scenario {
            name: name.to_string(),
            regime,
            params,
            seed,
            series,
        })
    }

    /// The five standard scenarios keyed by scenario name, all on the
    /// configured seed.
    pub fn standard_set(&self, bars: usize) -> Result<BTreeMap<String, Scenario>, ScenarioError> {
        Regime::ALL
            .iter()
            .map(|&regime| {
                let scenario = self.generate(regime, bars)?;
                Ok((scenario.name.clone(), scenario))
            })
            .collect()
    }

    fn walk(&self, params: &RegimeParams, noise: &Normal<f64>, bars: usize, rng: &mut StdRng) -> Vec<f64> {
        let center = self.config.initial_price;
        let floor = self.config.price_floor;
        let mut closes = Vec::with_capacity(bars);
        let mut price = center;
        closes.push(price);
        for t in 0..bars - 1 {
            let mut r = params.drift;
            if let Some(k) = params.mean_reversion {
                r -= k * (price - center) / center;
            }
            r += noise.sample(rng);
            if let Some(c) = params.cycle {
                r += c.amplitude * (t as f64 / c.period).sin();
            }
            price = (price * (1.0 + r)).max(floor);
            closes.push(price);
        }
        closes
    }

    fn timestamps(&self, bars: usize) -> Result<Vec<NaiveDateTime>, ScenarioError> {
        let step = Duration::seconds(self.config.interval_secs as i64);
        let mut out = Vec::with_capacity(bars);
        let mut ts = self.config.start;
        out.push(ts);
        for i in 1..bars {
            ts = ts
                .checked_add_signed(step)
                .ok_or(ScenarioError::TimestampOverflow(i))?;
            out.push(ts);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> ScenarioGenerator {
        ScenarioGenerator::new(ScenarioConfig::default()).unwrap()
    }

    // ─── Determinism ─────────────────────────────────────────────────

    #[test]
    fn same_seed_is_bit_identical() {
        let g = generator();
        let a = g.generate(Regime::TrendingUp, 250).unwrap();
        let b = g.generate(Regime::TrendingUp, 250).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let g = generator();
        let a = g.generate_with_seed(Regime::Sideways, 100, 1).unwrap();
        let b = g.generate_with_seed(Regime::Sideways, 100, 2).unwrap();
        assert_ne!(a.series, b.series);
    }

    // ─── Shape ───────────────────────────────────────────────────────

    #[test]
    fn series_has_requested_length_and_daily_steps() {
        let s = generator().generate(Regime::Sideways, 30).unwrap();
        assert_eq!(s.series.len(), 30);
        assert_eq!(s.series.first_close(), Some(50_000.0));
        let bars = s.series.bars();
        for w in bars.windows(2) {
            assert_eq!(w[1].timestamp - w[0].timestamp, Duration::days(1));
        }
        assert_eq!(bars[0].timestamp, default_start());
    }

    #[test]
    fn every_bar_is_sane() {
        let g = generator();
        for regime in Regime::ALL {
            let s = g.generate(regime, 300).unwrap();
            assert!(s.series.bars().iter().all(Bar::is_sane), "{regime}");
        }
    }

    #[test]
    fn wide_daily_vol_keeps_opens_positive() {
        let mut config = ScenarioConfig::default();
        config.bar_shape.daily_vol = 0.9;
        let g = ScenarioGenerator::new(config).unwrap();
        for seed in 0..20 {
            let s = g.generate_with_seed(Regime::LowVolatility, 2_000, seed).unwrap();
            for bar in s.series.bars() {
                assert!(bar.open > 0.0, "seed {seed}: {bar:?}");
                assert!(bar.low <= bar.open.min(bar.close), "seed {seed}: {bar:?}");
                assert!(bar.high >= bar.open.max(bar.close), "seed {seed}: {bar:?}");
            }
        }
    }

    #[test]
    fn floor_holds_under_crash_regime() {
        let config = ScenarioConfig {
            initial_price: 1_200.0,
            ..ScenarioConfig::default()
        };
        let g = ScenarioGenerator::new(config).unwrap();
        let crash = RegimeParams::trending(-0.05, 0.03);
        let s = g
            .generate_custom("crash", Regime::TrendingDown, crash, 200, 7)
            .unwrap();
        let closes = s.series.closes();
        assert!(closes.iter().all(|&c| c >= 1_000.0));
        assert!(closes.iter().any(|&c| c == 1_000.0));
    }

    #[test]
    fn single_bar_series() {
        let s = generator().generate(Regime::LowVolatility, 1).unwrap();
        assert_eq!(s.series.len(), 1);
        assert_eq!(s.series.first_close(), Some(50_000.0));
    }

    #[test]
    fn zero_volatility_trend_is_deterministic_in_closes() {
        let params = RegimeParams {
            drift: 0.01,
            volatility: 0.0,
            mean_reversion: None,
            cycle: None,
        };
        let s = generator()
            .generate_custom("flat_trend", Regime::TrendingUp, params, 3, 0)
            .unwrap();
        let closes = s.series.closes();
        assert!((closes[1] - 50_500.0).abs() < 1e-9);
        assert!((closes[2] - 51_005.0).abs() < 1e-9);
    }

    // ─── Standard set ────────────────────────────────────────────────

    #[test]
    fn standard_set_names() {
        let set = generator().standard_set(50).unwrap();
        let names: Vec<&str> = set.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec![
                "bear_market",
                "bull_market",
                "high_volatility",
                "low_volatility",
                "sideways_market"
            ]
        );
        assert_eq!(set["bull_market"].regime, Regime::TrendingUp);
        assert!(set.values().all(|s| s.seed == 42));
    }

    // ─── Errors ──────────────────────────────────────────────────────

    #[test]
    fn zero_bars_rejected() {
        assert_eq!(
            generator().generate(Regime::Sideways, 0).unwrap_err(),
            ScenarioError::ZeroBars
        );
    }

    #[test]
    fn invalid_config_rejected() {
        let bad_price = ScenarioConfig {
            initial_price: 0.0,
            ..ScenarioConfig::default()
        };
        assert!(matches!(
            ScenarioGenerator::new(bad_price),
            Err(ScenarioError::InvalidInitialPrice(_))
        ));

        let bad_floor = ScenarioConfig {
            price_floor: 60_000.0,
            ..ScenarioConfig::default()
        };
        assert!(matches!(
            ScenarioGenerator::new(bad_floor),
            Err(ScenarioError::InvalidFloor { .. })
        ));

        let mut bad_vol = ScenarioConfig::default();
        bad_vol.regimes.high_volatility.volatility = -0.1;
        assert!(matches!(
            ScenarioGenerator::new(bad_vol),
            Err(ScenarioError::InvalidRegimeParam {
                regime: Regime::HighVolatility,
                ..
            })
        ));

        let mut bad_shape = ScenarioConfig::default();
        bad_shape.bar_shape.daily_vol = 1.5;
        assert!(matches!(
            ScenarioGenerator::new(bad_shape),
            Err(ScenarioError::InvalidDailyVol(_))
        ));
    }
}
