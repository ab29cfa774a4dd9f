//! Serializable validation-run configuration, loaded from TOML.
//!
//! Every section is optional; missing sections and fields take the defaults
//! below, which reproduce the standard dual moving-average run: 200 bars,
//! a fast × slow × leverage sweep on the sideways scenario, 50 Monte Carlo
//! simulations, and 50-bar walk-forward windows stepped by 10.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use stresslab_core::{Regime, ScenarioConfig, ScenarioError};

use crate::evaluate::DEFAULT_SYMBOL;
use crate::fitness::FitnessMetric;
use crate::grid::{ConfigurationError, Constraint, ParamGrid, ParamRange};
use crate::monte_carlo::MonteCarloConfig;
use crate::sweep::SweepConfig;
use crate::walk_forward::{WalkForwardConfig, WalkForwardError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("[scenarios] {0}")]
    Scenario(#[from] ScenarioError),

    #[error("[sweep] {0}")]
    Grid(#[from] ConfigurationError),

    #[error("[walk_forward] {0}")]
    WalkForward(#[from] WalkForwardError),

    #[error("[{section}] unknown scenario '{name}'")]
    UnknownScenario { section: &'static str, name: String },

    #[error("[run] bars must be at least 1")]
    ZeroBars,

    #[error("[{0}] progress_every must be at least 1")]
    ZeroProgressInterval(&'static str),
}

// ─── Sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Symbol handed to the strategy factory (default "BTCUSDT").
    pub symbol: String,
    /// Registered strategy name (default "dual_ma").
    pub strategy: String,
    /// Bars per generated scenario (default 200).
    pub bars: usize,
    /// Directory for report artifacts; nothing is written when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Also write one CSV per generated scenario (default false).
    pub write_scenarios: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            strategy: "dual_ma".to_string(),
            bars: 200,
            output_dir: None,
            write_scenarios: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    pub enabled: bool,
    /// Scenario the sweep runs on (default "sideways_market").
    pub scenario: String,
    pub metric: FitnessMetric,
    /// Default 10.
    pub progress_every: usize,
    pub parallel: bool,
    pub parameters: Vec<ParamRange>,
    pub constraints: Vec<Constraint>,
}

impl Default for SweepSettings {
    fn default() -> Self {
        let grid = ParamGrid::dual_ma_default();
        Self {
            enabled: true,
            scenario: Regime::Sideways.scenario_name().to_string(),
            metric: FitnessMetric::Sharpe,
            progress_every: 10,
            parallel: false,
            parameters: grid.parameters,
            constraints: grid.constraints,
        }
    }
}

impl SweepSettings {
    pub fn grid(&self) -> ParamGrid {
        ParamGrid {
            parameters: self.parameters.clone(),
            constraints: self.constraints.clone(),
        }
    }

    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            metric: self.metric,
            progress_every: self.progress_every,
            parallel: self.parallel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressSettings {
    pub enabled: bool,
    pub parallel: bool,
}

impl Default for StressSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloSettings {
    pub enabled: bool,
    /// Base scenario to resample (default "sideways_market").
    pub scenario: String,
    /// Default 50.
    pub simulations: usize,
    /// Default 42.
    pub seed: u64,
    /// Default 20.
    pub progress_every: usize,
    pub parallel: bool,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            scenario: Regime::Sideways.scenario_name().to_string(),
            simulations: 50,
            seed: 42,
            progress_every: 20,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardSettings {
    pub enabled: bool,
    /// Scenario the windows slide across (default "sideways_market").
    pub scenario: String,
    /// Default 50.
    pub window_size: usize,
    /// Default 10.
    pub step_size: usize,
    pub parallel: bool,
}

impl Default for WalkForwardSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            scenario: Regime::Sideways.scenario_name().to_string(),
            window_size: 50,
            step_size: 10,
            parallel: false,
        }
    }
}

impl WalkForwardSettings {
    pub fn walk_forward_config(&self) -> WalkForwardConfig {
        WalkForwardConfig {
            window_size: self.window_size,
            step_size: self.step_size,
            parallel: self.parallel,
        }
    }
}

// ─── Top level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub run: RunSettings,
    pub scenarios: ScenarioConfig,
    pub sweep: SweepSettings,
    pub stress: StressSettings,
    pub monte_carlo: MonteCarloSettings,
    pub walk_forward: WalkForwardSettings,
}

impl ValidationConfig {
    /// Parse and validate.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Turn rayon dispatch on or off for every stage.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.sweep.parallel = parallel;
        self.stress.parallel = parallel;
        self.monte_carlo.parallel = parallel;
        self.walk_forward.parallel = parallel;
        self
    }

    pub fn monte_carlo_config(&self) -> MonteCarloConfig {
        MonteCarloConfig {
            simulations: self.monte_carlo.simulations,
            seed: self.monte_carlo.seed,
            progress_every: self.monte_carlo.progress_every,
            parallel: self.monte_carlo.parallel,
            bar_shape: self.scenarios.bar_shape,
        }
    }

    /// Check every enabled section. Nothing is generated or evaluated here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.bars == 0 {
            return Err(ConfigError::ZeroBars);
        }
        self.scenarios.validate()?;

        if self.sweep.enabled {
            check_scenario("sweep", &self.sweep.scenario)?;
            if self.sweep.progress_every == 0 {
                return Err(ConfigError::ZeroProgressInterval("sweep"));
            }
            self.sweep.grid().validate()?;
        }
        if self.monte_carlo.enabled {
            check_scenario("monte_carlo", &self.monte_carlo.scenario)?;
            if self.monte_carlo.progress_every == 0 {
                return Err(ConfigError::ZeroProgressInterval("monte_carlo"));
            }
        }
        if self.walk_forward.enabled {
            check_scenario("walk_forward", &self.walk_forward.scenario)?;
            self.walk_forward.walk_forward_config().validate()?;
        }
        Ok(())
    }
}

fn check_scenario(section: &'static str, name: &str) -> Result<(), ConfigError> {
    if Regime::ALL.iter().any(|r| r.scenario_name() == name) {
        Ok(())
    } else {
        Err(ConfigError::UnknownScenario {
            section,
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stresslab_core::ParamValue;

    #[test]
    fn defaults_match_standard_run() {
        let c = ValidationConfig::default();
        assert_eq!(c.run.bars, 200);
        assert_eq!(c.run.strategy, "dual_ma");
        assert_eq!(c.sweep.scenario, "sideways_market");
        assert_eq!(c.sweep.grid().size(), 32);
        assert_eq!(c.monte_carlo.simulations, 50);
        assert_eq!((c.walk_forward.window_size, c.walk_forward.step_size), (50, 10));
        c.validate().unwrap();
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(
            ValidationConfig::from_toml_str("").unwrap(),
            ValidationConfig::default()
        );
    }

    #[test]
    fn default_round_trips_through_toml() {
        let c = ValidationConfig::default();
        let text = c.to_toml_string().unwrap();
        assert_eq!(ValidationConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn partial_sections_override_fields() {
        let c = ValidationConfig::from_toml_str(
            r#"
            [run]
            bars = 300

            [monte_carlo]
            simulations = 10
            scenario = "bull_market"

            [[sweep.parameters]]
            name = "fast_period"
            values = [3, 4]

            [[sweep.parameters]]
            name = "slow_period"
            values = [10]

            [[sweep.constraints]]
            kind = "less_than"
            left = "fast_period"
            right = "slow_period"
            "#,
        )
        .unwrap();
        assert_eq!(c.run.bars, 300);
        assert_eq!(c.run.symbol, "BTCUSDT");
        assert_eq!(c.monte_carlo.simulations, 10);
        assert_eq!(c.monte_carlo.seed, 42);
        assert_eq!(c.sweep.parameters.len(), 2);
        assert_eq!(c.sweep.parameters[0].values, vec![ParamValue::Int(3), ParamValue::Int(4)]);
        assert_eq!(c.sweep.grid().combinations().unwrap().len(), 2);
    }

    #[test]
    fn validation_errors() {
        let err = ValidationConfig::from_toml_str("[run]\nbars = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroBars));

        let err =
            ValidationConfig::from_toml_str("[walk_forward]\nscenario = \"moon\"").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownScenario { section: "walk_forward", .. }
        ));

        let err = ValidationConfig::from_toml_str("[walk_forward]\nstep_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::WalkForward(WalkForwardError::ZeroStep)));

        let err = ValidationConfig::from_toml_str("[sweep]\nparameters = []").unwrap_err();
        assert!(matches!(err, ConfigError::Grid(ConfigurationError::EmptyGrid)));

        let err = ValidationConfig::from_toml_str("[scenarios]\ninitial_price = -1.0").unwrap_err();
        assert!(matches!(err, ConfigError::Scenario(_)));

        assert!(matches!(
            ValidationConfig::from_toml_str("[run]\nbars = \"many\"").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn disabled_sections_are_not_checked() {
        let c = ValidationConfig::from_toml_str(
            "[walk_forward]\nenabled = false\nwindow_size = 0\n",
        )
        .unwrap();
        assert!(!c.walk_forward.enabled);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ValidationConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn parallelism_applies_to_every_stage() {
        let c = ValidationConfig::default().with_parallelism(true);
        assert!(c.sweep.parallel && c.stress.parallel);
        assert!(c.monte_carlo.parallel && c.walk_forward.parallel);
    }
}
