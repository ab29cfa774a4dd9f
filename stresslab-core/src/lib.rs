//! StressLab Core: market data types, scenario synthesis, metrics, and the
//! strategy collaborator interface.
//!
//! This crate holds everything a validation run consumes:
//! - Bars and timestamp-ordered series
//! - Deterministic seed derivation
//! - Regime-driven scenario generation and bar dressing
//! - Pure performance metrics
//! - Parameter values and sets
//! - `Strategy` / `StrategyFactory` traits plus two reference strategies

pub mod bar;
pub mod metrics;
pub mod params;
pub mod rng;
pub mod scenario;
pub mod strategies;
pub mod strategy;

pub use bar::{Bar, Series, SeriesError};
pub use params::{ParamSet, ParamValue};
pub use rng::RngHierarchy;
pub use scenario::{
    BarSampler, BarShape, Cycle, Regime, RegimeParams, RegimeTable, Scenario, ScenarioConfig,
    ScenarioError, ScenarioGenerator,
};
pub use strategy::{BacktestReport, Strategy, StrategyError, StrategyFactory};
