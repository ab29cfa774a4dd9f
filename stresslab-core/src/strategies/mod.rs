//! Reference strategies and the name → factory registry.
//!
//! These implement the collaborator traits exactly as an external strategy
//! would, so every validation stage can run end to end without one.

pub mod buy_and_hold;
pub mod dual_ma;

pub use buy_and_hold::{BuyAndHold, BuyAndHoldFactory};
pub use dual_ma::{DualMa, DualMaFactory, DualMaParams};

use crate::params::ParamSet;
use crate::strategy::{StrategyError, StrategyFactory};
use std::collections::BTreeMap;
use std::sync::Arc;

/// All built-in factories keyed by name.
pub fn registry() -> BTreeMap<&'static str, Arc<dyn StrategyFactory>> {
    let mut map: BTreeMap<&'static str, Arc<dyn StrategyFactory>> = BTreeMap::new();
    map.insert(dual_ma::NAME, Arc::new(DualMaFactory));
    map.insert(buy_and_hold::NAME, Arc::new(BuyAndHoldFactory));
    map
}

/// Look up a built-in factory by name.
pub fn factory(name: &str) -> Option<Arc<dyn StrategyFactory>> {
    registry().remove(name)
}

// ─── Parameter parsing helpers ───────────────────────────────────────

fn reject_unknown(params: &ParamSet, known: &[&str]) -> Result<(), StrategyError> {
    match params.iter().find(|(name, _)| !known.contains(&name.as_str())) {
        Some((name, _)) => Err(StrategyError::InvalidParams {
            name: name.clone(),
            reason: format!("unknown parameter (expected one of {})", known.join(", ")),
        }),
        None => Ok(()),
    }
}

fn read_usize(params: &ParamSet, name: &str, default: usize) -> Result<usize, StrategyError> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => v.as_usize().ok_or_else(|| StrategyError::InvalidParams {
            name: name.to_string(),
            reason: format!("expected a non-negative integer, got {v}"),
        }),
    }
}

fn read_f64(params: &ParamSet, name: &str, default: f64) -> Result<f64, StrategyError> {
    match params.get(name) {
        None => Ok(default),
        Some(v) => v
            .as_f64()
            .filter(|x| x.is_finite())
            .ok_or_else(|| StrategyError::InvalidParams {
                name: name.to_string(),
                reason: format!("expected a finite number, got {v}"),
            }),
    }
}
