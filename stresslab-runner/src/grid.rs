//! Parameter grid: named value lists, their cartesian product, and
//! pairwise ordering constraints.
//!
//! Combinations are enumerated lexicographically over the order parameters
//! were added, with the last parameter varying fastest. Combinations that
//! violate a constraint are dropped before any evaluation happens.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stresslab_core::{ParamSet, ParamValue};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("parameter grid is empty")]
    EmptyGrid,

    #[error("parameter '{0}' has no values")]
    EmptyValues(String),

    #[error("parameter '{0}' appears more than once")]
    DuplicateParameter(String),

    #[error("constraint references unknown parameter '{0}'")]
    UnknownConstraintParameter(String),

    #[error("constraint on '{0}' requires numeric values")]
    NonNumericConstraint(String),

    #[error("progress interval must be at least 1")]
    ZeroProgressInterval,
}

/// One named parameter and the values to try.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Pairwise constraint between two numeric parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Keep only combinations where `left < right`.
    LessThan { left: String, right: String },
}

impl Constraint {
    fn names(&self) -> [&str; 2] {
        match self {
            Constraint::LessThan { left, right } => [left.as_str(), right.as_str()],
        }
    }

    fn holds(&self, combo: &ParamSet) -> bool {
        match self {
            Constraint::LessThan { left, right } => {
                match (
                    combo.get(left).and_then(ParamValue::as_f64),
                    combo.get(right).and_then(ParamValue::as_f64),
                ) {
                    (Some(l), Some(r)) => l < r,
                    _ => false,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    #[serde(default)]
    pub parameters: Vec<ParamRange>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter; its position fixes its place in enumeration order.
    pub fn param<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.parameters.push(ParamRange {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn less_than(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.constraints.push(Constraint::LessThan {
            left: left.into(),
            right: right.into(),
        });
        self
    }

    /// The dual moving-average grid used by the default validation run:
    /// fast {5, 8, 10, 12} × slow {15, 20, 25, 30} × leverage {1, 2}.
    pub fn dual_ma_default() -> Self {
        Self::new()
            .param("fast_period", [5, 8, 10, 12])
            .param("slow_period", [15, 20, 25, 30])
            .param("leverage", [1, 2])
            .less_than("fast_period", "slow_period")
    }

    /// Size of the unconstrained cartesian product.
    pub fn size(&self) -> usize {
        if self.parameters.is_empty() {
            return 0;
        }
        self.parameters.iter().map(|p| p.values.len()).product()
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.parameters.is_empty() {
            return Err(ConfigurationError::EmptyGrid);
        }
        for (i, p) in self.parameters.iter().enumerate() {
            if p.values.is_empty() {
                return Err(ConfigurationError::EmptyValues(p.name.clone()));
            }
            if self.parameters[..i].iter().any(|q| q.name == p.name) {
                return Err(ConfigurationError::DuplicateParameter(p.name.clone()));
            }
        }
        for c in &self.constraints {
            for name in c.names() {
                let range = self
                    .parameters
                    .iter()
                    .find(|p| p.name == name)
                    .ok_or_else(|| ConfigurationError::UnknownConstraintParameter(name.to_string()))?;
                if range.values.iter().any(|v| v.as_f64().is_none()) {
                    return Err(ConfigurationError::NonNumericConstraint(name.to_string()));
                }
            }
        }
        Ok(())
    }

    /// All constraint-satisfying combinations in enumeration order.
    pub fn combinations(&self) -> Result<Vec<ParamSet>, ConfigurationError> {
        self.validate()?;
        let mut out = Vec::new();
        let mut idx = vec![0usize; self.parameters.len()];
        loop {
            let combo: ParamSet = self
                .parameters
                .iter()
                .zip(&idx)
                .map(|(p, &i)| (p.name.clone(), p.values[i].clone()))
                .collect();
            if self.constraints.iter().all(|c| c.holds(&combo)) {
                out.push(combo);
            }

            // Odometer step: last position turns fastest.
            let mut pos = idx.len();
            loop {
                if pos == 0 {
                    return Ok(out);
                }
                pos -= 1;
                idx[pos] += 1;
                if idx[pos] < self.parameters[pos].values.len() {
                    break;
                }
                idx[pos] = 0;
            }
        }
    }
}
