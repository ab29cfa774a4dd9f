//! Stress tester: one fixed parameterization evaluated on every scenario.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use stresslab_core::{ParamSet, Scenario};

use crate::dispatch::map_units;
use crate::evaluate::{EvaluationContext, EvaluationFailure, EvaluationResult, Evaluator};

/// Per-scenario outcomes.
///
/// `results` has exactly the input's key set; a failed scenario maps to
/// `None` and its failure is kept in `failures`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StressOutcome {
    pub parameters: Option<ParamSet>,
    pub results: BTreeMap<String, Option<EvaluationResult>>,
    pub failures: Vec<EvaluationFailure>,
}

impl StressOutcome {
    pub fn passed(&self) -> usize {
        self.results.values().filter(|r| r.is_some()).count()
    }
}

#[derive(Debug, Clone)]
pub struct StressTester {
    evaluator: Evaluator,
    parallel: bool,
}

impl StressTester {
    pub fn new(evaluator: Evaluator) -> Self {
        Self {
            evaluator,
            parallel: false,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Evaluate `params` (or the strategy defaults) once per scenario.
    pub fn run(
        &self,
        scenarios: &BTreeMap<String, Scenario>,
        params: Option<&ParamSet>,
    ) -> StressOutcome {
        info!(
            strategy = self.evaluator.strategy_name(),
            scenarios = scenarios.len(),
            "starting stress test"
        );
        let named: Vec<(&String, &Scenario)> = scenarios.iter().collect();
        let outcomes = map_units(&named, self.parallel, |_, (name, scenario)| {
            self.evaluator.evaluate(
                &scenario.series,
                params,
                EvaluationContext::Scenario {
                    name: (*name).clone(),
                },
            )
        });

        let mut outcome = StressOutcome {
            parameters: params.cloned(),
            ..StressOutcome::default()
        };
        for ((name, _), result) in named.into_iter().zip(outcomes) {
            match result {
                Ok(r) => {
                    outcome.results.insert(name.clone(), Some(r));
                }
                Err(f) => {
                    outcome.results.insert(name.clone(), None);
                    outcome.failures.push(f);
                }
            }
        }
        info!(
            passed = outcome.passed(),
            failed = outcome.failures.len(),
            "stress test finished"
        );
        outcome
    }
}
