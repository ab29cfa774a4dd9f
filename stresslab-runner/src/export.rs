//! Export: JSON, CSV and Markdown artifacts for a validation run.
//!
//! Every persisted report carries `schema_version`; newer versions are
//! rejected on load.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use stresslab_core::Series;

use crate::evaluate::{EvaluationContext, EvaluationResult};
use crate::monte_carlo::MonteCarloOutcome;
use crate::pipeline::ValidationRun;
use crate::report::{AggregateReport, SCHEMA_VERSION};
use crate::sweep::SweepOutcome;
use crate::walk_forward::WalkForwardOutcome;

pub const REPORT_JSON: &str = "report.json";
pub const REPORT_MARKDOWN: &str = "report.md";
pub const SWEEP_CSV: &str = "sweep.csv";
pub const MONTE_CARLO_CSV: &str = "monte_carlo.csv";
pub const WALK_FORWARD_CSV: &str = "walk_forward.csv";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize an `AggregateReport` to pretty JSON.
pub fn export_json(report: &AggregateReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize AggregateReport to JSON")
}

/// Deserialize an `AggregateReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<AggregateReport> {
    let report: AggregateReport =
        serde_json::from_str(json).context("failed to deserialize AggregateReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn metric_cells(r: Option<&EvaluationResult>) -> [String; 4] {
    match r {
        Some(r) => [
            format!("{:.6}", r.total_return),
            format!("{:.6}", r.sharpe_ratio),
            format!("{:.6}", r.max_drawdown),
            format!("{:.6}", r.win_rate),
        ],
        None => Default::default(),
    }
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per attempted combination.
///
/// Columns: index, one column per parameter name (union over the sweep,
/// sorted), status, total_return, sharpe_ratio, max_drawdown, win_rate, error
pub fn export_sweep_csv(sweep: &SweepOutcome) -> Result<String> {
    let names: BTreeSet<&str> = sweep
        .entries
        .iter()
        .flat_map(|e| e.parameters.iter().map(|(k, _)| k.as_str()))
        .collect();

    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["index".to_string()];
    header.extend(names.iter().map(|n| n.to_string()));
    header.extend(
        ["status", "total_return", "sharpe_ratio", "max_drawdown", "win_rate", "error"]
            .map(String::from),
    );
    wtr.write_record(&header)?;

    for e in &sweep.entries {
        let mut row = vec![e.index.to_string()];
        row.extend(
            names
                .iter()
                .map(|n| e.parameters.get(n).map(|v| v.to_string()).unwrap_or_default()),
        );
        row.push(if e.is_failure() { "failed" } else { "ok" }.to_string());
        row.extend(metric_cells(e.result()));
        row.push(
            e.outcome
                .as_ref()
                .err()
                .map(|f| f.to_string())
                .unwrap_or_default(),
        );
        wtr.write_record(&row)?;
    }
    finish(wtr)
}

/// One row per simulation, successful or not, in simulation order. The
/// `total_return` column is the return distribution behind the report's
/// Monte Carlo section.
pub fn export_monte_carlo_csv(mc: &MonteCarloOutcome) -> Result<String> {
    let mut rows: Vec<(&EvaluationContext, Option<&EvaluationResult>, String)> = mc
        .results
        .iter()
        .map(|r| (&r.context, Some(r), String::new()))
        .chain(mc.failures.iter().map(|f| (&f.context, None, f.message.clone())))
        .collect();
    rows.sort_by_key(|(ctx, _, _)| match ctx {
        EvaluationContext::Simulation { index, .. } => *index,
        _ => usize::MAX,
    });

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "simulation",
        "seed",
        "status",
        "total_return",
        "sharpe_ratio",
        "max_drawdown",
        "win_rate",
        "error",
    ])?;
    for (ctx, result, error) in rows {
        let EvaluationContext::Simulation { index, seed } = ctx else {
            continue;
        };
        let status = if result.is_some() { "ok" } else { "failed" };
        let [ret, sharpe, mdd, win] = metric_cells(result);
        wtr.write_record([
            &index.to_string(),
            &seed.to_string(),
            &status.to_string(),
            &ret,
            &sharpe,
            &mdd,
            &win,
            &error,
        ])?;
    }
    finish(wtr)
}

/// One row per planned window, successful or not, in window order.
pub fn export_walk_forward_csv(wf: &WalkForwardOutcome) -> Result<String> {
    let mut rows: Vec<(&EvaluationContext, Option<&EvaluationResult>, &str)> = wf
        .results
        .iter()
        .map(|r| (&r.context, Some(r), "ok"))
        .chain(wf.failures.iter().map(|f| (&f.context, None, "failed")))
        .collect();
    rows.sort_by_key(|(ctx, _, _)| match ctx {
        EvaluationContext::Window { index, .. } => *index,
        _ => usize::MAX,
    });

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "window",
        "start_offset",
        "end_offset",
        "start",
        "end",
        "status",
        "total_return",
        "sharpe_ratio",
        "max_drawdown",
        "win_rate",
    ])?;
    for (ctx, result, status) in rows {
        let EvaluationContext::Window {
            index,
            start_offset,
            end_offset,
            start,
            end,
        } = ctx
        else {
            continue;
        };
        let [ret, sharpe, mdd, win] = metric_cells(result);
        wtr.write_record([
            &index.to_string(),
            &start_offset.to_string(),
            &end_offset.to_string(),
            &start.to_string(),
            &end.to_string(),
            &status.to_string(),
            &ret,
            &sharpe,
            &mdd,
            &win,
        ])?;
    }
    finish(wtr)
}

/// Export bars as CSV: timestamp, open, high, low, close, volume.
pub fn export_series_csv(series: &Series) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for b in series.bars() {
        wtr.write_record([
            &b.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            &format!("{:.6}", b.open),
            &format!("{:.6}", b.high),
            &format!("{:.6}", b.low),
            &format!("{:.6}", b.close),
            &format!("{:.2}", b.volume),
        ])?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write a run's artifacts into `output_dir`, creating it if needed:
/// - `report.json`: the full `AggregateReport`
/// - `report.md`: Markdown rendering
/// - `sweep.csv`: per-combination outcomes (when the sweep ran)
/// - `monte_carlo.csv`: per-simulation outcomes (when Monte Carlo ran)
/// - `walk_forward.csv`: per-window outcomes (when walk-forward ran)
///
/// Returns the paths written.
pub fn save_artifacts(run: &ValidationRun, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create artifact dir: {}", output_dir.display()))?;

    let mut files = vec![
        (REPORT_JSON, export_json(&run.report)?),
        (REPORT_MARKDOWN, run.report.to_markdown()),
    ];
    if let Some(sweep) = &run.sweep {
        files.push((SWEEP_CSV, export_sweep_csv(sweep)?));
    }
    if let Some(mc) = &run.monte_carlo {
        files.push((MONTE_CARLO_CSV, export_monte_carlo_csv(mc)?));
    }
    if let Some(wf) = &run.walk_forward {
        files.push((WALK_FORWARD_CSV, export_walk_forward_csv(wf)?));
    }

    let mut written = Vec::with_capacity(files.len());
    for (name, contents) in files {
        let path = output_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Load the report from an artifact directory's `report.json`.
pub fn load_report(dir: &Path) -> Result<AggregateReport> {
    let path = dir.join(REPORT_JSON);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportInputs;
    use crate::evaluate::test_support::ScriptedFactory;
    use crate::monte_carlo::{MonteCarloConfig, MonteCarloSimulator};
    use crate::walk_forward::{WalkForwardAnalyzer, WalkForwardConfig};
    use stresslab_core::ParamSet;
    use crate::{Evaluator, ParamGrid, SweepConfig, SweepOptimizer};
    use std::sync::Arc;
    use stresslab_core::scenario::{Regime, ScenarioConfig, ScenarioGenerator};
    use stresslab_core::strategies::DualMaFactory;

    fn series(bars: usize) -> Series {
        ScenarioGenerator::new(ScenarioConfig::default())
            .unwrap()
            .generate(Regime::Sideways, bars)
            .unwrap()
            .series
    }

    fn sweep() -> SweepOutcome {
        let grid = ParamGrid::new()
            .param("fast_period", [5, 40])
            .param("slow_period", [20]);
        SweepOptimizer::new(Evaluator::new(Arc::new(DualMaFactory)), SweepConfig::default())
            .run(&grid, &series(100))
            .unwrap()
    }

    #[test]
    fn json_rejects_newer_schema() {
        let mut report = AggregateReport::synthesize("dual_ma", ReportInputs::default());
        let json = export_json(&report).unwrap();
        assert_eq!(import_json(&json).unwrap(), report);

        report.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&report).unwrap();
        let err = import_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn sweep_csv_has_parameter_columns_and_failures() {
        // fast 40 >= slow 20 is rejected by the strategy.
        let csv = export_sweep_csv(&sweep()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "index,fast_period,slow_period,status,total_return,sharpe_ratio,max_drawdown,win_rate,error"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("0,5,20,ok,"));
        assert!(lines[2].starts_with("1,40,20,failed,,,,,"));
    }

    #[test]
    fn walk_forward_csv_rows_follow_windows() {
        let wf = WalkForwardAnalyzer::new(
            Evaluator::new(Arc::new(DualMaFactory)),
            WalkForwardConfig {
                window_size: 50,
                step_size: 25,
                parallel: false,
            },
        )
        .run(&series(100), None)
        .unwrap();
        let csv = export_walk_forward_csv(&wf).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 1 + 3);
        assert!(lines[1].starts_with("0,0,50,"));
        assert!(lines[3].starts_with("2,50,100,"));
    }

    fn monte_carlo(simulations: usize, params: Option<&ParamSet>) -> MonteCarloOutcome {
        MonteCarloSimulator::new(
            Evaluator::new(Arc::new(ScriptedFactory)),
            MonteCarloConfig {
                simulations,
                ..MonteCarloConfig::default()
            },
        )
        .run(&series(60), params)
        .unwrap()
    }

    #[test]
    fn monte_carlo_csv_one_row_per_simulation() {
        let mc = monte_carlo(6, None);
        let csv = export_monte_carlo_csv(&mc).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "simulation,seed,status,total_return,sharpe_ratio,max_drawdown,win_rate,error"
        );
        assert_eq!(lines.len(), 1 + 6);
        for (i, r) in mc.results.iter().enumerate() {
            let EvaluationContext::Simulation { index, seed } = &r.context else {
                panic!("unexpected context {:?}", r.context);
            };
            assert!(lines[i + 1].starts_with(&format!("{index},{seed},ok,")));
        }
    }

    #[test]
    fn monte_carlo_csv_keeps_failed_simulations() {
        let params = ParamSet::new().with("mode", "error");
        let mc = monte_carlo(3, Some(&params));
        let csv = export_monte_carlo_csv(&mc).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 1 + 3);
        assert!(lines[1].starts_with("0,"));
        assert!(lines[1].contains(",failed,,,,,"));
        assert!(lines[3].ends_with("scripted error"));
    }

    #[test]
    fn series_csv_one_row_per_bar() {
        let csv = export_series_csv(&series(10)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "timestamp,open,high,low,close,volume");
        assert_eq!(lines.len(), 11);
        assert!(lines[1].starts_with("2023-01-01 00:00:00,"));
    }
}
