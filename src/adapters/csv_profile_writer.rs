//! CSV profile writer.
//!
//! Given `out/run.csv` it writes three files:
//! - `out/run.csv`: one row per trace state (`date,cash,total_value,positions`)
//! - `out/run_metrics.csv`: `metric,strategy,baseline` rows
//! - `out/run_skipped.csv`: every rejected action with its reason

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::backtest::BacktestRun;
use crate::domain::error::NewstraderError;
use crate::domain::metrics::{Metrics, MetricsReport};
use crate::domain::portfolio::PortfolioState;
use crate::ports::report_port::ProfileWriterPort;

#[derive(Debug, Default)]
pub struct CsvProfileWriter;

impl CsvProfileWriter {
    pub fn new() -> Self {
        CsvProfileWriter
    }

    /// Sibling of `output_path` named `<stem>_<suffix>.csv`.
    pub fn companion_path(output_path: &Path, suffix: &str) -> PathBuf {
        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "profile".to_string());
        output_path.with_file_name(format!("{stem}_{suffix}.csv"))
    }

    fn write_trace(&self, trace: &[PortfolioState], path: &Path) -> Result<(), NewstraderError> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["date", "cash", "total_value", "positions"])?;
        for state in trace {
            wtr.write_record([
                state.date.to_string(),
                format!("{:.2}", state.cash),
                format!("{:.2}", state.total_value),
                format_positions(state),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_metrics(&self, report: &MetricsReport, path: &Path) -> Result<(), NewstraderError> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["metric", report.strategy.as_str(), "baseline"])?;
        let baseline = report.baseline.as_ref();
        for (name, value) in metric_rows(&report.metrics) {
            let base = baseline
                .and_then(|b| metric_rows(b).into_iter().find(|(n, _)| *n == name))
                .map(|(_, v)| v)
                .unwrap_or_default();
            wtr.write_record([name, value.as_str(), base.as_str()])?;
        }
        if let Some(excess) = report.excess_return {
            wtr.write_record(["excess_return", format!("{excess:.6}").as_str(), ""])?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_skipped(&self, run: &BacktestRun, path: &Path) -> Result<(), NewstraderError> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["date", "action", "reason"])?;
        for skipped in &run.skipped {
            wtr.write_record([
                skipped.date.to_string(),
                skipped.action.to_string(),
                skipped.reason.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl ProfileWriterPort for CsvProfileWriter {
    fn write_profile(
        &self,
        run: &BacktestRun,
        report: &MetricsReport,
        output_path: &Path,
    ) -> Result<(), NewstraderError> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        self.write_trace(&run.trace, output_path)?;
        self.write_metrics(report, &Self::companion_path(output_path, "metrics"))?;
        self.write_skipped(run, &Self::companion_path(output_path, "skipped"))?;
        Ok(())
    }
}

/// `AAPL:10;MSFT:-3`, in security order.
fn format_positions(state: &PortfolioState) -> String {
    state
        .positions
        .values()
        .map(|p| format!("{}:{}", p.security, p.quantity))
        .collect::<Vec<_>>()
        .join(";")
}

fn metric_rows(m: &Metrics) -> Vec<(&'static str, String)> {
    vec![
        ("total_return", format!("{:.6}", m.total_return)),
        ("annualized_return", format!("{:.6}", m.annualized_return)),
        ("sharpe_ratio", format!("{:.4}", m.sharpe_ratio)),
        ("sortino_ratio", format!("{:.4}", m.sortino_ratio)),
        ("max_drawdown", format!("{:.6}", m.max_drawdown)),
        ("max_drawdown_duration", m.max_drawdown_duration.to_string()),
        ("final_value", format!("{:.2}", m.final_value)),
        ("total_fills", m.total_fills.to_string()),
        ("closed_trades", m.closed_trades().to_string()),
        ("win_rate", format!("{:.4}", m.win_rate)),
        ("profit_factor", format!("{:.4}", m.profit_factor)),
        ("total_fees", format!("{:.2}", m.total_fees)),
    ]
}
