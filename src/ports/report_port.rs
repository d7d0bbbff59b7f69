//! Profile writer port: persists a run's trace and metrics summary.

use std::path::Path;

use crate::domain::backtest::BacktestRun;
use crate::domain::error::NewstraderError;
use crate::domain::metrics::MetricsReport;

pub trait ProfileWriterPort {
    fn write_profile(
        &self,
        run: &BacktestRun,
        report: &MetricsReport,
        output_path: &Path,
    ) -> Result<(), NewstraderError>;
}
