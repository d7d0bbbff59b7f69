//! CSV file data adapter.
//!
//! Prices live one file per security, `<prices_dir>/<SECURITY>.csv`, with at
//! least `date`, `open` and `close` columns (others are ignored). Signals
//! live in a single file with `date`, `security` and `value` columns, where
//! `value` is a number or one of BUY, HOLD, SELL.

use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::domain::error::NewstraderError;
use crate::domain::price_bar::PriceBar;
use crate::domain::security::Security;
use crate::domain::signal::{Signal, SignalValue};
use crate::ports::data_port::{MarketDataPort, SignalPort};

pub struct CsvAdapter {
    prices_dir: PathBuf,
    signals_file: Option<PathBuf>,
}

impl CsvAdapter {
    pub fn new(prices_dir: PathBuf) -> Self {
        Self {
            prices_dir,
            signals_file: None,
        }
    }

    pub fn with_signals(mut self, signals_file: PathBuf) -> Self {
        self.signals_file = Some(signals_file);
        self
    }

    fn csv_path(&self, security: &Security) -> PathBuf {
        self.prices_dir.join(format!("{security}.csv"))
    }

    fn read_bars(&self, security: &Security) -> Result<Vec<PriceBar>, NewstraderError> {
        let path = self.csv_path(security);
        let Some(content) = read_optional(&path)? else {
            return Ok(Vec::new());
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers()?.clone();
        let date_col = column(&headers, "date", &path)?;
        let open_col = column(&headers, "open", &path)?;
        let close_col = column(&headers, "close", &path)?;

        let mut bars = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result?;
            let date = parse_date(field(&record, date_col, "date", &path, line)?, &path, line)?;
            let open = field(&record, open_col, "open", &path, line)?;
            let open = parse_price(open, "open", &path, line)?;
            let close = field(&record, close_col, "close", &path, line)?;
            let close = parse_price(close, "close", &path, line)?;
            bars.push(PriceBar {
                security: security.clone(),
                date,
                open,
                close,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

impl MarketDataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        security: &Security,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, NewstraderError> {
        let mut bars = self.read_bars(security)?;
        bars.retain(|b| b.date >= start_date && b.date <= end_date);
        Ok(bars)
    }

    fn list_securities(&self) -> Result<Vec<Security>, NewstraderError> {
        let entries = fs::read_dir(&self.prices_dir).map_err(|e| NewstraderError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.prices_dir.display(),
                e
            ),
        })?;

        let mut securities = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    securities.push(Security::from(stem.to_string_lossy().as_ref()));
                }
            }
        }

        securities.sort();
        Ok(securities)
    }

    fn data_range(
        &self,
        security: &Security,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, NewstraderError> {
        let bars = self.read_bars(security)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}

impl SignalPort for CsvAdapter {
    fn fetch_signals(
        &self,
        securities: &[Security],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Signal>, NewstraderError> {
        let Some(path) = &self.signals_file else {
            return Ok(Vec::new());
        };
        let Some(content) = read_optional(path)? else {
            return Ok(Vec::new());
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers()?.clone();
        let date_col = column(&headers, "date", path)?;
        let security_col = column(&headers, "security", path)?;
        let value_col = column(&headers, "value", path)?;

        let mut signals = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result?;

            let date = parse_date(field(&record, date_col, "date", path, line)?, path, line)?;
            if date < start_date || date > end_date {
                continue;
            }
            let security = Security::from(field(&record, security_col, "security", path, line)?);
            if !securities.contains(&security) {
                continue;
            }
            let raw = field(&record, value_col, "value", path, line)?;
            let value: SignalValue = raw.parse().map_err(|e| NewstraderError::Data {
                reason: format!("{}: row {}: {}", path.display(), line + 2, e),
            })?;
            signals.push(Signal {
                security,
                date,
                value,
            });
        }
        Ok(signals)
    }
}

/// File contents, or `None` when the file does not exist.
fn read_optional(path: &Path) -> Result<Option<String>, NewstraderError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(NewstraderError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        }),
    }
}

fn column(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize, NewstraderError> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| NewstraderError::Data {
            reason: format!("{}: missing {name} column", path.display()),
        })
}

fn field<'r>(
    record: &'r csv::StringRecord,
    col: usize,
    name: &str,
    path: &Path,
    line: usize,
) -> Result<&'r str, NewstraderError> {
    record
        .get(col)
        .map(str::trim)
        .ok_or_else(|| NewstraderError::Data {
            reason: format!("{}: row {} missing {name}", path.display(), line + 2),
        })
}

fn parse_date(raw: &str, path: &Path, line: usize) -> Result<NaiveDate, NewstraderError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| NewstraderError::Data {
        reason: format!(
            "{}: row {}: invalid date '{raw}': {e}",
            path.display(),
            line + 2
        ),
    })
}

fn parse_price(raw: &str, name: &str, path: &Path, line: usize) -> Result<f64, NewstraderError> {
    raw.parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or_else(|| NewstraderError::Data {
            reason: format!(
                "{}: row {}: invalid {name} value '{raw}'",
                path.display(),
                line + 2
            ),
        })
}
