//! Domain error types.
//!
//! Three layers: [`Rejection`] is local to a single trade action and never
//! stops a run, [`BacktestError`] is fatal to a run, and [`NewstraderError`]
//! covers everything the adapters and CLI can hit.

use chrono::NaiveDate;

use super::security::Security;

/// Why the ledger refused a single trade action. Recorded and skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("insufficient funds: need {required:.2}, have {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("insufficient position: requested {requested}, held {held}")]
    InsufficientPosition { requested: u64, held: i64 },

    #[error("no quote resolvable for {0}")]
    NoQuote(Security),

    #[error("resolved quantity is zero")]
    ZeroQuantity,

    #[error("invalid order size: {0}")]
    InvalidSize(String),
}

/// Fatal backtest failures. A run that hits one of these ends in `FAILED`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BacktestError {
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("no price data for any security between {start} and {end}")]
    NoPriceData { start: NaiveDate, end: NaiveDate },

    #[error("data gap: no resolvable price for {security} on {date}")]
    DataGap { security: Security, date: NaiveDate },

    #[error(
        "strategy contract violation: {strategy} requested data dated {requested} while simulating {current}"
    )]
    StrategyContractViolation {
        strategy: String,
        requested: NaiveDate,
        current: NaiveDate,
    },
}

impl BacktestError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        BacktestError::Configuration {
            reason: reason.into(),
        }
    }
}

/// Top-level error type for newstrader.
#[derive(Debug, thiserror::Error)]
pub enum NewstraderError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {security}")]
    NoData { security: String },

    #[error(transparent)]
    Backtest(#[from] BacktestError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NewstraderError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        NewstraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(section: &str, key: &str) -> Self {
        NewstraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&NewstraderError> for std::process::ExitCode {
    fn from(err: &NewstraderError) -> Self {
        let code: u8 = match err {
            NewstraderError::Io(_) | NewstraderError::Csv(_) => 1,
            NewstraderError::ConfigParse { .. }
            | NewstraderError::ConfigMissing { .. }
            | NewstraderError::ConfigInvalid { .. }
            | NewstraderError::Backtest(BacktestError::Configuration { .. }) => 2,
            NewstraderError::Data { .. } => 3,
            NewstraderError::NoData { .. }
            | NewstraderError::Backtest(BacktestError::NoPriceData { .. })
            | NewstraderError::Backtest(BacktestError::DataGap { .. }) => 5,
            NewstraderError::Backtest(BacktestError::StrategyContractViolation { .. }) => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_messages() {
        let r = Rejection::InsufficientFunds {
            required: 1010.0,
            available: 1000.0,
        };
        assert_eq!(
            r.to_string(),
            "insufficient funds: need 1010.00, have 1000.00"
        );

        let r = Rejection::InsufficientPosition {
            requested: 10,
            held: 0,
        };
        assert_eq!(r.to_string(), "insufficient position: requested 10, held 0");
    }

    #[test]
    fn data_gap_names_security_and_date() {
        let err = BacktestError::DataGap {
            security: Security::from("AAPL"),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "data gap: no resolvable price for AAPL on 2024-03-01"
        );
    }

    #[test]
    fn backtest_error_converts_into_top_level() {
        let err: NewstraderError = BacktestError::configuration("start after end").into();
        assert_eq!(err.to_string(), "configuration error: start after end");
    }

    fn code(err: &NewstraderError) -> String {
        format!("{:?}", std::process::ExitCode::from(err))
    }

    fn expected(code: u8) -> String {
        format!("{:?}", std::process::ExitCode::from(code))
    }

    #[test]
    fn exit_codes_by_category() {

        let cfg = NewstraderError::missing("backtest", "start_date");
        assert_eq!(code(&cfg), expected(2));

        let gap = NewstraderError::Backtest(BacktestError::DataGap {
            security: Security::from("X"),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        });
        assert_eq!(code(&gap), expected(5));

        let violation = NewstraderError::Backtest(BacktestError::StrategyContractViolation {
            strategy: "peek".into(),
            requested: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            current: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        });
        assert_eq!(code(&violation), expected(6));
    }
}
