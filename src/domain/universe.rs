//! Security universe: parsing the configured list and loading its data.

use chrono::{Days, NaiveDate};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::domain::error::NewstraderError;
use crate::domain::market_data::{LookbackPolicy, MarketData, SignalBook};
use crate::domain::security::Security;
use crate::ports::data_port::{MarketDataPort, SignalPort};

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    /// Sorted, no duplicates.
    pub securities: Vec<Security>,
    pub benchmark: Option<Security>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in security list")]
    EmptyToken,

    #[error("duplicate security: {0}")]
    DuplicateSecurity(String),
}

/// Parse a comma-separated ticker list. Tickers are uppercased and returned
/// in sorted order.
pub fn parse_securities(input: &str) -> Result<Vec<Security>, UniverseError> {
    let mut securities = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let security = Security::from(trimmed);
        if !seen.insert(security.clone()) {
            return Err(UniverseError::DuplicateSecurity(security.to_string()));
        }
        securities.push(security);
    }

    securities.sort();
    Ok(securities)
}

/// First date whose data may be needed for a run starting at `start`.
pub fn data_window_start(start: NaiveDate, lookback: LookbackPolicy) -> NaiveDate {
    match lookback {
        LookbackPolicy::Exact => start,
        LookbackPolicy::MostRecentWithin { days } => start
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(start),
    }
}

impl Universe {
    pub fn new(securities: Vec<Security>, benchmark: Option<Security>) -> Self {
        Universe {
            securities,
            benchmark,
        }
    }

    pub fn count(&self) -> usize {
        self.securities.len()
    }

    /// Configured securities plus the benchmark, sorted.
    pub fn all(&self) -> Vec<Security> {
        let mut all = self.securities.clone();
        if let Some(benchmark) = &self.benchmark {
            if !all.contains(benchmark) {
                all.push(benchmark.clone());
                all.sort();
            }
        }
        all
    }

    /// Load bars for every security in `[start, end]`. Securities without
    /// bars are logged and left out; the engine rejects them as unknown.
    pub fn load_market_data(
        &self,
        port: &dyn MarketDataPort,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<MarketData, NewstraderError> {
        let mut bars = Vec::new();
        for security in self.all() {
            let fetched = port.fetch_bars(&security, start, end)?;
            if fetched.is_empty() {
                warn!(%security, %start, %end, "no price bars in range");
                continue;
            }
            info!(%security, bars = fetched.len(), "loaded price bars");
            bars.extend(fetched);
        }
        Ok(MarketData::new(bars))
    }

    pub fn load_signals(
        &self,
        port: &dyn SignalPort,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SignalBook, NewstraderError> {
        let signals = port.fetch_signals(&self.securities, start, end)?;
        info!(
            signals = signals.len(),
            securities = self.count(),
            "loaded signals"
        );
        Ok(SignalBook::new(signals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(list: &[&str]) -> Vec<Security> {
        list.iter().map(|s| Security::from(*s)).collect()
    }

    #[test]
    fn test_parse_securities_basic() {
        let result = parse_securities("MSFT,AAPL,GOOG").unwrap();
        assert_eq!(result, secs(&["AAPL", "GOOG", "MSFT"]));
    }

    #[test]
    fn test_parse_securities_with_whitespace_and_case() {
        let result = parse_securities("  msft , aapl ,Goog").unwrap();
        assert_eq!(result, secs(&["AAPL", "GOOG", "MSFT"]));
    }

    #[test]
    fn test_parse_securities_empty_token() {
        assert!(matches!(
            parse_securities("AAPL,,MSFT"),
            Err(UniverseError::EmptyToken)
        ));
        assert!(matches!(parse_securities(""), Err(UniverseError::EmptyToken)));
    }

    #[test]
    fn test_parse_securities_duplicate() {
        let result = parse_securities("AAPL,MSFT,aapl");
        assert!(matches!(result, Err(UniverseError::DuplicateSecurity(s)) if s == "AAPL"));
    }

    #[test]
    fn all_includes_benchmark_once() {
        let universe = Universe::new(secs(&["AAPL", "MSFT"]), Some(Security::from("SPY")));
        assert_eq!(universe.all(), secs(&["AAPL", "MSFT", "SPY"]));
        assert_eq!(universe.count(), 2);

        let universe = Universe::new(secs(&["AAPL", "SPY"]), Some(Security::from("SPY")));
        assert_eq!(universe.all(), secs(&["AAPL", "SPY"]));
    }

    #[test]
    fn window_start_reaches_back_for_lookback() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(data_window_start(start, LookbackPolicy::Exact), start);
        assert_eq!(
            data_window_start(start, LookbackPolicy::MostRecentWithin { days: 3 }),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()
        );
    }
}
