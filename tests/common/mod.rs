#![allow(dead_code)]

use chrono::NaiveDate;
use newstrader::domain::backtest::BacktestConfig;
use newstrader::domain::calendar::CalendarSource;
use newstrader::domain::error::NewstraderError;
use newstrader::domain::ledger::FeeModel;
use newstrader::domain::market_data::{LookbackPolicy, MarketData, SignalBook};
use newstrader::domain::price_bar::{PriceBar, PriceField};
use newstrader::domain::security::Security;
use newstrader::domain::signal::{Signal, SignalValue};
use newstrader::ports::data_port::{MarketDataPort, SignalPort};
use std::collections::HashMap;

pub struct MockMarketDataPort {
    pub data: HashMap<Security, Vec<PriceBar>>,
    pub errors: HashMap<Security, String>,
}

impl MockMarketDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, security: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(Security::from(security), bars);
        self
    }

    pub fn with_error(mut self, security: &str, reason: &str) -> Self {
        self.errors
            .insert(Security::from(security), reason.to_string());
        self
    }

    pub fn market_data(&self) -> MarketData {
        MarketData::new(self.data.values().flatten().cloned().collect())
    }
}

impl MarketDataPort for MockMarketDataPort {
    fn fetch_bars(
        &self,
        security: &Security,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, NewstraderError> {
        if let Some(reason) = self.errors.get(security) {
            return Err(NewstraderError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(security)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_securities(&self) -> Result<Vec<Security>, NewstraderError> {
        let mut securities: Vec<Security> = self.data.keys().cloned().collect();
        securities.sort();
        Ok(securities)
    }

    fn data_range(
        &self,
        security: &Security,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, NewstraderError> {
        match self.data.get(security) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub struct MockSignalPort {
    pub signals: Vec<Signal>,
}

impl MockSignalPort {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self { signals }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn signal_book(&self) -> SignalBook {
        SignalBook::new(self.signals.clone())
    }
}

impl SignalPort for MockSignalPort {
    fn fetch_signals(
        &self,
        securities: &[Security],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Signal>, NewstraderError> {
        Ok(self
            .signals
            .iter()
            .filter(|s| securities.contains(&s.security))
            .filter(|s| s.date >= start_date && s.date <= end_date)
            .cloned()
            .collect())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// January 2024. The 1st is a Monday.
pub fn jan(day: u32) -> NaiveDate {
    date(2024, 1, day)
}

/// Bar with open equal to close.
pub fn make_bar(security: &str, day: NaiveDate, price: f64) -> PriceBar {
    PriceBar {
        security: Security::from(security),
        date: day,
        open: price,
        close: price,
    }
}

/// One bar per consecutive January day starting on the 1st.
pub fn bar_series(security: &str, prices: &[f64]) -> Vec<PriceBar> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &p)| make_bar(security, jan(i as u32 + 1), p))
        .collect()
}

pub fn make_signal(security: &str, day: NaiveDate, score: f64) -> Signal {
    Signal {
        security: Security::from(security),
        date: day,
        value: SignalValue::Score(score),
    }
}

pub fn securities(list: &[&str]) -> Vec<Security> {
    list.iter().map(|s| Security::from(*s)).collect()
}

pub fn sample_config(list: &[&str], start: NaiveDate, end: NaiveDate) -> BacktestConfig {
    BacktestConfig {
        start_date: start,
        end_date: end,
        starting_cash: 10_000.0,
        calendar: CalendarSource::MarketData,
        securities: securities(list),
        fee_model: FeeModel::default(),
        execution_price: PriceField::Close,
        lookback: LookbackPolicy::Exact,
        short_selling_allowed: false,
        risk_free_rate: 0.0,
        benchmark: None,
    }
}
