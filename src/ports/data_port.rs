//! Market data and signal source ports.
//!
//! Absent data is an empty result, never a default value.

use chrono::NaiveDate;

use crate::domain::error::NewstraderError;
use crate::domain::price_bar::PriceBar;
use crate::domain::security::Security;
use crate::domain::signal::Signal;

pub trait MarketDataPort {
    /// Bars for `security` dated within `[start_date, end_date]`, sorted by
    /// date. A security with no data yields an empty vector.
    fn fetch_bars(
        &self,
        security: &Security,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, NewstraderError>;

    fn list_securities(&self) -> Result<Vec<Security>, NewstraderError>;

    /// First date, last date and bar count, or `None` without data.
    fn data_range(
        &self,
        security: &Security,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, NewstraderError>;
}

/// Producer of per-security, per-date signals. The sentiment model behind it
/// is opaque to the engine.
pub trait SignalPort {
    fn fetch_signals(
        &self,
        securities: &[Security],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Signal>, NewstraderError>;
}
