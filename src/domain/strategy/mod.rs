//! Strategy interface and the market view strategies decide against.
//!
//! A strategy is a pure function of its [`DecisionContext`]. The context only
//! exposes data dated at or before the simulated date: history slices are
//! truncated by the engine, and explicit dated lookups past the date are
//! refused and remembered so the engine can fail the run.

pub mod buy_and_hold;
pub mod threshold;
pub mod top_k;

pub use buy_and_hold::BuyAndHoldStrategy;
pub use threshold::ThresholdStrategy;
pub use top_k::TopKStrategy;

use chrono::NaiveDate;
use std::cell::Cell;

use super::action::TradeAction;
use super::error::BacktestError;
use super::ledger::Quotes;
use super::market_data::{LookbackPolicy, MarketData, SignalBook};
use super::portfolio::PortfolioState;
use super::price_bar::PriceBar;
use super::security::Security;
use super::signal::Signal;

pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Desired trades for `ctx.date`. Must be deterministic in its inputs.
    fn decide(&self, ctx: &DecisionContext<'_>) -> Vec<TradeAction>;

    /// Parameter checks run before a backtest starts.
    fn validate(&self) -> Result<(), BacktestError> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name()).finish()
    }
}

pub struct DecisionContext<'a> {
    pub date: NaiveDate,
    /// States recorded for earlier dates, oldest first.
    pub history: &'a [PortfolioState],
    /// Portfolio entering this date.
    pub state: &'a PortfolioState,
    pub market: &'a MarketView<'a>,
}

impl DecisionContext<'_> {
    /// Zero-based index of the current date in the calendar.
    pub fn step(&self) -> usize {
        self.history.len()
    }
}

/// Read-only window onto prices and signals, bounded by the simulated date.
pub struct MarketView<'a> {
    date: NaiveDate,
    lookback: LookbackPolicy,
    securities: &'a [Security],
    market: &'a MarketData,
    signals: &'a SignalBook,
    quotes: &'a Quotes,
    breach: Cell<Option<NaiveDate>>,
}

impl<'a> MarketView<'a> {
    pub fn new(
        date: NaiveDate,
        lookback: LookbackPolicy,
        securities: &'a [Security],
        market: &'a MarketData,
        signals: &'a SignalBook,
        quotes: &'a Quotes,
    ) -> Self {
        MarketView {
            date,
            lookback,
            securities,
            market,
            signals,
            quotes,
            breach: Cell::new(None),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Configured securities in sorted order.
    pub fn securities(&self) -> &'a [Security] {
        self.securities
    }

    /// Bar resolved for the current date under the lookback policy.
    pub fn quote(&self, security: &str) -> Option<&'a PriceBar> {
        self.quotes.get(security)
    }

    /// Signal resolved for the current date under the lookback policy.
    pub fn signal(&self, security: &str) -> Option<&'a Signal> {
        self.signals.resolve(security, self.date, self.lookback)
    }

    pub fn price_history(&self, security: &str) -> &'a [PriceBar] {
        self.market.until(security, self.date)
    }

    pub fn signal_history(&self, security: &str) -> &'a [Signal] {
        self.signals.until(security, self.date)
    }

    /// Bar dated exactly `date`. Asking for a date after the simulated one
    /// returns `None` and marks the view as breached.
    pub fn price_on(&self, security: &str, date: NaiveDate) -> Option<&'a PriceBar> {
        if self.refuse_future(date) {
            return None;
        }
        self.market.on(security, date)
    }

    pub fn signal_on(&self, security: &str, date: NaiveDate) -> Option<&'a Signal> {
        if self.refuse_future(date) {
            return None;
        }
        self.signals.on(security, date)
    }

    /// Latest future date a strategy asked for, if any.
    pub fn breach(&self) -> Option<NaiveDate> {
        self.breach.get()
    }

    fn refuse_future(&self, date: NaiveDate) -> bool {
        if date <= self.date {
            return false;
        }
        if self.breach.get().is_none_or(|seen| date > seen) {
            self.breach.set(Some(date));
        }
        true
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn view_hides_future_history() {
        let market = MarketData::new(vec![bar("X", 1, 10.0), bar("X", 2, 11.0), bar("X", 3, 12.0)]);
        let signals = SignalBook::new(vec![signal("X", 1, 0.1), signal("X", 3, 0.9)]);
        let secs = vec![Security::from("X")];
        let quotes = quotes_on(&market, &secs, 2);
        let view = MarketView::new(d(2), LookbackPolicy::Exact, &secs, &market, &signals, &quotes);

        assert_eq!(view.price_history("X").len(), 2);
        assert_eq!(view.signal_history("X").len(), 1);
        assert!(view.signal("X").is_none());
        assert!((view.quote("X").unwrap().close - 11.0).abs() < f64::EPSILON);
        assert!(view.breach().is_none());
    }

    #[test]
    fn dated_lookup_past_today_is_refused_and_recorded() {
        let market = MarketData::new(vec![bar("X", 1, 10.0), bar("X", 3, 12.0)]);
        let signals = SignalBook::empty();
        let secs = vec![Security::from("X")];
        let quotes = Quotes::new();
        let view = MarketView::new(d(1), LookbackPolicy::Exact, &secs, &market, &signals, &quotes);

        assert!(view.price_on("X", d(1)).is_some());
        assert!(view.breach().is_none());
        assert!(view.price_on("X", d(3)).is_none());
        assert!(view.signal_on("X", d(2)).is_none());
        assert_eq!(view.breach(), Some(d(3)));
    }

    #[test]
    fn signal_respects_lookback() {
        let market = MarketData::empty();
        let signals = SignalBook::new(vec![signal("X", 1, 0.4)]);
        let secs = vec![Security::from("X")];
        let quotes = Quotes::new();
        let view = MarketView::new(
            d(3),
            LookbackPolicy::MostRecentWithin { days: 2 },
            &secs,
            &market,
            &signals,
            &quotes,
        );
        assert!((view.signal("X").unwrap().score() - 0.4).abs() < f64::EPSILON);
    }
}
