//! Portfolio snapshots.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::position::Position;
use super::security::Security;

/// Tolerance used when checking the cash + holdings == total_value identity.
pub const VALUE_TOLERANCE: f64 = 1e-6;

/// Portfolio at the end of one simulated date. Snapshots are values: the
/// ledger produces a new one per step and never edits an old one.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub date: NaiveDate,
    pub cash: f64,
    pub positions: BTreeMap<Security, Position>,
    pub total_value: f64,
}

impl PortfolioState {
    pub fn initial(date: NaiveDate, starting_cash: f64) -> Self {
        PortfolioState {
            date,
            cash: starting_cash,
            positions: BTreeMap::new(),
            total_value: starting_cash,
        }
    }

    pub fn position(&self, security: &str) -> Option<&Position> {
        self.positions.get(security)
    }

    /// Signed share count, zero when flat.
    pub fn quantity(&self, security: &str) -> i64 {
        self.position(security).map(|p| p.quantity).unwrap_or(0)
    }

    pub fn has_position(&self, security: &str) -> bool {
        self.quantity(security) != 0
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn holdings_value(&self) -> f64 {
        self.positions.values().map(Position::market_value).sum()
    }

    pub fn computed_value(&self) -> f64 {
        self.cash + self.holdings_value()
    }

    pub fn value_is_consistent(&self) -> bool {
        let scale = self.total_value.abs().max(1.0);
        (self.computed_value() - self.total_value).abs() <= VALUE_TOLERANCE * scale
    }

    /// Fraction of total value held in `security`.
    pub fn weight(&self, security: &str) -> f64 {
        if self.total_value <= 0.0 {
            return 0.0;
        }
        self.position(security)
            .map(|p| p.market_value() / self.total_value)
            .unwrap_or(0.0)
    }
}
