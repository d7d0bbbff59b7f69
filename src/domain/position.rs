//! Position tracking and fill records.

use chrono::NaiveDate;

use super::action::Direction;
use super::security::Security;

/// A holding owned by the ledger. Negative quantity is a short and only
/// appears when short selling is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub security: Security,
    pub quantity: i64,
    pub average_cost: f64,
    /// Last price the position was marked at.
    pub last_price: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    /// Signed: shorts contribute negative value.
    pub fn market_value(&self) -> f64 {
        self.quantity as f64 * self.last_price
    }
}

/// One executed trade.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub date: NaiveDate,
    pub security: Security,
    pub direction: Direction,
    pub quantity: u64,
    pub price: f64,
    pub fee: f64,
    /// Set when the fill reduced an existing position.
    pub realized_pnl: Option<f64>,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.quantity as f64 * self.price
    }
}
