//! Trade actions emitted by strategies.

use std::fmt;

use super::security::Security;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => f.write_str("BUY"),
            Direction::Sell => f.write_str("SELL"),
        }
    }
}

/// How much to trade. The ledger resolves every variant to whole shares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderSize {
    /// Exact share count.
    Quantity(u64),
    /// Cash amount to spend or raise, fees included.
    Notional(f64),
    /// Fraction of the portfolio's total value the holding should reach.
    TargetWeight(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeAction {
    pub security: Security,
    pub direction: Direction,
    pub size: OrderSize,
}

impl TradeAction {
    pub fn buy(security: impl Into<Security>, size: OrderSize) -> Self {
        TradeAction {
            security: security.into(),
            direction: Direction::Buy,
            size,
        }
    }

    pub fn sell(security: impl Into<Security>, size: OrderSize) -> Self {
        TradeAction {
            security: security.into(),
            direction: Direction::Sell,
            size,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size {
            OrderSize::Quantity(q) => write!(f, "{} {} x{}", self.direction, self.security, q),
            OrderSize::Notional(n) => write!(f, "{} {} ${:.2}", self.direction, self.security, n),
            OrderSize::TargetWeight(w) => {
                write!(f, "{} {} to {:.1}%", self.direction, self.security, w * 100.0)
            }
        }
    }
}
