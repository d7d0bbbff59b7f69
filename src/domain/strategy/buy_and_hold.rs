//! Buy-and-hold baseline.

use crate::domain::action::{OrderSize, TradeAction};
use crate::domain::error::BacktestError;
use crate::domain::security::Security;

use super::{DecisionContext, Strategy};

/// Splits starting cash equally across `basket` on the first date and never
/// trades again. Members without a quote on the first date stay in cash.
#[derive(Debug, Clone, PartialEq)]
pub struct BuyAndHoldStrategy {
    pub basket: Vec<Security>,
}

impl BuyAndHoldStrategy {
    pub fn new(basket: Vec<Security>) -> Self {
        BuyAndHoldStrategy { basket }
    }
}

impl Strategy for BuyAndHoldStrategy {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn decide(&self, ctx: &DecisionContext<'_>) -> Vec<TradeAction> {
        if ctx.step() > 0 || self.basket.is_empty() {
            return Vec::new();
        }
        let share = ctx.state.cash / self.basket.len() as f64;
        self.basket
            .iter()
            .filter(|s| ctx.market.quote(s.as_str()).is_some())
            .map(|s| TradeAction::buy(s.clone(), OrderSize::Notional(share)))
            .collect()
    }

    fn validate(&self) -> Result<(), BacktestError> {
        if self.basket.is_empty() {
            return Err(BacktestError::configuration(
                "buy-and-hold basket must not be empty",
            ));
        }
        Ok(())
    }
}
