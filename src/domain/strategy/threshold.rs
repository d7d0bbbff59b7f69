//! Signal threshold strategy.

use crate::domain::action::{OrderSize, TradeAction};
use crate::domain::error::BacktestError;

use super::{DecisionContext, Strategy};

/// Enters a flat security when its signal reaches `buy_threshold` and exits
/// the whole holding when it falls to `sell_threshold`.
///
/// Each entry commits `position_size` of the cash not yet committed earlier
/// in the same step, walking securities in sorted order.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdStrategy {
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub position_size: f64,
}

impl Default for ThresholdStrategy {
    fn default() -> Self {
        ThresholdStrategy {
            buy_threshold: 0.5,
            sell_threshold: -0.5,
            position_size: 1.0,
        }
    }
}

impl Strategy for ThresholdStrategy {
    fn name(&self) -> &str {
        "threshold"
    }

    fn decide(&self, ctx: &DecisionContext<'_>) -> Vec<TradeAction> {
        let mut actions = Vec::new();
        let mut uncommitted = ctx.state.cash;

        for security in ctx.market.securities() {
            let Some(signal) = ctx.market.signal(security.as_str()) else {
                continue;
            };
            let score = signal.score();
            let held = ctx.state.quantity(security.as_str());

            if held > 0 && score <= self.sell_threshold {
                actions.push(TradeAction::sell(
                    security.clone(),
                    OrderSize::Quantity(held as u64),
                ));
            } else if !ctx.state.has_position(security.as_str())
                && score >= self.buy_threshold
                && ctx.market.quote(security.as_str()).is_some()
            {
                let notional = uncommitted * self.position_size;
                if notional <= 0.0 {
                    continue;
                }
                uncommitted -= notional;
                actions.push(TradeAction::buy(
                    security.clone(),
                    OrderSize::Notional(notional),
                ));
            }
        }
        actions
    }

    fn validate(&self) -> Result<(), BacktestError> {
        if !(self.buy_threshold.is_finite() && self.sell_threshold.is_finite()) {
            return Err(BacktestError::configuration("thresholds must be finite"));
        }
        if self.sell_threshold >= self.buy_threshold {
            return Err(BacktestError::configuration(
                "sell_threshold must be below buy_threshold",
            ));
        }
        if !(self.position_size > 0.0 && self.position_size <= 1.0) {
            return Err(BacktestError::configuration(
                "position_size must be in (0, 1]",
            ));
        }
        Ok(())
    }
}
