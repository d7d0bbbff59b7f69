//! Portfolio ledger: trade application with fee and spread rules.
//!
//! `apply` takes a snapshot and returns a new one; the input is never
//! touched. Each action either fills completely or is rejected with a
//! [`Rejection`]. Partial fills do not exist.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

use super::action::{Direction, OrderSize, TradeAction};
use super::error::Rejection;
use super::portfolio::PortfolioState;
use super::position::{Fill, Position};
use super::price_bar::{PriceBar, PriceField};
use super::security::Security;

/// Bars resolved for one simulated date, keyed by security.
pub type Quotes = BTreeMap<Security, PriceBar>;

/// Flat fee per fill plus a proportional spread that moves the execution
/// price against the trader.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeeModel {
    pub flat_fee: f64,
    pub spread_bps: f64,
}

impl FeeModel {
    /// Buy: price * (1 + bps / 10_000). Sell: price * (1 - bps / 10_000).
    pub fn execution_price(&self, direction: Direction, market_price: f64) -> f64 {
        let spread = self.spread_bps / 10_000.0;
        match direction {
            Direction::Buy => market_price * (1.0 + spread),
            Direction::Sell => market_price * (1.0 - spread),
        }
    }

    pub fn fee(&self) -> f64 {
        self.flat_fee
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LedgerConfig {
    pub fee_model: FeeModel,
    pub execution_price: PriceField,
    pub short_selling_allowed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerOutcome {
    pub state: PortfolioState,
    pub fills: Vec<Fill>,
    pub rejections: Vec<(TradeAction, Rejection)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PortfolioLedger {
    config: LedgerConfig,
}

impl PortfolioLedger {
    pub fn new(config: LedgerConfig) -> Self {
        PortfolioLedger { config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Apply `actions` on `date` and mark the result at each quote's close.
    ///
    /// Sells settle before buys so that liquidations fund purchases made in
    /// the same step; otherwise the given order is kept.
    pub fn apply(
        &self,
        state: &PortfolioState,
        date: NaiveDate,
        actions: &[TradeAction],
        quotes: &Quotes,
    ) -> LedgerOutcome {
        let mut next = state.clone();
        next.date = date;
        mark(&mut next, quotes, self.config.execution_price);

        let ordered = actions
            .iter()
            .filter(|a| a.direction == Direction::Sell)
            .chain(actions.iter().filter(|a| a.direction == Direction::Buy));

        let mut fills = Vec::new();
        let mut rejections = Vec::new();
        for action in ordered {
            match self.execute(&mut next, date, action, quotes) {
                Ok(Some(fill)) => {
                    debug!(
                        %date,
                        security = %fill.security,
                        direction = %fill.direction,
                        quantity = fill.quantity,
                        price = fill.price,
                        notional = fill.notional(),
                        "fill"
                    );
                    fills.push(fill);
                }
                Ok(None) => debug!(%date, %action, "already at target"),
                Err(reason) => rejections.push((action.clone(), reason)),
            }
        }

        mark(&mut next, quotes, PriceField::Close);
        LedgerOutcome {
            state: next,
            fills,
            rejections,
        }
    }

    fn execute(
        &self,
        next: &mut PortfolioState,
        date: NaiveDate,
        action: &TradeAction,
        quotes: &Quotes,
    ) -> Result<Option<Fill>, Rejection> {
        let bar = quotes
            .get(&action.security)
            .ok_or_else(|| Rejection::NoQuote(action.security.clone()))?;
        let market_price = bar.price(self.config.execution_price);
        if !(market_price.is_finite() && market_price > 0.0) {
            return Err(Rejection::NoQuote(action.security.clone()));
        }

        let fee_model = &self.config.fee_model;
        let price = fee_model.execution_price(action.direction, market_price);
        let fee = fee_model.fee();
        let held = next.quantity(action.security.as_str());

        let Some(quantity) = resolve_quantity(action, held, price, fee, next.total_value)? else {
            return Ok(None);
        };
        let signed_quantity = i64::try_from(quantity)
            .map_err(|_| Rejection::InvalidSize(format!("quantity {quantity}")))?;
        let notional = quantity as f64 * price;

        let signed = match action.direction {
            Direction::Buy => {
                let required = notional + fee;
                if required > next.cash {
                    return Err(Rejection::InsufficientFunds {
                        required,
                        available: next.cash,
                    });
                }
                next.cash -= required;
                signed_quantity
            }
            Direction::Sell => {
                if !self.config.short_selling_allowed && signed_quantity > held {
                    return Err(Rejection::InsufficientPosition {
                        requested: quantity,
                        held,
                    });
                }
                if next.cash + notional < fee {
                    return Err(Rejection::InsufficientFunds {
                        required: fee,
                        available: next.cash + notional,
                    });
                }
                next.cash += notional - fee;
                -signed_quantity
            }
        };

        let realized = update_position(next, &action.security, signed, price, market_price);
        next.total_value = next.computed_value();

        Ok(Some(Fill {
            date,
            security: action.security.clone(),
            direction: action.direction,
            quantity,
            price,
            fee,
            realized_pnl: realized.map(|pnl| pnl - fee),
        }))
    }
}

/// Whole shares an action trades. `None` means a target-weight order that
/// is already satisfied.
fn resolve_quantity(
    action: &TradeAction,
    held: i64,
    price: f64,
    fee: f64,
    total_value: f64,
) -> Result<Option<u64>, Rejection> {
    let quantity = match action.size {
        OrderSize::Quantity(q) => q,
        OrderSize::Notional(amount) => {
            if !(amount.is_finite() && amount > 0.0) {
                return Err(Rejection::InvalidSize(format!("notional {amount}")));
            }
            match action.direction {
                Direction::Buy => whole_shares(amount - fee, price),
                Direction::Sell => whole_shares(amount, price),
            }
        }
        OrderSize::TargetWeight(weight) => {
            if !(0.0..=1.0).contains(&weight) {
                return Err(Rejection::InvalidSize(format!("target weight {weight}")));
            }
            let target_value = weight * total_value;
            let delta = match action.direction {
                Direction::Buy => signed_shares(target_value - fee, price).saturating_sub(held),
                Direction::Sell => held.saturating_sub(signed_shares(target_value, price)),
            };
            if delta <= 0 {
                return Ok(None);
            }
            delta.unsigned_abs()
        }
    };
    if quantity == 0 {
        return Err(Rejection::ZeroQuantity);
    }
    Ok(Some(quantity))
}

fn whole_shares(amount: f64, price: f64) -> u64 {
    if amount <= 0.0 {
        0
    } else {
        (amount / price).floor() as u64
    }
}

fn signed_shares(amount: f64, price: f64) -> i64 {
    i64::try_from(whole_shares(amount, price)).unwrap_or(i64::MAX)
}

/// Apply a signed quantity change at `price` using weighted-average cost.
/// Returns the gross PnL realized by the reducing part of the trade.
fn update_position(
    next: &mut PortfolioState,
    security: &Security,
    signed: i64,
    price: f64,
    market_price: f64,
) -> Option<f64> {
    let position = next
        .positions
        .entry(security.clone())
        .or_insert_with(|| Position {
            security: security.clone(),
            quantity: 0,
            average_cost: price,
            last_price: market_price,
        });

    let old = position.quantity;
    let new = old + signed;
    let reducing = old != 0 && old.signum() != signed.signum();

    let realized = reducing.then(|| {
        let closed = signed.abs().min(old.abs()) as f64;
        closed * (price - position.average_cost) * old.signum() as f64
    });

    if old == 0 || !reducing {
        let total = old.abs() as f64 * position.average_cost + signed.abs() as f64 * price;
        position.average_cost = total / new.abs() as f64;
    } else if new != 0 && new.signum() != old.signum() {
        position.average_cost = price;
    }
    position.quantity = new;
    position.last_price = market_price;

    if new == 0 {
        next.positions.remove(security);
    }
    realized
}

fn mark(state: &mut PortfolioState, quotes: &Quotes, field: PriceField) {
    for (security, position) in state.positions.iter_mut() {
        if let Some(bar) = quotes.get(security) {
            position.last_price = bar.price(field);
        }
    }
    state.total_value = state.computed_value();
}
