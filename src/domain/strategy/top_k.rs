//! Top-K ranking strategy.

use crate::domain::action::{OrderSize, TradeAction};
use crate::domain::error::BacktestError;
use crate::domain::security::Security;

use super::{DecisionContext, Strategy};

/// On every `rebalance_every`-th date, ranks securities by signal and holds
/// the best `k` at equal weight `1 / k` of total value. Holdings that drop
/// out of the top `k` are liquidated. Held members get a sell down to their
/// weight as well, which the ledger skips unless today's prices put them
/// above it. Ties rank by security.
#[derive(Debug, Clone, PartialEq)]
pub struct TopKStrategy {
    pub k: usize,
    pub rebalance_every: usize,
}

impl TopKStrategy {
    pub fn new(k: usize) -> Self {
        TopKStrategy {
            k,
            rebalance_every: 1,
        }
    }

    fn is_rebalancing_date(&self, step: usize) -> bool {
        self.rebalance_every > 0 && step % self.rebalance_every == 0
    }

    /// Securities with both a signal and a quote today, best first.
    pub fn rank<'a>(&self, ctx: &DecisionContext<'a>) -> Vec<(&'a Security, f64)> {
        let mut ranked: Vec<(&Security, f64)> = ctx
            .market
            .securities()
            .iter()
            .filter(|s| ctx.market.quote(s.as_str()).is_some())
            .filter_map(|s| ctx.market.signal(s.as_str()).map(|sig| (s, sig.score())))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

impl Strategy for TopKStrategy {
    fn name(&self) -> &str {
        "top_k"
    }

    fn decide(&self, ctx: &DecisionContext<'_>) -> Vec<TradeAction> {
        if !self.is_rebalancing_date(ctx.step()) {
            return Vec::new();
        }

        let ranked = self.rank(ctx);
        let top: Vec<&Security> = ranked.iter().take(self.k).map(|(s, _)| *s).collect();

        let mut actions: Vec<TradeAction> = ctx
            .state
            .positions
            .values()
            .filter(|p| p.is_long() && !top.contains(&&p.security))
            .map(|p| TradeAction::sell(p.security.clone(), OrderSize::TargetWeight(0.0)))
            .collect();

        let weight = 1.0 / self.k as f64;
        actions.extend(
            top.iter()
                .filter(|s| ctx.state.quantity(s.as_str()) > 0)
                .map(|s| TradeAction::sell((*s).clone(), OrderSize::TargetWeight(weight))),
        );
        actions.extend(
            top.into_iter()
                .map(|s| TradeAction::buy(s.clone(), OrderSize::TargetWeight(weight))),
        );
        actions
    }

    fn validate(&self) -> Result<(), BacktestError> {
        if self.k == 0 {
            return Err(BacktestError::configuration("k must be at least 1"));
        }
        if self.rebalance_every == 0 {
            return Err(BacktestError::configuration(
                "rebalance_every must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market_data::{LookbackPolicy, MarketData, SignalBook};
    use crate::domain::portfolio::PortfolioState;
    use crate::domain::position::Position;
    use crate::domain::strategy::test_support::*;
    use crate::domain::strategy::MarketView;

    fn three_securities() -> (MarketData, SignalBook, Vec<Security>) {
        let market = MarketData::new(vec![bar("A", 1, 10.0), bar("B", 1, 20.0), bar("C", 1, 30.0)]);
        let signals = SignalBook::new(vec![
            signal("A", 1, 0.5),
            signal("B", 1, 0.9),
            signal("C", 1, 0.2),
        ]);
        let secs = vec![Security::from("A"), Security::from("B"), Security::from("C")];
        (market, signals, secs)
    }

    fn decide_with(
        strategy: &TopKStrategy,
        state: &PortfolioState,
        history: &[PortfolioState],
        market: &MarketData,
        signals: &SignalBook,
        secs: &[Security],
    ) -> Vec<TradeAction> {
        let quotes = quotes_on(market, secs, 1);
        let view = MarketView::new(d(1), LookbackPolicy::Exact, secs, market, signals, &quotes);
        let ctx = DecisionContext {
            date: d(1),
            history,
            state,
            market: &view,
        };
        strategy.decide(&ctx)
    }

    #[test]
    fn k1_picks_strongest_signal() {
        let (market, signals, secs) = three_securities();
        let state = PortfolioState::initial(d(1), 10_000.0);
        let actions = decide_with(&TopKStrategy::new(1), &state, &[], &market, &signals, &secs);
        assert_eq!(
            actions,
            vec![TradeAction::buy("B", OrderSize::TargetWeight(1.0))]
        );
    }

    #[test]
    fn k2_equal_weights() {
        let (market, signals, secs) = three_securities();
        let state = PortfolioState::initial(d(1), 10_000.0);
        let actions = decide_with(&TopKStrategy::new(2), &state, &[], &market, &signals, &secs);
        assert_eq!(
            actions,
            vec![
                TradeAction::buy("B", OrderSize::TargetWeight(0.5)),
                TradeAction::buy("A", OrderSize::TargetWeight(0.5)),
            ]
        );
    }

    #[test]
    fn liquidates_dropouts() {
        let (market, signals, secs) = three_securities();
        let mut state = PortfolioState::initial(d(1), 0.0);
        state.positions.insert(
            Security::from("C"),
            Position {
                security: Security::from("C"),
                quantity: 5,
                average_cost: 30.0,
                last_price: 30.0,
            },
        );
        let actions = decide_with(&TopKStrategy::new(1), &state, &[], &market, &signals, &secs);
        assert_eq!(
            actions,
            vec![
                TradeAction::sell("C", OrderSize::TargetWeight(0.0)),
                TradeAction::buy("B", OrderSize::TargetWeight(1.0)),
            ]
        );
    }

    #[test]
    fn held_members_get_a_trim_before_buys() {
        let (market, signals, secs) = three_securities();
        let mut state = PortfolioState::initial(d(1), 1_000.0);
        state.positions.insert(
            Security::from("B"),
            Position {
                security: Security::from("B"),
                quantity: 400,
                average_cost: 10.0,
                last_price: 20.0,
            },
        );
        let actions = decide_with(&TopKStrategy::new(2), &state, &[], &market, &signals, &secs);
        assert_eq!(
            actions,
            vec![
                TradeAction::sell("B", OrderSize::TargetWeight(0.5)),
                TradeAction::buy("B", OrderSize::TargetWeight(0.5)),
                TradeAction::buy("A", OrderSize::TargetWeight(0.5)),
            ]
        );
    }

    #[test]
    fn ties_break_by_security() {
        let market = MarketData::new(vec![bar("A", 1, 10.0), bar("B", 1, 10.0)]);
        let signals = SignalBook::new(vec![signal("B", 1, 0.5), signal("A", 1, 0.5)]);
        let secs = vec![Security::from("A"), Security::from("B")];
        let state = PortfolioState::initial(d(1), 100.0);
        let actions = decide_with(&TopKStrategy::new(1), &state, &[], &market, &signals, &secs);
        assert_eq!(actions[0].security, Security::from("A"));
    }

    #[test]
    fn skips_non_rebalancing_dates() {
        let (market, signals, secs) = three_securities();
        let state = PortfolioState::initial(d(1), 10_000.0);
        let history = vec![state.clone()];
        let strategy = TopKStrategy {
            k: 1,
            rebalance_every: 2,
        };
        assert!(decide_with(&strategy, &state, &history, &market, &signals, &secs).is_empty());
        assert!(!decide_with(&strategy, &state, &[], &market, &signals, &secs).is_empty());
    }

    #[test]
    fn validate_parameters() {
        assert!(TopKStrategy::new(0).validate().is_err());
        assert!(TopKStrategy { k: 1, rebalance_every: 0 }.validate().is_err());
        assert!(TopKStrategy::new(3).validate().is_ok());
    }
}
