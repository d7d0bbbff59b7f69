//! Backtest engine and event loop.
//!
//! [`BacktestConfig`] is an immutable value passed into [`BacktestEngine`].
//! The engine walks the calendar one date at a time, asks the strategy for
//! actions against a view truncated at that date, and lets the ledger turn
//! them into the next snapshot.

use chrono::NaiveDate;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{info, warn};

use super::action::TradeAction;
use super::calendar::{build_calendar, CalendarSource};
use super::error::{BacktestError, Rejection};
use super::ledger::{FeeModel, LedgerConfig, PortfolioLedger, Quotes};
use super::market_data::{LookbackPolicy, MarketData, SignalBook};
use super::portfolio::PortfolioState;
use super::position::Fill;
use super::price_bar::PriceField;
use super::security::Security;
use super::strategy::{BuyAndHoldStrategy, DecisionContext, MarketView, Strategy};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub starting_cash: f64,
    pub calendar: CalendarSource,
    /// Sorted, deduplicated.
    pub securities: Vec<Security>,
    pub fee_model: FeeModel,
    pub execution_price: PriceField,
    pub lookback: LookbackPolicy,
    pub short_selling_allowed: bool,
    pub risk_free_rate: f64,
    /// Baseline security. `None` compares against an equal-weight basket.
    pub benchmark: Option<Security>,
}

impl BacktestConfig {
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            fee_model: self.fee_model,
            execution_price: self.execution_price,
            short_selling_allowed: self.short_selling_allowed,
        }
    }

    /// Checks that need no market data.
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.start_date > self.end_date {
            return Err(BacktestError::configuration(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            )));
        }
        if !self.starting_cash.is_finite() || self.starting_cash < 0.0 {
            return Err(BacktestError::configuration(format!(
                "starting_cash must be non-negative, got {}",
                self.starting_cash
            )));
        }
        if self.securities.is_empty() {
            return Err(BacktestError::configuration("no securities configured"));
        }
        let FeeModel {
            flat_fee,
            spread_bps,
        } = self.fee_model;
        if !(flat_fee.is_finite() && flat_fee >= 0.0) {
            return Err(BacktestError::configuration(format!(
                "flat_fee must be non-negative, got {flat_fee}"
            )));
        }
        if !(spread_bps.is_finite() && spread_bps >= 0.0) {
            return Err(BacktestError::configuration(format!(
                "spread_bps must be non-negative, got {spread_bps}"
            )));
        }
        if self.lookback == (LookbackPolicy::MostRecentWithin { days: 0 }) {
            return Err(BacktestError::configuration(
                "lookback window must be at least one day (use 'exact' instead)",
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(BacktestError::configuration("risk_free_rate must be finite"));
        }
        Ok(())
    }

    /// Securities the engine resolves quotes for: the configured set plus
    /// the benchmark.
    fn quoted_securities(&self) -> Vec<Security> {
        let mut all = self.securities.clone();
        if let Some(benchmark) = &self.benchmark {
            if !all.contains(benchmark) {
                all.push(benchmark.clone());
                all.sort();
            }
        }
        all
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Init,
    Stepping,
    Done,
    Failed,
}

/// A trade action the ledger refused, with the date and reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedAction {
    pub date: NaiveDate,
    pub action: TradeAction,
    pub reason: Rejection,
}

/// Everything a run produced. A failed run keeps the partial trace.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRun {
    pub strategy: String,
    pub status: EngineState,
    pub trace: Vec<PortfolioState>,
    pub skipped: Vec<SkippedAction>,
    pub fills: Vec<Fill>,
    pub failure: Option<BacktestError>,
}

impl BacktestRun {
    fn new(strategy: &str) -> Self {
        BacktestRun {
            strategy: strategy.to_string(),
            status: EngineState::Init,
            trace: Vec::new(),
            skipped: Vec::new(),
            fills: Vec::new(),
            failure: None,
        }
    }

    fn fail(mut self, err: BacktestError) -> Self {
        warn!(strategy = %self.strategy, steps = self.trace.len(), error = %err, "backtest failed");
        self.status = EngineState::Failed;
        self.failure = Some(err);
        self
    }

    pub fn is_done(&self) -> bool {
        self.status == EngineState::Done
    }

    pub fn final_state(&self) -> Option<&PortfolioState> {
        self.trace.last()
    }

    pub fn into_result(self) -> Result<BacktestRun, BacktestError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

pub struct BacktestEngine {
    config: BacktestConfig,
    market: Arc<MarketData>,
    signals: Arc<SignalBook>,
    ledger: PortfolioLedger,
}

impl BacktestEngine {
    /// Validates `config` against the loaded data. Nothing is simulated yet.
    pub fn new(
        config: BacktestConfig,
        market: Arc<MarketData>,
        signals: Arc<SignalBook>,
    ) -> Result<Self, BacktestError> {
        config.validate()?;
        for security in config.quoted_securities() {
            if !market.contains(security.as_str()) {
                return Err(BacktestError::configuration(format!(
                    "unknown security {security}: no price bars loaded"
                )));
            }
        }
        let ledger = PortfolioLedger::new(config.ledger_config());
        Ok(BacktestEngine {
            config,
            market,
            signals,
            ledger,
        })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn calendar(&self) -> Vec<NaiveDate> {
        build_calendar(
            self.config.calendar,
            &self.market,
            &self.config.securities,
            self.config.start_date,
            self.config.end_date,
        )
    }

    pub fn run(&self, strategy: &dyn Strategy) -> BacktestRun {
        let mut run = BacktestRun::new(strategy.name());
        if let Err(err) = strategy.validate() {
            return run.fail(err);
        }

        let calendar = self.calendar();
        if calendar.is_empty() {
            return run.fail(BacktestError::NoPriceData {
                start: self.config.start_date,
                end: self.config.end_date,
            });
        }
        info!(
            strategy = strategy.name(),
            dates = calendar.len(),
            securities = self.config.securities.len(),
            "backtest started"
        );

        let quoted = self.config.quoted_securities();
        let mut state = PortfolioState::initial(self.config.start_date, self.config.starting_cash);
        run.status = EngineState::Stepping;

        for date in calendar {
            let quotes = self.resolve_quotes(&quoted, date);
            if let Some(security) = state.positions.keys().find(|s| !quotes.contains_key(*s)) {
                return run.fail(BacktestError::DataGap {
                    security: security.clone(),
                    date,
                });
            }

            let view = MarketView::new(
                date,
                self.config.lookback,
                &self.config.securities,
                &self.market,
                &self.signals,
                &quotes,
            );
            let ctx = DecisionContext {
                date,
                history: &run.trace,
                state: &state,
                market: &view,
            };
            let actions = strategy.decide(&ctx);
            if let Some(requested) = view.breach() {
                return run.fail(BacktestError::StrategyContractViolation {
                    strategy: strategy.name().to_string(),
                    requested,
                    current: date,
                });
            }

            let outcome = self.ledger.apply(&state, date, &actions, &quotes);
            for (action, reason) in outcome.rejections {
                warn!(%date, %action, %reason, "action skipped");
                run.skipped.push(SkippedAction {
                    date,
                    action,
                    reason,
                });
            }
            run.fills.extend(outcome.fills);
            run.trace.push(outcome.state.clone());
            state = outcome.state;
        }

        run.status = EngineState::Done;
        info!(
            strategy = strategy.name(),
            fills = run.fills.len(),
            skipped = run.skipped.len(),
            final_value = state.total_value,
            "backtest finished"
        );
        run
    }

    /// Runs independent strategies in parallel over the same data.
    pub fn run_batch(&self, strategies: &[Box<dyn Strategy>]) -> Vec<BacktestRun> {
        strategies.par_iter().map(|s| self.run(s.as_ref())).collect()
    }

    /// Buy-and-hold of the benchmark, or of every configured security at
    /// equal weight when none is set.
    pub fn baseline_strategy(&self) -> BuyAndHoldStrategy {
        let basket = match &self.config.benchmark {
            Some(benchmark) => vec![benchmark.clone()],
            None => self.config.securities.clone(),
        };
        BuyAndHoldStrategy::new(basket)
    }

    pub fn run_baseline(&self) -> BacktestRun {
        self.run(&self.baseline_strategy())
    }

    fn resolve_quotes(&self, securities: &[Security], date: NaiveDate) -> Quotes {
        securities
            .iter()
            .filter_map(|s| {
                self.market
                    .resolve(s.as_str(), date, self.config.lookback)
                    .map(|bar| (s.clone(), bar.clone()))
            })
            .collect()
    }
}
