//! Performance metrics over a portfolio trace.
//!
//! Everything here is a pure function of its inputs, so computing metrics
//! twice on the same trace gives identical results.

use super::backtest::BacktestRun;
use super::portfolio::PortfolioState;
use super::position::Fill;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Largest peak-to-trough decline of total value, as a fraction.
    pub max_drawdown: f64,
    /// Longest run of consecutive states below a prior peak.
    pub max_drawdown_duration: i64,
    pub final_value: f64,
    pub total_fills: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_fees: f64,
}

impl Metrics {
    /// A trace of one state or fewer has no return series and yields
    /// all-zero metrics.
    pub fn compute(
        trace: &[PortfolioState],
        fills: &[Fill],
        starting_cash: f64,
        risk_free_rate: f64,
    ) -> Self {
        if trace.len() <= 1 {
            return Metrics::default();
        }
        let values: Vec<f64> = trace.iter().map(|s| s.total_value).collect();
        let final_value = values.last().copied().unwrap_or(starting_cash);

        let total_return = if starting_cash > 0.0 {
            (final_value - starting_cash) / starting_cash
        } else {
            0.0
        };

        let years = values.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return.is_finite() && total_return > -1.0
        {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        // The trace starts after the first step; the first day's move is
        // measured from starting cash.
        let series: Vec<f64> = std::iter::once(starting_cash)
            .chain(values.iter().copied())
            .collect();
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&series);

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(&series, daily_rf);

        let mut metrics = Metrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            final_value,
            total_fills: fills.len(),
            total_fees: fills.iter().map(|f| f.fee).sum(),
            ..Metrics::default()
        };
        metrics.add_trade_stats(fills);
        metrics
    }

    /// Round trips are fills that realized PnL, i.e. reduced a position.
    fn add_trade_stats(&mut self, fills: &[Fill]) {
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;

        for pnl in fills.iter().filter_map(|f| f.realized_pnl) {
            if pnl > 0.0 {
                self.trades_won += 1;
                total_wins += pnl;
                self.largest_win = self.largest_win.max(pnl);
            } else if pnl < 0.0 {
                self.trades_lost += 1;
                total_losses += pnl.abs();
                self.largest_loss = self.largest_loss.max(pnl.abs());
            } else {
                self.trades_breakeven += 1;
            }
        }

        let closed = self.trades_won + self.trades_lost + self.trades_breakeven;
        self.win_rate = if closed > 0 {
            self.trades_won as f64 / closed as f64
        } else {
            0.0
        };
        self.profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
    }

    pub fn closed_trades(&self) -> usize {
        self.trades_won + self.trades_lost + self.trades_breakeven
    }
}

/// Strategy metrics side by side with the buy-and-hold baseline run over
/// the same calendar, fees and starting cash.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsReport {
    pub strategy: String,
    pub metrics: Metrics,
    pub baseline: Option<Metrics>,
    /// Strategy total return minus baseline total return.
    pub excess_return: Option<f64>,
}

impl MetricsReport {
    pub fn build(
        run: &BacktestRun,
        baseline: Option<&BacktestRun>,
        starting_cash: f64,
        risk_free_rate: f64,
    ) -> Self {
        let metrics = Metrics::compute(&run.trace, &run.fills, starting_cash, risk_free_rate);
        let baseline = baseline
            .map(|b| Metrics::compute(&b.trace, &b.fills, starting_cash, risk_free_rate));
        let excess_return = baseline
            .as_ref()
            .map(|b| metrics.total_return - b.total_return);
        MetricsReport {
            strategy: run.strategy.clone(),
            metrics,
            baseline,
            excess_return,
        }
    }
}

fn compute_drawdown(values: &[f64]) -> (f64, i64) {
    let Some(&first) = values.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for &value in values {
        if value >= peak {
            peak = value;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_risk_adjusted(values: &[f64], daily_rf: f64) -> (f64, f64) {
    if values.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = values
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let excess_return = mean - daily_rf;

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum();
    let downside_stddev = (downside / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}
