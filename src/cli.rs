//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_profile_writer::CsvProfileWriter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestEngine, BacktestRun};
use crate::domain::calendar::CalendarSource;
use crate::domain::config_validation::{
    check_strategy_type, read_choice, read_date, read_f64, read_strategy_type, read_usize,
    validate_backtest_config, validate_data_config, validate_strategy_config,
};
use crate::domain::error::{BacktestError, NewstraderError};
use crate::domain::ledger::FeeModel;
use crate::domain::market_data::{LookbackPolicy, SignalBook};
use crate::domain::metrics::MetricsReport;
use crate::domain::price_bar::PriceField;
use crate::domain::security::Security;
use crate::domain::strategy::{BuyAndHoldStrategy, Strategy, ThresholdStrategy, TopKStrategy};
use crate::domain::universe::{data_window_start, parse_securities, Universe};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{MarketDataPort, SignalPort};
use crate::ports::report_port::ProfileWriterPort;

#[derive(Parser, Debug)]
#[command(name = "newstrader", about = "News-signal strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and compare it with the buy-and-hold baseline
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy type, overriding [strategy] type
        #[arg(short, long)]
        strategy: Option<String>,
        /// Trace CSV path; metrics and skipped actions are written beside it
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated securities, overriding [backtest] securities
        #[arg(long)]
        securities: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration without running it
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the simulated calendar
    Calendar {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for the configured securities
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        security: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            output,
            securities,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(
                    &config,
                    strategy.as_deref(),
                    output.as_deref(),
                    securities.as_deref(),
                )
            }
        }
        Command::Validate { config } => run_dry_run(&config),
        Command::Calendar { config } => run_calendar(&config),
        Command::Info { config, security } => run_info(&config, security.as_deref()),
    }
}

fn fail(err: NewstraderError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Relative data paths are taken from the config file's directory.
pub fn resolve_data_path(config_path: &Path, raw: &str) -> PathBuf {
    let raw = Path::new(raw.trim());
    if raw.is_absolute() {
        return raw.to_path_buf();
    }
    config_path
        .parent()
        .map(|dir| dir.join(raw))
        .unwrap_or_else(|| raw.to_path_buf())
}

pub fn build_data_adapter(
    adapter: &dyn ConfigPort,
    config_path: &Path,
) -> Result<CsvAdapter, NewstraderError> {
    let prices_dir = adapter
        .get_string("data", "prices_dir")
        .ok_or_else(|| NewstraderError::missing("data", "prices_dir"))?;
    let mut csv = CsvAdapter::new(resolve_data_path(config_path, &prices_dir));
    if let Some(signals) = adapter
        .get_string("data", "signals_file")
        .filter(|s| !s.trim().is_empty())
    {
        csv = csv.with_signals(resolve_data_path(config_path, &signals));
    }
    Ok(csv)
}

pub fn resolve_securities(
    override_list: Option<&str>,
    adapter: &dyn ConfigPort,
) -> Result<Vec<Security>, NewstraderError> {
    let raw = match override_list {
        Some(list) => list.to_string(),
        None => adapter
            .get_string("backtest", "securities")
            .ok_or_else(|| NewstraderError::missing("backtest", "securities"))?,
    };
    parse_securities(&raw)
        .map_err(|e| NewstraderError::invalid("backtest", "securities", e.to_string()))
}

pub fn build_backtest_config(
    adapter: &dyn ConfigPort,
    securities_override: Option<&str>,
) -> Result<BacktestConfig, NewstraderError> {
    let benchmark = adapter
        .get_string("backtest", "benchmark")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(Security::from);

    Ok(BacktestConfig {
        start_date: read_date(adapter, "start_date")?,
        end_date: read_date(adapter, "end_date")?,
        starting_cash: read_f64(adapter, "backtest", "starting_cash", 100_000.0)?,
        calendar: read_choice::<CalendarSource>(adapter, "backtest", "calendar")?,
        securities: resolve_securities(securities_override, adapter)?,
        fee_model: FeeModel {
            flat_fee: read_f64(adapter, "backtest", "flat_fee", 0.0)?,
            spread_bps: read_f64(adapter, "backtest", "spread_bps", 0.0)?,
        },
        execution_price: read_choice::<PriceField>(adapter, "backtest", "execution_price")?,
        lookback: read_choice::<LookbackPolicy>(adapter, "backtest", "lookback")?,
        short_selling_allowed: adapter.get_bool("backtest", "short_selling_allowed", false),
        risk_free_rate: read_f64(adapter, "backtest", "risk_free_rate", 0.0)?,
        benchmark,
    })
}

/// Strategy from `[strategy]`, or from `kind_override` when given.
pub fn build_strategy(
    adapter: &dyn ConfigPort,
    kind_override: Option<&str>,
    securities: &[Security],
) -> Result<Box<dyn Strategy>, NewstraderError> {
    let kind = match kind_override {
        Some(kind) => {
            let kind = kind.trim().to_lowercase();
            check_strategy_type(&kind)?;
            kind
        }
        None => read_strategy_type(adapter)?,
    };

    let strategy: Box<dyn Strategy> = match kind.as_str() {
        "top_k" => Box::new(TopKStrategy {
            k: read_usize(adapter, "strategy", "k", 1)?,
            rebalance_every: read_usize(adapter, "strategy", "rebalance_every", 1)?,
        }),
        "buy_and_hold" => Box::new(BuyAndHoldStrategy::new(securities.to_vec())),
        _ => Box::new(ThresholdStrategy {
            buy_threshold: read_f64(adapter, "strategy", "buy_threshold", 0.5)?,
            sell_threshold: read_f64(adapter, "strategy", "sell_threshold", -0.5)?,
            position_size: read_f64(adapter, "strategy", "position_size", 1.0)?,
        }),
    };
    strategy.validate()?;
    Ok(strategy)
}

/// Strategy run, baseline run and the metrics comparing them.
#[derive(Debug)]
pub struct BacktestOutcome {
    pub run: BacktestRun,
    pub baseline: BacktestRun,
    pub report: MetricsReport,
}

/// Load data through the ports, then run the strategy and its baseline in
/// parallel over the same engine.
pub fn execute_backtest(
    market_port: &dyn MarketDataPort,
    signal_port: &dyn SignalPort,
    bt_config: &BacktestConfig,
    strategy: Box<dyn Strategy>,
) -> Result<BacktestOutcome, NewstraderError> {
    let universe = Universe::new(bt_config.securities.clone(), bt_config.benchmark.clone());
    let window_start = data_window_start(bt_config.start_date, bt_config.lookback);
    let market = universe.load_market_data(market_port, window_start, bt_config.end_date)?;
    if market.is_empty() {
        return Err(BacktestError::NoPriceData {
            start: bt_config.start_date,
            end: bt_config.end_date,
        }
        .into());
    }
    let signals = universe.load_signals(signal_port, window_start, bt_config.end_date)?;

    let engine = BacktestEngine::new(bt_config.clone(), Arc::new(market), Arc::new(signals))?;
    let strategies: Vec<Box<dyn Strategy>> = vec![strategy, Box::new(engine.baseline_strategy())];
    let mut runs = engine.run_batch(&strategies).into_iter();
    let (Some(run), Some(baseline)) = (runs.next(), runs.next()) else {
        return Err(NewstraderError::Data {
            reason: "batch returned fewer runs than strategies".to_string(),
        });
    };

    let report = MetricsReport::build(
        &run,
        baseline.is_done().then_some(&baseline),
        bt_config.starting_cash,
        bt_config.risk_free_rate,
    );
    Ok(BacktestOutcome {
        run,
        baseline,
        report,
    })
}

pub fn run_backtest_pipeline(
    market_port: &dyn MarketDataPort,
    signal_port: &dyn SignalPort,
    bt_config: &BacktestConfig,
    strategy: Box<dyn Strategy>,
    writer: &dyn ProfileWriterPort,
    output_path: Option<&Path>,
) -> ExitCode {
    eprintln!(
        "Running backtest: {} securities, {} to {}",
        bt_config.securities.len(),
        bt_config.start_date,
        bt_config.end_date,
    );

    let outcome = match execute_backtest(market_port, signal_port, bt_config, strategy) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };

    print_summary(&outcome);

    if let Some(output) = output_path {
        match writer.write_profile(&outcome.run, &outcome.report, output) {
            Ok(()) => eprintln!("\nProfile written to: {}", output.display()),
            Err(e) => {
                eprintln!("error: failed to write profile: {e}");
                return (&e).into();
            }
        }
    }

    match outcome.run.failure {
        Some(err) => fail(err.into()),
        None => ExitCode::SUCCESS,
    }
}

fn print_summary(outcome: &BacktestOutcome) {
    let run = &outcome.run;
    let m = &outcome.report.metrics;
    eprintln!("  Processed: {} dates", run.trace.len());

    eprintln!("\n=== Results: {} ===", run.strategy);
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", m.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    eprintln!("Fills:            {}", m.total_fills);
    eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    eprintln!("Fees Paid:        {:.2}", m.total_fees);
    eprintln!("Skipped Actions:  {}", run.skipped.len());

    if let (Some(base), Some(excess)) = (&outcome.report.baseline, outcome.report.excess_return) {
        eprintln!("\n=== Baseline: {} ===", outcome.baseline.strategy);
        eprintln!("Total Return:     {:.2}%", base.total_return * 100.0);
        eprintln!("Max Drawdown:     -{:.1}%", base.max_drawdown * 100.0);
        eprintln!("Excess Return:    {:+.2}%", excess * 100.0);
    } else if let Some(err) = &outcome.baseline.failure {
        eprintln!("\nwarning: baseline run failed: {err}");
    }
}

fn run_backtest(
    config_path: &Path,
    strategy_override: Option<&str>,
    output_path: Option<&Path>,
    securities_override: Option<&str>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let prepared = validate_all(&adapter)
        .and_then(|()| build_backtest_config(&adapter, securities_override))
        .and_then(|bt| {
            let strategy = build_strategy(&adapter, strategy_override, &bt.securities)?;
            let data = build_data_adapter(&adapter, config_path)?;
            Ok((bt, strategy, data))
        });
    let (bt_config, strategy, data) = match prepared {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    eprintln!("Strategy: {}", strategy.name());
    run_backtest_pipeline(
        &data,
        &data,
        &bt_config,
        strategy,
        &CsvProfileWriter::new(),
        output_path,
    )
}

fn validate_all(adapter: &dyn ConfigPort) -> Result<(), NewstraderError> {
    validate_backtest_config(adapter)?;
    validate_data_config(adapter)?;
    validate_strategy_config(adapter)
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_all(&adapter) {
        return fail(e);
    }
    eprintln!("Config validated successfully");

    let bt = match build_backtest_config(&adapter, None) {
        Ok(bt) => bt,
        Err(e) => return fail(e),
    };
    let strategy = match build_strategy(&adapter, None, &bt.securities) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    eprintln!("\nPlan:");
    eprintln!("  period:          {} to {}", bt.start_date, bt.end_date);
    eprintln!("  starting cash:   {:.2}", bt.starting_cash);
    eprintln!(
        "  securities:      {}",
        bt.securities
            .iter()
            .map(Security::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    eprintln!("  calendar:        {:?}", bt.calendar);
    eprintln!("  execution price: {:?}", bt.execution_price);
    eprintln!("  lookback:        {:?}", bt.lookback);
    eprintln!(
        "  fees:            {:.2} flat + {} bps spread",
        bt.fee_model.flat_fee, bt.fee_model.spread_bps
    );
    eprintln!("  short selling:   {}", bt.short_selling_allowed);
    match &bt.benchmark {
        Some(b) => eprintln!("  baseline:        buy and hold {b}"),
        None => eprintln!("  baseline:        equal-weight basket"),
    }
    eprintln!("  strategy:        {}", strategy.name());

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_calendar(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let calendar = validate_all(&adapter)
        .and_then(|()| build_backtest_config(&adapter, None))
        .and_then(|bt| {
            let data = build_data_adapter(&adapter, config_path)?;
            calendar_for(&data, &bt)
        });

    match calendar {
        Ok(dates) => {
            for date in &dates {
                println!("{date}");
            }
            eprintln!("{} dates", dates.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Calendar the engine would step through for `bt_config`.
pub fn calendar_for(
    market_port: &dyn MarketDataPort,
    bt_config: &BacktestConfig,
) -> Result<Vec<chrono::NaiveDate>, NewstraderError> {
    let universe = Universe::new(bt_config.securities.clone(), bt_config.benchmark.clone());
    let market = universe.load_market_data(market_port, bt_config.start_date, bt_config.end_date)?;
    let engine = BacktestEngine::new(
        bt_config.clone(),
        Arc::new(market),
        Arc::new(SignalBook::empty()),
    )?;
    Ok(engine.calendar())
}

fn run_info(config_path: &Path, security: Option<&str>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let data = match build_data_adapter(&adapter, config_path) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };
    let securities = match info_securities(security, &adapter, &data) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    for security in &securities {
        match data.data_range(security) {
            Ok(Some((first, last, count))) => {
                println!("{security}: {count} bars, {first} to {last}");
            }
            Ok(None) => eprintln!("{security}: no data found"),
            Err(e) => eprintln!("error reading {security}: {e}"),
        }
    }
    ExitCode::SUCCESS
}

/// Securities `info` reports on: the override, else the configured list,
/// else everything the data source holds.
pub fn info_securities(
    override_list: Option<&str>,
    adapter: &dyn ConfigPort,
    market_port: &dyn MarketDataPort,
) -> Result<Vec<Security>, NewstraderError> {
    if override_list.is_some() || adapter.has("backtest", "securities") {
        resolve_securities(override_list, adapter)
    } else {
        market_port.list_securities()
    }
}
