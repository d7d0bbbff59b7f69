//! Configuration validation.
//!
//! Validates all config fields before a backtest runs. The `read_*` helpers
//! are shared with the CLI builders so a value that validates is parsed the
//! same way when the run is assembled.

use chrono::NaiveDate;
use std::str::FromStr;

use crate::domain::error::NewstraderError;
use crate::domain::universe::parse_securities;
use crate::ports::config_port::ConfigPort;

pub const STRATEGY_TYPES: [&str; 3] = ["threshold", "top_k", "buy_and_hold"];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), NewstraderError> {
    validate_starting_cash(config)?;
    validate_fees(config)?;
    validate_risk_free_rate(config)?;
    validate_dates(config)?;
    validate_securities(config)?;
    validate_choices(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), NewstraderError> {
    match config.get_string("data", "prices_dir") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(NewstraderError::missing("data", "prices_dir")),
    }
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), NewstraderError> {
    let kind = read_strategy_type(config)?;
    match kind.as_str() {
        "threshold" => validate_thresholds(config),
        "top_k" => validate_top_k(config),
        _ => Ok(()),
    }
}

/// `[strategy] type`, lowercased. Defaults to `threshold`.
pub fn read_strategy_type(config: &dyn ConfigPort) -> Result<String, NewstraderError> {
    let kind = config
        .get_string("strategy", "type")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "threshold".to_string());
    check_strategy_type(&kind)?;
    Ok(kind)
}

pub fn check_strategy_type(kind: &str) -> Result<(), NewstraderError> {
    if STRATEGY_TYPES.contains(&kind) {
        Ok(())
    } else {
        Err(NewstraderError::invalid(
            "strategy",
            "type",
            format!("unknown strategy '{kind}', expected one of {}", STRATEGY_TYPES.join(", ")),
        ))
    }
}

/// Strict float lookup: a present but unparseable value is an error rather
/// than silently becoming `default`.
pub fn read_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, NewstraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| NewstraderError::invalid(section, key, format!("'{raw}' is not a number"))),
    }
}

pub fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, NewstraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
            NewstraderError::invalid(section, key, format!("'{raw}' is not a non-negative integer"))
        }),
    }
}

/// Parse an enum-like value through its `FromStr`, falling back to its
/// `Default` when the key is absent.
pub fn read_choice<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<T, NewstraderError>
where
    T: FromStr<Err = String> + Default,
{
    match config.get_string(section, key) {
        None => Ok(T::default()),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|reason| NewstraderError::invalid(section, key, reason)),
    }
}

pub fn read_date(config: &dyn ConfigPort, field: &str) -> Result<NaiveDate, NewstraderError> {
    let value = config
        .get_string("backtest", field)
        .ok_or_else(|| NewstraderError::missing("backtest", field))?;
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        NewstraderError::invalid(
            "backtest",
            field,
            format!("invalid {field} format, expected YYYY-MM-DD"),
        )
    })
}

fn validate_starting_cash(config: &dyn ConfigPort) -> Result<(), NewstraderError> {
    let value = read_f64(config, "backtest", "starting_cash", 100_000.0)?;
    if value < 0.0 {
        return Err(NewstraderError::invalid(
            "backtest",
            "starting_cash",
            "starting_cash must be non-negative",
        ));
    }
    Ok(())
}

fn validate_fees(config: &dyn ConfigPort) -> Result<(), NewstraderError> {
    for key in ["flat_fee", "spread_bps"] {
        if read_f64(config, "backtest", key, 0.0)? < 0.0 {
            return Err(NewstraderError::invalid(
                "backtest",
                key,
                format!("{key} must be non-negative"),
            ));
        }
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), NewstraderError> {
    let value = read_f64(config, "backtest", "risk_free_rate", 0.0)?;
    if !(0.0..1.0).contains(&value) {
        return Err(NewstraderError::invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), NewstraderError> {
    let start_date = read_date(config, "start_date")?;
    let end_date = read_date(config, "end_date")?;

    if start_date > end_date {
        return Err(NewstraderError::invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(())
}

fn validate_securities(config: &dyn ConfigPort) -> Result<(), NewstraderError> {
    let raw = config
        .get_string("backtest", "securities")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| NewstraderError::missing("backtest", "securities"))?;
    parse_securities(&raw)
        .map_err(|e| NewstraderError::invalid("backtest", "securities", e.to_string()))?;

    if let Some(benchmark) = config.get_string("backtest", "benchmark") {
        if benchmark.trim().is_empty() || benchmark.contains(',') {
            return Err(NewstraderError::invalid(
                "backtest",
                "benchmark",
                "benchmark must be a single security",
            ));
        }
    }
    Ok(())
}

fn validate_choices(config: &dyn ConfigPort) -> Result<(), NewstraderError> {
    use crate::domain::calendar::CalendarSource;
    use crate::domain::market_data::LookbackPolicy;
    use crate::domain::price_bar::PriceField;

    read_choice::<CalendarSource>(config, "backtest", "calendar")?;
    read_choice::<PriceField>(config, "backtest", "execution_price")?;
    let lookback = read_choice::<LookbackPolicy>(config, "backtest", "lookback")?;
    if lookback == (LookbackPolicy::MostRecentWithin { days: 0 }) {
        return Err(NewstraderError::invalid(
            "backtest",
            "lookback",
            "lookback window must be at least one day",
        ));
    }
    Ok(())
}

fn validate_thresholds(config: &dyn ConfigPort) -> Result<(), NewstraderError> {
    let buy = read_f64(config, "strategy", "buy_threshold", 0.5)?;
    let sell = read_f64(config, "strategy", "sell_threshold", -0.5)?;
    if sell >= buy {
        return Err(NewstraderError::invalid(
            "strategy",
            "sell_threshold",
            "sell_threshold must be below buy_threshold",
        ));
    }
    let size = read_f64(config, "strategy", "position_size", 1.0)?;
    if size <= 0.0 || size > 1.0 {
        return Err(NewstraderError::invalid(
            "strategy",
            "position_size",
            "position_size must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_top_k(config: &dyn ConfigPort) -> Result<(), NewstraderError> {
    for key in ["k", "rebalance_every"] {
        if read_usize(config, "strategy", key, 1)? < 1 {
            return Err(NewstraderError::invalid(
                "strategy",
                key,
                format!("{key} must be at least 1"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const BASE: &str = "[backtest]\nstart_date = 2024-01-01\nend_date = 2024-12-31\nsecurities = AAPL,MSFT\n";

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn with(extra: &str) -> FileConfigAdapter {
        make_config(&format!("{BASE}{extra}"))
    }

    fn invalid_key(err: NewstraderError) -> String {
        match err {
            NewstraderError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[backtest]
start_date = 2024-01-01
end_date = 2024-06-30
starting_cash = 10000
securities = AAPL, MSFT, GOOG
calendar = business_days
execution_price = close
flat_fee = 1.0
spread_bps = 5
lookback = 3
short_selling_allowed = false
risk_free_rate = 0.04
benchmark = SPY
"#,
        );
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn minimal_config_uses_defaults() {
        assert!(validate_backtest_config(&with("")).is_ok());
    }

    #[test]
    fn negative_starting_cash_fails() {
        let err = validate_backtest_config(&with("starting_cash = -100\n")).unwrap_err();
        assert_eq!(invalid_key(err), "starting_cash");
    }

    #[test]
    fn non_numeric_cash_fails_instead_of_defaulting() {
        let err = validate_backtest_config(&with("starting_cash = lots\n")).unwrap_err();
        assert_eq!(invalid_key(err), "starting_cash");
    }

    #[test]
    fn negative_fees_fail() {
        let err = validate_backtest_config(&with("flat_fee = -1\n")).unwrap_err();
        assert_eq!(invalid_key(err), "flat_fee");
        let err = validate_backtest_config(&with("spread_bps = -0.5\n")).unwrap_err();
        assert_eq!(invalid_key(err), "spread_bps");
    }

    #[test]
    fn risk_free_rate_out_of_range_fails() {
        let err = validate_backtest_config(&with("risk_free_rate = 1.5\n")).unwrap_err();
        assert_eq!(invalid_key(err), "risk_free_rate");
    }

    #[test]
    fn invalid_start_date_format_fails() {
        let config = make_config("[backtest]\nstart_date = 2024/01/01\nend_date = 2024-12-31\nsecurities = X\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "start_date");
    }

    #[test]
    fn missing_end_date_fails() {
        let config = make_config("[backtest]\nstart_date = 2024-01-01\nsecurities = X\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, NewstraderError::ConfigMissing { key, .. } if key == "end_date"));
    }

    #[test]
    fn start_date_after_end_date_fails() {
        let config = make_config("[backtest]\nstart_date = 2024-12-31\nend_date = 2024-01-01\nsecurities = X\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "start_date");
    }

    #[test]
    fn single_day_range_is_valid() {
        let config = make_config("[backtest]\nstart_date = 2024-01-02\nend_date = 2024-01-02\nsecurities = X\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn missing_securities_fails() {
        let config = make_config("[backtest]\nstart_date = 2024-01-01\nend_date = 2024-12-31\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, NewstraderError::ConfigMissing { key, .. } if key == "securities"));
    }

    #[test]
    fn duplicate_securities_fail() {
        let config = make_config("[backtest]\nstart_date = 2024-01-01\nend_date = 2024-12-31\nsecurities = X,Y,x\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "securities");
    }

    #[test]
    fn unknown_choices_fail() {
        let err = validate_backtest_config(&with("calendar = lunar\n")).unwrap_err();
        assert_eq!(invalid_key(err), "calendar");
        let err = validate_backtest_config(&with("execution_price = vwap\n")).unwrap_err();
        assert_eq!(invalid_key(err), "execution_price");
        let err = validate_backtest_config(&with("lookback = later\n")).unwrap_err();
        assert_eq!(invalid_key(err), "lookback");
        let err = validate_backtest_config(&with("lookback = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "lookback");
    }

    #[test]
    fn benchmark_must_be_single() {
        let err = validate_backtest_config(&with("benchmark = SPY,QQQ\n")).unwrap_err();
        assert_eq!(invalid_key(err), "benchmark");
    }

    #[test]
    fn data_section_requires_prices_dir() {
        assert!(validate_data_config(&make_config("[data]\nprices_dir = ./prices\n")).is_ok());
        let err = validate_data_config(&make_config("[data]\n")).unwrap_err();
        assert!(matches!(err, NewstraderError::ConfigMissing { key, .. } if key == "prices_dir"));
    }

    #[test]
    fn valid_strategy_configs_pass() {
        let threshold = make_config(
            "[strategy]\ntype = threshold\nbuy_threshold = 0.6\nsell_threshold = -0.2\nposition_size = 0.25\n",
        );
        assert!(validate_strategy_config(&threshold).is_ok());
        let top_k = make_config("[strategy]\ntype = top_k\nk = 3\nrebalance_every = 5\n");
        assert!(validate_strategy_config(&top_k).is_ok());
        let hold = make_config("[strategy]\ntype = buy_and_hold\n");
        assert!(validate_strategy_config(&hold).is_ok());
        assert!(validate_strategy_config(&make_config("[backtest]\n")).is_ok());
    }

    #[test]
    fn unknown_strategy_type_fails() {
        let err = validate_strategy_config(&make_config("[strategy]\ntype = momentum\n")).unwrap_err();
        assert_eq!(invalid_key(err), "type");
    }

    #[test]
    fn inverted_thresholds_fail() {
        let config = make_config("[strategy]\nbuy_threshold = -0.5\nsell_threshold = 0.5\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "sell_threshold");
    }

    #[test]
    fn position_size_out_of_range_fails() {
        let err = validate_strategy_config(&make_config("[strategy]\nposition_size = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "position_size");
        let err = validate_strategy_config(&make_config("[strategy]\nposition_size = 1.5\n")).unwrap_err();
        assert_eq!(invalid_key(err), "position_size");
    }

    #[test]
    fn top_k_zero_fails() {
        let err = validate_strategy_config(&make_config("[strategy]\ntype = top_k\nk = 0\n")).unwrap_err();
        assert_eq!(invalid_key(err), "k");
        let err = validate_strategy_config(&make_config("[strategy]\ntype = top_k\nk = -2\n")).unwrap_err();
        assert_eq!(invalid_key(err), "k");
    }
}
