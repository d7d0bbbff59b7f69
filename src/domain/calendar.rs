//! Trading calendar construction and business-day arithmetic.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::str::FromStr;

use super::market_data::MarketData;
use super::security::Security;

/// Where the simulated dates come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalendarSource {
    /// Union of dates on which any configured security has a bar.
    #[default]
    MarketData,
    /// Every Monday to Friday in range, bars or not.
    BusinessDays,
}

impl FromStr for CalendarSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "market_data" | "market-data" => Ok(CalendarSource::MarketData),
            "business_days" | "business-days" => Ok(CalendarSource::BusinessDays),
            other => Err(format!(
                "expected market_data or business_days, got '{other}'"
            )),
        }
    }
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Move `days` business days from `start` (negative moves backwards).
/// Stops at the last representable date if the range runs out.
pub fn add_business_days(start: NaiveDate, days: i64) -> NaiveDate {
    let mut current = start;
    let mut added = 0;
    while added < days.unsigned_abs() {
        let Some(moved) = step(current, days < 0) else {
            break;
        };
        current = moved;
        if is_business_day(current) {
            added += 1;
        }
    }
    current
}

/// Offset `start` by `days` calendar days, then roll onto a business day in
/// the direction of travel.
pub fn next_business_day(start: NaiveDate, days: i64) -> NaiveDate {
    let backwards = days < 0;
    let mut current = if backwards {
        start.checked_sub_days(Days::new(days.unsigned_abs()))
    } else {
        start.checked_add_days(Days::new(days.unsigned_abs()))
    }
    .unwrap_or(start);
    while !is_business_day(current) {
        match step(current, backwards) {
            Some(moved) => current = moved,
            None => break,
        }
    }
    current
}

fn step(date: NaiveDate, backwards: bool) -> Option<NaiveDate> {
    if backwards {
        date.pred_opt()
    } else {
        date.succ_opt()
    }
}

pub fn business_days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_business_day(*d))
        .collect()
}

pub fn build_calendar(
    source: CalendarSource,
    market: &MarketData,
    securities: &[Security],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<NaiveDate> {
    match source {
        CalendarSource::MarketData => market.dates_between(securities, start, end),
        CalendarSource::BusinessDays => business_days_between(start, end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_bar::PriceBar;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekends_are_not_business_days() {
        // 2024-01-06 is a Saturday
        assert!(!is_business_day(d(2024, 1, 6)));
        assert!(!is_business_day(d(2024, 1, 7)));
        assert!(is_business_day(d(2024, 1, 8)));
    }

    #[test]
    fn add_business_days_skips_weekend() {
        // Friday + 1 business day = Monday
        assert_eq!(add_business_days(d(2024, 1, 5), 1), d(2024, 1, 8));
        assert_eq!(add_business_days(d(2024, 1, 8), -1), d(2024, 1, 5));
        assert_eq!(add_business_days(d(2024, 1, 3), 0), d(2024, 1, 3));
        assert_eq!(add_business_days(d(2024, 1, 1), 5), d(2024, 1, 8));
    }

    #[test]
    fn next_business_day_rolls_in_direction_of_travel() {
        // Thu + 2 = Sat -> roll forward to Mon
        assert_eq!(next_business_day(d(2024, 1, 4), 2), d(2024, 1, 8));
        // Tue - 2 = Sun -> roll back to Fri
        assert_eq!(next_business_day(d(2024, 1, 9), -2), d(2024, 1, 5));
        assert_eq!(next_business_day(d(2024, 1, 9), 0), d(2024, 1, 9));
    }

    #[test]
    fn stepping_stops_at_date_range_edges() {
        assert_eq!(add_business_days(NaiveDate::MAX, 10), NaiveDate::MAX);
        assert_eq!(add_business_days(NaiveDate::MIN, -10), NaiveDate::MIN);
        assert_eq!(next_business_day(NaiveDate::MAX, 3), NaiveDate::MAX);
        assert_eq!(next_business_day(NaiveDate::MIN, -3), NaiveDate::MIN);
    }

    #[test]
    fn business_days_between_is_inclusive() {
        let days = business_days_between(d(2024, 1, 5), d(2024, 1, 9));
        assert_eq!(days, vec![d(2024, 1, 5), d(2024, 1, 8), d(2024, 1, 9)]);
        assert!(business_days_between(d(2024, 1, 9), d(2024, 1, 5)).is_empty());
    }

    #[test]
    fn calendar_from_market_data() {
        let market = MarketData::new(vec![
            PriceBar {
                security: Security::from("X"),
                date: d(2024, 1, 2),
                open: 1.0,
                close: 1.0,
            },
            PriceBar {
                security: Security::from("Y"),
                date: d(2024, 1, 4),
                open: 1.0,
                close: 1.0,
            },
        ]);
        let secs = vec![Security::from("X"), Security::from("Y")];
        let cal = build_calendar(
            CalendarSource::MarketData,
            &market,
            &secs,
            d(2024, 1, 1),
            d(2024, 1, 31),
        );
        assert_eq!(cal, vec![d(2024, 1, 2), d(2024, 1, 4)]);

        let only_x = build_calendar(
            CalendarSource::MarketData,
            &market,
            &secs[..1],
            d(2024, 1, 1),
            d(2024, 1, 31),
        );
        assert_eq!(only_x, vec![d(2024, 1, 2)]);
    }

    #[test]
    fn parse_calendar_source() {
        assert_eq!(
            "business_days".parse::<CalendarSource>(),
            Ok(CalendarSource::BusinessDays)
        );
        assert_eq!(
            "Market_Data".parse::<CalendarSource>(),
            Ok(CalendarSource::MarketData)
        );
        assert!("exchange".parse::<CalendarSource>().is_err());
    }
}
