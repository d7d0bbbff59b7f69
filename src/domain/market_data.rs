//! In-memory price and signal stores with lookback resolution.
//!
//! Both stores keep one date-sorted series per security. Lookups return
//! `None` for "no data" so the engine can apply its lookback policy instead of
//! silently reading a default.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

use super::price_bar::PriceBar;
use super::security::Security;
use super::signal::Signal;

/// Anything stored per security and date.
pub trait Dated {
    fn security(&self) -> &Security;
    fn date(&self) -> NaiveDate;
}

impl Dated for PriceBar {
    fn security(&self) -> &Security {
        &self.security
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Dated for Signal {
    fn security(&self) -> &Security {
        &self.security
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// How far back the engine may reach for a price or signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookbackPolicy {
    /// Only data dated exactly on the simulated date.
    #[default]
    Exact,
    /// Latest data dated within `days` calendar days at or before the date.
    MostRecentWithin { days: u32 },
}

impl LookbackPolicy {
    pub fn accepts(&self, observed: NaiveDate, date: NaiveDate) -> bool {
        if observed > date {
            return false;
        }
        match self {
            LookbackPolicy::Exact => observed == date,
            LookbackPolicy::MostRecentWithin { days } => {
                (date - observed).num_days() <= i64::from(*days)
            }
        }
    }
}

impl FromStr for LookbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_lowercase();
        if trimmed == "exact" {
            return Ok(LookbackPolicy::Exact);
        }
        let digits = trimmed.trim_end_matches('d').trim();
        let days: u32 = digits
            .parse()
            .map_err(|_| format!("expected 'exact' or a number of days, got '{s}'"))?;
        Ok(LookbackPolicy::MostRecentWithin { days })
    }
}

#[derive(Debug, Clone)]
struct Series<T> {
    items: Vec<T>,
    date_index: HashMap<NaiveDate, usize>,
}

impl<T: Dated> Series<T> {
    fn new(mut items: Vec<T>) -> Self {
        items.sort_by_key(|item| item.date());
        // Later duplicates of the same date win.
        let mut deduped: Vec<T> = Vec::with_capacity(items.len());
        for item in items {
            match deduped.last_mut() {
                Some(last) if last.date() == item.date() => *last = item,
                _ => deduped.push(item),
            }
        }
        let date_index = deduped
            .iter()
            .enumerate()
            .map(|(i, item)| (item.date(), i))
            .collect();
        Series {
            items: deduped,
            date_index,
        }
    }

    fn until(&self, date: NaiveDate) -> &[T] {
        let end = self.items.partition_point(|item| item.date() <= date);
        &self.items[..end]
    }
}

/// Immutable store of dated records grouped by security.
#[derive(Debug, Clone)]
pub struct TimeSeriesStore<T> {
    series: BTreeMap<Security, Series<T>>,
}

pub type MarketData = TimeSeriesStore<PriceBar>;
pub type SignalBook = TimeSeriesStore<Signal>;

impl<T: Dated + Clone> TimeSeriesStore<T> {
    pub fn new(records: Vec<T>) -> Self {
        let mut grouped: BTreeMap<Security, Vec<T>> = BTreeMap::new();
        for record in records {
            grouped
                .entry(record.security().clone())
                .or_default()
                .push(record);
        }
        TimeSeriesStore {
            series: grouped
                .into_iter()
                .map(|(security, items)| (security, Series::new(items)))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        TimeSeriesStore {
            series: BTreeMap::new(),
        }
    }

    pub fn securities(&self) -> impl Iterator<Item = &Security> {
        self.series.keys()
    }

    pub fn contains(&self, security: &str) -> bool {
        self.series
            .get(security)
            .is_some_and(|s| !s.items.is_empty())
    }

    pub fn len(&self, security: &str) -> usize {
        self.series.get(security).map_or(0, |s| s.items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(|s| s.items.is_empty())
    }

    pub fn all(&self, security: &str) -> &[T] {
        self.series
            .get(security)
            .map(|s| s.items.as_slice())
            .unwrap_or(&[])
    }

    pub fn on(&self, security: &str, date: NaiveDate) -> Option<&T> {
        let series = self.series.get(security)?;
        series.date_index.get(&date).map(|&i| &series.items[i])
    }

    /// Every record dated at or before `date`.
    pub fn until(&self, security: &str, date: NaiveDate) -> &[T] {
        self.series
            .get(security)
            .map(|s| s.until(date))
            .unwrap_or(&[])
    }

    /// Latest record the lookback policy accepts for `date`.
    pub fn resolve(&self, security: &str, date: NaiveDate, lookback: LookbackPolicy) -> Option<&T> {
        let candidate = self.until(security, date).last()?;
        lookback
            .accepts(candidate.date(), date)
            .then_some(candidate)
    }

    /// Sorted union of record dates across `securities` within `[start, end]`.
    pub fn dates_between(
        &self,
        securities: &[Security],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<NaiveDate> {
        let unique: BTreeSet<NaiveDate> = securities
            .iter()
            .filter_map(|s| self.series.get(s.as_str()))
            .flat_map(|series| series.items.iter().map(Dated::date))
            .filter(|d| *d >= start && *d <= end)
            .collect();
        unique.into_iter().collect()
    }
}
