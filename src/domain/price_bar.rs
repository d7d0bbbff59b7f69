//! Daily price bar.

use chrono::NaiveDate;
use std::str::FromStr;

use super::security::Security;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub security: Security,
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
}

impl PriceBar {
    pub fn price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::Close => self.close,
        }
    }
}

/// Which side of the bar trades execute against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceField {
    #[default]
    Open,
    Close,
}

impl FromStr for PriceField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(PriceField::Open),
            "close" => Ok(PriceField::Close),
            other => Err(format!("expected open or close, got '{other}'")),
        }
    }
}
