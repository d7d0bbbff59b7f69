//! News-derived signals.
//!
//! The sentiment model is external; this module only defines the values it
//! hands over and how categorical outputs compare against numeric thresholds.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use super::security::Security;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalCategory {
    Buy,
    Hold,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalValue {
    Score(f64),
    Category(SignalCategory),
}

impl SignalValue {
    /// Numeric score in -1..=1. Categories map to 1, 0 and -1.
    pub fn score(&self) -> f64 {
        match self {
            SignalValue::Score(s) => s.clamp(-1.0, 1.0),
            SignalValue::Category(SignalCategory::Buy) => 1.0,
            SignalValue::Category(SignalCategory::Hold) => 0.0,
            SignalValue::Category(SignalCategory::Sell) => -1.0,
        }
    }
}

impl FromStr for SignalValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_uppercase().as_str() {
            "BUY" => return Ok(SignalValue::Category(SignalCategory::Buy)),
            "HOLD" => return Ok(SignalValue::Category(SignalCategory::Hold)),
            "SELL" => return Ok(SignalValue::Category(SignalCategory::Sell)),
            _ => {}
        }
        let score: f64 = trimmed
            .parse()
            .map_err(|_| format!("expected a score or BUY/HOLD/SELL, got '{trimmed}'"))?;
        if !score.is_finite() {
            return Err(format!("score must be finite, got '{trimmed}'"));
        }
        Ok(SignalValue::Score(score))
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Score(s) => write!(f, "{s}"),
            SignalValue::Category(SignalCategory::Buy) => f.write_str("BUY"),
            SignalValue::Category(SignalCategory::Hold) => f.write_str("HOLD"),
            SignalValue::Category(SignalCategory::Sell) => f.write_str("SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub security: Security,
    pub date: NaiveDate,
    pub value: SignalValue,
}

impl Signal {
    pub fn score(&self) -> f64 {
        self.value.score()
    }
}
