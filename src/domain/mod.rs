//! Core domain types and logic.

pub mod security;
pub mod price_bar;
pub mod signal;
pub mod action;
pub mod position;
pub mod portfolio;
pub mod market_data;
pub mod calendar;
pub mod ledger;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod universe;
pub mod config_validation;
pub mod error;
