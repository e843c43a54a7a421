//! Core domain types and logic: log reconstruction and P&L aggregation.

pub mod fill;
pub mod point_value;
pub mod trade;
pub mod reconstructor;
pub mod pnl_series;
pub mod calendar;
pub mod config_validation;
pub mod error;
