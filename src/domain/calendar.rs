//! Calendar view aggregation and period summary figures.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

use super::trade::TradeRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub pnl: f64,
    pub trades: usize,
}

/// Net P&L per trading day within one calendar month, ordered by date.
/// Days without trades are omitted.
pub fn daily_pnl(records: &[TradeRecord], year: i32, month: u32) -> Vec<CalendarDay> {
    let mut days: BTreeMap<NaiveDate, CalendarDay> = BTreeMap::new();
    for record in records
        .iter()
        .filter(|r| r.date.year() == year && r.date.month() == month)
    {
        let day = days.entry(record.date).or_insert(CalendarDay {
            date: record.date,
            pnl: 0.0,
            trades: 0,
        });
        day.pnl += record.profit;
        day.trades += 1;
    }
    days.into_values().collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSummary {
    pub total_pnl: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl PeriodSummary {
    pub fn compute(records: &[TradeRecord]) -> Self {
        let mut total_pnl = 0.0_f64;
        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for record in records {
            let pnl = record.profit;
            total_pnl += pnl;
            if pnl > 0.0 {
                trades_won += 1;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
        }

        let total_trades = records.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        PeriodSummary {
            total_pnl,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            largest_win,
            largest_loss,
        }
    }
}
