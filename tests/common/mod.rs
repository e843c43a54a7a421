#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::RefCell;
use std::io::Write;
use tradejournal::domain::error::JournalError;
use tradejournal::domain::trade::TradeRecord;
use tradejournal::ports::trade_store_port::TradeStorePort;

pub const LOG_HEADER: &str = "DateTime\tSymbol\tQuantity\tFillPrice\tBuySell\tOpenClose";

/// In-memory trade store; an injected error makes every call fail.
pub struct MockTradeStore {
    pub trades: RefCell<Vec<TradeRecord>>,
    pub error: Option<String>,
}

impl MockTradeStore {
    pub fn new() -> Self {
        Self {
            trades: RefCell::new(Vec::new()),
            error: None,
        }
    }

    pub fn with_trades(trades: Vec<TradeRecord>) -> Self {
        Self {
            trades: RefCell::new(trades),
            error: None,
        }
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }

    fn check(&self) -> Result<(), JournalError> {
        match &self.error {
            Some(reason) => Err(JournalError::Database {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl TradeStorePort for MockTradeStore {
    fn save_trades(&self, trades: &[TradeRecord]) -> Result<usize, JournalError> {
        self.check()?;
        self.trades.borrow_mut().extend_from_slice(trades);
        Ok(trades.len())
    }

    fn load_trades(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TradeRecord>, JournalError> {
        self.check()?;
        Ok(self
            .trades
            .borrow()
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .cloned()
            .collect())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Tab-delimited fill row in the broker's column order.
pub fn fill_row(
    timestamp: &str,
    symbol: &str,
    quantity: f64,
    price: f64,
    side: &str,
    action: &str,
) -> String {
    format!("{timestamp}\t{symbol}\t{quantity}\t{price}\t{side}\t{action}")
}

/// A full log: header followed by the given rows.
pub fn fill_log(rows: &[String]) -> String {
    let mut text = String::from(LOG_HEADER);
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text.push('\n');
    text
}

/// One long MES round trip (+4.5 points, 5.0 per point) and one short ES loser
/// (-2 points, 50.0 per point) on 3 and 5 March 2025.
pub fn sample_log() -> String {
    fill_log(&[
        fill_row("03/03/2025 09:30:00", "F.US.MESH25", 1.0, 6000.25, "Buy", "Open"),
        fill_row("03/03/2025 09:45:00", "F.US.MESH25", 1.0, 6004.75, "Sell", "Close"),
        fill_row("03/05/2025 10:00:00", "F.US.ESH25", 1.0, 6010.0, "Sell", "Open"),
        fill_row("03/05/2025 10:20:00", "F.US.ESH25", 1.0, 6012.0, "Buy", "Close"),
    ])
}

pub fn record(y: i32, m: u32, d: u32, symbol: &str, profit: f64) -> TradeRecord {
    TradeRecord::new(date(y, m, d), symbol, profit)
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
