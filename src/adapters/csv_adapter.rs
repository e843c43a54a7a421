//! CSV file trade store.

use crate::domain::error::JournalError;
use crate::domain::fill::Side;
use crate::domain::trade::{TradeExtensions, TradeRecord};
use crate::ports::trade_store_port::TradeStorePort;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;

/// One CSV row. Extensions are embedded as a JSON string column.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    symbol: String,
    profit: f64,
    side: Option<Side>,
    quantity: Option<f64>,
    entry_price: Option<f64>,
    exit_price: Option<f64>,
    entry_time: Option<String>,
    exit_time: Option<String>,
    extensions: String,
}

impl CsvRow {
    fn from_record(record: &TradeRecord) -> Result<Self, JournalError> {
        Ok(Self {
            date: record.date,
            symbol: record.symbol.clone(),
            profit: record.profit,
            side: record.side,
            quantity: record.quantity,
            entry_price: record.entry_price,
            exit_price: record.exit_price,
            entry_time: record.entry_time.clone(),
            exit_time: record.exit_time.clone(),
            extensions: serde_json::to_string(&record.extensions)?,
        })
    }

    fn into_record(self) -> Result<TradeRecord, JournalError> {
        let extensions: TradeExtensions = if self.extensions.trim().is_empty() {
            TradeExtensions::new()
        } else {
            serde_json::from_str(&self.extensions)?
        };
        Ok(TradeRecord {
            date: self.date,
            symbol: self.symbol,
            profit: self.profit,
            side: self.side,
            quantity: self.quantity,
            entry_price: self.entry_price,
            exit_price: self.exit_price,
            entry_time: self.entry_time,
            exit_time: self.exit_time,
            extensions,
        })
    }
}

/// Identity of a trade for duplicate detection, built from fill-derived fields.
fn fill_key(record: &TradeRecord) -> String {
    format!(
        "{}|{}|{:?}|{:?}|{:?}|{:?}|{:?}",
        record.date,
        record.symbol,
        record.entry_time,
        record.exit_time,
        record.entry_price,
        record.exit_price,
        record.quantity
    )
}

pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn csv_error(&self, e: csv::Error) -> JournalError {
        JournalError::Database {
            reason: format!("{}: {}", self.path.display(), e),
        }
    }

    /// Every stored record in file order. A missing file is an empty journal.
    pub fn read_all(&self) -> Result<Vec<TradeRecord>, JournalError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut records = Vec::new();
        for row in rdr.deserialize::<CsvRow>() {
            let row = row.map_err(|e| self.csv_error(e))?;
            records.push(row.into_record()?);
        }
        Ok(records)
    }
}

impl TradeStorePort for CsvAdapter {
    fn save_trades(&self, trades: &[TradeRecord]) -> Result<usize, JournalError> {
        let existing = self.read_all()?;
        let mut seen: HashSet<String> = existing.iter().map(fill_key).collect();
        let write_header = existing.is_empty()
            && fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);

        let mut written = 0;
        for trade in trades {
            if !seen.insert(fill_key(trade)) {
                continue;
            }
            wtr.serialize(CsvRow::from_record(trade)?)
                .map_err(|e| self.csv_error(e))?;
            written += 1;
        }
        wtr.flush()?;

        tracing::debug!(path = %self.path.display(), written, "appended trades to csv store");
        Ok(written)
    }

    fn load_trades(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TradeRecord>, JournalError> {
        let mut trades: Vec<TradeRecord> = self
            .read_all()?
            .into_iter()
            .filter(|r| r.date >= start && r.date <= end)
            .collect();
        trades.sort_by(|a, b| (a.date, &a.entry_time).cmp(&(b.date, &b.entry_time)));
        Ok(trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::ExtensionValue;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (TempDir, CsvAdapter) {
        let dir = TempDir::new().unwrap();
        let adapter = CsvAdapter::new(dir.path().join("trades.csv"));
        (dir, adapter)
    }

    #[test]
    fn missing_file_is_empty_journal() {
        let (_dir, adapter) = setup();
        let loaded = adapter.load_trades(date(2025, 1, 1), date(2025, 12, 31)).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn save_then_load_keeps_all_fields() {
        let (_dir, adapter) = setup();
        let mut record = TradeRecord::new(date(2025, 3, 3), "F.US.MESZ25", -12.5);
        record.side = Some(Side::Sell);
        record.quantity = Some(2.0);
        record.entry_price = Some(6010.0);
        record.exit_price = Some(6011.25);
        record.entry_time = Some("09:30:00".into());
        record.exit_time = Some("09:41:10".into());
        record
            .extensions
            .insert(TradeExtensions::NOTES, ExtensionValue::Text("faded the open".into()));

        assert_eq!(adapter.save_trades(&[record.clone()]).unwrap(), 1);
        let loaded = adapter.load_trades(date(2025, 3, 1), date(2025, 3, 31)).unwrap();
        assert_eq!(loaded, vec![record]);
    }

    #[test]
    fn appends_across_saves_with_single_header() {
        let (_dir, adapter) = setup();
        adapter
            .save_trades(&[TradeRecord::new(date(2025, 3, 1), "ESZ5", 1.0)])
            .unwrap();
        adapter
            .save_trades(&[TradeRecord::new(date(2025, 3, 2), "NQZ5", 2.0)])
            .unwrap();

        let content = fs::read_to_string(&adapter.path).unwrap();
        assert_eq!(content.matches("date,symbol").count(), 1);
        assert_eq!(adapter.read_all().unwrap().len(), 2);
    }

    #[test]
    fn duplicate_trades_are_not_written_twice() {
        let (_dir, adapter) = setup();
        let record = TradeRecord::new(date(2025, 3, 1), "ESZ5", 1.0).with_entry_time("09:30:00");
        assert_eq!(adapter.save_trades(&[record.clone(), record.clone()]).unwrap(), 1);
        assert_eq!(adapter.save_trades(&[record]).unwrap(), 0);
        assert_eq!(adapter.read_all().unwrap().len(), 1);
    }

    #[test]
    fn load_filters_range_and_orders() {
        let (_dir, adapter) = setup();
        adapter
            .save_trades(&[
                TradeRecord::new(date(2025, 3, 9), "late", 1.0).with_entry_time("15:00:00"),
                TradeRecord::new(date(2025, 3, 9), "early", 1.0).with_entry_time("09:00:00"),
                TradeRecord::new(date(2025, 3, 2), "first", 1.0),
                TradeRecord::new(date(2025, 4, 2), "outside", 1.0),
            ])
            .unwrap();

        let loaded = adapter.load_trades(date(2025, 3, 1), date(2025, 3, 31)).unwrap();
        let symbols: Vec<&str> = loaded.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["first", "early", "late"]);
    }

    #[test]
    fn corrupt_file_is_a_database_error() {
        let (_dir, adapter) = setup();
        fs::write(
            &adapter.path,
            "date,symbol,profit,side,quantity,entry_price,exit_price,entry_time,exit_time,extensions\n\
             not-a-date,ESZ5,1.0,,,,,,,\n",
        )
        .unwrap();
        let err = adapter.read_all().unwrap_err();
        assert!(matches!(err, JournalError::Database { .. }));
    }
}
