//! Trade persistence port trait.

use crate::domain::error::JournalError;
use crate::domain::trade::TradeRecord;
use chrono::NaiveDate;

pub trait TradeStorePort {
    /// Persist records, returning how many were written.
    fn save_trades(&self, trades: &[TradeRecord]) -> Result<usize, JournalError>;

    /// Records dated within `start..=end`, ordered by date then entry time.
    fn load_trades(&self, start: NaiveDate, end: NaiveDate)
    -> Result<Vec<TradeRecord>, JournalError>;
}
