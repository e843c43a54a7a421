//! SQLite trade store.

use crate::domain::error::JournalError;
use crate::domain::fill::Side;
use crate::domain::trade::{TradeExtensions, TradeRecord};
use crate::ports::config_port::ConfigPort;
use crate::ports::trade_store_port::TradeStorePort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn conversion_error(
    column: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, err.into())
}

fn query_error(e: rusqlite::Error) -> JournalError {
    JournalError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, JournalError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| JournalError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| JournalError::Database {
                    reason: e.to_string(),
                })?;

        tracing::debug!(path = %db_path, pool_size, "opened sqlite trade store");
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, JournalError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| JournalError::Database {
                reason: e.to_string(),
            })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, JournalError> {
        self.pool.get().map_err(|e: r2d2::Error| JournalError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), JournalError> {
        let conn = self.connection()?;

        // Unique over the fill-derived columns: re-importing a log inserts nothing.
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                symbol TEXT NOT NULL,
                profit REAL NOT NULL,
                side TEXT,
                quantity REAL,
                entry_price REAL,
                exit_price REAL,
                entry_time TEXT,
                exit_time TEXT,
                extensions TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_trades_date ON trades(date);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_trades_fill ON trades(
                date, symbol, entry_time, exit_time, entry_price, exit_price, quantity
            );",
        )
        .map_err(query_error)?;

        Ok(())
    }

    pub fn count(&self) -> Result<usize, JournalError> {
        let conn = self.connection()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM trades", [], |row| row.get(0))
            .map_err(query_error)?;
        Ok(count as usize)
    }
}

impl TradeStorePort for SqliteAdapter {
    fn save_trades(&self, trades: &[TradeRecord]) -> Result<usize, JournalError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(query_error)?;

        let mut written = 0;
        for trade in trades {
            let extensions = serde_json::to_string(&trade.extensions)?;
            written += tx
                .execute(
                    "INSERT OR IGNORE INTO trades (date, symbol, profit, side, quantity,
                        entry_price, exit_price, entry_time, exit_time, extensions)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        trade.date.format(DATE_FORMAT).to_string(),
                        trade.symbol,
                        trade.profit,
                        trade.side.map(|s| s.to_string()),
                        trade.quantity,
                        trade.entry_price,
                        trade.exit_price,
                        trade.entry_time,
                        trade.exit_time,
                        extensions,
                    ],
                )
                .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;

        if written < trades.len() {
            tracing::info!(
                skipped = trades.len() - written,
                "ignored trades already present in store"
            );
        }
        Ok(written)
    }

    fn load_trades(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<TradeRecord>, JournalError> {
        let conn = self.connection()?;

        let query = "SELECT date, symbol, profit, side, quantity, entry_price, exit_price,
                            entry_time, exit_time, extensions
                     FROM trades
                     WHERE date >= ?1 AND date <= ?2
                     ORDER BY date ASC, entry_time ASC, id ASC";

        let mut stmt = conn.prepare(query).map_err(query_error)?;

        let rows = stmt
            .query_map(
                params![
                    start.format(DATE_FORMAT).to_string(),
                    end.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    let date_str: String = row.get(0)?;
                    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
                        .map_err(|e| conversion_error(0, e))?;
                    let side = row
                        .get::<_, Option<String>>(3)?
                        .map(|s| s.parse::<Side>())
                        .transpose()
                        .map_err(|e| conversion_error(3, e))?;
                    let extensions_json: String = row.get(9)?;
                    let extensions: TradeExtensions = serde_json::from_str(&extensions_json)
                        .map_err(|e| conversion_error(9, e))?;
                    Ok(TradeRecord {
                        date,
                        symbol: row.get(1)?,
                        profit: row.get(2)?,
                        side,
                        quantity: row.get(4)?,
                        entry_price: row.get(5)?,
                        exit_price: row.get(6)?,
                        entry_time: row.get(7)?,
                        exit_time: row.get(8)?,
                        extensions,
                    })
                },
            )
            .map_err(query_error)?;

        let mut trades = Vec::new();
        for row in rows {
            trades.push(row.map_err(query_error)?);
        }

        Ok(trades)
    }
}
