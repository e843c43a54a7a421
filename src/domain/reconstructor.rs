//! Rebuild round-trip trades from a tab-delimited broker fill log.
//!
//! The log carries a header row naming its columns; column order is resolved
//! from that row rather than assumed. Each subsequent row is one fill. Opening
//! fills are held per raw symbol until a closing fill for the same symbol
//! arrives, at which point a [`CompletedTrade`] is emitted. Rows that cannot be
//! read are skipped, never fatal.

use std::collections::{HashMap, VecDeque};

use chrono::NaiveDateTime;

use super::fill::{Action, FillEvent, Side, parse_nonzero_number, parse_timestamp};
use super::point_value::PointValueTable;
use super::trade::CompletedTrade;

pub const COL_DATETIME: &str = "DateTime";
pub const COL_SYMBOL: &str = "Symbol";
pub const COL_QUANTITY: &str = "Quantity";
pub const COL_FILL_PRICE: &str = "FillPrice";
pub const COL_BUY_SELL: &str = "BuySell";
pub const COL_OPEN_CLOSE: &str = "OpenClose";

const NOISE_PREFIXES: &[&str] = &["ActivityType", "DateTime"];

/// What to do with an `Open` fill when the symbol already has one pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenPolicy {
    /// Replace the pending open; the earlier entry is lost.
    #[default]
    Overwrite,
    /// Queue opens per symbol; each close consumes the oldest.
    Queue,
}

impl std::str::FromStr for OpenPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(OpenPolicy::Overwrite),
            "queue" | "fifo" => Ok(OpenPolicy::Queue),
            other => Err(format!("unknown open policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconstructorConfig {
    pub open_policy: OpenPolicy,
    pub point_values: PointValueTable,
}

/// Counters describing what happened to each log row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconstructionReport {
    pub header_found: bool,
    pub fills_read: usize,
    pub rows_skipped: usize,
    pub unmatched_closes: usize,
    /// Pending opens replaced by a later open on the same symbol.
    pub overwritten_opens: usize,
    /// Opens still pending when the log ended.
    pub open_positions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    datetime: usize,
    symbol: usize,
    quantity: usize,
    fill_price: usize,
    buy_sell: usize,
    open_close: usize,
}

impl Columns {
    fn resolve(header: &str) -> Option<Self> {
        let names: Vec<&str> = header.split('\t').map(str::trim).collect();
        let find = |name: &str| names.iter().position(|n| *n == name);
        Some(Self {
            datetime: find(COL_DATETIME)?,
            symbol: find(COL_SYMBOL)?,
            quantity: find(COL_QUANTITY)?,
            fill_price: find(COL_FILL_PRICE)?,
            buy_sell: find(COL_BUY_SELL)?,
            open_close: find(COL_OPEN_CLOSE)?,
        })
    }

    fn read(&self, line: &str) -> Result<FillEvent, &'static str> {
        let cols: Vec<&str> = line.split('\t').collect();
        let cell = |idx: usize| cols.get(idx).map(|c| c.trim()).unwrap_or("");

        let date_str = cell(self.datetime);
        if date_str.is_empty() {
            return Err("empty date");
        }
        let symbol = cell(self.symbol);
        if symbol.is_empty() {
            return Err("empty symbol");
        }
        let quantity = parse_nonzero_number(cell(self.quantity)).ok_or("invalid quantity")?;
        let fill_price =
            parse_nonzero_number(cell(self.fill_price)).ok_or("invalid fill price")?;
        let timestamp = parse_timestamp(date_str).ok_or("invalid date")?;
        let side: Side = cell(self.buy_sell).parse().map_err(|_| "invalid side")?;
        let action: Action = cell(self.open_close).parse().map_err(|_| "invalid open/close")?;

        Ok(FillEvent {
            timestamp,
            symbol: symbol.to_string(),
            quantity,
            fill_price,
            side,
            action,
        })
    }
}

#[derive(Debug, Clone)]
struct OpenPosition {
    timestamp: NaiveDateTime,
    quantity: f64,
    entry_price: f64,
    side: Side,
}

/// Pending opens keyed by the literal symbol string.
struct OpenBook {
    policy: OpenPolicy,
    pending: HashMap<String, VecDeque<OpenPosition>>,
}

impl OpenBook {
    fn new(policy: OpenPolicy) -> Self {
        Self {
            policy,
            pending: HashMap::new(),
        }
    }

    /// Returns true when an earlier pending open was discarded.
    fn open(&mut self, symbol: &str, position: OpenPosition) -> bool {
        let queue = self.pending.entry(symbol.to_string()).or_default();
        match self.policy {
            OpenPolicy::Overwrite => {
                let replaced = !queue.is_empty();
                queue.clear();
                queue.push_back(position);
                replaced
            }
            OpenPolicy::Queue => {
                queue.push_back(position);
                false
            }
        }
    }

    fn close(&mut self, symbol: &str) -> Option<OpenPosition> {
        let queue = self.pending.get_mut(symbol)?;
        let position = queue.pop_front();
        if queue.is_empty() {
            self.pending.remove(symbol);
        }
        position
    }

    fn remaining(&self) -> usize {
        self.pending.values().map(VecDeque::len).sum()
    }
}

/// Profit of a round trip: directional price delta times quantity times point value.
pub fn trade_profit(
    side: Side,
    entry_price: f64,
    exit_price: f64,
    quantity: f64,
    point_value: f64,
) -> f64 {
    (exit_price - entry_price) * side.direction() * quantity * point_value
}

/// Reconstruct trades with the default overwrite policy and built-in point values.
pub fn reconstruct_trades(text: &str) -> Vec<CompletedTrade> {
    reconstruct_trades_with(text, &ReconstructorConfig::default())
}

pub fn reconstruct_trades_with(text: &str, config: &ReconstructorConfig) -> Vec<CompletedTrade> {
    reconstruct_with_report(text, config).0
}

/// Reconstruct trades in the order their closing fills appear, together with
/// a report of skipped and unmatched rows.
pub fn reconstruct_with_report(
    text: &str,
    config: &ReconstructorConfig,
) -> (Vec<CompletedTrade>, ReconstructionReport) {
    let mut report = ReconstructionReport::default();
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<&str> = text.lines().collect();

    let Some(columns) = lines
        .iter()
        .find(|l| l.contains(COL_DATETIME))
        .and_then(|header| Columns::resolve(header))
    else {
        tracing::warn!("trade log has no usable header row; no trades reconstructed");
        return (Vec::new(), report);
    };
    report.header_found = true;

    let mut book = OpenBook::new(config.open_policy);
    let mut trades = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() || NOISE_PREFIXES.iter().any(|p| line.starts_with(p)) {
            continue;
        }

        let fill = match columns.read(line) {
            Ok(fill) => fill,
            Err(reason) => {
                tracing::debug!(line = idx + 1, reason, "skipping trade log row");
                report.rows_skipped += 1;
                continue;
            }
        };
        report.fills_read += 1;

        match fill.action {
            Action::Open => {
                let position = OpenPosition {
                    timestamp: fill.timestamp,
                    quantity: fill.quantity,
                    entry_price: fill.fill_price,
                    side: fill.side,
                };
                if book.open(&fill.symbol, position) {
                    tracing::debug!(line = idx + 1, symbol = %fill.symbol, "pending open overwritten");
                    report.overwritten_opens += 1;
                }
            }
            Action::Close => {
                let Some(open) = book.close(&fill.symbol) else {
                    tracing::debug!(line = idx + 1, symbol = %fill.symbol, "close without matching open");
                    report.unmatched_closes += 1;
                    continue;
                };
                let point_value = config.point_values.point_value(&fill.symbol);
                let profit = trade_profit(
                    open.side,
                    open.entry_price,
                    fill.fill_price,
                    open.quantity,
                    point_value,
                );
                trades.push(CompletedTrade {
                    date: open.timestamp,
                    closed_at: fill.timestamp,
                    symbol: fill.symbol,
                    side: open.side,
                    quantity: open.quantity,
                    entry_price: open.entry_price,
                    exit_price: fill.fill_price,
                    profit,
                });
            }
        }
    }

    report.open_positions = book.remaining();
    tracing::info!(
        trades = trades.len(),
        skipped = report.rows_skipped,
        unmatched_closes = report.unmatched_closes,
        open_positions = report.open_positions,
        "trade log reconstructed"
    );
    (trades, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    const HEADER: &str = "DateTime\tSymbol\tQuantity\tFillPrice\tBuySell\tOpenClose";

    fn log(rows: &[&str]) -> String {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    #[test]
    fn single_round_trip_emits_one_trade() {
        let text = log(&[
            "11/03/2025 09:30:00\tF.US.MESZ25\t1\t6000.25\tBuy\tOpen",
            "11/03/2025 09:45:00\tF.US.MESZ25\t1\t6004.75\tSell\tClose",
        ]);
        let trades = reconstruct_trades(&text);

        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert_eq!(t.symbol, "F.US.MESZ25");
        assert_eq!(t.entry_price, 6000.25);
        assert_eq!(t.exit_price, 6004.75);
        assert_eq!(t.side, Side::Buy);
        assert_relative_eq!(t.profit, 4.5 * 5.0);
        assert_eq!(
            t.date,
            NaiveDate::from_ymd_opt(2025, 11, 3)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn profit_sign_for_long_and_short() {
        assert_relative_eq!(trade_profit(Side::Buy, 100.0, 110.0, 2.0, 50.0), 1000.0);
        assert_relative_eq!(trade_profit(Side::Sell, 100.0, 110.0, 2.0, 50.0), -1000.0);
    }

    #[test]
    fn short_trade_uses_open_side() {
        let text = log(&[
            "11/03/2025 09:30:00\tESZ5\t2\t110\tSell\tOpen",
            "11/03/2025 09:50:00\tESZ5\t2\t100\tBuy\tClose",
        ]);
        let trades = reconstruct_trades(&text);
        assert_eq!(trades.len(), 1);
        assert_relative_eq!(trades[0].profit, 1000.0);
    }

    #[test]
    fn columns_resolved_by_name_not_position() {
        let text = "ActivityType\tOpenClose\tBuySell\tFillPrice\tQuantity\tSymbol\tDateTime\n\
            Fills\tOpen\tBuy\t100\t1\tGCZ5\t2025-11-03 10:00:00\n\
            Fills\tClose\tSell\t102\t1\tGCZ5\t2025-11-03 10:30:00\n";
        let trades = reconstruct_trades(text);
        assert_eq!(trades.len(), 1);
        assert_relative_eq!(trades[0].profit, 200.0);
    }

    #[test]
    fn unmatched_close_is_dropped() {
        let text = log(&["11/03/2025 09:45:00\tESZ5\t1\t6004.75\tSell\tClose"]);
        let (trades, report) = reconstruct_with_report(&text, &ReconstructorConfig::default());
        assert!(trades.is_empty());
        assert_eq!(report.unmatched_closes, 1);
    }

    #[test]
    fn missing_header_yields_no_trades() {
        let text = "11/03/2025 09:30:00\tESZ5\t1\t100\tBuy\tOpen\n\
            11/03/2025 09:40:00\tESZ5\t1\t101\tSell\tClose\n";
        let (trades, report) = reconstruct_with_report(text, &ReconstructorConfig::default());
        assert!(trades.is_empty());
        assert!(!report.header_found);
    }

    #[test]
    fn header_missing_a_column_yields_no_trades() {
        let text = "DateTime\tSymbol\tQuantity\tFillPrice\tBuySell\n\
            11/03/2025 09:30:00\tESZ5\t1\t100\tBuy\n";
        assert!(reconstruct_trades(text).is_empty());
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let text = log(&[
            "",
            "11/03/2025 09:00:00\tESZ5\t0\t100\tBuy\tOpen",
            "11/03/2025 09:01:00\tESZ5\tabc\t100\tBuy\tOpen",
            "11/03/2025 09:02:00\tESZ5\t1\tNaN\tBuy\tOpen",
            "\tESZ5\t1\t100\tBuy\tOpen",
            "not a date\tESZ5\t1\t100\tBuy\tOpen",
            "11/03/2025 09:03:00\t\t1\t100\tBuy\tOpen",
            "11/03/2025 09:04:00\tESZ5",
            "11/03/2025 09:30:00\tESZ5\t1\t100\tBuy\tOpen",
            "11/03/2025 09:40:00\tESZ5\t1\t101\tSell\tClose",
        ]);
        let (trades, report) = reconstruct_with_report(&text, &ReconstructorConfig::default());
        assert_eq!(trades.len(), 1);
        assert_relative_eq!(trades[0].profit, 50.0);
        assert_eq!(report.rows_skipped, 7);
        assert_eq!(report.fills_read, 2);
    }

    #[test]
    fn noise_lines_are_ignored() {
        let text = format!(
            "ActivityType\tsummary row\n{}\n\n{}\n11/03/2025 09:30:00\tESZ5\t1\t100\tBuy\tOpen\n\
             11/03/2025 09:40:00\tESZ5\t1\t99\tSell\tClose\n",
            HEADER, HEADER
        );
        let (trades, report) = reconstruct_with_report(&text, &ReconstructorConfig::default());
        assert_eq!(trades.len(), 1);
        assert_relative_eq!(trades[0].profit, -50.0);
        assert_eq!(report.rows_skipped, 0);
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let text = format!(
            "{HEADER}\r\n11/03/2025 09:30:00\tMNQZ5\t3\t21000\tBuy\tOpen\r\n\
             11/03/2025 09:40:00\tMNQZ5\t3\t21010\tSell\tClose\r\n"
        );
        let trades = reconstruct_trades(&text);
        assert_eq!(trades.len(), 1);
        assert_relative_eq!(trades[0].profit, 10.0 * 3.0 * 2.0);
    }

    #[test]
    fn byte_order_mark_before_header_is_ignored() {
        let text = format!(
            "\u{feff}{HEADER}\r\n11/03/2025 09:30:00\tESZ5\t1\t6000\tBuy\tOpen\r\n\
             11/03/2025 09:40:00\tESZ5\t1\t6002\tSell\tClose\r\n"
        );
        let (trades, report) = reconstruct_with_report(&text, &ReconstructorConfig::default());
        assert!(report.header_found);
        assert_eq!(trades.len(), 1);
        assert_relative_eq!(trades[0].profit, 100.0);
    }

    #[test]
    fn trades_emitted_in_close_order_with_open_date() {
        let text = log(&[
            "11/03/2025 09:30:00\tESZ5\t1\t100\tBuy\tOpen",
            "11/03/2025 09:31:00\tNQZ5\t1\t200\tSell\tOpen",
            "11/04/2025 10:00:00\tNQZ5\t1\t190\tBuy\tClose",
            "11/05/2025 11:00:00\tESZ5\t1\t101\tSell\tClose",
        ]);
        let trades = reconstruct_trades(&text);
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].symbol, "NQZ5");
        assert_relative_eq!(trades[0].profit, 200.0);
        assert_eq!(trades[0].date.date(), NaiveDate::from_ymd_opt(2025, 11, 3).unwrap());
        assert_eq!(trades[0].closed_at.date(), NaiveDate::from_ymd_opt(2025, 11, 4).unwrap());
        assert_eq!(trades[1].symbol, "ESZ5");
        assert_relative_eq!(trades[1].profit, 50.0);
    }

    #[test]
    fn symbols_are_matched_literally() {
        let text = log(&[
            "11/03/2025 09:30:00\tF.US.ESZ25\t1\t100\tBuy\tOpen",
            "11/03/2025 09:40:00\tESZ25\t1\t101\tSell\tClose",
        ]);
        assert!(reconstruct_trades(&text).is_empty());
    }

    #[test]
    fn second_open_overwrites_first_by_default() {
        let text = log(&[
            "11/03/2025 09:30:00\tESZ5\t1\t100\tBuy\tOpen",
            "11/03/2025 09:35:00\tESZ5\t1\t102\tBuy\tOpen",
            "11/03/2025 09:40:00\tESZ5\t1\t103\tSell\tClose",
            "11/03/2025 09:45:00\tESZ5\t1\t104\tSell\tClose",
        ]);
        let (trades, report) = reconstruct_with_report(&text, &ReconstructorConfig::default());
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].entry_price, 102.0);
        assert_eq!(report.overwritten_opens, 1);
        assert_eq!(report.unmatched_closes, 1);
    }

    #[test]
    fn queue_policy_matches_opens_first_in_first_out() {
        let text = log(&[
            "11/03/2025 09:30:00\tESZ5\t1\t100\tBuy\tOpen",
            "11/03/2025 09:35:00\tESZ5\t1\t102\tBuy\tOpen",
            "11/03/2025 09:40:00\tESZ5\t1\t103\tSell\tClose",
            "11/03/2025 09:45:00\tESZ5\t1\t104\tSell\tClose",
        ]);
        let config = ReconstructorConfig {
            open_policy: OpenPolicy::Queue,
            ..Default::default()
        };
        let (trades, report) = reconstruct_with_report(&text, &config);
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].entry_price, 100.0);
        assert_eq!(trades[1].entry_price, 102.0);
        assert_relative_eq!(trades[0].profit, 150.0);
        assert_relative_eq!(trades[1].profit, 100.0);
        assert_eq!(report.overwritten_opens, 0);
        assert_eq!(report.open_positions, 0);
    }

    #[test]
    fn pending_opens_are_counted() {
        let text = log(&["11/03/2025 09:30:00\tESZ5\t1\t100\tBuy\tOpen"]);
        let (trades, report) = reconstruct_with_report(&text, &ReconstructorConfig::default());
        assert!(trades.is_empty());
        assert_eq!(report.open_positions, 1);
    }

    #[test]
    fn configured_point_values_are_used() {
        let text = log(&[
            "11/03/2025 09:30:00\tXYZQ9\t1\t10\tBuy\tOpen",
            "11/03/2025 09:40:00\tXYZQ9\t1\t12\tSell\tClose",
        ]);
        let config = ReconstructorConfig {
            point_values: PointValueTable::builtin().with_override("XYZ", 25.0),
            ..Default::default()
        };
        let trades = reconstruct_trades_with(&text, &config);
        assert_relative_eq!(trades[0].profit, 50.0);
        assert_relative_eq!(reconstruct_trades(&text)[0].profit, 2.0);
    }

    #[test]
    fn open_policy_parses() {
        assert_eq!("overwrite".parse::<OpenPolicy>(), Ok(OpenPolicy::Overwrite));
        assert_eq!("Queue".parse::<OpenPolicy>(), Ok(OpenPolicy::Queue));
        assert_eq!("fifo".parse::<OpenPolicy>(), Ok(OpenPolicy::Queue));
        assert!("stack".parse::<OpenPolicy>().is_err());
    }
}
