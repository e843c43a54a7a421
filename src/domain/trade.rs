//! Round-trip trades and their persisted journal records.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::fill::Side;

/// Format used for `entry_time`/`exit_time`; zero padded so that string order
/// equals time order.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// A matched open/close pair produced by the reconstructor.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTrade {
    /// Timestamp of the opening fill.
    pub date: NaiveDateTime,
    pub closed_at: NaiveDateTime,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub profit: f64,
}

impl CompletedTrade {
    pub fn is_long(&self) -> bool {
        self.side == Side::Buy
    }

    pub fn to_record(&self) -> TradeRecord {
        TradeRecord::from(self)
    }
}

/// Typed value stored under a journal extension key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionValue {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

/// Journal annotations attached to a trade.
///
/// Well-known keys:
/// - `edges`: list of edge names the trade was taken on
/// - `mood`: number on a 0-10 slider
/// - `notes`: free text
/// - `questions`: answered custom questions, one `question: answer` per entry
/// - `reviewed`: flag set once the trade has been journaled
///
/// Unknown keys are kept so that annotations written by newer versions survive
/// a round trip through storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeExtensions(BTreeMap<String, ExtensionValue>);

impl TradeExtensions {
    pub const EDGES: &'static str = "edges";
    pub const MOOD: &'static str = "mood";
    pub const NOTES: &'static str = "notes";
    pub const QUESTIONS: &'static str = "questions";
    pub const REVIEWED: &'static str = "reviewed";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ExtensionValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: &str, value: ExtensionValue) -> Option<ExtensionValue> {
        self.0.insert(key.to_string(), value)
    }

    pub fn edges(&self) -> &[String] {
        match self.0.get(Self::EDGES) {
            Some(ExtensionValue::List(items)) => items,
            _ => &[],
        }
    }

    pub fn mood(&self) -> Option<f64> {
        match self.0.get(Self::MOOD) {
            Some(ExtensionValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn notes(&self) -> Option<&str> {
        match self.0.get(Self::NOTES) {
            Some(ExtensionValue::Text(t)) => Some(t),
            _ => None,
        }
    }

    pub fn is_reviewed(&self) -> bool {
        matches!(self.0.get(Self::REVIEWED), Some(ExtensionValue::Flag(true)))
    }
}

/// The record shape exchanged with trade storage and fed to the series builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub profit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<String>,
    #[serde(default, skip_serializing_if = "TradeExtensions::is_empty")]
    pub extensions: TradeExtensions,
}

impl TradeRecord {
    /// A record carrying only the fields the series builder requires.
    pub fn new(date: NaiveDate, symbol: &str, profit: f64) -> Self {
        Self {
            date,
            symbol: symbol.to_string(),
            profit,
            side: None,
            quantity: None,
            entry_price: None,
            exit_price: None,
            entry_time: None,
            exit_time: None,
            extensions: TradeExtensions::new(),
        }
    }

    pub fn with_entry_time(mut self, entry_time: &str) -> Self {
        self.entry_time = Some(entry_time.to_string());
        self
    }

    pub fn with_profit(mut self, profit: f64) -> Self {
        self.profit = profit;
        self
    }
}

impl From<&CompletedTrade> for TradeRecord {
    fn from(trade: &CompletedTrade) -> Self {
        Self {
            date: trade.date.date(),
            symbol: trade.symbol.clone(),
            profit: trade.profit,
            side: Some(trade.side),
            quantity: Some(trade.quantity),
            entry_price: Some(trade.entry_price),
            exit_price: Some(trade.exit_price),
            entry_time: Some(trade.date.format(TIME_FORMAT).to_string()),
            exit_time: Some(trade.closed_at.format(TIME_FORMAT).to_string()),
            extensions: TradeExtensions::new(),
        }
    }
}
