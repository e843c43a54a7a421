//! Cumulative P&L series for the dashboard chart.
//!
//! Records are filtered to the viewed month or year, ordered, and folded into a
//! running total. Where the running total changes sign between two trades a
//! synthetic zero point is inserted so that a caller drawing the positive and
//! negative halves in different colours gets segments that meet on the axis.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime};
use serde::Serialize;

use super::trade::TradeRecord;

/// Fraction of the value range added above and below the chart domain.
pub const DOMAIN_PADDING: f64 = 0.25;

pub const LABEL_FORMAT: &str = "%b %-d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Monthly,
    Yearly,
}

impl ViewMode {
    pub fn contains(self, reference: NaiveDate, date: NaiveDate) -> bool {
        match self {
            ViewMode::Monthly => {
                date.year() == reference.year() && date.month() == reference.month()
            }
            ViewMode::Yearly => date.year() == reference.year(),
        }
    }
}

impl std::str::FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monthly" | "month" => Ok(ViewMode::Monthly),
            "yearly" | "year" => Ok(ViewMode::Yearly),
            other => Err(format!("unknown view mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub label: String,
    pub cumulative_pnl: f64,
    pub trade_profit: f64,
    pub timestamp_millis: i64,
    /// 1-based position among real trades; `None` for interpolated zero points.
    pub sequence_index: Option<usize>,
    pub symbol: Option<String>,
    /// Cumulative value when it is non-negative.
    pub positive_pnl: Option<f64>,
    /// Cumulative value when it is negative.
    pub negative_pnl: Option<f64>,
}

impl ChartPoint {
    fn trade(record: &TradeRecord, cumulative: f64, sequence_index: usize) -> Self {
        let cumulative_pnl = round2(cumulative);
        let (positive_pnl, negative_pnl) = split_by_sign(cumulative, cumulative_pnl);
        Self {
            label: record.date.format(LABEL_FORMAT).to_string(),
            cumulative_pnl,
            trade_profit: round2(record.profit),
            timestamp_millis: day_millis(record.date),
            sequence_index: Some(sequence_index),
            symbol: Some(record.symbol.clone()),
            positive_pnl,
            negative_pnl,
        }
    }

    fn zero_cross(timestamp_millis: i64) -> Self {
        let label = DateTime::from_timestamp_millis(timestamp_millis)
            .map(|dt| dt.format(LABEL_FORMAT).to_string())
            .unwrap_or_default();
        Self {
            label,
            cumulative_pnl: 0.0,
            trade_profit: 0.0,
            timestamp_millis,
            sequence_index: None,
            symbol: None,
            positive_pnl: Some(0.0),
            negative_pnl: None,
        }
    }

    pub fn is_interpolated(&self) -> bool {
        self.sequence_index.is_none()
    }
}

/// Vertical extent of the chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisDomain {
    pub min: f64,
    pub max: f64,
}

impl AxisDomain {
    /// Domain spanning zero and every value, padded outward by a quarter of the range.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let (min, max) = values
            .into_iter()
            .fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let pad = (max - min) * DOMAIN_PADDING;
        Self {
            min: min - pad,
            max: max + pad,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PnlSeries {
    pub mode: ViewMode,
    pub reference: NaiveDate,
    pub points: Vec<ChartPoint>,
    pub domain: AxisDomain,
    /// X-axis labels: first and last point only.
    pub ticks: Vec<String>,
}

impl PnlSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn trade_points(&self) -> impl Iterator<Item = &ChartPoint> {
        self.points.iter().filter(|p| !p.is_interpolated())
    }

    /// Final cumulative value, zero for an empty series.
    pub fn total(&self) -> f64 {
        self.points.last().map(|p| p.cumulative_pnl).unwrap_or(0.0)
    }
}

/// Round to cents. Values that round to zero come out as `+0.0`, never `-0.0`.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0 + 0.0
}

fn split_by_sign(exact: f64, rounded: f64) -> (Option<f64>, Option<f64>) {
    if exact >= 0.0 {
        (Some(rounded), None)
    } else {
        (None, Some(rounded))
    }
}

fn day_millis(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

fn crosses_zero(prev: f64, curr: f64) -> bool {
    (prev < 0.0 && curr >= 0.0) || (prev >= 0.0 && curr < 0.0)
}

/// Timestamp where the straight line between two points meets zero.
fn zero_cross_millis(prev_millis: i64, prev_pnl: f64, curr_millis: i64, curr_pnl: f64) -> i64 {
    let total = prev_pnl.abs() + curr_pnl.abs();
    if total == 0.0 {
        return prev_millis;
    }
    let weight = prev_pnl.abs() / total;
    prev_millis + ((curr_millis - prev_millis) as f64 * weight).round() as i64
}

/// Order records by date; within one date, records with an entry time are
/// arranged by that time across the slots they occupy while untimed records
/// keep their input position.
pub fn sort_records(records: &mut [TradeRecord]) {
    records.sort_by_key(|r| r.date);

    let mut start = 0;
    while start < records.len() {
        let date = records[start].date;
        let end = start + records[start..].iter().take_while(|r| r.date == date).count();
        order_timed_slots(&mut records[start..end]);
        start = end;
    }
}

fn order_timed_slots(run: &mut [TradeRecord]) {
    let slots: Vec<usize> = run
        .iter()
        .enumerate()
        .filter(|(_, r)| r.entry_time.is_some())
        .map(|(i, _)| i)
        .collect();
    if slots.len() < 2 {
        return;
    }

    let mut timed: Vec<TradeRecord> = slots.iter().map(|&i| run[i].clone()).collect();
    timed.sort_by(|a, b| a.entry_time.cmp(&b.entry_time));
    for (slot, record) in slots.into_iter().zip(timed) {
        run[slot] = record;
    }
}

/// Build the chart series for the month or year containing `reference`.
pub fn build_pnl_series(
    records: &[TradeRecord],
    mode: ViewMode,
    reference: NaiveDate,
) -> PnlSeries {
    let mut selected: Vec<TradeRecord> = records
        .iter()
        .filter(|r| mode.contains(reference, r.date))
        .cloned()
        .collect();
    sort_records(&mut selected);

    let mut points: Vec<ChartPoint> = Vec::with_capacity(selected.len() * 2);
    let mut cumulative = 0.0_f64;
    let mut previous: Option<(i64, f64)> = None;

    for (i, record) in selected.iter().enumerate() {
        cumulative += record.profit;
        let point = ChartPoint::trade(record, cumulative, i + 1);

        if let Some((prev_millis, prev_pnl)) = previous {
            if crosses_zero(prev_pnl, cumulative) {
                let at =
                    zero_cross_millis(prev_millis, prev_pnl, point.timestamp_millis, cumulative);
                points.push(ChartPoint::zero_cross(at));
            }
        }

        previous = Some((point.timestamp_millis, cumulative));
        points.push(point);
    }

    let domain = AxisDomain::from_values(points.iter().map(|p| p.cumulative_pnl));
    let ticks = edge_labels(&points);

    tracing::debug!(
        mode = ?mode,
        %reference,
        trades = selected.len(),
        points = points.len(),
        "built pnl series"
    );

    PnlSeries {
        mode,
        reference,
        points,
        domain,
        ticks,
    }
}

fn edge_labels(points: &[ChartPoint]) -> Vec<String> {
    match points {
        [] => Vec::new(),
        [only] => vec![only.label.clone()],
        [first, .., last] => vec![first.label.clone(), last.label.clone()],
    }
}
