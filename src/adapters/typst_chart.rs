//! Typst chart rendering for the cumulative P&L series.

use crate::domain::error::JournalError;
use crate::domain::pnl_series::{ChartPoint, PnlSeries};
use crate::ports::chart_port::ChartPort;
use std::fs;
use std::path::Path;

const WIDTH: f64 = 500.0;
const HEIGHT: f64 = 200.0;
const PADDING: f64 = 40.0;

pub const EMPTY_CHART: &str = "No trades in this period.";

pub struct TypstChartAdapter;

impl ChartPort for TypstChartAdapter {
    fn write(&self, series: &PnlSeries, output_path: &Path) -> Result<(), JournalError> {
        fs::write(output_path, format_pnl_chart(series))?;
        Ok(())
    }

    fn extension(&self) -> &'static str {
        "typ"
    }
}

struct Plot {
    min_ts: i64,
    scale_x: f64,
    scale_y: f64,
    domain_min: f64,
}

impl Plot {
    fn new(series: &PnlSeries) -> Self {
        let plot_width = WIDTH - 2.0 * PADDING;
        let plot_height = HEIGHT - 2.0 * PADDING;

        let min_ts = series.points.first().map(|p| p.timestamp_millis).unwrap_or(0);
        let max_ts = series.points.last().map(|p| p.timestamp_millis).unwrap_or(0);
        let span = (max_ts - min_ts) as f64;
        let range = series.domain.max - series.domain.min;

        Self {
            min_ts,
            scale_x: if span > 0.0 { plot_width / span } else { 0.0 },
            scale_y: if range > 0.0 { plot_height / range } else { 1.0 },
            domain_min: series.domain.min,
        }
    }

    fn x(&self, point: &ChartPoint) -> f64 {
        PADDING + (point.timestamp_millis - self.min_ts) as f64 * self.scale_x
    }

    fn y(&self, value: f64) -> f64 {
        HEIGHT - PADDING - (value - self.domain_min) * self.scale_y
    }
}

/// Contiguous index runs of points accepted by `keep`.
fn runs(points: &[ChartPoint], keep: impl Fn(&ChartPoint) -> bool) -> Vec<Vec<&ChartPoint>> {
    let mut out: Vec<Vec<&ChartPoint>> = Vec::new();
    let mut current: Vec<&ChartPoint> = Vec::new();
    for point in points {
        if keep(point) {
            current.push(point);
        } else if !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn path(plot: &Plot, run: &[&ChartPoint], colour: &str) -> String {
    let vertices: Vec<String> = run
        .iter()
        .map(|p| format!("({:.1}pt, {:.1}pt)", plot.x(p), plot.y(p.cumulative_pnl)))
        .collect();
    format!(
        "      place(path(stroke: {} + 1pt, {}))\n",
        colour,
        vertices.join(", ")
    )
}

pub fn format_pnl_chart(series: &PnlSeries) -> String {
    if series.is_empty() {
        return EMPTY_CHART.to_string();
    }

    let plot = Plot::new(series);
    let zero_y = plot.y(0.0);

    let mut body = String::new();
    body.push_str(&format!(
        "      place(line(start: ({:.0}pt, {:.1}pt), end: ({:.0}pt, {:.1}pt), stroke: gray + 0.5pt))\n",
        PADDING,
        zero_y,
        WIDTH - PADDING,
        zero_y
    ));

    // Zero-cross points close both the positive and the negative segment.
    for run in runs(&series.points, |p| p.positive_pnl.is_some()) {
        body.push_str(&path(&plot, &run, "green"));
    }
    for run in runs(&series.points, |p| {
        p.negative_pnl.is_some() || p.is_interpolated()
    }) {
        body.push_str(&path(&plot, &run, "red"));
    }

    let tick_y = HEIGHT - PADDING + 6.0;
    let tick_points = [series.points.first(), series.points.last()];
    for (label, point) in series.ticks.iter().zip(tick_points.into_iter().flatten()) {
        body.push_str(&format!(
            "      place(dx: {:.1}pt, dy: {:.1}pt, text(size: 8pt)[{}])\n",
            plot.x(point),
            tick_y,
            label
        ));
    }

    format!(
        r#"#figure(
  box(
    width: {:.0}pt,
    height: {:.0}pt,
    fill: white,
    {{
{}    }}
  ),
  caption: [Cumulative PnL ({:.2} to {:.2})]
)
"#,
        WIDTH, HEIGHT, body, series.domain.min, series.domain.max
    )
}
