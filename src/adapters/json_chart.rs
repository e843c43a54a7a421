//! JSON export of the P&L series for external chart renderers.

use crate::domain::error::JournalError;
use crate::domain::pnl_series::PnlSeries;
use crate::ports::chart_port::ChartPort;
use std::fs;
use std::path::Path;

pub struct JsonChartAdapter {
    pub pretty: bool,
}

impl JsonChartAdapter {
    pub fn render(&self, series: &PnlSeries) -> Result<String, JournalError> {
        let json = if self.pretty {
            serde_json::to_string_pretty(series)?
        } else {
            serde_json::to_string(series)?
        };
        Ok(json)
    }
}

impl ChartPort for JsonChartAdapter {
    fn write(&self, series: &PnlSeries, output_path: &Path) -> Result<(), JournalError> {
        let mut json = self.render(series)?;
        json.push('\n');
        fs::write(output_path, json)?;
        Ok(())
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}
