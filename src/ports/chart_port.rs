//! Chart rendering port trait.

use crate::domain::error::JournalError;
use crate::domain::pnl_series::PnlSeries;
use std::path::Path;

/// Port for handing a built series to a renderer.
pub trait ChartPort {
    fn write(&self, series: &PnlSeries, output_path: &Path) -> Result<(), JournalError>;

    /// File extension the renderer produces, without the dot.
    fn extension(&self) -> &'static str;
}
