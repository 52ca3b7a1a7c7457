//! Flat CSV export

use std::path::Path;

use tracing::info;

use super::{ExportReport, ensure_parent};
use crate::harvest::{FIELD_NAMES, Record};
use crate::utils::{HarvestError, HarvestResult};

/// Write `records` as CSV: the ten-column header, then one row per record
///
/// Rows keep accumulator order. An existing file at `path` is replaced.
/// Nothing is created when `records` is empty.
pub fn write_table(records: &[Record], path: &Path) -> HarvestResult<ExportReport> {
    if records.is_empty() {
        return Err(HarvestError::EmptyResultSet);
    }
    ensure_parent(path)?;

    let mut writer = csv::Writer::from_path(path).map_err(|e| HarvestError::io(path, e))?;
    writer
        .write_record(FIELD_NAMES)
        .map_err(|e| HarvestError::io(path, e))?;
    for record in records {
        writer
            .write_record(record.to_row())
            .map_err(|e| HarvestError::io(path, e))?;
    }
    writer.flush().map_err(|e| HarvestError::io(path, e))?;

    info!("Data saved to {}", path.display());
    Ok(ExportReport {
        path: path.to_path_buf(),
        rows: records.len(),
        message: format!("Data saved successfully to {}", path.display()),
    })
}
