use std::path::Path;

use super::model::{CellValue, FrequencySeries, Trace, FREQUENCY_LABEL};
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::mask::FrequencyMask;
use crate::pipeline::peaks::PeakTable;

pub const CENTER_LABEL: &str = "Center Frequency (MHz)";
pub const SPAN_LABEL: &str = "Span (MHz)";

fn writer(path: &Path) -> PipelineResult<csv::Writer<std::fs::File>> {
    let file = std::fs::File::create(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(csv::Writer::from_writer(file))
}

fn finish(mut writer: csv::Writer<std::fs::File>, path: &Path) -> PipelineResult<()> {
    writer.flush().map_err(|e| PipelineError::io(path, e))
}

/// Two columns: `Frequency (MHz)` and the series label.
pub fn write_series(path: &Path, series: &FrequencySeries) -> PipelineResult<()> {
    let mut w = writer(path)?;
    w.write_record([FREQUENCY_LABEL, series.label.as_str()])?;
    for (f, v) in series.iter() {
        w.write_record([f.to_string(), v.to_string()])?;
    }
    log::info!("Wrote {} row(s) of '{}' to {}", series.len(), series.label, path.display());
    finish(w, path)
}

/// Every column of the trace, overlays included.
pub fn write_trace(path: &Path, trace: &Trace) -> PipelineResult<()> {
    let mut w = writer(path)?;
    w.write_record(trace.column_names())?;
    for i in 0..trace.len() {
        w.write_record(trace.row_cells(i).iter().map(CellValue::to_string))?;
    }
    log::info!("Wrote trace '{}' ({} rows) to {}", trace.name, trace.len(), path.display());
    finish(w, path)
}

/// The union of all recorded columns in first-seen order, then `Trace` and
/// `Notes`.  A row without some column leaves that cell blank.
pub fn write_peak_table(path: &Path, table: &PeakTable) -> PipelineResult<()> {
    let columns = table.columns();
    let mut w = writer(path)?;

    let mut header = columns.clone();
    header.push("Trace".to_string());
    header.push("Notes".to_string());
    w.write_record(&header)?;

    for row in table.rows() {
        let mut record: Vec<String> = columns
            .iter()
            .map(|c| {
                row.columns
                    .iter()
                    .position(|rc| rc == c)
                    .and_then(|i| row.record.cells.get(i))
                    .map(CellValue::to_string)
                    .unwrap_or_default()
            })
            .collect();
        record.push(row.trace.clone());
        record.push(row.notes.clone());
        w.write_record(&record)?;
    }
    log::info!("Wrote {} peak row(s) to {}", table.len(), path.display());
    finish(w, path)
}

impl FrequencyMask {
    /// Save the band table, sorted by center frequency.
    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let mut w = writer(path)?;
        w.write_record([CENTER_LABEL, SPAN_LABEL])?;
        for band in self.bands() {
            w.write_record([band.center_mhz.to_string(), band.span_mhz.to_string()])?;
        }
        finish(w, path)
    }
}
