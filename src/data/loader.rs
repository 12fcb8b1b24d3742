use std::path::Path;

use serde::Deserialize;

use super::model::{Polarity, Trace, TraceRow, POSITION_LABEL};
use crate::error::{PipelineError, PipelineResult};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Text inside the last pair of parentheses of a column header:
/// `"Frequency (Hz)"` → `Some("Hz")`.
pub fn unit_of(header: &str) -> Option<&str> {
    let open = header.rfind('(')?;
    let close = header[open..].find(')')? + open;
    let unit = header[open + 1..close].trim();
    (!unit.is_empty()).then_some(unit)
}

/// Multiplier taking a frequency in `unit` to MHz.  Unknown or missing units
/// are taken as MHz.
pub fn mhz_scale(unit: Option<&str>) -> f64 {
    match unit.map(|u| u.trim().to_ascii_lowercase()).as_deref() {
        Some("hz") => 1e-6,
        Some("khz") => 1e-3,
        Some("ghz") => 1e3,
        _ => 1.0,
    }
}

fn csv_reader(path: &Path) -> PipelineResult<csv::Reader<std::fs::File>> {
    let file = std::fs::File::open(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

// ---------------------------------------------------------------------------
// Two-column numeric tables (correction factors)
// ---------------------------------------------------------------------------

/// A (frequency, value) table as read from disk, before any sign handling.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericTable {
    pub frequency_header: Option<String>,
    pub value_header: Option<String>,
    pub rows: Vec<(f64, f64)>,
}

/// Read a two-column numeric table.  The header row is optional: a first row
/// whose frequency cell is not a number is taken as the header.
///
/// Fails with [`PipelineError::MalformedTable`] when a row has fewer than two
/// columns, a cell is not numeric, or there are no data rows at all.
pub fn read_numeric_table(path: &Path, source_name: &str) -> PipelineResult<NumericTable> {
    let mut reader = csv_reader(path)?;
    let mut table = NumericTable {
        frequency_header: None,
        value_header: None,
        rows: Vec::new(),
    };

    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        if record.len() < 2 {
            return Err(PipelineError::malformed(
                source_name,
                format!("row {row_no} has {} column(s), expected 2", record.len()),
            ));
        }

        let freq_cell = &record[0];
        let value_cell = &record[1];
        let Ok(frequency) = freq_cell.parse::<f64>() else {
            if row_no == 0 {
                table.frequency_header = Some(freq_cell.to_string());
                table.value_header = Some(value_cell.to_string());
                continue;
            }
            return Err(PipelineError::malformed(
                source_name,
                format!("row {row_no}: frequency '{freq_cell}' is not a number"),
            ));
        };
        let value = value_cell.parse::<f64>().map_err(|_| {
            PipelineError::malformed(source_name, format!("row {row_no}: value '{value_cell}' is not a number"))
        })?;

        table.rows.push((frequency, value));
    }

    if table.rows.is_empty() {
        return Err(PipelineError::malformed(source_name, "no data rows"));
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Mask band tables
// ---------------------------------------------------------------------------

/// Read the rows of a mask band table as `(center, span)` cells.  Blank or
/// non-numeric cells come back as `None`; the mask engine drops such rows.
pub fn read_band_rows(path: &Path) -> PipelineResult<Vec<(Option<f64>, Option<f64>)>> {
    let mut reader = csv_reader(path)?;
    let mut rows = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        let center = record.get(0).and_then(|c| c.parse::<f64>().ok());
        let span = record.get(1).and_then(|c| c.parse::<f64>().ok());

        // A non-numeric first row is the header.
        if row_no == 0 && center.is_none() && record.get(0).is_some_and(|c| !c.is_empty()) {
            continue;
        }
        rows.push((center, span));
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Normalized trace files
// ---------------------------------------------------------------------------

/// Load a normalized trace.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`  – header row; first column `Frequency (<unit>)`, second column
///   the amplitude, optional `Position` column with Vertical/Horizontal tags
/// * `.json` – `{ "frequency_unit": "Hz", "amplitude_label": "...",
///   "frequency": [...], "amplitude": [...], "position": [...] }`
///
/// Frequencies are converted to MHz.  The trace is named after the file stem.
pub fn load_trace(path: &Path) -> PipelineResult<Trace> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("trace")
        .to_string();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let trace = match ext.as_str() {
        "json" => load_trace_json(path, name)?,
        _ => load_trace_csv(path, name)?,
    };
    log::info!(
        "Loaded trace '{}' ({} samples{})",
        trace.name,
        trace.len(),
        if trace.is_its() { ", directional" } else { "" }
    );
    Ok(trace)
}

fn load_trace_csv(path: &Path, name: String) -> PipelineResult<Trace> {
    let mut reader = csv_reader(path)?;
    let mut records = reader.records();

    let headers = match records.next() {
        Some(result) => result?,
        None => return Err(PipelineError::malformed(&name, "empty trace file")),
    };
    if headers.len() < 2 {
        return Err(PipelineError::malformed(&name, "trace needs frequency and amplitude columns"));
    }

    let scale = mhz_scale(unit_of(&headers[0]));
    let amplitude_label = headers[1].to_string();
    let position_idx = headers.iter().position(|h| h.eq_ignore_ascii_case(POSITION_LABEL));

    let mut rows = Vec::new();
    for (row_no, result) in records.enumerate() {
        let record = result?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let frequency = parse_cell(&record, 0, row_no, &name)?;
        let amplitude = parse_cell(&record, 1, row_no, &name)?;
        let polarity = match position_idx.and_then(|i| record.get(i)) {
            Some(tag) if !tag.is_empty() => Some(
                tag.parse::<Polarity>()
                    .map_err(|e| PipelineError::malformed(&name, format!("row {row_no}: {e}")))?,
            ),
            _ => None,
        };

        rows.push(TraceRow {
            frequency: frequency * scale,
            amplitude,
            polarity,
        });
    }

    Ok(Trace::from_rows(name, amplitude_label, rows))
}

fn parse_cell(record: &csv::StringRecord, idx: usize, row_no: usize, name: &str) -> PipelineResult<f64> {
    let cell = record.get(idx).unwrap_or("");
    cell.parse::<f64>()
        .map_err(|_| PipelineError::malformed(name, format!("row {row_no}, column {idx}: '{cell}' is not a number")))
}

#[derive(Debug, Deserialize)]
struct TraceJson {
    #[serde(default)]
    frequency_unit: Option<String>,
    #[serde(default = "default_amplitude_label")]
    amplitude_label: String,
    frequency: Vec<f64>,
    amplitude: Vec<f64>,
    #[serde(default)]
    position: Option<Vec<String>>,
}

fn default_amplitude_label() -> String {
    "Amplitude (dB)".to_string()
}

fn load_trace_json(path: &Path, name: String) -> PipelineResult<Trace> {
    let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    let raw: TraceJson = serde_json::from_str(&text)?;

    if raw.frequency.len() != raw.amplitude.len() {
        return Err(PipelineError::malformed(
            &name,
            format!(
                "frequency has {} values but amplitude has {}",
                raw.frequency.len(),
                raw.amplitude.len()
            ),
        ));
    }

    let scale = mhz_scale(raw.frequency_unit.as_deref());
    let mut polarity = Vec::with_capacity(raw.frequency.len());
    match &raw.position {
        Some(tags) if tags.len() == raw.frequency.len() => {
            for (i, tag) in tags.iter().enumerate() {
                let p = tag
                    .parse::<Polarity>()
                    .map_err(|e| PipelineError::malformed(&name, format!("position[{i}]: {e}")))?;
                polarity.push(Some(p));
            }
        }
        Some(tags) => {
            return Err(PipelineError::malformed(
                &name,
                format!("position has {} values, expected {}", tags.len(), raw.frequency.len()),
            ));
        }
        None => polarity.resize(raw.frequency.len(), None),
    }

    let rows = raw
        .frequency
        .iter()
        .zip(&raw.amplitude)
        .zip(polarity)
        .map(|((&f, &a), p)| TraceRow {
            frequency: f * scale,
            amplitude: a,
            polarity: p,
        })
        .collect();

    Ok(Trace::from_rows(name, raw.amplitude_label, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_come_from_the_last_parentheses() {
        assert_eq!(unit_of("Frequency (Hz)"), Some("Hz"));
        assert_eq!(unit_of("Level (dBuV) (dB/m)"), Some("dB/m"));
        assert_eq!(unit_of("Frequency"), None);
        assert_eq!(unit_of("Odd ()"), None);
    }

    #[test]
    fn frequency_units_scale_to_mhz() {
        assert_eq!(mhz_scale(Some("Hz")), 1e-6);
        assert_eq!(mhz_scale(Some("kHz")), 1e-3);
        assert_eq!(mhz_scale(Some("MHz")), 1.0);
        assert_eq!(mhz_scale(Some("GHz")), 1e3);
        assert_eq!(mhz_scale(None), 1.0);
    }
}
