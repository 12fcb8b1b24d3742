//! Peak extractor: repeatedly takes the strongest remaining sample and
//! removes an exclusion band around it.

use crate::data::filter::unmasked_indices;
use crate::data::model::{CellValue, Trace};

/// One selected peak: the full row it was taken from, values rounded for
/// display.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakRecord {
    pub frequency: f64,
    pub amplitude: f64,
    /// Cells of the source row, matching [`PeakList::columns`].
    pub cells: Vec<CellValue>,
}

/// Peaks of one trace in selection order (strongest first).
#[derive(Debug, Clone, PartialEq)]
pub struct PeakList {
    pub trace: String,
    pub columns: Vec<String>,
    pub records: Vec<PeakRecord>,
    /// Exclusion half-width used, in samples.
    pub band: usize,
}

impl PeakList {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PeakTable – peak rows of every displayed trace
// ---------------------------------------------------------------------------

/// One row of the peak table.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakRow {
    pub trace: String,
    pub columns: Vec<String>,
    pub record: PeakRecord,
    pub notes: String,
}

/// Peak rows of all displayed traces.  A trace's rows are replaced as a
/// whole when it is redisplayed and deleted when it is hidden.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeakTable {
    rows: Vec<PeakRow>,
}

impl PeakTable {
    pub fn rows(&self) -> &[PeakRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drop every row of `list.trace`, then append the new list.
    pub fn replace(&mut self, list: PeakList) {
        self.remove_trace(&list.trace);
        let PeakList {
            trace,
            columns,
            records,
            ..
        } = list;
        self.rows.extend(records.into_iter().map(|record| PeakRow {
            trace: trace.clone(),
            columns: columns.clone(),
            record,
            notes: String::new(),
        }));
    }

    /// Delete the rows of one trace.  Returns how many were removed.
    pub fn remove_trace(&mut self, trace: &str) -> usize {
        let before = self.rows.len();
        self.rows.retain(|r| r.trace != trace);
        before - self.rows.len()
    }

    /// Attach free-text notes to a row.  Returns `false` for an unknown row.
    pub fn set_notes(&mut self, row: usize, notes: impl Into<String>) -> bool {
        match self.rows.get_mut(row) {
            Some(r) => {
                r.notes = notes.into();
                true
            }
            None => false,
        }
    }

    /// Union of the recorded columns over all rows, in first-seen order.
    pub fn columns(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for row in &self.rows {
            for c in &row.columns {
                if !out.contains(c) {
                    out.push(c.clone());
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakExtractor {
    pub num_peaks: usize,
    /// Minimum distance between two reported peaks, MHz.
    pub min_separation_mhz: f64,
}

impl Default for PeakExtractor {
    fn default() -> Self {
        PeakExtractor {
            num_peaks: 6,
            min_separation_mhz: 2.5,
        }
    }
}

impl PeakExtractor {
    /// Select up to `num_peaks` peaks from the unmasked rows of `trace`.
    ///
    /// The searched column is the display amplitude (raw amplitude for a
    /// directional scan).  The sample step is the spacing of the first two
    /// searchable rows unless `step_hint` is given.  Fewer peaks come back
    /// when the trace runs out of rows.  The trace itself is not modified.
    pub fn extract(&self, trace: &Trace, step_hint: Option<f64>) -> PeakList {
        let freq = trace.frequency();
        let values = if trace.is_its() {
            trace.amplitude()
        } else {
            trace.display_amplitude()
        };

        // Live row indices; each pick narrows this set.
        let mut live = unmasked_indices(trace);

        let step = step_hint.or_else(|| match live.as_slice() {
            [a, b, ..] => Some(freq[*b] - freq[*a]),
            _ => None,
        });
        let band = step.map_or(1, |s| exclusion_band(s, self.min_separation_mhz));

        let mut records = Vec::new();
        while records.len() < self.num_peaks {
            let Some(pos) = argmax(&live, values) else {
                break;
            };
            let row = live[pos];
            records.push(PeakRecord {
                frequency: round3(freq[row]),
                amplitude: round3(values[row]),
                cells: trace.row_cells(row).into_iter().map(round_cell).collect(),
            });

            let lo = pos.saturating_sub(band);
            let hi = pos.saturating_add(band).min(live.len() - 1);
            live.drain(lo..=hi);
        }

        if records.len() < self.num_peaks {
            log::debug!(
                "Trace '{}' exhausted after {} of {} peaks",
                trace.name,
                records.len(),
                self.num_peaks
            );
        }
        log::info!("Extracted {} peak(s) from '{}' (band ±{band} samples)", records.len(), trace.name);

        PeakList {
            trace: trace.name.clone(),
            columns: trace.column_names(),
            records,
            band,
        }
    }
}

/// Smallest whole number of steps spanning at least `min_separation`,
/// saturating at `usize::MAX` for vanishing steps.
pub fn exclusion_band(step: f64, min_separation: f64) -> usize {
    if !(step.is_finite() && step > 0.0) {
        return 1;
    }
    let mut steps = (min_separation / step).floor();
    if steps * step < min_separation {
        steps += 1.0;
    }
    // Float-to-int `as` saturates.
    (steps as usize).max(1)
}

/// Position in `live` of the largest value; the first one on ties.  NaN
/// values are never selected.
fn argmax(live: &[usize], values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (pos, &row) in live.iter().enumerate() {
        let v = values[row];
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((pos, v)),
        }
    }
    best.map(|(pos, _)| pos)
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

fn round_cell(cell: CellValue) -> CellValue {
    match cell {
        CellValue::Float(v) => CellValue::Float(round3(v)),
        other => other,
    }
}
