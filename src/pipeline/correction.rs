//! Correction factor engine: merges calibration tables sampled on different
//! grids into one unified correction curve.

use std::collections::BTreeSet;

use super::join::interpolate_within;
use super::table::CorrectionTable;
use crate::data::model::{FrequencySeries, TOTAL_LABEL};
use crate::error::{PipelineError, PipelineResult};

/// Column name of the distance correction factor.
pub const DCF_COLUMN: &str = "DCF";

// ---------------------------------------------------------------------------
// Distance correction factor
// ---------------------------------------------------------------------------

/// Measurement and reference distances for free-space scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceBounds {
    pub from: f64,
    pub to: f64,
}

impl DistanceBounds {
    pub fn new(from: f64, to: f64) -> PipelineResult<Self> {
        Ok(DistanceBounds {
            from: check_distance(from, &from.to_string())?,
            to: check_distance(to, &to.to_string())?,
        })
    }

    /// Parse distance entries as typed by a user or stored in a profile.
    /// Returns `Ok(None)` unless both entries are filled in.
    pub fn parse(from: &str, to: &str) -> PipelineResult<Option<Self>> {
        let (from, to) = (from.trim(), to.trim());
        if from.is_empty() || to.is_empty() {
            return Ok(None);
        }
        let from_v = from
            .parse::<f64>()
            .map_err(|_| PipelineError::invalid_distance(from, "not a number"))?;
        let to_v = to
            .parse::<f64>()
            .map_err(|_| PipelineError::invalid_distance(to, "not a number"))?;
        Ok(Some(DistanceBounds {
            from: check_distance(from_v, from)?,
            to: check_distance(to_v, to)?,
        }))
    }

    /// `20·log10(from / to)` in dB.
    pub fn dcf(&self) -> f64 {
        20.0 * (self.from / self.to).log10()
    }
}

fn check_distance(value: f64, text: &str) -> PipelineResult<f64> {
    if !value.is_finite() {
        return Err(PipelineError::invalid_distance(text, "not finite"));
    }
    if value <= 0.0 {
        return Err(PipelineError::invalid_distance(text, "must be positive"));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// CorrectionCurve – the unified curve
// ---------------------------------------------------------------------------

/// One factor column of the unified curve.  `None` outside the frequency
/// range its source table covers.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// All factor columns on the union of their frequencies, gaps interpolated
/// inside each column's own range, plus the row-wise `total`.
///
/// Always rebuilt from scratch by [`CorrectionEngine::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionCurve {
    frequency: Vec<f64>,
    columns: Vec<CurveColumn>,
    total: Vec<f64>,
    dcf: Option<f64>,
}

impl CorrectionCurve {
    pub fn frequency(&self) -> &[f64] {
        &self.frequency
    }

    pub fn columns(&self) -> &[CurveColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&CurveColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn total(&self) -> &[f64] {
        &self.total
    }

    /// The distance correction factor folded into this curve, if any.
    pub fn dcf(&self) -> Option<f64> {
        self.dcf
    }

    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }

    pub fn total_series(&self) -> FrequencySeries {
        FrequencySeries::from_pairs(
            TOTAL_LABEL,
            self.frequency.iter().copied().zip(self.total.iter().copied()),
        )
    }

    /// Rows bracketing `[first, last]`: the largest curve frequency strictly
    /// below `first` and the smallest strictly above `last`.
    pub fn bracketing_rows(&self, first: f64, last: f64) -> (Option<usize>, Option<usize>) {
        let below = self.frequency.partition_point(|&f| f < first).checked_sub(1);
        let above = self.frequency.partition_point(|&f| f <= last);
        (below, (above < self.frequency.len()).then_some(above))
    }
}

// ---------------------------------------------------------------------------
// CorrectionEngine
// ---------------------------------------------------------------------------

/// Builds [`CorrectionCurve`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionEngine {
    /// Frequency axis used when no table is supplied, `(start, stop)` MHz.
    pub default_span_mhz: (f64, f64),
    pub default_step_mhz: f64,
}

impl Default for CorrectionEngine {
    fn default() -> Self {
        CorrectionEngine {
            default_span_mhz: (30.0, 40_000.0),
            default_step_mhz: 1.0,
        }
    }
}

impl CorrectionEngine {
    /// Merge `tables` (outer join on frequency, one column per table), add a
    /// constant DCF column when `distance` is given, interpolate every column
    /// inside its own range and sum the columns into `total`.
    pub fn generate(&self, tables: &[CorrectionTable], distance: Option<DistanceBounds>) -> CorrectionCurve {
        let frequency = if tables.is_empty() {
            self.default_axis()
        } else {
            union_axis(tables)
        };

        let mut taken: BTreeSet<String> = BTreeSet::new();
        let mut columns: Vec<CurveColumn> = tables
            .iter()
            .map(|table| {
                let series = table.series();
                CurveColumn {
                    name: unique_name(&table.name, &mut taken),
                    values: frequency.iter().map(|&f| series.get(f)).collect(),
                }
            })
            .collect();

        let dcf = distance.map(|d| d.dcf());
        if let Some(dcf) = dcf {
            columns.push(CurveColumn {
                name: unique_name(DCF_COLUMN, &mut taken),
                values: vec![Some(dcf); frequency.len()],
            });
        }

        for column in &mut columns {
            interpolate_within(&frequency, &mut column.values);
        }

        let total = (0..frequency.len())
            .map(|row| columns.iter().filter_map(|c| c.values[row]).sum())
            .collect();

        log::info!(
            "Generated correction curve: {} rows, {} column(s){}",
            frequency.len(),
            columns.len(),
            dcf.map(|d| format!(", DCF {d:.3} dB")).unwrap_or_default()
        );

        CorrectionCurve {
            frequency,
            columns,
            total,
            dcf,
        }
    }

    fn default_axis(&self) -> Vec<f64> {
        let (start, stop) = self.default_span_mhz;
        let step = self.default_step_mhz;
        let count = ((stop - start) / step).floor() as usize + 1;
        (0..count).map(|i| start + i as f64 * step).collect()
    }
}

fn union_axis(tables: &[CorrectionTable]) -> Vec<f64> {
    let mut axis: Vec<f64> = tables
        .iter()
        .flat_map(|t| t.series().frequency().iter().copied())
        .collect();
    axis.sort_by(f64::total_cmp);
    axis.dedup();
    axis
}

fn unique_name(base: &str, taken: &mut BTreeSet<String>) -> String {
    let mut name = base.to_string();
    let mut n = 2;
    while taken.contains(&name) {
        name = format!("{base} ({n})");
        n += 1;
    }
    taken.insert(name.clone());
    name
}
