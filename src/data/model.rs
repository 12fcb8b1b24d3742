use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub const FREQUENCY_LABEL: &str = "Frequency (MHz)";
pub const POSITION_LABEL: &str = "Position";
pub const MASK_LABEL: &str = "Mask";
pub const TOTAL_LABEL: &str = "Total Correction Factor";
pub const CORRECTED_LABEL: &str = "Corrected Amp. (dBuV/m)";

// ---------------------------------------------------------------------------
// CellValue – a single cell in a recorded peak row
// ---------------------------------------------------------------------------

/// A dynamically-typed cell, used where a row mixes numeric columns with the
/// polarity tag and the mask flag.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Float(f64),
    Text(String),
    Bool(bool),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Polarity – antenna orientation of a directional (ITS) scan sample
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Polarity {
    Vertical,
    Horizontal,
}

impl Polarity {
    pub const ALL: [Polarity; 2] = [Polarity::Vertical, Polarity::Horizontal];

    pub fn as_str(self) -> &'static str {
        match self {
            Polarity::Vertical => "Vertical",
            Polarity::Horizontal => "Horizontal",
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Polarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertical" | "v" => Ok(Polarity::Vertical),
            "horizontal" | "h" => Ok(Polarity::Horizontal),
            other => Err(format!("unknown polarity '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// FrequencySeries – sorted, duplicate-free (frequency, value) pairs
// ---------------------------------------------------------------------------

/// Ordered `(frequency, value)` pairs.  Frequencies are in MHz, strictly
/// ascending and unique once constructed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrequencySeries {
    /// Name of the value column (e.g. `Delta (dB)`).
    pub label: String,
    frequency: Vec<f64>,
    values: Vec<f64>,
}

impl FrequencySeries {
    /// Build a series from unordered pairs.  Pairs with a non-finite frequency
    /// are dropped; on duplicate frequencies the first pair wins.
    pub fn from_pairs(label: impl Into<String>, pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut pairs: Vec<(f64, f64)> = pairs.into_iter().filter(|(f, _)| f.is_finite()).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        pairs.dedup_by(|next, kept| next.0 == kept.0);

        let (frequency, values) = pairs.into_iter().unzip();
        FrequencySeries {
            label: label.into(),
            frequency,
            values,
        }
    }

    pub fn frequency(&self) -> &[f64] {
        &self.frequency
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequency.iter().copied().zip(self.values.iter().copied())
    }

    /// Value at an exact frequency, if present.
    pub fn get(&self, frequency: f64) -> Option<f64> {
        self.frequency
            .binary_search_by(|f| f.partial_cmp(&frequency).unwrap_or(Ordering::Less))
            .ok()
            .map(|i| self.values[i])
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Negate every value (the series counterpart of `-s`).
    pub fn negated(&self) -> Self {
        FrequencySeries {
            label: self.label.clone(),
            frequency: self.frequency.clone(),
            values: self.values.iter().map(|v| -v).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Trace overlays – derived columns kept apart from the raw data
// ---------------------------------------------------------------------------

/// One correction factor joined onto a trace's frequency axis.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedFactor {
    pub name: String,
    pub values: Vec<f64>,
}

/// Columns produced by a correction pass.  Replaced wholesale on every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionOverlay {
    pub factors: Vec<JoinedFactor>,
    pub total: Vec<f64>,
    pub corrected: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Trace – one measurement, raw data plus removable overlays
// ---------------------------------------------------------------------------

/// A single row of trace input as handed over by a trace loader.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRow {
    pub frequency: f64,
    pub amplitude: f64,
    pub polarity: Option<Polarity>,
}

/// A measurement trace.  The raw frequency/amplitude columns never change
/// after construction; correction and mask passes live in overlays that can
/// be cleared and recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub name: String,
    /// Header of the raw amplitude column, e.g. `Meas. Peak (dBm)`.
    pub amplitude_label: String,
    frequency: Vec<f64>,
    amplitude: Vec<f64>,
    polarity: Option<Vec<Polarity>>,
    correction: Option<CorrectionOverlay>,
    mask: Option<Vec<bool>>,
}

impl Trace {
    /// Build a trace from loader rows.  Rows are sorted by frequency; a trace
    /// without polarity tags is also de-duplicated on frequency.  Once any row
    /// carries a tag the trace is directional and untagged rows are dropped.
    pub fn from_rows(name: impl Into<String>, amplitude_label: impl Into<String>, rows: Vec<TraceRow>) -> Self {
        let mut rows: Vec<TraceRow> = rows.into_iter().filter(|r| r.frequency.is_finite()).collect();
        rows.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));

        let name = name.into();
        let its = rows.iter().any(|r| r.polarity.is_some());
        if its {
            let before = rows.len();
            rows.retain(|r| r.polarity.is_some());
            if rows.len() < before {
                log::warn!(
                    "Trace '{name}': dropped {} row(s) without a polarity tag",
                    before - rows.len()
                );
            }
        } else {
            rows.dedup_by(|next, kept| next.frequency == kept.frequency);
        }

        let frequency = rows.iter().map(|r| r.frequency).collect();
        let amplitude = rows.iter().map(|r| r.amplitude).collect();
        let polarity = its.then(|| rows.iter().filter_map(|r| r.polarity).collect());

        Trace {
            name,
            amplitude_label: amplitude_label.into(),
            frequency,
            amplitude,
            polarity,
            correction: None,
            mask: None,
        }
    }

    /// Convenience constructor for a plain (non-directional) trace.
    pub fn from_pairs(
        name: impl Into<String>,
        amplitude_label: impl Into<String>,
        pairs: impl IntoIterator<Item = (f64, f64)>,
    ) -> Self {
        let rows = pairs
            .into_iter()
            .map(|(frequency, amplitude)| TraceRow {
                frequency,
                amplitude,
                polarity: None,
            })
            .collect();
        Trace::from_rows(name, amplitude_label, rows)
    }

    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }

    pub fn frequency(&self) -> &[f64] {
        &self.frequency
    }

    pub fn amplitude(&self) -> &[f64] {
        &self.amplitude
    }

    pub fn polarity(&self) -> Option<&[Polarity]> {
        self.polarity.as_deref()
    }

    /// Whether this is a directional scan carrying a polarity tag per sample.
    pub fn is_its(&self) -> bool {
        self.polarity.is_some()
    }

    /// Display name of the sub-trace holding one polarity.
    pub fn polarity_name(base: &str, polarity: Polarity) -> String {
        format!("{base} - {polarity}")
    }

    /// Split a directional scan into its vertical and horizontal sub-traces.
    /// A polarity with no samples yields no sub-trace.  A plain trace yields
    /// nothing.
    pub fn split_polarity(&self) -> Vec<Trace> {
        let Some(tags) = &self.polarity else {
            return Vec::new();
        };

        Polarity::ALL
            .iter()
            .filter_map(|&wanted| {
                let pairs: Vec<(f64, f64)> = tags
                    .iter()
                    .zip(self.frequency.iter().zip(&self.amplitude))
                    .filter(|(tag, _)| **tag == wanted)
                    .map(|(_, (&f, &a))| (f, a))
                    .collect();
                if pairs.is_empty() {
                    return None;
                }
                Some(Trace::from_pairs(
                    Trace::polarity_name(&self.name, wanted),
                    self.amplitude_label.clone(),
                    pairs,
                ))
            })
            .collect()
    }

    // -- overlays --

    pub fn correction(&self) -> Option<&CorrectionOverlay> {
        self.correction.as_ref()
    }

    pub fn mask(&self) -> Option<&[bool]> {
        self.mask.as_deref()
    }

    pub(crate) fn set_correction(&mut self, overlay: CorrectionOverlay) {
        debug_assert_eq!(overlay.corrected.len(), self.len());
        self.correction = Some(overlay);
    }

    pub(crate) fn set_mask(&mut self, mask: Vec<bool>) {
        debug_assert_eq!(mask.len(), self.len());
        self.mask = Some(mask);
    }

    /// Drop every column added by a correction pass.
    pub fn clear_correction(&mut self) {
        self.correction = None;
    }

    /// Drop the mask column.
    pub fn clear_mask(&mut self) {
        self.mask = None;
    }

    pub fn is_masked(&self, index: usize) -> bool {
        self.mask
            .as_ref()
            .and_then(|m| m.get(index).copied())
            .unwrap_or(false)
    }

    /// The amplitude column shown and searched: the corrected amplitude when
    /// a correction pass is in effect, the raw amplitude otherwise.
    pub fn display_amplitude(&self) -> &[f64] {
        match &self.correction {
            Some(overlay) => &overlay.corrected,
            None => &self.amplitude,
        }
    }

    pub fn display_label(&self) -> &str {
        if self.correction.is_some() {
            CORRECTED_LABEL
        } else {
            &self.amplitude_label
        }
    }

    /// Header of every column a recorded row carries, in storage order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec![FREQUENCY_LABEL.to_string(), self.amplitude_label.clone()];
        if self.polarity.is_some() {
            names.push(POSITION_LABEL.to_string());
        }
        if self.mask.is_some() {
            names.push(MASK_LABEL.to_string());
        }
        if let Some(overlay) = &self.correction {
            names.extend(overlay.factors.iter().map(|f| f.name.clone()));
            names.push(TOTAL_LABEL.to_string());
            names.push(CORRECTED_LABEL.to_string());
        }
        names
    }

    /// Cells of row `index`, matching [`Trace::column_names`].
    pub fn row_cells(&self, index: usize) -> Vec<CellValue> {
        let mut cells = vec![
            CellValue::Float(self.frequency[index]),
            CellValue::Float(self.amplitude[index]),
        ];
        if let Some(tags) = &self.polarity {
            cells.push(CellValue::Text(tags[index].to_string()));
        }
        if let Some(mask) = &self.mask {
            cells.push(CellValue::Bool(mask[index]));
        }
        if let Some(overlay) = &self.correction {
            cells.extend(overlay.factors.iter().map(|f| CellValue::Float(f.values[index])));
            cells.push(CellValue::Float(overlay.total[index]));
            cells.push(CellValue::Float(overlay.corrected[index]));
        }
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_sorts_and_drops_duplicate_frequencies() {
        let s = FrequencySeries::from_pairs("v", [(3.0, 30.0), (1.0, 10.0), (3.0, 99.0), (f64::NAN, 1.0)]);
        assert_eq!(s.frequency(), &[1.0, 3.0]);
        assert_eq!(s.values(), &[10.0, 30.0]);
        assert_eq!(s.get(3.0), Some(30.0));
        assert_eq!(s.get(2.0), None);
    }

    #[test]
    fn its_trace_splits_by_polarity() {
        let rows = vec![
            TraceRow { frequency: 100.0, amplitude: 1.0, polarity: Some(Polarity::Vertical) },
            TraceRow { frequency: 100.0, amplitude: 2.0, polarity: Some(Polarity::Horizontal) },
            TraceRow { frequency: 101.0, amplitude: 3.0, polarity: Some(Polarity::Vertical) },
        ];
        let trace = Trace::from_rows("scan", "Level (dBuV)", rows);
        assert!(trace.is_its());
        assert_eq!(trace.len(), 3);

        let parts = trace.split_polarity();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "scan - Vertical");
        assert_eq!(parts[0].amplitude(), &[1.0, 3.0]);
        assert_eq!(parts[1].name, "scan - Horizontal");
        assert!(!parts[1].is_its());
    }

    #[test]
    fn untagged_rows_of_a_directional_trace_are_dropped() {
        let rows = vec![
            TraceRow { frequency: 100.0, amplitude: 1.0, polarity: Some(Polarity::Horizontal) },
            TraceRow { frequency: 101.0, amplitude: 7.0, polarity: None },
            TraceRow { frequency: 102.0, amplitude: 2.0, polarity: Some(Polarity::Horizontal) },
        ];
        let trace = Trace::from_rows("scan", "A", rows);
        assert_eq!(trace.frequency(), &[100.0, 102.0]);
        assert_eq!(trace.polarity().unwrap(), &[Polarity::Horizontal, Polarity::Horizontal]);

        let parts = trace.split_polarity();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].amplitude(), &[1.0, 2.0]);
    }

    #[test]
    fn single_polarity_scan_yields_one_sub_trace() {
        let rows = vec![TraceRow { frequency: 5.0, amplitude: 1.0, polarity: Some(Polarity::Horizontal) }];
        let parts = Trace::from_rows("h", "A", rows).split_polarity();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "h - Horizontal");
    }

    #[test]
    fn display_amplitude_follows_correction_overlay() {
        let mut trace = Trace::from_pairs("t", "Meas. Peak (dBm)", [(1.0, 10.0), (2.0, 20.0)]);
        assert_eq!(trace.display_label(), "Meas. Peak (dBm)");

        trace.set_correction(CorrectionOverlay {
            factors: vec![JoinedFactor { name: "af".into(), values: vec![1.0, 1.0] }],
            total: vec![1.0, 1.0],
            corrected: vec![118.0, 128.0],
        });
        assert_eq!(trace.display_amplitude(), &[118.0, 128.0]);
        assert_eq!(trace.amplitude(), &[10.0, 20.0]);
        assert_eq!(trace.column_names().last().map(String::as_str), Some(CORRECTED_LABEL));

        trace.clear_correction();
        assert_eq!(trace.display_amplitude(), &[10.0, 20.0]);
    }

    #[test]
    fn polarity_parses_loosely() {
        assert_eq!(" vertical ".parse::<Polarity>(), Ok(Polarity::Vertical));
        assert_eq!("H".parse::<Polarity>(), Ok(Polarity::Horizontal));
        assert!("diagonal".parse::<Polarity>().is_err());
    }
}
