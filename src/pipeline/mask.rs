//! Frequency masks: bands excluded from plots and peak search.
//!
//! A mask is stored and persisted as its compact band table.  The sampled
//! [`MaskSeries`] is derived from it whenever it is needed.

use std::path::Path;

use super::join::{join_key, HZ_KEY_SCALE};
use crate::data::loader;
use crate::error::PipelineResult;

/// One excluded band, `[center - span/2, center + span/2]` MHz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskBand {
    pub center_mhz: f64,
    pub span_mhz: f64,
}

impl MaskBand {
    pub fn lower(&self) -> f64 {
        self.center_mhz - self.span_mhz / 2.0
    }

    pub fn upper(&self) -> f64 {
        self.center_mhz + self.span_mhz / 2.0
    }

    pub fn contains(&self, frequency_mhz: f64) -> bool {
        frequency_mhz >= self.lower() && frequency_mhz <= self.upper()
    }
}

/// The band table.  Kept sorted by center frequency.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrequencyMask {
    pub name: String,
    bands: Vec<MaskBand>,
}

impl FrequencyMask {
    /// Build a mask from raw `(center, span)` rows.  Rows with a blank or
    /// invalid cell, or a negative span, are dropped.
    pub fn from_rows(name: impl Into<String>, rows: impl IntoIterator<Item = (Option<f64>, Option<f64>)>) -> Self {
        let mut dropped = 0usize;
        let mut bands: Vec<MaskBand> = rows
            .into_iter()
            .filter_map(|row| match row {
                (Some(center_mhz), Some(span_mhz))
                    if center_mhz.is_finite() && span_mhz.is_finite() && span_mhz >= 0.0 =>
                {
                    Some(MaskBand { center_mhz, span_mhz })
                }
                _ => {
                    dropped += 1;
                    None
                }
            })
            .collect();
        bands.sort_by(|a, b| a.center_mhz.total_cmp(&b.center_mhz));

        let name = name.into();
        if dropped > 0 {
            log::debug!("Mask '{name}': dropped {dropped} empty or invalid row(s)");
        }
        FrequencyMask { name, bands }
    }

    pub fn from_bands(name: impl Into<String>, bands: impl IntoIterator<Item = MaskBand>) -> Self {
        Self::from_rows(
            name,
            bands.into_iter().map(|b| (Some(b.center_mhz), Some(b.span_mhz))),
        )
    }

    /// Load a band table (`Center Frequency (MHz)`, `Span (MHz)`), header
    /// optional.  The mask is named after the file stem.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("mask")
            .to_string();
        Ok(Self::from_rows(name, loader::read_band_rows(path)?))
    }

    pub fn bands(&self) -> &[MaskBand] {
        &self.bands
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Sample every band at `step_mhz` across its closed interval and tag the
    /// samples as masked.  The result is keyed in whole Hz.
    pub fn expand(&self, step_mhz: f64) -> MaskSeries {
        let mut hz: Vec<i64> = Vec::new();
        for band in &self.bands {
            let (lower, upper) = (band.lower(), band.upper());
            let count = if step_mhz > 0.0 {
                ((upper - lower) / step_mhz).floor() as usize
            } else {
                0
            };
            hz.extend((0..=count).map(|i| join_key(lower + i as f64 * step_mhz, HZ_KEY_SCALE)));
            hz.push(join_key(upper, HZ_KEY_SCALE));
        }
        hz.sort_unstable();
        hz.dedup();

        log::debug!(
            "Expanded mask '{}': {} band(s) into {} samples",
            self.name,
            self.bands.len(),
            hz.len()
        );
        let masked = vec![true; hz.len()];
        MaskSeries { hz, masked }
    }
}

/// Boolean series over absolute frequency (Hz keys), sorted ascending.
/// Frequencies absent from the series count as not masked.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaskSeries {
    hz: Vec<i64>,
    masked: Vec<bool>,
}

impl MaskSeries {
    pub fn hz(&self) -> &[i64] {
        &self.hz
    }

    pub fn masked(&self) -> &[bool] {
        &self.masked
    }

    pub fn len(&self) -> usize {
        self.hz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hz.is_empty()
    }
}
