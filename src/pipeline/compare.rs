//! Trace-to-trace comparisons: delta, shielding effectiveness and max hold.

use super::join::{join_key, key_tolerance, nearest_join, MHZ_KEY_SCALE};
use super::smoothing::SavitzkyGolay;
use crate::data::loader::unit_of;
use crate::data::model::{FrequencySeries, Trace};
use crate::error::PipelineResult;

pub const DELTA_LABEL: &str = "Delta (dB)";
pub const SE_LABEL: &str = "Attenuation (dB)";

// ---------------------------------------------------------------------------
// Delta / shielding effectiveness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DeltaComputer {
    /// Nearest-match tolerance when aligning `b` onto `a`, MHz.
    pub tolerance_mhz: f64,
    smoother: SavitzkyGolay,
}

impl DeltaComputer {
    pub fn new(tolerance_mhz: f64, window: usize, poly_order: usize) -> PipelineResult<Self> {
        Ok(DeltaComputer {
            tolerance_mhz,
            smoother: SavitzkyGolay::new(window, poly_order)?,
        })
    }

    pub fn smoother(&self) -> &SavitzkyGolay {
        &self.smoother
    }

    /// `a − b` on `a`'s frequency axis.  Masks are ignored; each trace
    /// contributes its display amplitude.  Rows of `a` with no `b` sample
    /// within tolerance (whole-MHz keys) are left out.
    pub fn delta(&self, a: &Trace, b: &Trace) -> FrequencySeries {
        let left: Vec<i64> = a.frequency().iter().map(|&f| join_key(f, MHZ_KEY_SCALE)).collect();
        let right: Vec<i64> = b.frequency().iter().map(|&f| join_key(f, MHZ_KEY_SCALE)).collect();
        let matches = nearest_join(&left, &right, key_tolerance(self.tolerance_mhz, MHZ_KEY_SCALE));

        let (amp_a, amp_b) = (a.display_amplitude(), b.display_amplitude());
        let series = FrequencySeries::from_pairs(
            DELTA_LABEL,
            matches
                .iter()
                .enumerate()
                .filter_map(|(i, m)| m.map(|j| (a.frequency()[i], amp_a[i] - amp_b[j]))),
        );

        log::debug!(
            "Delta '{}' - '{}': {} of {} rows aligned",
            a.name,
            b.name,
            series.len(),
            a.len()
        );
        series
    }

    /// Smooth a delta curve into a shielding-effectiveness curve.
    pub fn smooth(&self, delta: &FrequencySeries) -> PipelineResult<FrequencySeries> {
        let smoothed = self.smoother.smooth(delta.values())?;
        Ok(FrequencySeries::from_pairs(
            SE_LABEL,
            delta.frequency().iter().copied().zip(smoothed),
        ))
    }

    /// Delta of `a` and `b`, smoothed.  Fails with
    /// [`InsufficientSamples`](crate::error::PipelineError::InsufficientSamples)
    /// when fewer rows align than the smoothing window needs.
    pub fn shielding_effectiveness(&self, a: &Trace, b: &Trace) -> PipelineResult<FrequencySeries> {
        self.smooth(&self.delta(a, b))
    }
}

// ---------------------------------------------------------------------------
// Max hold
// ---------------------------------------------------------------------------

/// Row-wise maximum of the display amplitudes of `traces`, outer-merged on
/// exact frequency.  NaN samples are ignored.
pub fn max_hold(traces: &[&Trace]) -> FrequencySeries {
    let unit = traces
        .first()
        .and_then(|t| unit_of(t.display_label()))
        .unwrap_or("dB")
        .to_string();

    let mut samples: Vec<(f64, f64)> = traces
        .iter()
        .flat_map(|t| t.frequency().iter().copied().zip(t.display_amplitude().iter().copied()))
        .filter(|(_, v)| !v.is_nan())
        .collect();
    samples.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(samples.len());
    for (f, v) in samples {
        match merged.last_mut() {
            Some(last) if last.0 == f => last.1 = last.1.max(v),
            _ => merged.push((f, v)),
        }
    }

    FrequencySeries::from_pairs(format!("Max ({unit})"), merged)
}
