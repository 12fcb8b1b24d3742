//! Trace aligner: joins a measurement trace against the unified correction
//! curve and the mask series, writing the results into the trace's overlays.

use super::correction::CorrectionCurve;
use super::join::{interpolate_within, join_key, key_tolerance, nearest_join, HZ_KEY_SCALE, MHZ_KEY_SCALE};
use super::mask::MaskSeries;
use crate::data::model::{CorrectionOverlay, JoinedFactor, Trace};

/// Offset taking a dBm reading to dBµV (50 Ω system).
pub const DBM_TO_DBUV: f64 = 107.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceAligner {
    /// Nearest-match tolerance of the correction join, MHz.
    pub correction_tolerance_mhz: f64,
    /// Nearest-match tolerance of the mask join, MHz.
    pub mask_tolerance_mhz: f64,
    /// Constant added to every corrected amplitude.
    pub reference_offset_db: f64,
}

impl Default for TraceAligner {
    fn default() -> Self {
        TraceAligner {
            correction_tolerance_mhz: 1.0,
            mask_tolerance_mhz: 5.0,
            reference_offset_db: DBM_TO_DBUV,
        }
    }
}

impl TraceAligner {
    /// Join every factor column of `curve` onto the trace and compute the
    /// corrected amplitude.  Any previous correction overlay is replaced, so
    /// re-running with the same curve gives the same result.
    ///
    /// Keys are whole MHz; a trace row with no curve row within tolerance is
    /// interpolated from its neighbours, the nearest curve row outside the
    /// trace on each side included.  Anything still unknown counts as 0 dB.
    ///
    /// Returns the number of rows matched directly by the join.
    pub fn apply_correction(&self, trace: &mut Trace, curve: &CorrectionCurve) -> usize {
        trace.clear_correction();

        let freq = trace.frequency().to_vec();
        let n = freq.len();

        let left: Vec<i64> = freq.iter().map(|&f| join_key(f, MHZ_KEY_SCALE)).collect();
        let right: Vec<i64> = curve.frequency().iter().map(|&f| join_key(f, MHZ_KEY_SCALE)).collect();
        let matches = nearest_join(&left, &right, key_tolerance(self.correction_tolerance_mhz, MHZ_KEY_SCALE));
        let matched = matches.iter().filter(|m| m.is_some()).count();

        let (below, above) = match (freq.first(), freq.last()) {
            (Some(&first), Some(&last)) => curve.bracketing_rows(first, last),
            _ => (None, None),
        };

        // Axis with the bracketing curve rows spliced in at either end.
        let mut axis = Vec::with_capacity(n + 2);
        axis.extend(below.map(|i| curve.frequency()[i]));
        axis.extend_from_slice(&freq);
        axis.extend(above.map(|i| curve.frequency()[i]));
        let offset = usize::from(below.is_some());

        let factors: Vec<JoinedFactor> = curve
            .columns()
            .iter()
            .map(|column| {
                let mut values: Vec<Option<f64>> = Vec::with_capacity(axis.len());
                values.extend(below.map(|i| column.values[i]));
                values.extend(matches.iter().map(|m| m.and_then(|j| column.values[j])));
                values.extend(above.map(|i| column.values[i]));

                interpolate_within(&axis, &mut values);

                JoinedFactor {
                    name: column.name.clone(),
                    values: values[offset..offset + n].iter().map(|v| v.unwrap_or(0.0)).collect(),
                }
            })
            .collect();

        let total: Vec<f64> = (0..n).map(|i| factors.iter().map(|f| f.values[i]).sum()).collect();
        let corrected = trace
            .amplitude()
            .iter()
            .zip(&total)
            .map(|(amp, t)| amp + t + self.reference_offset_db)
            .collect();

        log::debug!(
            "Correction pass on '{}': {matched}/{n} rows matched, {} factor(s)",
            trace.name,
            factors.len()
        );
        trace.set_correction(CorrectionOverlay {
            factors,
            total,
            corrected,
        });
        matched
    }

    /// Flag every trace row whose nearest mask sample (in whole Hz) lies within
    /// the mask tolerance.  Rows without such a sample are not masked.  Any
    /// previous mask column is replaced.
    ///
    /// Returns the number of masked rows.
    pub fn apply_mask(&self, trace: &mut Trace, mask: &MaskSeries) -> usize {
        trace.clear_mask();

        let left: Vec<i64> = trace.frequency().iter().map(|&f| join_key(f, HZ_KEY_SCALE)).collect();
        let matches = nearest_join(&left, mask.hz(), key_tolerance(self.mask_tolerance_mhz, HZ_KEY_SCALE));
        let flags: Vec<bool> = matches
            .iter()
            .map(|m| m.map(|j| mask.masked()[j]).unwrap_or(false))
            .collect();

        let masked = flags.iter().filter(|&&m| m).count();
        log::debug!("Mask pass on '{}': {masked}/{} rows masked", trace.name, trace.len());
        trace.set_mask(flags);
        masked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::FrequencySeries;
    use crate::pipeline::correction::CorrectionEngine;
    use crate::pipeline::mask::{FrequencyMask, MaskBand};
    use crate::pipeline::table::{CorrectionTable, FactorKind};

    fn curve() -> CorrectionCurve {
        let af = CorrectionTable::from_series(
            "af",
            FrequencySeries::from_pairs("", [(100.0, 5.0), (200.0, 7.0)]),
            FactorKind::Antenna.sign(),
            "dB/m",
        );
        let att = CorrectionTable::from_series(
            "att",
            FrequencySeries::from_pairs("", [(100.0, 10.0), (200.0, 10.0)]),
            FactorKind::Attenuator.sign(),
            "dB",
        );
        CorrectionEngine::default().generate(&[af, att], None)
    }

    #[test]
    fn correction_between_table_points_is_interpolated() {
        let mut trace = Trace::from_pairs("t", "Meas. Peak (dBm)", [(150.0, 50.0)]);
        let matched = TraceAligner::default().apply_correction(&mut trace, &curve());

        assert_eq!(matched, 0);
        let overlay = trace.correction().unwrap();
        assert!((overlay.total[0] + 4.0).abs() < 1e-12);
        assert!((overlay.corrected[0] - 153.0).abs() < 1e-12);
        // The bracketing rows do not stay in the trace.
        assert_eq!(trace.frequency(), &[150.0]);
    }

    #[test]
    fn correction_matches_within_one_mhz() {
        let mut trace = Trace::from_pairs("t", "A", [(99.0, 0.0), (100.7, 0.0), (200.0, 0.0)]);
        let matched = TraceAligner::default().apply_correction(&mut trace, &curve());
        assert_eq!(matched, 3);
        let total = &trace.correction().unwrap().total;
        assert_eq!(total, &vec![-5.0, -5.0, -3.0]);
    }

    #[test]
    fn correction_outside_the_curve_counts_as_zero() {
        let mut trace = Trace::from_pairs("t", "A", [(10.0, 1.0), (500.0, 2.0)]);
        TraceAligner::default().apply_correction(&mut trace, &curve());
        let overlay = trace.correction().unwrap();
        assert_eq!(overlay.total, vec![0.0, 0.0]);
        assert_eq!(overlay.corrected, vec![108.0, 109.0]);
    }

    #[test]
    fn reapplying_a_correction_does_not_compound() {
        let curve = curve();
        let aligner = TraceAligner::default();
        let mut once = Trace::from_pairs("t", "A", [(120.0, 1.0), (180.0, 2.0)]);
        aligner.apply_correction(&mut once, &curve);

        let mut twice = once.clone();
        twice.clear_correction();
        aligner.apply_correction(&mut twice, &curve);
        aligner.apply_correction(&mut twice, &curve);

        assert_eq!(once, twice);
        assert_eq!(twice.amplitude(), &[1.0, 2.0]);
    }

    #[test]
    fn mask_flags_rows_near_band_samples() {
        let mask = FrequencyMask::from_bands("m", [MaskBand { center_mhz: 100.0, span_mhz: 2.0 }]).expand(1.0);
        let mut trace = Trace::from_pairs("t", "A", [(50.0, 0.0), (96.0, 0.0), (100.5, 0.0), (110.0, 0.0)]);
        let masked = TraceAligner::default().apply_mask(&mut trace, &mask);

        assert_eq!(masked, 2);
        assert_eq!(trace.mask().unwrap(), &[false, true, true, false]);
    }

    #[test]
    fn empty_mask_masks_nothing() {
        let mut trace = Trace::from_pairs("t", "A", [(1.0, 0.0), (2.0, 0.0)]);
        let masked = TraceAligner::default().apply_mask(&mut trace, &MaskSeries::default());
        assert_eq!(masked, 0);
        assert_eq!(trace.mask().unwrap(), &[false, false]);
    }
}
