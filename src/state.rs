use std::collections::{BTreeMap, BTreeSet};

use crate::data::filter::visible_series;
use crate::data::model::{FrequencySeries, Trace};
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::compare::max_hold;
use crate::pipeline::correction::CorrectionCurve;
use crate::pipeline::mask::{FrequencyMask, MaskSeries};
use crate::pipeline::peaks::PeakTable;
use crate::settings::Settings;

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Everything an analysis session holds, independent of any front end.
///
/// Traces are keyed by display name.  The correction curve and mask are the
/// current context: every trace shown is run through them first.
#[derive(Debug, Default)]
pub struct Session {
    pub settings: Settings,

    traces: BTreeMap<String, Trace>,

    /// Directional scans by name, with the sub-traces they were split into.
    scans: BTreeMap<String, Vec<String>>,

    /// Per-polarity sub-traces.  These never take correction or mask passes.
    directional: BTreeSet<String>,

    /// Traces currently shown; refreshed when the context changes.
    displayed: BTreeSet<String>,

    correction: Option<CorrectionCurve>,
    mask: Option<(FrequencyMask, MaskSeries)>,

    peaks: PeakTable,

    /// Delta, shielding-effectiveness and max-hold results by label.
    derived: BTreeMap<String, FrequencySeries>,
}

impl Session {
    pub fn new(settings: Settings) -> PipelineResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            ..Default::default()
        })
    }

    // -- traces --

    /// Register a trace under its name, replacing whatever was registered
    /// under that name before.  A directional scan is registered as its
    /// vertical and horizontal sub-traces only.  Returns the names now
    /// available for display.
    pub fn insert_trace(&mut self, trace: Trace) -> Vec<String> {
        let name = trace.name.clone();
        self.forget(&name);

        if !trace.is_its() {
            self.traces.insert(name.clone(), trace);
            log::debug!("Registered trace '{name}'");
            return vec![name];
        }

        let parts = trace.split_polarity();
        let names: Vec<String> = parts.iter().map(|p| p.name.clone()).collect();
        for part in parts {
            self.forget(&part.name);
            self.directional.insert(part.name.clone());
            self.traces.insert(part.name.clone(), part);
        }
        log::debug!("Registered directional scan '{name}' as {}", names.join(", "));
        self.scans.insert(name, names.clone());
        names
    }

    /// Forget a trace and its peak rows.  Forgetting a directional scan
    /// forgets all of its sub-traces.  Returns the names removed.
    pub fn remove_trace(&mut self, name: &str) -> PipelineResult<Vec<String>> {
        self.forget(name)
            .ok_or_else(|| PipelineError::UnknownTrace(name.to_string()))
    }

    fn forget(&mut self, name: &str) -> Option<Vec<String>> {
        let removed = match self.scans.remove(name) {
            Some(parts) => parts,
            None if self.traces.contains_key(name) => vec![name.to_string()],
            None => return None,
        };
        for part in &removed {
            self.traces.remove(part);
            self.directional.remove(part);
            self.displayed.remove(part);
            self.peaks.remove_trace(part);
        }
        Some(removed)
    }

    /// Error for a name with no displayable trace behind it.
    fn not_displayable(&self, name: &str) -> PipelineError {
        match self.scans.get(name) {
            Some(parts) => PipelineError::DirectionalScan {
                name: name.to_string(),
                parts: parts.clone(),
            },
            None => PipelineError::UnknownTrace(name.to_string()),
        }
    }

    pub fn trace(&self, name: &str) -> PipelineResult<&Trace> {
        self.traces.get(name).ok_or_else(|| self.not_displayable(name))
    }

    pub fn trace_names(&self) -> impl Iterator<Item = &str> {
        self.traces.keys().map(String::as_str)
    }

    pub fn is_displayed(&self, name: &str) -> bool {
        self.displayed.contains(name)
    }

    /// Run the mask and correction passes for `name` against the current
    /// context.  Earlier passes are cleared first.
    fn prepare(&mut self, name: &str) -> PipelineResult<&Trace> {
        let aligner = self.settings.aligner();
        let skip_passes = self.directional.contains(name);
        if !self.traces.contains_key(name) {
            return Err(self.not_displayable(name));
        }
        let trace = self
            .traces
            .get_mut(name)
            .ok_or_else(|| PipelineError::UnknownTrace(name.to_string()))?;

        trace.clear_mask();
        trace.clear_correction();
        if !skip_passes {
            if let Some((_, series)) = &self.mask {
                aligner.apply_mask(trace, series);
            }
            if let Some(curve) = &self.correction {
                aligner.apply_correction(trace, curve);
            }
        }
        Ok(trace)
    }

    /// Show a trace: apply the current context, replace its peak rows and
    /// return the unmasked display series.
    pub fn display(&mut self, name: &str) -> PipelineResult<FrequencySeries> {
        let extractor = self.settings.extractor();
        let trace = self.prepare(name)?;
        let peaks = extractor.extract(trace, None);
        let visible = visible_series(trace);

        self.peaks.replace(peaks);
        self.displayed.insert(name.to_string());
        Ok(visible)
    }

    /// Stop showing a trace; its peak rows are removed.
    pub fn hide(&mut self, name: &str) -> PipelineResult<()> {
        if !self.traces.contains_key(name) {
            return Err(self.not_displayable(name));
        }
        let removed = self.peaks.remove_trace(name);
        self.displayed.remove(name);
        log::debug!("Hid '{name}', dropped {removed} peak row(s)");
        Ok(())
    }

    fn refresh_displayed(&mut self) -> PipelineResult<()> {
        let shown: Vec<String> = self.displayed.iter().cloned().collect();
        for name in shown {
            self.display(&name)?;
        }
        Ok(())
    }

    // -- context --

    pub fn correction(&self) -> Option<&CorrectionCurve> {
        self.correction.as_ref()
    }

    pub fn set_correction(&mut self, curve: CorrectionCurve) -> PipelineResult<()> {
        self.correction = Some(curve);
        self.refresh_displayed()
    }

    pub fn clear_correction(&mut self) -> PipelineResult<()> {
        self.correction = None;
        self.refresh_displayed()
    }

    pub fn mask(&self) -> Option<&FrequencyMask> {
        self.mask.as_ref().map(|(bands, _)| bands)
    }

    /// Install a mask, sampled at the configured mask step.
    pub fn set_mask(&mut self, mask: FrequencyMask) -> PipelineResult<()> {
        let series = mask.expand(self.settings.mask_step_mhz);
        self.mask = Some((mask, series));
        self.refresh_displayed()
    }

    pub fn clear_mask(&mut self) -> PipelineResult<()> {
        self.mask = None;
        self.refresh_displayed()
    }

    // -- peaks --

    pub fn peaks(&self) -> &PeakTable {
        &self.peaks
    }

    pub fn peaks_mut(&mut self) -> &mut PeakTable {
        &mut self.peaks
    }

    // -- derived series --

    pub fn derived(&self, label: &str) -> Option<&FrequencySeries> {
        self.derived.get(label)
    }

    pub fn derived_labels(&self) -> impl Iterator<Item = &str> {
        self.derived.keys().map(String::as_str)
    }

    /// `a − b`, stored under `label`.
    pub fn delta(&mut self, a: &str, b: &str, label: &str) -> PipelineResult<FrequencySeries> {
        let computer = self.settings.delta_computer()?;
        let ta = self.prepare(a)?.clone();
        let tb = self.prepare(b)?;
        let delta = computer.delta(&ta, tb);

        self.derived.insert(label.to_string(), delta.clone());
        Ok(delta)
    }

    /// Smoothed `a − b`, stored under `label`.  The raw delta is stored
    /// under `<label> (delta)` first, so it is kept even when smoothing fails.
    pub fn shielding_effectiveness(&mut self, a: &str, b: &str, label: &str) -> PipelineResult<FrequencySeries> {
        let computer = self.settings.delta_computer()?;
        let delta = self.delta(a, b, &format!("{label} (delta)"))?;

        let se = computer.smooth(&delta).map_err(|e| {
            log::warn!("Shielding effectiveness '{label}' not computed: {e}");
            e
        })?;
        self.derived.insert(label.to_string(), se.clone());
        Ok(se)
    }

    /// Row-wise maximum over `names`, stored under `label`.
    pub fn max_hold(&mut self, names: &[&str], label: &str) -> PipelineResult<FrequencySeries> {
        let mut prepared = Vec::with_capacity(names.len());
        for name in names {
            prepared.push(self.prepare(name)?.clone());
        }
        let refs: Vec<&Trace> = prepared.iter().collect();
        let series = max_hold(&refs);

        self.derived.insert(label.to_string(), series.clone());
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Polarity, TraceRow};
    use crate::pipeline::correction::CorrectionEngine;
    use crate::pipeline::mask::MaskBand;
    use crate::pipeline::table::{CorrectionTable, FactorKind};

    fn session() -> Session {
        Session::new(Settings {
            num_peaks: 2,
            smoothing_window: 5,
            smoothing_order: 2,
            ..Settings::default()
        })
        .unwrap()
    }

    fn flat_curve(value: f64) -> CorrectionCurve {
        let table = CorrectionTable::from_series(
            "af",
            FrequencySeries::from_pairs("", [(0.0, value), (1000.0, value)]),
            FactorKind::Antenna.sign(),
            "dB/m",
        );
        CorrectionEngine::default().generate(&[table], None)
    }

    fn ramp(name: &str, offset: f64) -> Trace {
        Trace::from_pairs(name, "Level (dBm)", (0..20).map(|i| (100.0 + i as f64, offset + i as f64)))
    }

    #[test]
    fn unknown_traces_are_reported() {
        let mut s = session();
        assert!(matches!(s.display("nope"), Err(PipelineError::UnknownTrace(_))));
        assert!(matches!(s.hide("nope"), Err(PipelineError::UnknownTrace(_))));
        assert!(s.delta("nope", "nada", "d").is_err());
    }

    #[test]
    fn display_applies_context_and_records_peaks() {
        let mut s = session();
        s.insert_trace(ramp("a", 0.0));
        s.set_correction(flat_curve(10.0)).unwrap();

        let shown = s.display("a").unwrap();
        assert_eq!(shown.len(), 20);
        assert!((shown.values()[0] - 117.0).abs() < 1e-9);
        assert_eq!(s.peaks().len(), 2);

        s.display("a").unwrap();
        assert_eq!(s.peaks().len(), 2);

        s.hide("a").unwrap();
        assert!(s.peaks().is_empty());
        assert!(!s.is_displayed("a"));
    }

    #[test]
    fn changing_the_mask_refreshes_displayed_traces() {
        let mut s = session();
        s.insert_trace(ramp("a", 0.0));
        s.display("a").unwrap();
        assert_eq!(s.peaks().rows()[0].record.frequency, 119.0);

        s.set_mask(FrequencyMask::from_bands("m", [MaskBand { center_mhz: 118.0, span_mhz: 2.0 }]))
            .unwrap();
        assert!(s.trace("a").unwrap().mask().is_some());
        assert!(s.peaks().rows()[0].record.frequency < 117.0);

        s.clear_mask().unwrap();
        assert!(s.trace("a").unwrap().mask().is_none());
    }

    fn scan(name: &str) -> Trace {
        let rows = vec![
            TraceRow { frequency: 100.0, amplitude: 1.0, polarity: Some(Polarity::Vertical) },
            TraceRow { frequency: 100.0, amplitude: 50.0, polarity: Some(Polarity::Horizontal) },
            TraceRow { frequency: 101.0, amplitude: 3.0, polarity: Some(Polarity::Vertical) },
            TraceRow { frequency: 101.0, amplitude: 40.0, polarity: Some(Polarity::Horizontal) },
        ];
        Trace::from_rows(name, "Level (dBuV)", rows)
    }

    #[test]
    fn directional_scans_register_sub_traces_without_passes() {
        let mut s = session();
        let names = s.insert_trace(scan("scan"));
        assert_eq!(names, vec!["scan - Vertical", "scan - Horizontal"]);

        s.set_correction(flat_curve(10.0)).unwrap();
        let shown = s.display("scan - Horizontal").unwrap();
        assert_eq!(shown.values(), &[50.0, 40.0]);
        assert!(s.trace("scan - Horizontal").unwrap().correction().is_none());
    }

    #[test]
    fn directional_scan_itself_is_not_displayable() {
        let mut s = session();
        s.insert_trace(scan("scan"));

        let err = s.display("scan").unwrap_err();
        assert!(matches!(
            &err,
            PipelineError::DirectionalScan { name, parts } if name == "scan" && parts.len() == 2
        ));
        assert!(matches!(s.hide("scan"), Err(PipelineError::DirectionalScan { .. })));
        assert!(s.peaks().is_empty());

        s.display("scan - Vertical").unwrap();
        s.display("scan - Horizontal").unwrap();
        let traces: Vec<&str> = s.peaks().rows().iter().map(|r| r.trace.as_str()).collect();
        assert_eq!(traces, vec!["scan - Vertical", "scan - Horizontal"]);
    }

    #[test]
    fn replacing_or_removing_a_scan_drops_its_sub_traces() {
        let mut s = session();
        s.insert_trace(scan("scan"));
        s.display("scan - Vertical").unwrap();
        assert_eq!(s.peaks().len(), 1);

        s.insert_trace(ramp("scan", 0.0));
        assert_eq!(s.trace_names().collect::<Vec<_>>(), vec!["scan"]);
        assert!(s.peaks().is_empty());

        s.insert_trace(scan("scan"));
        assert!(s.trace("scan").is_err());
        s.display("scan - Horizontal").unwrap();

        let removed = s.remove_trace("scan").unwrap();
        assert_eq!(removed, vec!["scan - Vertical", "scan - Horizontal"]);
        assert_eq!(s.trace_names().count(), 0);
        assert!(s.peaks().is_empty());
        assert!(matches!(s.remove_trace("scan"), Err(PipelineError::UnknownTrace(_))));
    }

    #[test]
    fn shielding_effectiveness_keeps_the_raw_delta() {
        let mut s = session();
        s.insert_trace(ramp("a", 30.0));
        s.insert_trace(ramp("b", 10.0));

        let se = s.shielding_effectiveness("a", "b", "enclosure").unwrap();
        assert_eq!(se.len(), 20);
        assert!(se.values().iter().all(|v| (v - 20.0).abs() < 1e-9));
        assert!(s.derived("enclosure (delta)").is_some());

        let short = Trace::from_pairs("c", "Level (dBm)", [(100.0, 1.0), (101.0, 2.0)]);
        s.insert_trace(short);
        let err = s.shielding_effectiveness("c", "b", "short").unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientSamples { window: 5, available: 2 }));
        assert_eq!(s.derived("short (delta)").unwrap().len(), 2);
        assert!(s.derived("short").is_none());
    }

    #[test]
    fn max_hold_is_stored_by_label() {
        let mut s = session();
        s.insert_trace(ramp("a", 0.0));
        s.insert_trace(ramp("b", 5.0));
        let max = s.max_hold(&["a", "b"], "max").unwrap();
        assert_eq!(max.values()[0], 5.0);
        assert_eq!(s.derived_labels().collect::<Vec<_>>(), vec!["max"]);
    }
}
