use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::align::{TraceAligner, DBM_TO_DBUV};
use crate::pipeline::compare::DeltaComputer;
use crate::pipeline::peaks::PeakExtractor;

// ---------------------------------------------------------------------------
// Settings – persisted analysis parameters
// ---------------------------------------------------------------------------

/// Analysis parameters, stored as JSON.  Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Peaks reported per displayed trace.
    pub num_peaks: usize,
    /// Root of the calibration library and default output directory.
    pub workspace: PathBuf,
    pub min_peak_separation_mhz: f64,
    pub correction_tolerance_mhz: f64,
    pub mask_tolerance_mhz: f64,
    /// Sampling step used when expanding mask bands.
    pub mask_step_mhz: f64,
    pub reference_offset_db: f64,
    /// Savitzky-Golay window for shielding effectiveness (odd).
    pub smoothing_window: usize,
    pub smoothing_order: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            num_peaks: 6,
            workspace: PathBuf::from("."),
            min_peak_separation_mhz: 2.5,
            correction_tolerance_mhz: 1.0,
            mask_tolerance_mhz: 5.0,
            mask_step_mhz: 1.0,
            reference_offset_db: DBM_TO_DBUV,
            smoothing_window: 1001,
            smoothing_order: 3,
        }
    }
}

impl Settings {
    /// Read and validate a settings file.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let settings: Settings = serde_json::from_str(&text)?;
        settings.validate()?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| PipelineError::io(path, e))
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let invalid = |msg: String| Err(PipelineError::InvalidSettings(msg));

        if self.num_peaks == 0 {
            return invalid("num_peaks must be at least 1".into());
        }
        for (name, value) in [
            ("min_peak_separation_mhz", self.min_peak_separation_mhz),
            ("correction_tolerance_mhz", self.correction_tolerance_mhz),
            ("mask_tolerance_mhz", self.mask_tolerance_mhz),
            ("mask_step_mhz", self.mask_step_mhz),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{name} must be positive, got {value}"));
            }
        }
        if !self.reference_offset_db.is_finite() {
            return invalid("reference_offset_db must be finite".into());
        }
        if self.smoothing_window < 3 || self.smoothing_window % 2 == 0 {
            return invalid(format!(
                "smoothing_window must be odd and at least 3, got {}",
                self.smoothing_window
            ));
        }
        if self.smoothing_order >= self.smoothing_window {
            return invalid(format!(
                "smoothing_order {} must be below smoothing_window {}",
                self.smoothing_order, self.smoothing_window
            ));
        }
        Ok(())
    }

    pub fn aligner(&self) -> TraceAligner {
        TraceAligner {
            correction_tolerance_mhz: self.correction_tolerance_mhz,
            mask_tolerance_mhz: self.mask_tolerance_mhz,
            reference_offset_db: self.reference_offset_db,
        }
    }

    pub fn extractor(&self) -> PeakExtractor {
        PeakExtractor {
            num_peaks: self.num_peaks,
            min_separation_mhz: self.min_peak_separation_mhz,
        }
    }

    pub fn delta_computer(&self) -> PipelineResult<DeltaComputer> {
        DeltaComputer::new(
            self.correction_tolerance_mhz,
            self.smoothing_window,
            self.smoothing_order,
        )
    }
}
