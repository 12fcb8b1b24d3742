use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::correction::{CorrectionCurve, CorrectionEngine, DistanceBounds};
use crate::pipeline::table::{CorrectionTable, FactorKind};

/// Placeholder written for an empty selection slot.
pub const NONE_SELECTION: &str = "None";

// ---------------------------------------------------------------------------
// CalibrationLibrary – where named correction tables live
// ---------------------------------------------------------------------------

/// Directory of correction tables, one sub-directory per [`FactorKind`]:
/// `<root>/Antenna/<name>.csv`, `<root>/Cable/<name>.csv`, ...
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationLibrary {
    pub root: PathBuf,
}

impl CalibrationLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CalibrationLibrary { root: root.into() }
    }

    pub fn table_path(&self, kind: FactorKind, name: &str) -> PathBuf {
        self.root.join(kind.dir_name()).join(format!("{name}.csv"))
    }

    pub fn load(&self, kind: FactorKind, name: &str) -> PipelineResult<CorrectionTable> {
        CorrectionTable::load(&self.table_path(kind, name), kind.sign())
    }
}

// ---------------------------------------------------------------------------
// EquipmentProfile – a saved set of table selections
// ---------------------------------------------------------------------------

/// A named measurement setup.  Persisted as one value per CSV row, in this
/// order: antenna, preamp, cable, attenuator 1..3, distance from, distance to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EquipmentProfile {
    pub antenna: Option<String>,
    pub preamp: Option<String>,
    pub cable: Option<String>,
    pub attenuators: [Option<String>; 3],
    pub distance_from: String,
    pub distance_to: String,
}

/// Result of generating a curve from a profile: the curve plus every input
/// that had to be left out of it.
#[derive(Debug)]
pub struct CurveReport {
    pub curve: CorrectionCurve,
    pub skipped: Vec<PipelineError>,
}

impl EquipmentProfile {
    /// Selected tables in merge order.
    pub fn selections(&self) -> Vec<(FactorKind, &str)> {
        let mut out = Vec::new();
        let slots = [
            (FactorKind::Antenna, &self.antenna),
            (FactorKind::Preamp, &self.preamp),
            (FactorKind::Cable, &self.cable),
            (FactorKind::Attenuator, &self.attenuators[0]),
            (FactorKind::Attenuator, &self.attenuators[1]),
            (FactorKind::Attenuator, &self.attenuators[2]),
        ];
        for (kind, slot) in slots {
            if let Some(name) = slot.as_deref() {
                out.push((kind, name));
            }
        }
        out
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut rows: Vec<String> = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(record.get(0).unwrap_or("").trim().to_string());
        }
        if rows.len() < 6 {
            return Err(PipelineError::malformed(
                path.display().to_string(),
                format!("equipment profile has {} rows, expected 6 to 8", rows.len()),
            ));
        }

        let selection = |i: usize| -> Option<String> {
            let v = rows[i].as_str();
            (!v.is_empty() && v != NONE_SELECTION).then(|| v.to_string())
        };
        Ok(EquipmentProfile {
            antenna: selection(0),
            preamp: selection(1),
            cable: selection(2),
            attenuators: [selection(3), selection(4), selection(5)],
            distance_from: rows.get(6).cloned().unwrap_or_default(),
            distance_to: rows.get(7).cloned().unwrap_or_default(),
        })
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let mut writer = csv::Writer::from_path(path)?;
        let slot = |s: &Option<String>| s.clone().unwrap_or_else(|| NONE_SELECTION.to_string());

        let rows = [
            slot(&self.antenna),
            slot(&self.preamp),
            slot(&self.cable),
            slot(&self.attenuators[0]),
            slot(&self.attenuators[1]),
            slot(&self.attenuators[2]),
            self.distance_from.clone(),
            self.distance_to.clone(),
        ];
        for row in rows {
            writer.write_record([row])?;
        }
        writer.flush().map_err(|e| PipelineError::io(path, e))?;
        Ok(())
    }
}

impl CorrectionEngine {
    /// Load every table a profile selects and generate the curve.  A table
    /// that fails to load, or an invalid distance pair, is logged, reported in
    /// [`CurveReport::skipped`] and left out; the rest still merges.
    pub fn generate_from_profile(&self, profile: &EquipmentProfile, library: &CalibrationLibrary) -> CurveReport {
        self.generate_from_profile_with(profile, library, &[])
    }

    /// As [`generate_from_profile`](Self::generate_from_profile), with extra
    /// table files merged after the profile's selections.  They follow the
    /// same skip-and-report policy.
    pub fn generate_from_profile_with(
        &self,
        profile: &EquipmentProfile,
        library: &CalibrationLibrary,
        extra: &[(FactorKind, PathBuf)],
    ) -> CurveReport {
        let mut skipped = Vec::new();
        let mut tables = Vec::new();

        let selected = profile
            .selections()
            .into_iter()
            .map(|(kind, name)| (kind, library.table_path(kind, name)));
        let extra = extra.iter().map(|(kind, path)| (*kind, path.clone()));

        for (kind, path) in selected.chain(extra) {
            match CorrectionTable::load(&path, kind.sign()) {
                Ok(table) => tables.push(table),
                Err(e) => {
                    log::warn!("Skipping {kind} table {}: {e}", path.display());
                    skipped.push(e);
                }
            }
        }

        let distance = match DistanceBounds::parse(&profile.distance_from, &profile.distance_to) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("Distance correction omitted: {e}");
                skipped.push(e);
                None
            }
        };

        CurveReport {
            curve: self.generate(&tables, distance),
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selections_skip_empty_slots_in_merge_order() {
        let profile = EquipmentProfile {
            antenna: Some("bicon".into()),
            cable: Some("rg58".into()),
            attenuators: [None, Some("10db".into()), None],
            ..Default::default()
        };
        assert_eq!(
            profile.selections(),
            vec![
                (FactorKind::Antenna, "bicon"),
                (FactorKind::Cable, "rg58"),
                (FactorKind::Attenuator, "10db"),
            ]
        );
    }

    #[test]
    fn library_paths_follow_kind_directories() {
        let lib = CalibrationLibrary::new("/cal");
        assert_eq!(
            lib.table_path(FactorKind::Preamp, "lna"),
            PathBuf::from("/cal/Preamp/lna.csv")
        );
    }
}
