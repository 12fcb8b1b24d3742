use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::data::loader;
use crate::data::model::FrequencySeries;
use crate::error::PipelineResult;

// ---------------------------------------------------------------------------
// Sign / FactorKind
// ---------------------------------------------------------------------------

/// How a factor enters the total: added (antenna, cable) or subtracted
/// (preamp gain, attenuator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Add,
    Subtract,
}

impl Sign {
    pub fn factor(self) -> f64 {
        match self {
            Sign::Add => 1.0,
            Sign::Subtract => -1.0,
        }
    }
}

/// The measurement-chain element a correction table describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FactorKind {
    Antenna,
    Cable,
    Preamp,
    Attenuator,
}

impl FactorKind {
    pub const ALL: [FactorKind; 4] = [
        FactorKind::Antenna,
        FactorKind::Cable,
        FactorKind::Preamp,
        FactorKind::Attenuator,
    ];

    pub fn sign(self) -> Sign {
        match self {
            FactorKind::Antenna | FactorKind::Cable => Sign::Add,
            FactorKind::Preamp | FactorKind::Attenuator => Sign::Subtract,
        }
    }

    /// Sub-directory of a calibration library holding tables of this kind.
    pub fn dir_name(self) -> &'static str {
        match self {
            FactorKind::Antenna => "Antenna",
            FactorKind::Cable => "Cable",
            FactorKind::Preamp => "Preamp",
            FactorKind::Attenuator => "Attenuator",
        }
    }
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for FactorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FactorKind::ALL
            .into_iter()
            .find(|k| k.dir_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown factor kind '{s}' (expected antenna, cable, preamp, attenuator)"))
    }
}

// ---------------------------------------------------------------------------
// CorrectionTable
// ---------------------------------------------------------------------------

/// One calibration factor as a frequency → dB series, with its sign already
/// applied so that the engine only ever adds.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionTable {
    /// Source identifier (profile / file name); becomes the column name in
    /// the unified curve.
    pub name: String,
    pub sign: Sign,
    /// Unit of the value column as written in the source header, `dB` when
    /// the source has no header.
    pub unit: String,
    series: FrequencySeries,
}

impl CorrectionTable {
    /// Wrap a series given in the table's native sign convention.  A
    /// subtracted factor is negated here, once.
    pub fn from_series(name: impl Into<String>, native: FrequencySeries, sign: Sign, unit: impl Into<String>) -> Self {
        let name = name.into();
        let series = match sign {
            Sign::Add => native,
            Sign::Subtract => native.negated(),
        };
        CorrectionTable {
            series: series.with_label(name.clone()),
            name,
            sign,
            unit: unit.into(),
        }
    }

    /// Load a two-column (frequency MHz, factor) table.  The table is named
    /// after the file stem.
    pub fn load(path: &Path, sign: Sign) -> PipelineResult<Self> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("table")
            .to_string();

        let raw = loader::read_numeric_table(path, &name)?;
        let unit = raw
            .value_header
            .as_deref()
            .and_then(loader::unit_of)
            .unwrap_or("dB")
            .to_string();

        let table = CorrectionTable::from_series(name, FrequencySeries::from_pairs("", raw.rows), sign, unit);
        log::debug!(
            "Loaded correction table '{}' ({} rows, sign {:+})",
            table.name,
            table.series.len(),
            sign.factor()
        );
        Ok(table)
    }

    /// Values after sign application.
    pub fn series(&self) -> &FrequencySeries {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtracted_tables_are_negated_once() {
        let native = FrequencySeries::from_pairs("", [(100.0, 10.0), (200.0, 10.0)]);
        let atten = CorrectionTable::from_series("atten", native, FactorKind::Attenuator.sign(), "dB");
        assert_eq!(atten.series().values(), &[-10.0, -10.0]);
        assert_eq!(atten.series().label, "atten");
    }

    #[test]
    fn kinds_carry_their_sign() {
        assert_eq!(FactorKind::Antenna.sign(), Sign::Add);
        assert_eq!(FactorKind::Cable.sign(), Sign::Add);
        assert_eq!(FactorKind::Preamp.sign(), Sign::Subtract);
        assert_eq!(FactorKind::Attenuator.sign().factor(), -1.0);
        assert_eq!("preamp".parse::<FactorKind>(), Ok(FactorKind::Preamp));
        assert!("mixer".parse::<FactorKind>().is_err());
    }
}
