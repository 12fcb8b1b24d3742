use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use emi_trace::data::export::{write_peak_table, write_series, write_trace};
use emi_trace::data::loader::load_trace;
use emi_trace::data::model::FrequencySeries;
use emi_trace::data::profile::{CalibrationLibrary, CurveReport, EquipmentProfile};
use emi_trace::pipeline::correction::CorrectionEngine;
use emi_trace::pipeline::limits::{LimitClass, LimitLine};
use emi_trace::pipeline::mask::FrequencyMask;
use emi_trace::{Session, Settings};

use crate::cli::{Cli, Command, ContextArgs};

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

pub fn run(cli: Cli) -> Result<()> {
    let mut settings = match &cli.settings {
        Some(path) => Settings::load(path).with_context(|| format!("loading settings {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(n) = cli.num_peaks {
        settings.num_peaks = n;
    }
    let mut session = Session::new(settings)?;

    match cli.command {
        Command::Correct { trace, context, output } => {
            apply_context(&mut session, &context)?;
            let names = load_into(&mut session, &trace)?;
            let single = names.len() == 1;
            for name in &names {
                session.display(name)?;
                let out = match (&output, single) {
                    (Some(path), true) => path.clone(),
                    (Some(path), false) => suffixed(path, &polarity_suffix(name)),
                    (None, true) => suffixed(&trace, "corrected"),
                    (None, false) => suffixed(&trace, &format!("{}_corrected", polarity_suffix(name))),
                };
                let prepared = session.trace(name)?;
                write_trace(&out, prepared)?;
                println!("{name}: {} rows → {}", prepared.len(), out.display());
            }
        }
        Command::Peaks { traces, context, limit, output } => {
            apply_context(&mut session, &context)?;
            for path in &traces {
                for name in load_into(&mut session, path)? {
                    session.display(&name)?;
                }
            }
            print_peaks(&session, limit);
            if let Some(out) = output {
                write_peak_table(&out, session.peaks())?;
                println!("Peak table → {}", out.display());
            }
        }
        Command::Delta { a, b, context, output } => {
            apply_context(&mut session, &context)?;
            let (na, nb) = (load_into(&mut session, &a)?, load_into(&mut session, &b)?);
            let label = format!("{} - {}", na[0], nb[0]);
            let delta = session.delta(&na[0], &nb[0], &label)?;
            emit_series(&delta, output.unwrap_or_else(|| suffixed(&a, "delta")))?;
        }
        Command::Se { a, b, context, output } => {
            apply_context(&mut session, &context)?;
            let (na, nb) = (load_into(&mut session, &a)?, load_into(&mut session, &b)?);
            let se = session
                .shielding_effectiveness(&na[0], &nb[0], "SE")
                .context("computing shielding effectiveness")?;
            emit_series(&se, output.unwrap_or_else(|| suffixed(&a, "se")))?;
        }
        Command::MaxHold { traces, context, output } => {
            apply_context(&mut session, &context)?;
            let mut names = Vec::new();
            for path in &traces {
                names.push(load_into(&mut session, path)?.remove(0));
            }
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let max = session.max_hold(&refs, "Max Hold")?;
            emit_series(&max, output.unwrap_or_else(|| suffixed(&traces[0], "maxhold")))?;
        }
        Command::Curve { context, output } => {
            let CurveReport { curve, skipped } = build_curve(&session.settings, &context)?;
            let out = output.unwrap_or_else(|| PathBuf::from("correction_curve.csv"));
            write_series(&out, &curve.total_series())?;
            for column in curve.columns() {
                println!("  {}", column.name);
            }
            if let Some(dcf) = curve.dcf() {
                println!("  DCF = {dcf:.3} dB");
            }
            for e in &skipped {
                println!("  skipped: {e}");
            }
            println!("{} rows → {}", curve.len(), out.display());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load a trace file into the session.  Returns the displayable names: the
/// trace itself, or the polarity sub-traces of a directional scan.
fn load_into(session: &mut Session, path: &Path) -> Result<Vec<String>> {
    let trace = load_trace(path).with_context(|| format!("loading trace {}", path.display()))?;
    if trace.is_empty() {
        bail!("trace {} has no samples", path.display());
    }
    Ok(session.insert_trace(trace))
}

/// Install the correction curve and mask the arguments describe.
fn apply_context(session: &mut Session, context: &ContextArgs) -> Result<()> {
    if context.has_correction() {
        let report = build_curve(&session.settings, context)?;
        if !report.skipped.is_empty() {
            log::warn!("Correction curve built without {} input(s)", report.skipped.len());
        }
        session.set_correction(report.curve)?;
    }
    if let Some(path) = &context.mask {
        let mask = FrequencyMask::load(path).with_context(|| format!("loading mask {}", path.display()))?;
        log::info!("Mask '{}': {} band(s)", mask.name, mask.bands().len());
        session.set_mask(mask)?;
    }
    Ok(())
}

/// Merge the profile's tables, then the explicit `--table` files.  Tables
/// that fail to load and an invalid distance pair are left out of the curve
/// and come back in the report.
fn build_curve(settings: &Settings, context: &ContextArgs) -> Result<CurveReport> {
    let library = CalibrationLibrary::new(context.library.clone().unwrap_or_else(|| settings.workspace.clone()));

    let mut profile = match &context.profile {
        Some(path) => EquipmentProfile::load(path).with_context(|| format!("loading profile {}", path.display()))?,
        None => EquipmentProfile::default(),
    };
    if let (Some(from), Some(to)) = (&context.distance_from, &context.distance_to) {
        profile.distance_from = from.clone();
        profile.distance_to = to.clone();
    }

    Ok(CorrectionEngine::default().generate_from_profile_with(&profile, &library, &context.tables))
}

fn print_peaks(session: &Session, limit: Option<LimitClass>) {
    let line = limit.map(LimitLine::builtin);
    let mut current = "";
    for row in session.peaks().rows() {
        if row.trace != current {
            current = &row.trace;
            println!("{current}");
        }
        let margin = line
            .as_ref()
            .and_then(|l| l.margin(row.record.frequency, row.record.amplitude))
            .map(|m| format!("  margin {m:+.2} dB"))
            .unwrap_or_default();
        println!(
            "  {:>12.3} MHz  {:>9.3}{margin}",
            row.record.frequency, row.record.amplitude
        );
    }
    if let Some(line) = line {
        println!("(margins against {})", line.name);
    }
}

fn emit_series(series: &FrequencySeries, out: PathBuf) -> Result<()> {
    write_series(&out, series)?;
    println!("{}: {} rows → {}", series.label, series.len(), out.display());
    Ok(())
}

/// `"scan - Vertical"` → `"vertical"`
fn polarity_suffix(name: &str) -> String {
    name.rsplit(" - ").next().unwrap_or(name).to_ascii_lowercase()
}

/// `dir/name.csv` → `dir/name_<suffix>.csv`
fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("trace");
    path.with_file_name(format!("{stem}_{suffix}.csv"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use emi_trace::pipeline::table::FactorKind;
    use emi_trace::PipelineError;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn explicit_table_with_invalid_distance_still_builds() {
        let temp = TempDir::new().expect("tempdir should be created");
        let af = temp.path().join("af.csv");
        fs::write(&af, "Frequency (MHz),AF (dB/m)\n100,12\n200,14\n").expect("table should be written");

        let context = ContextArgs {
            library: Some(temp.path().to_path_buf()),
            tables: vec![(FactorKind::Antenna, af)],
            distance_from: Some("0".into()),
            distance_to: Some("10".into()),
            ..Default::default()
        };
        let report = build_curve(&Settings::default(), &context).unwrap();

        assert!(matches!(report.skipped[..], [PipelineError::InvalidDistance { .. }]));
        assert!(report.curve.dcf().is_none());
        let names: Vec<&str> = report.curve.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["af"]);
        assert_eq!(report.curve.total()[0], 12.0);
    }

    #[test]
    fn missing_explicit_table_is_skipped() {
        let temp = TempDir::new().expect("tempdir should be created");
        let context = ContextArgs {
            library: Some(temp.path().to_path_buf()),
            tables: vec![(FactorKind::Cable, temp.path().join("absent.csv"))],
            ..Default::default()
        };
        let report = build_curve(&Settings::default(), &context).unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert!(report.curve.columns().is_empty());
    }

    #[test]
    fn directional_file_loads_as_sub_traces_only() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("its.csv");
        fs::write(
            &path,
            "Frequency (MHz),Level (dBuV),Position\n100,10,V\n100,40,H\n101,12,V\n101,42,H\n",
        )
        .expect("trace should be written");

        let mut session = Session::new(Settings::default()).unwrap();
        let names = load_into(&mut session, &path).unwrap();
        assert_eq!(names, vec!["its - Vertical", "its - Horizontal"]);
        assert!(matches!(session.display("its"), Err(PipelineError::DirectionalScan { .. })));
        assert_eq!(polarity_suffix(&names[1]), "horizontal");
    }
}
