use std::fs;
use std::path::Path;

use emi_trace::data::export::{write_peak_table, write_series};
use emi_trace::data::loader::load_trace;
use emi_trace::data::profile::{CalibrationLibrary, EquipmentProfile};
use emi_trace::pipeline::correction::CorrectionEngine;
use emi_trace::pipeline::limits::{LimitClass, LimitLine};
use emi_trace::pipeline::mask::FrequencyMask;
use emi_trace::pipeline::table::FactorKind;
use emi_trace::{PipelineError, Session, Settings};
use tempfile::TempDir;

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directory should be created");
    }
    fs::write(path, contents).expect("file should be written");
}

/// 100..=199 MHz in Hz, flat floor with two emissions.
fn sweep_csv(floor: f64) -> String {
    let mut out = String::from("Frequency (Hz),Meas. Peak (dBm)\n");
    for i in 0..100 {
        let f = 100.0 + i as f64;
        let level = match i {
            20 => floor + 40.0,
            70 => floor + 30.0,
            _ => floor,
        };
        out.push_str(&format!("{},{}\n", f * 1e6, level));
    }
    out
}

fn small_settings() -> Settings {
    Settings {
        num_peaks: 2,
        smoothing_window: 11,
        smoothing_order: 3,
        ..Settings::default()
    }
}

#[test]
fn corrected_masked_peaks_end_to_end() {
    let temp = TempDir::new().expect("tempdir should be created");
    let library = CalibrationLibrary::new(temp.path().join("cal"));
    write_file(
        &library.table_path(FactorKind::Antenna, "bicon"),
        "Frequency (MHz),AF (dB/m)\n100,10\n200,10\n",
    );
    write_file(&library.table_path(FactorKind::Attenuator, "6dB"), "100,6\n200,6\n");
    let trace_path = temp.path().join("open.csv");
    write_file(&trace_path, &sweep_csv(-90.0));

    let profile = EquipmentProfile {
        antenna: Some("bicon".into()),
        attenuators: [Some("6dB".into()), None, None],
        ..Default::default()
    };
    let report = CorrectionEngine::default().generate_from_profile(&profile, &library);
    assert!(report.skipped.is_empty());

    let mut session = Session::new(small_settings()).unwrap();
    let trace = load_trace(&trace_path).unwrap();
    assert_eq!(trace.frequency()[0], 100.0);
    session.insert_trace(trace);
    session.set_correction(report.curve).unwrap();

    let shown = session.display("open").unwrap();
    assert_eq!(shown.len(), 100);
    // -90 dBm + 10 - 6 + 107
    assert!((shown.values()[0] - 21.0).abs() < 1e-9);

    let peaks = session.peaks().rows();
    assert_eq!(peaks.len(), 2);
    assert_eq!(peaks[0].record.frequency, 120.0);
    assert_eq!(peaks[0].record.amplitude, 61.0);
    assert_eq!(peaks[1].record.frequency, 170.0);

    // Mask the strongest emission: the next one moves up.
    session
        .set_mask(FrequencyMask::from_rows("ambient", [(Some(120.0), Some(2.0))]))
        .unwrap();
    let shown = session.display("open").unwrap();
    assert!(shown.len() < 100);
    assert!(shown.get(120.0).is_none());
    assert_eq!(session.peaks().rows()[0].record.frequency, 170.0);

    let limit = LimitLine::builtin(LimitClass::CisprB);
    let top = &session.peaks().rows()[0].record;
    let margin = limit.margin(top.frequency, top.amplitude).unwrap();
    assert!((margin - (51.0 - 30.0)).abs() < 1e-9);

    let out = temp.path().join("peaks.csv");
    session.peaks_mut().set_notes(0, "clock harmonic");
    write_peak_table(&out, session.peaks()).unwrap();
    let text = fs::read_to_string(&out).unwrap();
    let header = text.lines().next().unwrap();
    assert!(header.starts_with("Frequency (MHz),Meas. Peak (dBm),Mask,bicon,6dB"));
    assert!(header.ends_with("Trace,Notes"));
    assert!(text.contains("clock harmonic"));
}

#[test]
fn shielding_effectiveness_of_two_sweeps() {
    let temp = TempDir::new().expect("tempdir should be created");
    let open = temp.path().join("open.csv");
    let closed = temp.path().join("closed.csv");
    write_file(&open, &sweep_csv(-60.0));
    write_file(&closed, &sweep_csv(-85.0));

    let mut session = Session::new(small_settings()).unwrap();
    session.insert_trace(load_trace(&open).unwrap());
    session.insert_trace(load_trace(&closed).unwrap());

    let se = session.shielding_effectiveness("open", "closed", "SE").unwrap();
    assert_eq!(se.len(), 100);
    assert!(se.values().iter().all(|v| (v - 25.0).abs() < 1e-6));
    assert!(session.derived("SE (delta)").is_some());

    let out = temp.path().join("se.csv");
    write_series(&out, &se).unwrap();
    let first = fs::read_to_string(&out).unwrap().lines().next().unwrap().to_string();
    assert_eq!(first, "Frequency (MHz),Attenuation (dB)");

    assert!(matches!(
        session.shielding_effectiveness("open", "missing", "x"),
        Err(PipelineError::UnknownTrace(name)) if name == "missing"
    ));
}

#[test]
fn directional_scan_from_json() {
    let temp = TempDir::new().expect("tempdir should be created");
    let path = temp.path().join("its.json");
    write_file(
        &path,
        r#"{
            "frequency_unit": "MHz",
            "amplitude_label": "Level (dBuV)",
            "frequency": [100, 100, 101, 101, 102],
            "amplitude": [10, 20, 11, 21, 12],
            "position": ["V", "H", "V", "H", "Vertical"]
        }"#,
    );

    let mut session = Session::new(small_settings()).unwrap();
    let names = session.insert_trace(load_trace(&path).unwrap());
    assert_eq!(names, vec!["its - Vertical", "its - Horizontal"]);
    assert!(matches!(
        session.display("its"),
        Err(PipelineError::DirectionalScan { parts, .. }) if parts == names
    ));

    let vertical = session.display("its - Vertical").unwrap();
    assert_eq!(vertical.values(), &[10.0, 11.0, 12.0]);
    let horizontal = session.display("its - Horizontal").unwrap();
    assert_eq!(horizontal.len(), 2);
    assert_eq!(session.peaks().rows()[0].trace, "its - Vertical");
}
