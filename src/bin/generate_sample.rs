use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use emi_trace::data::profile::EquipmentProfile;
use emi_trace::pipeline::mask::{FrequencyMask, MaskBand};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Noise floor plus narrowband emissions `(center MHz, width MHz, height dB)`.
fn generate_sweep(freq_mhz: &[f64], floor_dbm: f64, emissions: &[(f64, f64, f64)], rng: &mut SimpleRng) -> Vec<f64> {
    freq_mhz
        .iter()
        .map(|&f| {
            let signal: f64 = emissions
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(f, mu, sigma, amp))
                .sum();
            floor_dbm + signal + rng.gauss(0.0, 1.5)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn write_columns(path: &Path, header: [&str; 2], rows: impl IntoIterator<Item = (f64, f64)>) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(header)?;
    let mut count = 0;
    for (x, y) in rows {
        writer.write_record([format!("{x}"), format!("{y:.3}")])?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

fn main() -> Result<()> {
    env_logger::init();

    let out = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "sample_data".to_string()));
    let cal = out.join("cal");
    let mut rng = SimpleRng::new(42);

    // 30 MHz → 1 GHz, 0.5 MHz bins
    let freq_mhz: Vec<f64> = (0..=1940).map(|i| 30.0 + i as f64 * 0.5).collect();
    let emissions = [
        (98.0, 4.0, 25.0),
        (125.0, 0.4, 38.0),
        (250.0, 0.4, 30.0),
        (433.9, 0.3, 42.0),
        (868.0, 0.3, 27.0),
    ];

    let open = generate_sweep(&freq_mhz, -95.0, &emissions, &mut rng);
    let n = write_columns(
        &out.join("open.csv"),
        ["Frequency (Hz)", "Meas. Peak (dBm)"],
        freq_mhz.iter().map(|f| f * 1e6).zip(open.iter().copied()),
    )?;

    // Same source behind an enclosure: emissions attenuated by ~30 dB.
    let shielded: Vec<(f64, f64, f64)> = emissions.iter().map(|&(mu, s, a)| (mu, s, a - 30.0)).collect();
    let closed = generate_sweep(&freq_mhz, -95.0, &shielded, &mut rng);
    write_columns(
        &out.join("shielded.csv"),
        ["Frequency (Hz)", "Meas. Peak (dBm)"],
        freq_mhz.iter().map(|f| f * 1e6).zip(closed.iter().copied()),
    )?;

    // Calibration tables, 10 MHz grid
    let grid: Vec<f64> = (3..=100).map(|i| i as f64 * 10.0).collect();
    write_columns(
        &cal.join("Antenna").join("bicon.csv"),
        ["Frequency (MHz)", "Antenna Factor (dB/m)"],
        grid.iter().map(|&f| (f, 20.0 * f.log10() - 29.8 + 2.0 * (f / 150.0).sin())),
    )?;
    write_columns(
        &cal.join("Cable").join("rg58.csv"),
        ["Frequency (MHz)", "Loss (dB)"],
        grid.iter().map(|&f| (f, 0.12 * f.sqrt())),
    )?;
    write_columns(
        &cal.join("Attenuator").join("10dB.csv"),
        ["Frequency (MHz)", "Attenuation (dB)"],
        grid.iter().map(|&f| (f, 10.0)),
    )?;

    let profile = EquipmentProfile {
        antenna: Some("bicon".to_string()),
        cable: Some("rg58".to_string()),
        attenuators: [Some("10dB".to_string()), None, None],
        distance_from: "3".to_string(),
        distance_to: "10".to_string(),
        ..Default::default()
    };
    profile.save(&out.join("profile.csv"))?;

    // FM broadcast band as ambient
    FrequencyMask::from_bands(
        "ambient",
        [MaskBand {
            center_mhz: 98.0,
            span_mhz: 20.0,
        }],
    )
    .save(&out.join("ambient.csv"))?;

    println!(
        "Wrote 2 sweeps ({n} bins each), 3 calibration tables, a profile and a mask to {}",
        out.display()
    );
    Ok(())
}
