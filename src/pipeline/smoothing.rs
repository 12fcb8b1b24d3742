//! Savitzky-Golay polynomial smoothing.
//!
//! Fits a local polynomial of degree `p` to a sliding window of `2m+1`
//! samples.  Interior samples use the centre row of the least-squares
//! projection; the first and last `m` samples are evaluated on the
//! polynomial fitted to the first and last full window, so the output keeps
//! the input length without mirroring.
//!
//! Reference: Savitzky & Golay, "Smoothing and Differentiation of Data
//! by Simplified Least Squares Procedures" (Analytical Chemistry, 1964).

use crate::error::{PipelineError, PipelineResult};

/// Savitzky-Golay smoother with its projection matrix computed up front.
#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    window: usize,
    poly_order: usize,
    /// `(JᵀJ)⁻¹Jᵀ`, `poly_order + 1` rows of `window` weights.  The abscissa
    /// is scaled to `[-1, 1]` to keep the normal equations well conditioned.
    projection: Vec<Vec<f64>>,
}

impl SavitzkyGolay {
    /// `window` must be odd and greater than `poly_order`.
    pub fn new(window: usize, poly_order: usize) -> PipelineResult<Self> {
        if window < 3 || window % 2 == 0 {
            return Err(PipelineError::InvalidSettings(format!(
                "smoothing window must be odd and at least 3, got {window}"
            )));
        }
        if poly_order >= window {
            return Err(PipelineError::InvalidSettings(format!(
                "polynomial order {poly_order} >= window size {window}"
            )));
        }

        let projection = projection_matrix(window, poly_order).ok_or_else(|| {
            PipelineError::InvalidSettings(format!("singular fit for window {window}, order {poly_order}"))
        })?;
        Ok(SavitzkyGolay {
            window,
            poly_order,
            projection,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn poly_order(&self) -> usize {
        self.poly_order
    }

    /// Smooth `data`.  Fails with [`PipelineError::InsufficientSamples`] when
    /// `data` is shorter than the window.
    pub fn smooth(&self, data: &[f64]) -> PipelineResult<Vec<f64>> {
        let n = data.len();
        if n < self.window {
            return Err(PipelineError::InsufficientSamples {
                window: self.window,
                available: n,
            });
        }

        let m = self.window / 2;
        let centre = self.weights_at(0.0);
        let mut output = vec![0.0; n];

        for i in m..n - m {
            output[i] = dot(&centre, &data[i - m..=i + m]);
        }

        // Edges: evaluate the fit of the first / last full window.
        let head = &data[..self.window];
        let tail = &data[n - self.window..];
        for j in 0..m {
            let t = (j as f64 - m as f64) / m as f64;
            output[j] = dot(&self.weights_at(t), head);
            output[n - 1 - j] = dot(&self.weights_at(-t), tail);
        }

        Ok(output)
    }

    /// Weights giving the fitted polynomial's value at scaled position `t`.
    fn weights_at(&self, t: f64) -> Vec<f64> {
        let mut weights = vec![0.0; self.window];
        let mut tk = 1.0;
        for row in &self.projection {
            for (w, p) in weights.iter_mut().zip(row) {
                *w += tk * p;
            }
            tk *= t;
        }
        weights
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `(JᵀJ)⁻¹Jᵀ` for the Vandermonde matrix `J[i][k] = xᵢᵏ`, `xᵢ` evenly spaced
/// on `[-1, 1]`.  `None` if the normal equations are singular.
fn projection_matrix(window: usize, poly_order: usize) -> Option<Vec<Vec<f64>>> {
    let m = (window / 2) as f64;
    let p = poly_order + 1;

    let j: Vec<Vec<f64>> = (0..window)
        .map(|i| {
            let x = (i as f64 - m) / m;
            let mut xk = 1.0;
            (0..p)
                .map(|_| {
                    let v = xk;
                    xk *= x;
                    v
                })
                .collect()
        })
        .collect();

    // Augmented [JᵀJ | I]
    let mut aug = vec![vec![0.0; 2 * p]; p];
    for r in 0..p {
        for c in 0..p {
            aug[r][c] = j.iter().map(|row| row[r] * row[c]).sum();
        }
        aug[r][p + r] = 1.0;
    }

    // Gauss-Jordan with partial pivoting
    for col in 0..p {
        let pivot_row = (col..p).max_by(|&a, &b| aug[a][col].abs().total_cmp(&aug[b][col].abs()))?;
        aug.swap(col, pivot_row);

        let pivot = aug[col][col];
        if pivot.abs() < 1e-12 {
            return None;
        }
        for v in aug[col].iter_mut() {
            *v /= pivot;
        }
        for r in 0..p {
            if r != col {
                let factor = aug[r][col];
                if factor != 0.0 {
                    for c in 0..2 * p {
                        aug[r][c] -= factor * aug[col][c];
                    }
                }
            }
        }
    }

    let projection = (0..p)
        .map(|k| {
            (0..window)
                .map(|i| (0..p).map(|l| aug[k][p + l] * j[i][l]).sum())
                .collect()
        })
        .collect();
    Some(projection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_signal_is_unchanged() {
        let sg = SavitzkyGolay::new(7, 2).unwrap();
        let smoothed = sg.smooth(&[5.0; 20]).unwrap();
        for v in smoothed {
            assert!((v - 5.0).abs() < 1e-10);
        }
    }

    #[test]
    fn cubic_is_reproduced_including_edges() {
        let data: Vec<f64> = (0..30)
            .map(|i| {
                let x = i as f64 * 0.1;
                x * x * x - 2.0 * x + 1.0
            })
            .collect();
        let smoothed = SavitzkyGolay::new(9, 3).unwrap().smooth(&data).unwrap();
        for (s, d) in smoothed.iter().zip(&data) {
            assert!((s - d).abs() < 1e-9, "got {s}, expected {d}");
        }
    }

    #[test]
    fn smoothing_reduces_sample_noise() {
        let data: Vec<f64> = (0..200)
            .map(|i| (i as f64 * 0.05).sin() + if i % 2 == 0 { 0.3 } else { -0.3 })
            .collect();
        let smoothed = SavitzkyGolay::new(21, 3).unwrap().smooth(&data).unwrap();

        let roughness = |v: &[f64]| v.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum::<f64>();
        assert!(roughness(&smoothed) < roughness(&data) / 10.0);
    }

    #[test]
    fn large_window_stays_well_conditioned() {
        let data: Vec<f64> = (0..1500).map(|i| 0.002 * i as f64 + 3.0).collect();
        let smoothed = SavitzkyGolay::new(1001, 3).unwrap().smooth(&data).unwrap();
        for (s, d) in smoothed.iter().zip(&data) {
            assert!((s - d).abs() < 1e-6);
        }
    }

    #[test]
    fn short_input_is_rejected() {
        let err = SavitzkyGolay::new(1001, 3).unwrap().smooth(&[0.0; 1000]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientSamples { window: 1001, available: 1000 }
        ));
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        assert!(SavitzkyGolay::new(4, 2).is_err());
        assert!(SavitzkyGolay::new(5, 5).is_err());
        assert!(SavitzkyGolay::new(1, 0).is_err());
    }
}
