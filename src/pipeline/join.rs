//! The two ways series on different frequency grids are brought together.
//!
//! * [`interpolate_within`] fills gaps of an outer-joined column, strictly
//!   between its first and last defined sample.  Used to build the unified
//!   correction curve.
//! * [`nearest_join`] pairs integer keys with the closest key on the other
//!   side inside a tolerance.  Never fills, never extrapolates.  Used to align
//!   live traces with the curve, the mask and each other.

/// Scale for keys in whole MHz (frequencies are stored in MHz).
pub const MHZ_KEY_SCALE: f64 = 1.0;
/// Scale for keys in whole Hz.
pub const HZ_KEY_SCALE: f64 = 1e6;

/// Integer join key: `frequency * scale`, truncated toward zero.
pub fn join_key(frequency_mhz: f64, scale: f64) -> i64 {
    (frequency_mhz * scale).trunc() as i64
}

/// Restate a tolerance given in MHz in the unit of keys built with `scale`.
pub fn key_tolerance(tolerance_mhz: f64, scale: f64) -> i64 {
    (tolerance_mhz * scale).round() as i64
}

/// For every left key, the index of the right key closest to it, provided
/// the distance is at most `tolerance`.
///
/// `right` must be sorted ascending.  When the nearest key appears several
/// times the last occurrence wins; when a lower and a higher key are equally
/// close the lower one wins.
pub fn nearest_join(left: &[i64], right: &[i64], tolerance: i64) -> Vec<Option<usize>> {
    debug_assert!(right.windows(2).all(|w| w[0] <= w[1]));

    left.iter()
        .map(|&key| {
            let after = right.partition_point(|&r| r <= key);
            let backward = after.checked_sub(1);
            let forward = right.partition_point(|&r| r < key);
            let forward = (forward < right.len()).then_some(forward);

            let best = match (backward, forward) {
                (Some(b), Some(f)) => {
                    if key - right[b] <= right[f] - key {
                        b
                    } else {
                        f
                    }
                }
                (Some(b), None) => b,
                (None, Some(f)) => f,
                (None, None) => return None,
            };

            ((right[best] - key).abs() <= tolerance).then_some(best)
        })
        .collect()
}

/// Linearly interpolate the missing values of `values` against the abscissa
/// `x`, only between the first and the last defined entry.  Entries outside
/// that span stay `None`.
///
/// `x` must be sorted ascending and have the same length as `values`.
pub fn interpolate_within(x: &[f64], values: &mut [Option<f64>]) {
    debug_assert_eq!(x.len(), values.len());

    let mut prev: Option<usize> = None;
    for i in 0..values.len() {
        if values[i].is_none() {
            continue;
        }
        if let Some(p) = prev {
            if i > p + 1 {
                fill_gap(x, values, p, i);
            }
        }
        prev = Some(i);
    }
}

fn fill_gap(x: &[f64], values: &mut [Option<f64>], lo: usize, hi: usize) {
    let (Some(y0), Some(y1)) = (values[lo], values[hi]) else {
        return;
    };
    let (x0, x1) = (x[lo], x[hi]);
    let span = x1 - x0;

    for (k, value) in values.iter_mut().enumerate().take(hi).skip(lo + 1) {
        *value = Some(if span.abs() < f64::EPSILON {
            y0
        } else {
            y0 + (y1 - y0) * (x[k] - x0) / span
        });
    }
}
