use super::model::{FrequencySeries, Trace};

// ---------------------------------------------------------------------------
// Mask filtering: which rows of a trace are visible / searchable
// ---------------------------------------------------------------------------

/// Return indices of rows that pass the trace's mask.
///
/// A row passes when:
/// * The trace carries no mask column → passes (no constraint)
/// * Its mask cell is `false` → passes
/// * Its mask cell is `true` → hidden from plots and peak search
pub fn unmasked_indices(trace: &Trace) -> Vec<usize> {
    (0..trace.len()).filter(|&i| !trace.is_masked(i)).collect()
}

/// The default displayed series: display amplitude over unmasked rows only.
/// Masked rows stay in the trace; they are only left out of this view.
pub fn visible_series(trace: &Trace) -> FrequencySeries {
    let freq = trace.frequency();
    let amp = trace.display_amplitude();
    FrequencySeries::from_pairs(
        trace.display_label(),
        unmasked_indices(trace).into_iter().map(|i| (freq[i], amp[i])),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_rows_are_hidden_but_kept() {
        let mut trace = Trace::from_pairs("t", "A", [(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
        assert_eq!(unmasked_indices(&trace), vec![0, 1, 2]);

        trace.set_mask(vec![false, true, false]);
        assert_eq!(unmasked_indices(&trace), vec![0, 2]);

        let visible = visible_series(&trace);
        assert_eq!(visible.frequency(), &[1.0, 3.0]);
        assert_eq!(trace.len(), 3);
    }
}
