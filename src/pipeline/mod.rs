/// Correction & analysis pipeline.
///
/// Architecture:
/// ```text
///  correction tables ──► CorrectionEngine ──► CorrectionCurve ─┐
///  mask band table ────► FrequencyMask::expand ► MaskSeries ───┤
///                                                              ▼
///  raw Trace ──────────────────────────────────────────►  TraceAligner
///                                                              │
///                                         corrected / masked Trace
///                                              │           │
///                                              ▼           ▼
///                                      PeakExtractor   DeltaComputer
///                                              │           │
///                                          PeakList    delta / SE curve
/// ```
///
/// `join` holds the two alignment primitives everything else is built on.

pub mod align;
pub mod compare;
pub mod correction;
pub mod join;
pub mod limits;
pub mod mask;
pub mod peaks;
pub mod smoothing;
pub mod table;
