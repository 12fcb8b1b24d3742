//! EMI trace correction and analysis.
//!
//! Spectrum-analyzer sweeps are corrected with antenna, cable, preamplifier
//! and attenuator factors, masked against ambient bands, searched for peaks
//! and compared against each other (delta, shielding effectiveness, max
//! hold).  See [`pipeline`] for the processing chain and [`state::Session`]
//! for the context that ties it together.

pub mod data;
pub mod error;
pub mod pipeline;
pub mod settings;
pub mod state;

pub use error::{PipelineError, PipelineResult};
pub use settings::Settings;
pub use state::Session;
