//! Audio source separation (stem separation)
//!
//! A pretrained separation model only understands fixed-length windows. This
//! module turns it into a separator for recordings of any length:
//! - `SegmentPlanner` cuts the timeline into overlapping windows
//! - `OverlapAccumulator` blends window outputs with a triangular weight
//! - `ShiftEnsembler` averages randomly time-shifted passes
//! - `SeparationOrchestrator` ties them together on a bounded worker pool
//! - `StemSelector` picks the requested sources and derives `no_vocals`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sf_ml::separation::{SeparationOrchestrator, StemRequest, StemSelector};
//!
//! let result = orchestrator.separate(&audio, "htdemucs_ft", 1)?;
//! let stems = StemSelector::select(&result, &StemRequest::parse("vocals"))?;
//! let karaoke = &stems["no_vocals"];
//! ```

mod accumulate;
mod ensemble;
mod htdemucs;
mod orchestrator;
mod plan;
mod stems;

pub use accumulate::{OverlapAccumulator, transition_window};
pub use ensemble::{ShiftEnsembler, ShiftSample};
pub use htdemucs::{HTDEMUCS_SAMPLE_RATE, ModelKind, OnnxSeparationModel, SEGMENT_SAMPLES};
pub use orchestrator::SeparationOrchestrator;
pub use plan::{Segment, SegmentPlan, SegmentPlanner};
pub use stems::{
    NO_VOCALS, SeparationResult, SeparationStats, StemRequest, StemSelection, StemSelector, VOCALS,
};

use std::collections::HashMap;

use sf_core::AudioBuffer;

use crate::error::MlResult;

/// Per-source output of one model invocation, keyed by source name
pub type SourceMap = HashMap<String, AudioBuffer>;

/// A pretrained source-separation model treated as an opaque oracle
///
/// Implementations are shared read-only across worker threads, so `infer`
/// takes `&self` and must be safe to call concurrently.
pub trait SeparationModel: Send + Sync {
    /// Model name as known to the registry
    fn name(&self) -> &str;

    /// Ordered, unique source names produced by `infer`
    fn source_names(&self) -> &[String];

    /// Window length in samples the model consumes per call
    fn segment_length(&self) -> usize;

    /// Expected input channel count
    fn channels(&self) -> usize {
        2
    }

    /// Expected input sample rate
    fn sample_rate(&self) -> u32 {
        sf_core::DEFAULT_SAMPLE_RATE
    }

    /// Separate one window
    ///
    /// Every returned buffer must have the input's channel count and length.
    fn infer(&self, segment: &AudioBuffer) -> MlResult<SourceMap>;
}
