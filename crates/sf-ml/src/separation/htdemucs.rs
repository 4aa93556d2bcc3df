//! HTDemucs v4 - Hybrid Transformer Demucs
//!
//! The network itself runs as an exported ONNX graph; this module only knows
//! its interface: fixed 7.8 s stereo windows at 44.1 kHz in, one waveform per
//! source out.
//!
//! ## Model Variants
//!
//! - htdemucs: 4-stem (drums, bass, other, vocals)
//! - htdemucs_ft: Fine-tuned for higher quality (default)
//! - htdemucs_6s: 6-stem (+ guitar, piano)

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};
use sf_core::AudioBuffer;

use super::{SeparationModel, SourceMap};
use crate::error::{MlError, MlResult};
use crate::inference::{InferenceConfig, InferenceEngine};

/// Window length: 7.8 s at 44.1 kHz
pub const SEGMENT_SAMPLES: usize = 343_980;

/// HTDemucs sample rate
pub const HTDEMUCS_SAMPLE_RATE: u32 = 44100;

const FOUR_STEMS: &[&str] = &["drums", "bass", "other", "vocals"];
const SIX_STEMS: &[&str] = &["drums", "bass", "other", "vocals", "guitar", "piano"];

/// Known pretrained models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ModelKind {
    #[serde(rename = "htdemucs")]
    Htdemucs,
    #[default]
    #[serde(rename = "htdemucs_ft")]
    HtdemucsFt,
    #[serde(rename = "htdemucs_6s")]
    Htdemucs6s,
}

impl ModelKind {
    pub fn all() -> &'static [ModelKind] {
        &[ModelKind::Htdemucs, ModelKind::HtdemucsFt, ModelKind::Htdemucs6s]
    }

    /// Registry / file name
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Htdemucs => "htdemucs",
            ModelKind::HtdemucsFt => "htdemucs_ft",
            ModelKind::Htdemucs6s => "htdemucs_6s",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.name() == name)
    }

    /// Sources in output order
    pub fn source_names(&self) -> &'static [&'static str] {
        match self {
            ModelKind::Htdemucs | ModelKind::HtdemucsFt => FOUR_STEMS,
            ModelKind::Htdemucs6s => SIX_STEMS,
        }
    }

    pub fn segment_length(&self) -> usize {
        SEGMENT_SAMPLES
    }

    pub fn channels(&self) -> usize {
        2
    }

    pub fn sample_rate(&self) -> u32 {
        HTDEMUCS_SAMPLE_RATE
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| MlError::ModelNotFound {
            name: s.to_string(),
        })
    }
}

/// HTDemucs separator backed by an ONNX graph
pub struct OnnxSeparationModel {
    kind: ModelKind,
    sources: Vec<String>,
    engine: InferenceEngine,
}

impl OnnxSeparationModel {
    /// Load `kind` from an ONNX file
    pub fn load<P: AsRef<Path>>(
        kind: ModelKind,
        model_path: P,
        config: &InferenceConfig,
    ) -> MlResult<Self> {
        let engine = InferenceEngine::new(
            model_path,
            [1, kind.channels(), kind.segment_length()],
            config,
        )?;

        Ok(Self {
            kind,
            sources: kind.source_names().iter().map(|s| s.to_string()).collect(),
            engine,
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }
}

impl SeparationModel for OnnxSeparationModel {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn source_names(&self) -> &[String] {
        &self.sources
    }

    fn segment_length(&self) -> usize {
        self.kind.segment_length()
    }

    fn channels(&self) -> usize {
        self.kind.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.kind.sample_rate()
    }

    fn infer(&self, segment: &AudioBuffer) -> MlResult<SourceMap> {
        let (channels, frames) = (segment.num_channels(), segment.frames());
        if channels != self.channels() {
            return Err(MlError::ChannelMismatch {
                expected: self.channels(),
                got: channels,
            });
        }

        // [batch, channels, samples]
        let flat: Vec<f32> = segment.channels().concat();
        let input = Array3::from_shape_vec((1, channels, frames), flat)
            .map_err(|e| MlError::Internal(format!("input tensor: {}", e)))?;

        let output = self.engine.run_array3(&input)?;

        let expected = [1, self.sources.len(), channels, frames];
        if output.shape() != expected {
            return Err(MlError::InvalidOutputShape {
                expected: format!("{:?}", expected),
                got: format!("{:?}", output.shape()),
            });
        }

        // Single host conversion: [1, sources, channels, samples] -> one buffer per source
        let stems = output.index_axis(Axis(0), 0);
        self.sources
            .iter()
            .zip(stems.outer_iter())
            .map(|(name, stem)| -> MlResult<(String, AudioBuffer)> {
                let planar = stem.outer_iter().map(|row| row.to_vec()).collect();
                Ok((name.clone(), AudioBuffer::new(planar, segment.sample_rate())?))
            })
            .collect()
    }
}
