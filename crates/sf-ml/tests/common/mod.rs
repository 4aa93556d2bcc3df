//! Synthetic separation models for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sf_core::AudioBuffer;
use sf_ml::separation::{SeparationModel, SourceMap};
use sf_ml::{CancellationToken, MlError, MlResult, ModelRegistry};

pub const FOUR_STEMS: [&str; 4] = ["drums", "bass", "other", "vocals"];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Registry that only knows the given models
pub fn registry_with(models: Vec<Arc<dyn SeparationModel>>) -> Arc<ModelRegistry> {
    let registry = ModelRegistry::new(|name: &str| -> MlResult<Arc<dyn SeparationModel>> {
        Err(MlError::ModelNotFound { name: name.into() })
    });
    for model in models {
        registry.insert(model).unwrap();
    }
    Arc::new(registry)
}

/// Deterministic stereo test signal
pub fn test_signal(channels: usize, frames: usize) -> AudioBuffer {
    let data = (0..channels)
        .map(|ch| {
            (0..frames)
                .map(|i| {
                    let t = i as f32;
                    0.5 * (t * 0.031 * (ch + 1) as f32).sin() + 0.25 * (t * 0.0071).cos()
                })
                .collect()
        })
        .collect();
    AudioBuffer::new(data, 44100).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE MODELS
// ═══════════════════════════════════════════════════════════════════════════════

/// Splits the mix into sources by fixed gains (additive when gains sum to 1)
pub struct GainSplitModel {
    name: String,
    sources: Vec<String>,
    gains: Vec<f32>,
    segment_length: usize,
    channels: usize,
}

impl GainSplitModel {
    pub fn new(name: &str, sources: &[&str], gains: &[f32], segment_length: usize) -> Self {
        assert_eq!(sources.len(), gains.len());
        Self {
            name: name.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            gains: gains.to_vec(),
            segment_length,
            channels: 2,
        }
    }

    /// drums/bass/other/vocals with gains 0.1/0.2/0.3/0.4
    pub fn four_stem(name: &str, segment_length: usize) -> Self {
        Self::new(name, &FOUR_STEMS, &[0.1, 0.2, 0.3, 0.4], segment_length)
    }
}

impl SeparationModel for GainSplitModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_names(&self) -> &[String] {
        &self.sources
    }

    fn segment_length(&self) -> usize {
        self.segment_length
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn infer(&self, segment: &AudioBuffer) -> MlResult<SourceMap> {
        assert_eq!(segment.frames(), self.segment_length);
        Ok(self
            .sources
            .iter()
            .zip(&self.gains)
            .map(|(name, &gain)| (name.clone(), segment.scale(gain)))
            .collect())
    }
}

/// Output depends on position inside the window, so shifts and blending matter
pub struct WindowedModel {
    sources: Vec<String>,
    segment_length: usize,
}

impl WindowedModel {
    pub fn new(segment_length: usize) -> Self {
        Self {
            sources: vec!["tilt".to_string(), "square".to_string()],
            segment_length,
        }
    }
}

impl SeparationModel for WindowedModel {
    fn name(&self) -> &str {
        "windowed"
    }

    fn source_names(&self) -> &[String] {
        &self.sources
    }

    fn segment_length(&self) -> usize {
        self.segment_length
    }

    fn infer(&self, segment: &AudioBuffer) -> MlResult<SourceMap> {
        let n = segment.frames() as f32;
        let tilt: Vec<Vec<f32>> = segment
            .channels()
            .iter()
            .map(|ch| {
                ch.iter()
                    .enumerate()
                    .map(|(i, s)| s * (1.0 + i as f32 / n))
                    .collect()
            })
            .collect();
        let square: Vec<Vec<f32>> = segment
            .channels()
            .iter()
            .map(|ch| ch.iter().map(|s| s * s).collect())
            .collect();

        Ok(SourceMap::from([
            (
                "tilt".to_string(),
                AudioBuffer::new(tilt, segment.sample_rate())?,
            ),
            (
                "square".to_string(),
                AudioBuffer::new(square, segment.sample_rate())?,
            ),
        ]))
    }
}

/// Fails on any window whose first sample is at or above `trigger`
pub struct FailingModel {
    inner: GainSplitModel,
    trigger: f32,
}

impl FailingModel {
    pub fn new(name: &str, segment_length: usize, trigger: f32) -> Self {
        Self {
            inner: GainSplitModel::four_stem(name, segment_length),
            trigger,
        }
    }
}

impl SeparationModel for FailingModel {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn source_names(&self) -> &[String] {
        self.inner.source_names()
    }

    fn segment_length(&self) -> usize {
        self.inner.segment_length()
    }

    fn infer(&self, segment: &AudioBuffer) -> MlResult<SourceMap> {
        let first = segment.channel(0).map_or(0.0, |ch| ch[0]);
        if first >= self.trigger {
            return Err(MlError::Tract("synthetic failure".into()));
        }
        self.inner.infer(segment)
    }
}

/// Counts calls and peak concurrency; optionally cancels after `cancel_after` calls
pub struct InstrumentedModel {
    inner: GainSplitModel,
    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    delay: Duration,
    cancel: Option<(CancellationToken, usize)>,
}

impl InstrumentedModel {
    pub fn new(name: &str, segment_length: usize, delay: Duration) -> Self {
        Self {
            inner: GainSplitModel::four_stem(name, segment_length),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay,
            cancel: None,
        }
    }

    pub fn cancelling(mut self, token: CancellationToken, after: usize) -> Self {
        self.cancel = Some((token, after));
        self
    }
}

impl SeparationModel for InstrumentedModel {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn source_names(&self) -> &[String] {
        self.inner.source_names()
    }

    fn segment_length(&self) -> usize {
        self.inner.segment_length()
    }

    fn infer(&self, segment: &AudioBuffer) -> MlResult<SourceMap> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);

        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((token, after)) = &self.cancel {
            if calls >= *after {
                token.cancel();
            }
        }

        let out = self.inner.infer(segment);
        self.active.fetch_sub(1, Ordering::SeqCst);
        out
    }
}
