//! Weighted overlap-add of segment outputs

use std::sync::Arc;

use sf_core::AudioBuffer;

use super::SourceMap;
use super::plan::{Segment, SegmentPlan};
use crate::error::{MlError, MlResult};

/// Triangular blend window, strictly positive, peak 1.0
///
/// `w[i] = (min(i + 1, len - i) / max) ^ power`
pub fn transition_window(segment_length: usize, power: f32) -> Vec<f32> {
    let ramp: Vec<f32> = (0..segment_length)
        .map(|i| (i + 1).min(segment_length - i) as f32)
        .collect();
    let peak = ramp.iter().copied().fold(0.0f32, f32::max).max(1.0);
    ramp.into_iter().map(|r| (r / peak).powf(power)).collect()
}

/// Running weighted sums for one ensemble pass
///
/// Segments may be added in any order. Accumulators built for the same plan
/// can also be filled independently and combined with `merge`.
#[derive(Debug, Clone)]
pub struct OverlapAccumulator {
    source_names: Arc<[String]>,
    window: Arc<[f32]>,
    channels: usize,
    total_length: usize,
    /// [source][channel][sample]
    sums: Vec<Vec<Vec<f32>>>,
    weights: Vec<f32>,
    segments_added: usize,
}

impl OverlapAccumulator {
    pub fn new(
        source_names: &[String],
        channels: usize,
        plan: &SegmentPlan,
        transition_power: f32,
    ) -> Self {
        let window = transition_window(plan.segment_length, transition_power);
        Self {
            source_names: source_names.into(),
            window: window.into(),
            channels,
            total_length: plan.total_length,
            sums: vec![vec![vec![0.0; plan.total_length]; channels]; source_names.len()],
            weights: vec![0.0; plan.total_length],
            segments_added: 0,
        }
    }

    /// Fresh accumulator with the same layout and window
    pub fn empty_like(&self) -> Self {
        Self {
            source_names: Arc::clone(&self.source_names),
            window: Arc::clone(&self.window),
            channels: self.channels,
            total_length: self.total_length,
            sums: vec![vec![vec![0.0; self.total_length]; self.channels]; self.source_names.len()],
            weights: vec![0.0; self.total_length],
            segments_added: 0,
        }
    }

    pub fn segments_added(&self) -> usize {
        self.segments_added
    }

    /// Accumulators alive on this layout, including `self`
    #[cfg(test)]
    pub(crate) fn live_layouts(&self) -> usize {
        Arc::strong_count(&self.window)
    }

    /// Add the model output for one window
    pub fn add(&mut self, index: usize, segment: &Segment, outputs: &SourceMap) -> MlResult<()> {
        let segment_length = self.window.len();

        for name in self.source_names.iter() {
            let buffer = outputs.get(name).ok_or_else(|| MlError::InvalidOutputShape {
                expected: format!("source '{}' in segment {}", name, index),
                got: format!("sources {:?}", outputs.keys().collect::<Vec<_>>()),
            })?;
            if buffer.num_channels() != self.channels || buffer.frames() != segment_length {
                return Err(MlError::InvalidOutputShape {
                    expected: format!("[{}, {}] for '{}'", self.channels, segment_length, name),
                    got: format!("[{}, {}]", buffer.num_channels(), buffer.frames()),
                });
            }
        }

        let start = segment.start;
        let valid = segment.valid_length(self.total_length);
        let window = &self.window[..valid];

        for (sums, name) in self.sums.iter_mut().zip(self.source_names.iter()) {
            // presence checked above
            let Some(buffer) = outputs.get(name) else {
                continue;
            };
            for (acc, samples) in sums.iter_mut().zip(buffer.channels()) {
                for ((a, &s), &w) in acc[start..start + valid]
                    .iter_mut()
                    .zip(&samples[..valid])
                    .zip(window)
                {
                    *a += s * w;
                }
            }
        }

        for (acc, &w) in self.weights[start..start + valid].iter_mut().zip(window) {
            *acc += w;
        }

        self.segments_added += 1;
        Ok(())
    }

    /// Combine with an accumulator built for the same plan
    pub fn merge(mut self, other: Self) -> MlResult<Self> {
        if self.total_length != other.total_length
            || self.channels != other.channels
            || self.source_names != other.source_names
        {
            return Err(MlError::Internal(
                "cannot merge accumulators with different layouts".into(),
            ));
        }

        for (mine, theirs) in self.sums.iter_mut().zip(&other.sums) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
            }
        }
        for (x, y) in self.weights.iter_mut().zip(&other.weights) {
            *x += y;
        }
        self.segments_added += other.segments_added;

        Ok(self)
    }

    /// Divide the weighted sums by the accumulated weight
    ///
    /// Returns one buffer per source, in source order.
    pub fn finish(self, sample_rate: u32) -> MlResult<Vec<(String, AudioBuffer)>> {
        if let Some(pos) = self.weights.iter().position(|&w| w <= 0.0) {
            return Err(MlError::Internal(format!(
                "no segment covers sample {} of {}",
                pos, self.total_length
            )));
        }

        let weights = self.weights;
        self.source_names
            .iter()
            .cloned()
            .zip(self.sums)
            .map(|(name, channels)| -> MlResult<(String, AudioBuffer)> {
                let channels = channels
                    .into_iter()
                    .map(|ch| ch.into_iter().zip(&weights).map(|(s, w)| s / w).collect())
                    .collect();
                Ok((name, AudioBuffer::new(channels, sample_rate)?))
            })
            .collect()
    }
}
