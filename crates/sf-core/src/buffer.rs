//! Planar multichannel audio buffer
//!
//! `AudioBuffer` is the value passed between every stage of the separation
//! pipeline. It is validated on construction and never mutated afterwards;
//! every transformation returns a new buffer.

use crate::error::{CoreError, CoreResult};

/// Immutable planar audio buffer (one `Vec<f32>` per channel)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create buffer from planar channel data
    ///
    /// Fails if there are no channels, the channels are empty or of unequal
    /// length, or the sample rate is zero.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> CoreResult<Self> {
        if sample_rate == 0 {
            return Err(CoreError::InvalidSampleRate(sample_rate));
        }

        let frames = match channels.first() {
            Some(first) => first.len(),
            None => return Err(CoreError::InvalidBuffer("no channels".into())),
        };

        if frames == 0 {
            return Err(CoreError::InvalidBuffer("zero-length channels".into()));
        }

        if let Some(bad) = channels.iter().find(|c| c.len() != frames) {
            return Err(CoreError::LengthMismatch {
                expected: frames,
                got: bad.len(),
            });
        }

        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Create buffer from interleaved samples
    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: u32) -> CoreResult<Self> {
        if channels == 0 {
            return Err(CoreError::InvalidBuffer("no channels".into()));
        }
        if samples.len() % channels != 0 {
            return Err(CoreError::InvalidBuffer(format!(
                "{} interleaved samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }

        let frames = samples.len() / channels;
        let mut planar = vec![Vec::with_capacity(frames); channels];
        for frame in samples.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                planar[ch].push(sample);
            }
        }

        Self::new(planar, sample_rate)
    }

    /// Create a silent buffer
    pub fn silence(channels: usize, frames: usize, sample_rate: u32) -> CoreResult<Self> {
        Self::new(vec![vec![0.0; frames]; channels], sample_rate)
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Single channel
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// All channels
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Take ownership of the planar data
    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Interleave channels (frame-major)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let channels = self.num_channels();
        let mut out = Vec::with_capacity(self.frames() * channels);
        for i in 0..self.frames() {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }

    /// Copy `length` frames starting at `start`
    ///
    /// Positions past the end of the buffer are zero.
    pub fn slice_padded(&self, start: usize, length: usize) -> CoreResult<Self> {
        let channels = self
            .channels
            .iter()
            .map(|ch| {
                let mut out = vec![0.0f32; length];
                if start < ch.len() {
                    let end = (start + length).min(ch.len());
                    out[..end - start].copy_from_slice(&ch[start..end]);
                }
                out
            })
            .collect();

        Self::new(channels, self.sample_rate)
    }

    /// Circularly shift along time: sample `t` moves to `(t + offset) mod frames`
    ///
    /// `rotate(k)` followed by `rotate(-k)` is the identity.
    pub fn rotate(&self, offset: isize) -> Self {
        let frames = self.frames();
        let k = offset.rem_euclid(frames as isize) as usize;
        let channels = self
            .channels
            .iter()
            .map(|ch| {
                let mut out = ch.clone();
                out.rotate_right(k);
                out
            })
            .collect();

        Self {
            channels,
            sample_rate: self.sample_rate,
        }
    }

    /// Duplicate a mono buffer to `target` channels
    ///
    /// A buffer that already has `target` channels is returned unchanged. Only
    /// mono input can be upmixed.
    pub fn upmix(&self, target: usize) -> CoreResult<Self> {
        if self.num_channels() == target {
            return Ok(self.clone());
        }
        if self.num_channels() != 1 || target == 0 {
            return Err(CoreError::ChannelMismatch {
                expected: target,
                got: self.num_channels(),
            });
        }

        log::debug!("Upmixing mono buffer to {} channels", target);
        Ok(Self {
            channels: vec![self.channels[0].clone(); target],
            sample_rate: self.sample_rate,
        })
    }

    /// Elementwise sum of two buffers with identical shape and rate
    pub fn add(&self, other: &AudioBuffer) -> CoreResult<Self> {
        self.check_compatible(other)?;
        let channels = self
            .channels
            .iter()
            .zip(&other.channels)
            .map(|(a, b)| a.iter().zip(b).map(|(x, y)| x + y).collect())
            .collect();

        Ok(Self {
            channels,
            sample_rate: self.sample_rate,
        })
    }

    /// Elementwise sum of any number of buffers
    pub fn sum<'a, I>(buffers: I) -> CoreResult<Option<Self>>
    where
        I: IntoIterator<Item = &'a AudioBuffer>,
    {
        let mut acc: Option<AudioBuffer> = None;
        for buffer in buffers {
            acc = Some(match acc {
                Some(total) => total.add(buffer)?,
                None => buffer.clone(),
            });
        }
        Ok(acc)
    }

    /// Silent buffer of the same shape and rate
    pub fn zeroed(&self) -> Self {
        Self {
            channels: vec![vec![0.0; self.frames()]; self.num_channels()],
            sample_rate: self.sample_rate,
        }
    }

    /// Multiply every sample by `gain`
    pub fn scale(&self, gain: f32) -> Self {
        Self {
            channels: self
                .channels
                .iter()
                .map(|ch| ch.iter().map(|s| s * gain).collect())
                .collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Peak absolute sample value
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flatten()
            .map(|s| s.abs())
            .fold(0.0f32, f32::max)
    }

    /// RMS over all channels
    pub fn rms(&self) -> f32 {
        let count = self.frames() * self.num_channels();
        let sum_sq: f32 = self.channels.iter().flatten().map(|s| s * s).sum();
        (sum_sq / count as f32).sqrt()
    }

    /// Largest absolute sample difference to another buffer of the same shape
    pub fn max_abs_diff(&self, other: &AudioBuffer) -> CoreResult<f32> {
        self.check_compatible(other)?;
        Ok(self
            .channels
            .iter()
            .flatten()
            .zip(other.channels.iter().flatten())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max))
    }

    fn check_compatible(&self, other: &AudioBuffer) -> CoreResult<()> {
        if self.num_channels() != other.num_channels() {
            return Err(CoreError::ChannelMismatch {
                expected: self.num_channels(),
                got: other.num_channels(),
            });
        }
        if self.frames() != other.frames() {
            return Err(CoreError::LengthMismatch {
                expected: self.frames(),
                got: other.frames(),
            });
        }
        if self.sample_rate != other.sample_rate {
            return Err(CoreError::SampleRateMismatch {
                expected: self.sample_rate,
                got: other.sample_rate,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stereo(left: Vec<f32>, right: Vec<f32>) -> AudioBuffer {
        AudioBuffer::new(vec![left, right], 44100).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid() {
        assert!(AudioBuffer::new(vec![], 44100).is_err());
        assert!(AudioBuffer::new(vec![vec![]], 44100).is_err());
        assert!(AudioBuffer::new(vec![vec![0.0; 4]], 0).is_err());
        assert_eq!(
            AudioBuffer::new(vec![vec![0.0; 4], vec![0.0; 3]], 44100),
            Err(CoreError::LengthMismatch { expected: 4, got: 3 })
        );
    }

    #[test]
    fn test_interleave_roundtrip() {
        let buffer = AudioBuffer::from_interleaved(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 2, 48000).unwrap();
        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.channel(0).unwrap(), &[0.1, 0.3, 0.5]);
        assert_eq!(buffer.channel(1).unwrap(), &[0.2, 0.4, 0.6]);
        assert_eq!(buffer.to_interleaved(), vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
    }

    #[test]
    fn test_from_interleaved_uneven() {
        assert!(AudioBuffer::from_interleaved(&[0.0; 5], 2, 44100).is_err());
    }

    #[test]
    fn test_slice_padded_tail() {
        let buffer = stereo(vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]);
        let slice = buffer.slice_padded(2, 4).unwrap();
        assert_eq!(slice.frames(), 4);
        assert_eq!(slice.channel(0).unwrap(), &[3.0, 0.0, 0.0, 0.0]);
        assert_eq!(slice.channel(1).unwrap(), &[6.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rotate_and_back() {
        let buffer = stereo(vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]);
        let rotated = buffer.rotate(1);
        assert_eq!(rotated.channel(0).unwrap(), &[4.0, 1.0, 2.0, 3.0]);
        assert_eq!(rotated.rotate(-1), buffer);
        // Offsets larger than the buffer wrap
        assert_eq!(buffer.rotate(5), rotated);
    }

    #[test]
    fn test_upmix_mono() {
        let mono = AudioBuffer::new(vec![vec![0.5, -0.5]], 44100).unwrap();
        let up = mono.upmix(2).unwrap();
        assert_eq!(up.num_channels(), 2);
        assert_eq!(up.channel(0), up.channel(1));

        let quad = stereo(vec![0.0; 2], vec![0.0; 2]);
        assert!(quad.upmix(4).is_err());
    }

    #[test]
    fn test_sum_and_zeroed() {
        let a = stereo(vec![1.0, 2.0], vec![3.0, 4.0]);
        let b = stereo(vec![0.5, 0.5], vec![0.5, 0.5]);
        let total = AudioBuffer::sum([&a, &b]).unwrap().unwrap();
        assert_eq!(total.channel(0).unwrap(), &[1.5, 2.5]);
        assert_eq!(total.channel(1).unwrap(), &[3.5, 4.5]);

        let silent = a.zeroed();
        assert_eq!(silent.peak(), 0.0);
        assert_eq!(a.add(&silent).unwrap(), a);

        let none: [&AudioBuffer; 0] = [];
        assert!(AudioBuffer::sum(none).unwrap().is_none());
    }

    #[test]
    fn test_add_rejects_mismatch() {
        let a = stereo(vec![1.0, 2.0], vec![3.0, 4.0]);
        let b = AudioBuffer::new(vec![vec![1.0, 2.0]], 44100).unwrap();
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn test_levels() {
        let buffer = stereo(vec![0.5, -0.8], vec![0.3, -0.2]);
        assert_relative_eq!(buffer.peak(), 0.8);
        assert!(buffer.rms() > 0.0);
        assert_relative_eq!(buffer.scale(2.0).peak(), 1.6);
    }
}
