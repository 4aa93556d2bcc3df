//! Shift ensembling (test-time augmentation)
//!
//! Each pass circularly rotates the input by a random offset, separates it,
//! rotates every source back and contributes with equal weight to the
//! average. Passes are independent and run in parallel on the current rayon
//! pool.

use rand::Rng;
use rayon::prelude::*;
use sf_core::AudioBuffer;

use crate::error::{MlError, MlResult};

/// Input of one ensemble pass
#[derive(Debug, Clone)]
pub struct ShiftSample {
    /// Circular shift applied to the input, in samples
    pub offset: usize,
    /// Rotated input
    pub buffer: AudioBuffer,
}

/// Averages separation passes over randomly shifted copies of the input
#[derive(Debug, Clone, Copy)]
pub struct ShiftEnsembler {
    max_shift: usize,
}

impl ShiftEnsembler {
    /// Offsets are drawn from `[0, max_shift)`
    pub fn new(max_shift: usize) -> Self {
        Self {
            max_shift: max_shift.max(1),
        }
    }

    pub fn max_shift(&self) -> usize {
        self.max_shift
    }

    /// Offsets used for `shift_count` passes; zero passes means one unshifted pass
    pub fn offsets<R: Rng + ?Sized>(&self, shift_count: usize, rng: &mut R) -> Vec<usize> {
        if shift_count == 0 {
            return vec![0];
        }
        (0..shift_count)
            .map(|_| rng.random_range(0..self.max_shift))
            .collect()
    }

    /// Run `shift_count` randomly shifted passes and average them
    pub fn ensemble<R, F>(
        &self,
        buffer: &AudioBuffer,
        shift_count: usize,
        rng: &mut R,
        pass: F,
    ) -> MlResult<Vec<(String, AudioBuffer)>>
    where
        R: Rng + ?Sized,
        F: Fn(&ShiftSample) -> MlResult<Vec<(String, AudioBuffer)>> + Send + Sync,
    {
        let offsets = self.offsets(shift_count, rng);
        self.ensemble_offsets(buffer, &offsets, pass)
    }

    /// Run one pass per explicit offset and average them
    pub fn ensemble_offsets<F>(
        &self,
        buffer: &AudioBuffer,
        offsets: &[usize],
        pass: F,
    ) -> MlResult<Vec<(String, AudioBuffer)>>
    where
        F: Fn(&ShiftSample) -> MlResult<Vec<(String, AudioBuffer)>> + Send + Sync,
    {
        if offsets.is_empty() {
            return Err(MlError::InvalidConfiguration(
                "at least one shift offset is required".into(),
            ));
        }

        let total = offsets
            .par_iter()
            .map(|&offset| Self::run_pass(buffer, offset, &pass).map(Some))
            .try_reduce(
                || None,
                |a, b| match (a, b) {
                    (Some(a), Some(b)) => sum_sources(a, b).map(Some),
                    (a, None) => Ok(a),
                    (None, b) => Ok(b),
                },
            )?
            .ok_or_else(|| MlError::Internal("shift ensemble produced no passes".into()))?;

        if offsets.len() == 1 {
            return Ok(total);
        }

        let gain = 1.0 / offsets.len() as f32;
        Ok(total
            .into_iter()
            .map(|(name, buffer)| (name, buffer.scale(gain)))
            .collect())
    }

    fn run_pass<F>(
        buffer: &AudioBuffer,
        offset: usize,
        pass: &F,
    ) -> MlResult<Vec<(String, AudioBuffer)>>
    where
        F: Fn(&ShiftSample) -> MlResult<Vec<(String, AudioBuffer)>>,
    {
        let sample = ShiftSample {
            offset,
            buffer: buffer.rotate(offset as isize),
        };
        let sources = pass(&sample)?;
        log::debug!("Shift pass at offset {} complete", offset);

        Ok(sources
            .into_iter()
            .map(|(name, source)| (name, source.rotate(-(offset as isize))))
            .collect())
    }
}

fn sum_sources(
    a: Vec<(String, AudioBuffer)>,
    b: Vec<(String, AudioBuffer)>,
) -> MlResult<Vec<(String, AudioBuffer)>> {
    if a.len() != b.len() {
        return Err(MlError::Internal(format!(
            "shift passes disagree on source count: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    a.into_iter()
        .zip(b)
        .map(|((name_a, buf_a), (name_b, buf_b))| {
            if name_a != name_b {
                return Err(MlError::Internal(format!(
                    "shift passes disagree on source order: '{}' vs '{}'",
                    name_a, name_b
                )));
            }
            Ok((name_a, buf_a.add(&buf_b)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ramp(frames: usize) -> AudioBuffer {
        let data: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
        AudioBuffer::new(vec![data.clone(), data], 44100).unwrap()
    }

    // Time-invariant pass: halves the signal into two sources
    fn halve(sample: &ShiftSample) -> MlResult<Vec<(String, AudioBuffer)>> {
        let half = sample.buffer.scale(0.5);
        Ok(vec![("a".into(), half.clone()), ("b".into(), half)])
    }

    #[test]
    fn test_zero_shifts_is_single_unshifted_pass() {
        let ensembler = ShiftEnsembler::new(16);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(ensembler.offsets(0, &mut rng), vec![0]);

        let input = ramp(32);
        let degenerate = ensembler.ensemble(&input, 0, &mut rng, halve).unwrap();
        let explicit = ensembler.ensemble_offsets(&input, &[0], halve).unwrap();

        for ((na, a), (nb, b)) in degenerate.iter().zip(&explicit) {
            assert_eq!(na, nb);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_offsets_in_range_and_seeded() {
        let ensembler = ShiftEnsembler::new(10);
        let a = ensembler.offsets(8, &mut ChaCha8Rng::seed_from_u64(42));
        let b = ensembler.offsets(8, &mut ChaCha8Rng::seed_from_u64(42));

        assert_eq!(a.len(), 8);
        assert!(a.iter().all(|&o| o < 10));
        assert_eq!(a, b);
    }

    #[test]
    fn test_shift_invariant_pass_is_unchanged() {
        let ensembler = ShiftEnsembler::new(16);
        let input = ramp(32);
        let out = ensembler.ensemble_offsets(&input, &[3, 7, 11], halve).unwrap();

        let expected = input.scale(0.5);
        for (_, buffer) in &out {
            assert!(buffer.max_abs_diff(&expected).unwrap() < 1e-6);
        }
    }

    #[test]
    fn test_pass_sees_rotated_input() {
        let ensembler = ShiftEnsembler::new(16);
        let input = ramp(8);
        let check_rotation = |sample: &ShiftSample| {
            let expected = input.rotate(sample.offset as isize);
            assert_eq!(sample.buffer, expected);
            Ok(vec![("x".to_string(), sample.buffer.clone())])
        };

        let out = ensembler.ensemble_offsets(&input, &[5], check_rotation).unwrap();
        assert_eq!(out[0].1, input);
    }

    #[test]
    fn test_pass_error_propagates() {
        let ensembler = ShiftEnsembler::new(4);
        let result = ensembler.ensemble_offsets(&ramp(8), &[0, 1], |_| {
            Err(MlError::inference("broken", 2, "boom"))
        });
        assert!(matches!(
            result,
            Err(MlError::InferenceFailure { segment: 2, .. })
        ));
    }

    #[test]
    fn test_empty_offsets_rejected() {
        let ensembler = ShiftEnsembler::new(4);
        assert!(ensembler.ensemble_offsets(&ramp(8), &[], halve).is_err());
    }
}
