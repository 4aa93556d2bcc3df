//! Separation orchestration
//!
//! ```text
//!   AudioBuffer ─► resolve model ─► upmix ─► SegmentPlanner
//!                                              │
//!        ┌─────────────── ShiftEnsembler ──────┘
//!        │  per offset: rotate ─► [segment × infer] on WorkerPool
//!        │                        └► one OverlapAccumulator per pass
//!        │              rotate back
//!        └► average passes ─► SeparationResult (+ stats)
//! ```

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use sf_core::AudioBuffer;

use super::accumulate::OverlapAccumulator;
use super::ensemble::{ShiftEnsembler, ShiftSample};
use super::plan::{SegmentPlan, SegmentPlanner};
use super::stems::{SeparationResult, SeparationStats};
use super::SeparationModel;
use crate::config::SeparationConfig;
use crate::error::{MlError, MlResult};
use crate::pool::{SeparationControl, WorkerPool};
use crate::registry::ModelRegistry;

/// Shift pass handed to the ensembler
type PassFn<'a> = dyn Fn(&ShiftSample) -> MlResult<Vec<(String, AudioBuffer)>> + Send + Sync + 'a;

/// Runs a registered model over recordings of any length
pub struct SeparationOrchestrator {
    registry: Arc<ModelRegistry>,
    config: SeparationConfig,
    pool: WorkerPool,
}

impl SeparationOrchestrator {
    pub fn new(registry: Arc<ModelRegistry>, config: SeparationConfig) -> MlResult<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.max_in_flight)?;
        Ok(Self {
            registry,
            config,
            pool,
        })
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SeparationConfig {
        &self.config
    }

    /// Random source for shift offsets: seeded from `config.seed` when set
    pub fn shift_rng(&self) -> ChaCha8Rng {
        match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        }
    }

    /// Separate `buffer` with `model_name`, averaging `shift_count` shifted passes
    ///
    /// Shift offsets are drawn from `shift_rng`.
    pub fn separate(
        &self,
        buffer: &AudioBuffer,
        model_name: &str,
        shift_count: usize,
    ) -> MlResult<SeparationResult> {
        let mut rng = self.shift_rng();
        self.separate_with(
            buffer,
            model_name,
            shift_count,
            &mut rng,
            &SeparationControl::default(),
        )
    }

    /// `separate` with an explicit random source, cancellation and progress
    pub fn separate_with<R: Rng + Send + ?Sized>(
        &self,
        buffer: &AudioBuffer,
        model_name: &str,
        shift_count: usize,
        rng: &mut R,
        control: &SeparationControl,
    ) -> MlResult<SeparationResult> {
        let model = self.registry.get(model_name)?;
        self.check_shift_count(shift_count)?;

        let ensembler = ShiftEnsembler::new(model.segment_length());
        self.run(
            buffer,
            model.as_ref(),
            shift_count.max(1),
            control,
            move |input, pass| ensembler.ensemble(input, shift_count, rng, pass),
        )
    }

    /// Separate with explicit shift offsets (one pass per offset)
    pub fn separate_offsets(
        &self,
        buffer: &AudioBuffer,
        model_name: &str,
        offsets: &[usize],
        control: &SeparationControl,
    ) -> MlResult<SeparationResult> {
        let model = self.registry.get(model_name)?;
        self.check_shift_count(offsets.len())?;

        let ensembler = ShiftEnsembler::new(model.segment_length());
        self.run(
            buffer,
            model.as_ref(),
            offsets.len(),
            control,
            move |input, pass| ensembler.ensemble_offsets(input, offsets, pass),
        )
    }

    fn check_shift_count(&self, shift_count: usize) -> MlResult<()> {
        if shift_count > self.config.max_shifts {
            return Err(MlError::InvalidConfiguration(format!(
                "shift count {} exceeds maximum {}",
                shift_count, self.config.max_shifts
            )));
        }
        Ok(())
    }

    /// Plan, then let `ensemble` drive `passes` shift passes on the pool
    fn run<E>(
        &self,
        buffer: &AudioBuffer,
        model: &dyn SeparationModel,
        passes: usize,
        control: &SeparationControl,
        ensemble: E,
    ) -> MlResult<SeparationResult>
    where
        E: FnOnce(&AudioBuffer, &PassFn<'_>) -> MlResult<Vec<(String, AudioBuffer)>> + Send,
    {
        let start = Instant::now();
        control.cancel.check()?;

        let input = Self::prepare_input(buffer, model)?;
        let plan = SegmentPlanner::plan(input.frames(), model.segment_length(), self.config.overlap)?;

        log::info!(
            "Separating with {} ({:?} quality): {} frames, {} channels, {} segments, {} passes",
            model.name(),
            self.config.quality,
            input.frames(),
            input.num_channels(),
            plan.len(),
            passes
        );

        let units = plan.len() * passes;
        control.progress.start(units);

        let template = OverlapAccumulator::new(
            model.source_names(),
            input.num_channels(),
            &plan,
            self.config.transition_power,
        );

        let pass: &PassFn<'_> = &|sample: &ShiftSample| {
            Self::run_pass(model, &plan, &template, sample, control)
        };
        let sources = self.pool.install(|| ensemble(&*input, pass));

        let sources = match sources {
            Err(MlError::Cancelled) => {
                log::info!("Separation with {} cancelled", model.name());
                return Err(MlError::Cancelled);
            }
            other => other?,
        };

        let elapsed = start.elapsed();
        let duration = input.duration_secs();
        let stats = SeparationStats {
            segments_processed: units,
            passes,
            elapsed_ms: elapsed.as_millis() as u64,
            rtf: if duration > 0.0 {
                (elapsed.as_secs_f64() / duration) as f32
            } else {
                0.0
            },
        };

        log::info!(
            "Separation with {} done in {} ms (RTF {:.3})",
            model.name(),
            stats.elapsed_ms,
            stats.rtf
        );

        Ok(SeparationResult::new(model.name(), sources)?.with_stats(stats))
    }

    /// Match the model's channel layout; only mono is upmixed
    fn prepare_input<'a>(
        buffer: &'a AudioBuffer,
        model: &dyn SeparationModel,
    ) -> MlResult<Cow<'a, AudioBuffer>> {
        let expected = model.channels();

        let input = match buffer.num_channels() {
            n if n == expected => Cow::Borrowed(buffer),
            1 => Cow::Owned(buffer.upmix(expected)?),
            got => return Err(MlError::ChannelMismatch { expected, got }),
        };

        if buffer.sample_rate() != model.sample_rate() {
            log::warn!(
                "Input is {}Hz but {} expects {}Hz; separating without resampling",
                buffer.sample_rate(),
                model.name(),
                model.sample_rate()
            );
        }

        Ok(input)
    }

    /// One ensemble pass: every segment through the model, blended
    ///
    /// Segments are inferred in parallel; all of them add into the pass's
    /// single accumulator.
    fn run_pass(
        model: &dyn SeparationModel,
        plan: &SegmentPlan,
        template: &OverlapAccumulator,
        sample: &ShiftSample,
        control: &SeparationControl,
    ) -> MlResult<Vec<(String, AudioBuffer)>> {
        let accumulator = Mutex::new(template.empty_like());

        plan.segments
            .par_iter()
            .enumerate()
            .try_for_each(|(index, segment)| -> MlResult<()> {
                control.cancel.check()?;

                let window = sample.buffer.slice_padded(segment.start, segment.length)?;
                let outputs = model.infer(&window).map_err(|e| match e {
                    MlError::Cancelled => e,
                    other => MlError::inference(model.name(), index, other),
                })?;

                accumulator.lock().add(index, segment, &outputs)?;
                control.progress.advance();
                Ok(())
            })?;

        accumulator.into_inner().finish(sample.buffer.sample_rate())
    }
}
