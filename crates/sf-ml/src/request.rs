//! Separation requests and file-to-file jobs

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sf_file::{AudioDecoder, AudioEncoder, WavConfig, WavEncoder};

use crate::config::MAX_SHIFTS;
use crate::error::{MlError, MlResult};
use crate::pool::SeparationControl;
use crate::separation::{ModelKind, SeparationOrchestrator, StemRequest, StemSelector};

/// Stem choices accepted from callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StemChoice {
    #[default]
    Vocals,
    Drums,
    Bass,
    Other,
    All,
}

impl StemChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            StemChoice::Vocals => "vocals",
            StemChoice::Drums => "drums",
            StemChoice::Bass => "bass",
            StemChoice::Other => "other",
            StemChoice::All => "all",
        }
    }
}

impl fmt::Display for StemChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StemChoice> for StemRequest {
    fn from(choice: StemChoice) -> Self {
        match choice {
            StemChoice::All => StemRequest::All,
            other => StemRequest::Stem(other.as_str().to_string()),
        }
    }
}

/// One separation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparationRequest {
    /// Input audio file
    pub audio: PathBuf,
    #[serde(default)]
    pub model: ModelKind,
    #[serde(default)]
    pub stem: StemChoice,
    /// Shift passes, 0..=10; unset uses the orchestrator's configured count
    #[serde(default)]
    pub shifts: Option<u8>,
}

impl SeparationRequest {
    pub fn new(audio: impl Into<PathBuf>) -> Self {
        Self {
            audio: audio.into(),
            model: ModelKind::default(),
            stem: StemChoice::default(),
            shifts: None,
        }
    }

    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.model = model;
        self
    }

    pub fn with_stem(mut self, stem: StemChoice) -> Self {
        self.stem = stem;
        self
    }

    pub fn with_shifts(mut self, shifts: u8) -> Self {
        self.shifts = Some(shifts);
        self
    }

    pub fn validate(&self) -> MlResult<()> {
        if let Some(shifts) = self.shifts {
            if shifts as usize > MAX_SHIFTS {
                return Err(MlError::InvalidConfiguration(format!(
                    "shifts must be in [0, {}], got {}",
                    MAX_SHIFTS, shifts
                )));
            }
        }
        Ok(())
    }

    /// Requested shift count, or `default` when unset
    pub fn shift_count(&self, default: usize) -> usize {
        self.shifts.map_or(default, usize::from)
    }
}

/// Decode, separate, select and write each output as WAV
pub struct SeparationJob {
    wav: WavConfig,
    control: SeparationControl,
}

impl Default for SeparationJob {
    fn default() -> Self {
        Self::new()
    }
}

impl SeparationJob {
    pub fn new() -> Self {
        Self {
            wav: WavConfig::default(),
            control: SeparationControl::default(),
        }
    }

    pub fn with_wav_config(mut self, wav: WavConfig) -> Self {
        self.wav = wav;
        self
    }

    pub fn with_control(mut self, control: SeparationControl) -> Self {
        self.control = control;
        self
    }

    /// Run `request`, writing `<output_dir>/<name>.wav` per selected output
    ///
    /// If any output fails to write, the files already written by this run
    /// are removed before the error is returned.
    pub fn run(
        &self,
        orchestrator: &SeparationOrchestrator,
        request: &SeparationRequest,
        output_dir: &Path,
    ) -> MlResult<HashMap<String, PathBuf>> {
        request.validate()?;

        let shifts = request.shift_count(orchestrator.config().shifts);
        let audio = AudioDecoder::decode(&request.audio)?;
        log::info!(
            "Job {}: {:.1}s, model {}, stem {}, shifts {}",
            request.audio.display(),
            audio.duration_secs(),
            request.model,
            request.stem,
            shifts
        );

        let mut rng = orchestrator.shift_rng();
        let result = orchestrator.separate_with(
            &audio,
            request.model.name(),
            shifts,
            &mut rng,
            &self.control,
        )?;

        let selection = StemSelector::select(&result, &StemRequest::from(request.stem))?;

        let encoder = WavEncoder::new(self.wav);
        let mut written = HashMap::with_capacity(selection.len());
        for (name, buffer) in &selection {
            let path = output_dir.join(format!("{}.{}", name, encoder.extension()));
            if let Err(e) = encoder.write(buffer, &path) {
                log::error!("Failed to write {}: {}", path.display(), e);
                Self::remove_written(&written);
                return Err(e.into());
            }
            log::info!("Saved {}", path.display());
            written.insert(name.clone(), path);
        }

        Ok(written)
    }

    fn remove_written(written: &HashMap<String, PathBuf>) {
        for path in written.values() {
            if let Err(e) = std::fs::remove_file(path) {
                log::warn!("Could not remove partial output {}: {}", path.display(), e);
            }
        }
    }
}
