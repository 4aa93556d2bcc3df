//! Separation results and stem selection

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sf_core::AudioBuffer;

use crate::error::{MlError, MlResult};

/// Source name that triggers the derived `no_vocals` output
pub const VOCALS: &str = "vocals";

/// Name of the derived accompaniment output
pub const NO_VOCALS: &str = "no_vocals";

/// Output of a selection: output name -> audio
pub type StemSelection = HashMap<String, AudioBuffer>;

/// Processing statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeparationStats {
    /// Model invocations across all passes
    pub segments_processed: usize,
    /// Shift passes averaged
    pub passes: usize,
    /// Wall-clock time
    pub elapsed_ms: u64,
    /// Real-time factor (processing time / audio duration)
    pub rtf: f32,
}

/// Every source produced by a model for one recording
#[derive(Debug, Clone)]
pub struct SeparationResult {
    model: String,
    sources: Vec<(String, AudioBuffer)>,
    stats: SeparationStats,
}

impl SeparationResult {
    /// Build a result; all sources must share frame count and sample rate
    pub fn new(model: impl Into<String>, sources: Vec<(String, AudioBuffer)>) -> MlResult<Self> {
        let Some((_, first)) = sources.first() else {
            return Err(MlError::Internal("separation produced no sources".into()));
        };
        let (frames, sample_rate) = (first.frames(), first.sample_rate());

        if let Some((name, bad)) = sources
            .iter()
            .find(|(_, b)| b.frames() != frames || b.sample_rate() != sample_rate)
        {
            return Err(MlError::Internal(format!(
                "source '{}' has {} frames at {}Hz, expected {} at {}Hz",
                name,
                bad.frames(),
                bad.sample_rate(),
                frames,
                sample_rate
            )));
        }

        Ok(Self {
            model: model.into(),
            sources,
            stats: SeparationStats::default(),
        })
    }

    pub fn with_stats(mut self, stats: SeparationStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn stats(&self) -> &SeparationStats {
        &self.stats
    }

    /// Sources in model order
    pub fn sources(&self) -> &[(String, AudioBuffer)] {
        &self.sources
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&AudioBuffer> {
        self.sources.iter().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    pub fn frames(&self) -> usize {
        self.sources.first().map_or(0, |(_, b)| b.frames())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sources.first().map_or(0, |(_, b)| b.sample_rate())
    }

    pub fn into_sources(self) -> Vec<(String, AudioBuffer)> {
        self.sources
    }

    /// Weighted sum of sources; sources without a gain are left out
    pub fn remix(&self, gains: &[(&str, f32)]) -> MlResult<AudioBuffer> {
        let mut mix = self.silence();
        for &(name, gain) in gains {
            let buffer = self.get(name).ok_or_else(|| self.unknown(name))?;
            mix = mix.add(&buffer.scale(gain))?;
        }
        Ok(mix)
    }

    /// Sum of every source not in `excluded` (silence if nothing remains)
    pub fn residual(&self, excluded: &[&str]) -> MlResult<AudioBuffer> {
        if let Some(name) = excluded.iter().find(|n| self.get(n).is_none()) {
            return Err(self.unknown(name));
        }

        let kept = self
            .sources
            .iter()
            .filter(|(n, _)| !excluded.contains(&n.as_str()))
            .map(|(_, b)| b);

        Ok(AudioBuffer::sum(kept)?.unwrap_or_else(|| self.silence()))
    }

    /// Sum of all sources
    pub fn mixture(&self) -> MlResult<AudioBuffer> {
        self.residual(&[])
    }

    fn silence(&self) -> AudioBuffer {
        // sources is non-empty by construction
        self.sources[0].1.zeroed()
    }

    fn unknown(&self, stem: &str) -> MlError {
        MlError::UnknownStem {
            stem: stem.to_string(),
            model: self.model.clone(),
        }
    }
}

/// Which outputs a caller wants
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StemRequest {
    /// Every source (plus `no_vocals` when applicable)
    All,
    /// One named source (plus `no_vocals` for vocals)
    Stem(String),
}

impl StemRequest {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            StemRequest::All
        } else {
            StemRequest::Stem(s.to_ascii_lowercase())
        }
    }
}

impl fmt::Display for StemRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StemRequest::All => f.write_str("all"),
            StemRequest::Stem(name) => f.write_str(name),
        }
    }
}

/// Maps a result and a request to named output buffers
pub struct StemSelector;

impl StemSelector {
    /// Select outputs for `request`
    ///
    /// When the model produces a `vocals` source and the request is `vocals`
    /// or `all`, the selection also contains `no_vocals`: the sum of every
    /// other source.
    pub fn select(result: &SeparationResult, request: &StemRequest) -> MlResult<StemSelection> {
        let mut selection = StemSelection::new();

        let wants_no_vocals = match request {
            StemRequest::All => {
                for (name, buffer) in result.sources() {
                    selection.insert(name.clone(), buffer.clone());
                }
                true
            }
            StemRequest::Stem(name) => {
                let buffer = result.get(name).ok_or_else(|| result.unknown(name))?;
                selection.insert(name.clone(), buffer.clone());
                name == VOCALS
            }
        };

        if wants_no_vocals && result.get(VOCALS).is_some() {
            selection.insert(NO_VOCALS.to_string(), result.residual(&[VOCALS])?);
        }

        Ok(selection)
    }
}
