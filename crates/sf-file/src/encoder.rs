//! Audio encoding module
//!
//! WAV output via hound. 32-bit float writes the buffer's samples exactly;
//! 16/24-bit integer output clamps to [-1, 1].

use crate::error::{FileError, FileResult};

use serde::{Deserialize, Serialize};
use sf_core::AudioBuffer;

use std::io::Cursor;
use std::path::Path;

// ═══════════════════════════════════════════════════════════════════════════════
// ENCODER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Audio encoder trait
pub trait AudioEncoder {
    /// Encode audio buffer to bytes
    fn encode(&self, buffer: &AudioBuffer) -> FileResult<Vec<u8>>;

    /// Get file extension
    fn extension(&self) -> &'static str;

    /// Encode and write to `path`, creating parent directories as needed
    fn write(&self, buffer: &AudioBuffer, path: &Path) -> FileResult<()> {
        let encoded = self.encode(buffer)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, encoded)?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WAV ENCODER
// ═══════════════════════════════════════════════════════════════════════════════

/// WAV output settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavConfig {
    /// Bits per sample (16, 24 or 32)
    pub bit_depth: u16,
    /// Write IEEE float samples (32-bit only)
    pub float: bool,
}

impl Default for WavConfig {
    fn default() -> Self {
        Self::float32()
    }
}

impl WavConfig {
    pub fn float32() -> Self {
        Self {
            bit_depth: 32,
            float: true,
        }
    }

    pub fn pcm16() -> Self {
        Self {
            bit_depth: 16,
            float: false,
        }
    }

    pub fn pcm24() -> Self {
        Self {
            bit_depth: 24,
            float: false,
        }
    }
}

/// WAV encoder using hound
pub struct WavEncoder {
    config: WavConfig,
}

impl WavEncoder {
    pub fn new(config: WavConfig) -> Self {
        Self { config }
    }
}

impl Default for WavEncoder {
    fn default() -> Self {
        Self::new(WavConfig::default())
    }
}

impl AudioEncoder for WavEncoder {
    fn encode(&self, buffer: &AudioBuffer) -> FileResult<Vec<u8>> {
        if !matches!(
            (self.config.bit_depth, self.config.float),
            (16, false) | (24, false) | (32, true)
        ) {
            return Err(FileError::ConfigError(format!(
                "Unsupported WAV format: {} bits, float={}",
                self.config.bit_depth, self.config.float
            )));
        }

        let mut output = Vec::new();

        let spec = hound::WavSpec {
            channels: buffer.num_channels() as u16,
            sample_rate: buffer.sample_rate(),
            bits_per_sample: self.config.bit_depth,
            sample_format: if self.config.float && self.config.bit_depth == 32 {
                hound::SampleFormat::Float
            } else {
                hound::SampleFormat::Int
            },
        };

        let mut writer = hound::WavWriter::new(Cursor::new(&mut output), spec)
            .map_err(|e| FileError::EncodingError(e.to_string()))?;

        let samples = buffer.to_interleaved();

        match (self.config.bit_depth, self.config.float) {
            (16, false) => {
                for &sample in &samples {
                    let s = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
                    writer
                        .write_sample(s)
                        .map_err(|e| FileError::EncodingError(e.to_string()))?;
                }
            }
            (24, false) => {
                for &sample in &samples {
                    let s = (sample.clamp(-1.0, 1.0) * 8388607.0) as i32;
                    writer
                        .write_sample(s)
                        .map_err(|e| FileError::EncodingError(e.to_string()))?;
                }
            }
            (32, true) => {
                for &sample in &samples {
                    writer
                        .write_sample(sample)
                        .map_err(|e| FileError::EncodingError(e.to_string()))?;
                }
            }
            (bits, float) => {
                return Err(FileError::ConfigError(format!(
                    "Unsupported WAV format: {} bits, float={}",
                    bits, float
                )));
            }
        }

        writer
            .finalize()
            .map_err(|e| FileError::EncodingError(e.to_string()))?;

        Ok(output)
    }

    fn extension(&self) -> &'static str {
        "wav"
    }
}
