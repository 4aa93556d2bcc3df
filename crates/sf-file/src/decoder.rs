//! Audio decoding module
//!
//! Uses symphonia for decoding multiple formats:
//! - WAV, AIFF (PCM)
//! - FLAC, ALAC (lossless)
//! - MP3, OGG Vorbis, AAC (lossy)

use crate::error::{FileError, FileResult};

use sf_core::AudioBuffer;

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

// ═══════════════════════════════════════════════════════════════════════════════
// DECODER
// ═══════════════════════════════════════════════════════════════════════════════

/// Universal audio decoder using symphonia
pub struct AudioDecoder;

impl AudioDecoder {
    /// Decode audio file to a unit-scaled f32 `AudioBuffer`
    pub fn decode(path: &Path) -> FileResult<AudioBuffer> {
        let mut format = Self::open(path)?;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| FileError::UnsupportedFormat("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| FileError::UnsupportedFormat("Unknown sample rate".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| FileError::UnsupportedFormat(format!("Failed to create decoder: {}", e)))?;

        let mut samples: Vec<f32> = Vec::new();
        let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);
        let mut sample_buf: Option<SampleBuffer<f32>> = None;
        let mut skipped_packets = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    return Err(FileError::CorruptAudio(format!("Packet read error: {}", e)));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Skipping undecodable packet: {}", e);
                    skipped_packets += 1;
                    continue;
                }
                Err(e) => {
                    return Err(FileError::CorruptAudio(format!("Decode error: {}", e)));
                }
            };

            let buf = sample_buf.get_or_insert_with(|| {
                let spec = *decoded.spec();
                channels = spec.channels.count();
                SampleBuffer::new(decoded.capacity() as u64, spec)
            });
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }

        if samples.is_empty() || channels == 0 {
            return Err(FileError::CorruptAudio(format!(
                "No audio decoded from {} ({} packets skipped)",
                path.display(),
                skipped_packets
            )));
        }

        log::debug!(
            "Decoded {}: {} frames, {}Hz, {} channels",
            path.display(),
            samples.len() / channels,
            sample_rate,
            channels
        );

        Ok(AudioBuffer::from_interleaved(&samples, channels, sample_rate)?)
    }

    /// Get audio file info without decoding
    pub fn probe(path: &Path) -> FileResult<AudioFileInfo> {
        let format = Self::open(path)?;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| FileError::UnsupportedFormat("No audio track found".to_string()))?;

        let codec_params = &track.codec_params;
        let sample_rate = codec_params.sample_rate.unwrap_or(sf_core::DEFAULT_SAMPLE_RATE);
        let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);
        let frames = codec_params.n_frames.unwrap_or(0);

        Ok(AudioFileInfo {
            path: path.to_path_buf(),
            format: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
                .to_uppercase(),
            sample_rate,
            channels,
            frames,
            duration: frames as f64 / sample_rate as f64,
        })
    }

    /// Get list of supported container extensions
    pub fn supported_formats() -> &'static [&'static str] {
        &["wav", "flac", "mp3", "ogg", "aac", "m4a", "aiff"]
    }

    fn open(path: &Path) -> FileResult<Box<dyn FormatReader>> {
        if !path.exists() {
            return Err(FileError::InputNotFound(path.display().to_string()));
        }

        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| FileError::UnsupportedFormat(format!("Failed to probe format: {}", e)))?;

        Ok(probed.format)
    }
}

/// Audio file information
#[derive(Debug, Clone)]
pub struct AudioFileInfo {
    pub path: std::path::PathBuf,
    pub format: String,
    pub sample_rate: u32,
    pub channels: usize,
    pub frames: u64,
    pub duration: f64,
}
