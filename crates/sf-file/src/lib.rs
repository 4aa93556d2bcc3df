//! sf-file: Audio decode/encode collaborators for StemForge
//!
//! Decoding goes through symphonia and yields a planar, unit-scaled f32
//! `AudioBuffer` at the file's native sample rate. Encoding writes WAV via
//! hound.
//!
//! ```rust,ignore
//! use sf_file::{AudioDecoder, AudioEncoder, WavEncoder};
//!
//! let buffer = AudioDecoder::decode(Path::new("mix.flac"))?;
//! WavEncoder::default().write(&buffer, Path::new("copy.wav"))?;
//! ```

mod decoder;
mod encoder;
mod error;

pub use decoder::*;
pub use encoder::*;
pub use error::*;
