//! sf-core: Shared types for StemForge
//!
//! This crate provides the audio buffer type passed between the decode step,
//! the separation pipeline and the encode step.

mod buffer;
mod error;

pub use buffer::*;
pub use error::*;

/// Sample rate most separation models are trained at
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
