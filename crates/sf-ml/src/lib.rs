//! # StemForge separation pipeline
//!
//! Splits a mixed recording into sources (vocals, drums, bass, other, and
//! guitar/piano for six-source models) with a pretrained HTDemucs model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  SeparationJob (decode ─► separate ─► select ─► encode)              │
//! │                                                                      │
//! │  SeparationOrchestrator                                              │
//! │   ├── ModelRegistry  (single-flight load per name, cached outcomes)  │
//! │   ├── SegmentPlanner (overlapping fixed-length windows)              │
//! │   ├── ShiftEnsembler (random circular shifts, equal-weight average)  │
//! │   ├── OverlapAccumulator (triangular weights, commutative merge)     │
//! │   └── WorkerPool     (rayon, max_in_flight threads)                  │
//! │                                                                      │
//! │  StemSelector (requested sources + derived no_vocals)                │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Inference runs on the CPU through tract; the model is an opaque
//! `SeparationModel`, so tests and benches plug in synthetic models.

mod config;
mod error;
mod inference;
mod pool;
mod registry;
mod request;

pub mod separation;

pub use config::{MAX_SHIFTS, RegistryConfig, SeparationConfig, SeparationQuality};
pub use error::{MlError, MlResult};
pub use inference::{InferenceConfig, InferenceEngine};
pub use pool::{CancellationToken, ProgressCallback, ProgressTracker, SeparationControl, WorkerPool};
pub use registry::{ModelLoader, ModelRegistry, OnnxModelLoader};
pub use request::{SeparationJob, SeparationRequest, StemChoice};
