//! STT (Speech-to-Text) engine module.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  SttEngine (trait)                   │
//! │                                                      │
//! │   ┌──────────────┐       ┌──────────────┐            │
//! │   │ EngineLoader │──────▶│ WhisperEngine│            │
//! │   │ - is_ready   │ load  │ - ctx        │            │
//! │   │ - begin_load │ async │ - params     │            │
//! │   └──────────────┘       └──────┬───────┘            │
//! │                                 │                    │
//! │                                 ▼                    │
//! │                       ┌──────────────────┐           │
//! │                       │  transcribe()    │           │
//! │                       │  audio → text    │           │
//! │                       └──────────────────┘           │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The controller only ever sees [`EngineLoader`] (readiness + async load)
//! and `Arc<dyn SttEngine>` (transcription on a blocking worker).  Engine
//! errors never escape the pipeline: they surface as an empty transcript.

pub mod engine;
pub mod loader;
pub mod transcribe;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use engine::{SttEngine, SttError, WhisperEngine};
pub use loader::EngineLoader;
pub use transcribe::{SamplingStrategy, Segment, TranscribeParams, TranscriptionResult};

// test-only re-export so other test modules can import MockSttEngine
// without `use push_to_type::stt::engine::MockSttEngine`.
#[cfg(test)]
pub use engine::MockSttEngine;
