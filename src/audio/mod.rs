//! Audio pipeline — microphone capture → downmix/resample → controller events,
//! plus the VAD pieces the recording lifecycle consumes.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → stereo_to_mono
//!           → resample_to_16k → CaptureService gate → ControlEvent::AudioFrame
//! ```
//!
//! The controller never touches the hardware directly; it drives the
//! [`AudioSource`] trait, and frames reach it only through its own event
//! channel.

pub mod capture;
pub mod resample;
pub mod vad;

pub use capture::{
    AudioCapture, AudioChunk, AudioSource, CaptureError, CaptureService, StreamHandle,
    UnavailableAudioSource,
};
pub use resample::{resample_to_16k, stereo_to_mono};
pub use vad::{RmsVad, SilenceTracker, SpeechDetector, VadError};
