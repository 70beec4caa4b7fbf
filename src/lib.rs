//! Push-to-Type — push-to-talk voice dictation controller.
//!
//! A global hotkey starts microphone capture, speech is transcribed with
//! Whisper, and the result is either pasted into the focused application or
//! dispatched as a voice command.  The heart of the crate is the
//! [`pipeline::RecordingController`]: a single-task state machine that
//! serializes every hotkey edge, audio frame, and transcription completion
//! through one event channel, so the recording lifecycle can never be
//! corrupted by its three producer threads racing each other.
//!
//! # Event flow
//!
//! ```text
//! rdev listener thread ─┐
//! cpal capture thread  ─┼─▶ ControlEvent (mpsc) ─▶ RecordingController
//! whisper worker       ─┘                             │        │
//!                                                     ▼        ▼
//!                                              AudioSource   TextSink /
//!                                              SttEngine     CommandSet
//! ```
//!
//! Each module has its own focused docs; start with [`pipeline`] for the
//! state machine and [`hotkey`] for the edge/debounce protocol.

pub mod audio;
pub mod commands;
pub mod config;
pub mod hotkey;
pub mod inject;
pub mod pipeline;
pub mod stt;
