//! Energy-based Voice Activity Detection (VAD).
//!
//! The recording lifecycle uses the detector in two independent ways:
//!
//! * **Pre-check** — a one-shot [`SpeechDetector::is_speech`] pass over a
//!   short finished recording, to skip transcription entirely when the clip
//!   is pure silence (Whisper hallucinates text on silent input).
//! * **Continuous monitor** — per-frame classification while recording,
//!   feeding a [`SilenceTracker`] that accumulates trailing silence for the
//!   auto-stop.
//!
//! ## Algorithm
//!
//! Audio is split into 30 ms frames (480 samples @ 16 kHz).  A frame is
//! classified as *voice* when its RMS amplitude exceeds the configured
//! threshold.
//!
//! External detectors (e.g. a Silero ONNX model) can replace [`RmsVad`]
//! behind the [`SpeechDetector`] trait; a failing detector degrades to
//! "assume speech present" in the controller and never blocks the pipeline.

use thiserror::Error;

// ---------------------------------------------------------------------------
// VadError / SpeechDetector
// ---------------------------------------------------------------------------

/// Failure of an external voice-activity detector.
///
/// The bundled [`RmsVad`] never produces this; it exists so that fallible
/// detectors can report problems and still let the controller degrade
/// gracefully instead of crashing or blocking.
#[derive(Debug, Clone, Error)]
pub enum VadError {
    #[error("voice activity detector unavailable: {0}")]
    Unavailable(String),
}

/// Object-safe, thread-safe speech/silence classifier.
///
/// # Contract
///
/// * Must not panic on malformed input — empty or odd-length buffers return
///   a safe default instead.
/// * `Ok(true)` means speech was detected somewhere in `samples`.
/// * Callers treat `Err` as "assume speech present".
pub trait SpeechDetector: Send + Sync {
    fn is_speech(&self, samples: &[f32]) -> Result<bool, VadError>;
}

// ---------------------------------------------------------------------------
// RmsVad
// ---------------------------------------------------------------------------

/// Energy-based detector: a frame is voice when its RMS amplitude exceeds
/// the threshold.
///
/// # Example
///
/// ```rust
/// use push_to_type::audio::{RmsVad, SpeechDetector};
///
/// // 0.01 RMS threshold — typical for a quiet room
/// let vad = RmsVad::new(0.01);
///
/// let mut audio = vec![0.0_f32; 480];       // 30 ms silence
/// audio.extend(vec![0.5_f32; 480]);         // 30 ms voice
///
/// assert!(vad.is_speech(&audio).unwrap());
/// assert!(!vad.is_speech(&vec![0.0; 960]).unwrap());
/// ```
pub struct RmsVad {
    /// RMS amplitude threshold; frames below this are considered silence.
    rms_threshold: f32,
    /// Frame size in samples.  Default: 480 samples = 30 ms at 16 kHz.
    frame_size: usize,
}

impl RmsVad {
    /// Create an [`RmsVad`] with the given RMS threshold.
    ///
    /// `rms_threshold` should be in `[0.0, 1.0]`.  A typical value is
    /// `0.01` for quiet microphones; use `0.02`–`0.05` in noisy environments.
    pub fn new(rms_threshold: f32) -> Self {
        Self {
            rms_threshold,
            frame_size: 480, // 30 ms at 16 kHz
        }
    }

    /// Create an [`RmsVad`] with a custom frame size, for sample rates other
    /// than 16 kHz.
    pub fn with_frame_size(rms_threshold: f32, frame_size: usize) -> Self {
        assert!(frame_size > 0, "frame_size must be > 0");
        Self {
            rms_threshold,
            frame_size,
        }
    }

    /// RMS threshold currently in use.
    pub fn threshold(&self) -> f32 {
        self.rms_threshold
    }

    /// Returns `true` when the frame contains voice activity.
    fn is_voice_frame(&self, chunk: &[f32]) -> bool {
        if chunk.is_empty() {
            return false;
        }
        let mean_sq: f32 = chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32;
        mean_sq.sqrt() > self.rms_threshold
    }
}

impl SpeechDetector for RmsVad {
    /// Scan `samples` frame by frame; any voice frame means speech.
    ///
    /// An empty buffer contains no speech and returns `Ok(false)` — the safe
    /// default for malformed input.
    fn is_speech(&self, samples: &[f32]) -> Result<bool, VadError> {
        let found = samples
            .chunks(self.frame_size)
            .any(|frame| self.is_voice_frame(frame));
        Ok(found)
    }
}

// ---------------------------------------------------------------------------
// SilenceTracker
// ---------------------------------------------------------------------------

/// Trailing-silence bookkeeping for the continuous VAD monitor.
///
/// Owned by the live recording session; a tracker never outlives its session,
/// so a trailing-silence timeout can only ever fire for the session that
/// accumulated it.
#[derive(Debug, Default)]
pub struct SilenceTracker {
    /// Samples of uninterrupted silence at the current tail of the recording.
    trailing_samples: usize,
    /// Total frames observed, for diagnostics.
    frames_seen: u64,
}

impl SilenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observed frame.  Speech resets the trailing run; silence
    /// extends it by the frame's sample count.
    pub fn observe(&mut self, is_speech: bool, n_samples: usize) {
        self.frames_seen += 1;
        if is_speech {
            self.trailing_samples = 0;
        } else {
            self.trailing_samples += n_samples;
        }
    }

    /// Current uninterrupted trailing silence, in seconds.
    pub fn trailing_secs(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.trailing_samples as f32 / sample_rate as f32
    }

    /// Total frames observed since the session started.
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
