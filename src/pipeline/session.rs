//! One start-to-delivery cycle of the recording lifecycle.
//!
//! A [`RecordingSession`] is created when a start event is accepted and
//! dropped whenever the machine returns to `Idle` — it is never reused.  The
//! monotonically increasing id is what lets the controller reject stale
//! transcription results: a result tagged with an old id simply no longer
//! matches the live session.

use std::time::Instant;

use crate::audio::SilenceTracker;

// ---------------------------------------------------------------------------
// RecordingSession
// ---------------------------------------------------------------------------

/// State owned by a single recording cycle.
///
/// The sample buffer is exclusively owned here; no other component reads or
/// mutates it.  `command_mode` is frozen at creation — delivery branching
/// reads it from the session, never from current configuration, so a mode
/// switch cannot race a live session.
#[derive(Debug)]
pub struct RecordingSession {
    /// Monotonic session id, unique for the lifetime of the controller.
    pub id: u64,
    /// When the session was created.
    pub started_at: Instant,
    /// Route the transcript through command matching instead of text
    /// delivery.  Immutable for the session's lifetime.
    pub command_mode: bool,
    /// Append an Enter keystroke after text delivery.  Set by the
    /// auto-enter stop binding.
    pub auto_enter: bool,
    /// Trailing-silence bookkeeping for the continuous VAD monitor.
    pub silence: SilenceTracker,
    /// Accumulated 16 kHz mono samples, in arrival order.
    samples: Vec<f32>,
}

impl RecordingSession {
    /// Create a fresh session.  Called only by the controller when a start
    /// event is accepted.
    pub fn new(id: u64, command_mode: bool) -> Self {
        Self {
            id,
            started_at: Instant::now(),
            command_mode,
            auto_enter: false,
            silence: SilenceTracker::new(),
            samples: Vec::new(),
        }
    }

    /// Append a block of samples in arrival order.
    pub fn append(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    /// Recorded duration in seconds at the given sample rate.
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / sample_rate as f32
    }

    /// Number of samples accumulated so far.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` when no samples have arrived yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Take ownership of the accumulated buffer, leaving the session empty.
    /// Called exactly once, when the recording stops.
    pub fn take_samples(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.samples)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
