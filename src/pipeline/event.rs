//! Controller event types.
//!
//! Every asynchronous producer — the hotkey edge dispatcher, the audio
//! capture forwarder, the transcription worker, the model loader — speaks to
//! the controller exclusively through [`ControlEvent`] values on a single
//! mpsc channel.  The controller task drains that channel one event at a
//! time, which is what serialises all state transitions without a lock.

// ---------------------------------------------------------------------------
// ControlEvent
// ---------------------------------------------------------------------------

/// An event funnelled into the recording lifecycle controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// A start-capable binding was pressed.  `command_mode` is captured here
    /// and frozen into the session at creation — a later mode change can
    /// never race a live session.
    StartRequested { command_mode: bool },

    /// A stop-capable binding was pressed while recording.  `auto_enter`
    /// requests an Enter keystroke after the text is delivered.
    StopRequested { auto_enter: bool },

    /// The cancel binding was pressed.  Immediate while recording; while
    /// processing it marks the in-flight result stale instead.
    CancelRequested,

    /// The transcription model finished loading and is ready for use.
    ModelReady,

    /// The transcription model failed to load.
    ModelLoadFailed { message: String },

    /// A background transcription finished.  `session_id` identifies the
    /// session the audio belonged to; a stale id means the session was
    /// cancelled or superseded and the text must be discarded.
    TranscriptionDone { session_id: u64, text: String },

    /// A block of 16 kHz mono samples from the capture forwarder.  Appended
    /// to the live session's buffer in arrival order; dropped in any state
    /// other than `Recording`.
    AudioFrame { samples: Vec<f32> },

    /// Stop the controller loop.
    Shutdown,
}

// ---------------------------------------------------------------------------
// StopCause
// ---------------------------------------------------------------------------

/// Why a recording left the `Recording` state for `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// A stop-capable hotkey was pressed.
    Hotkey,
    /// The continuous VAD monitor saw enough trailing silence.
    Silence,
    /// The hard recording-length ceiling was reached.
    MaxDuration,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ControlEvent>();
    }

    #[test]
    fn audio_frame_carries_samples() {
        let ev = ControlEvent::AudioFrame {
            samples: vec![0.0; 480],
        };
        match ev {
            ControlEvent::AudioFrame { samples } => assert_eq!(samples.len(), 480),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
