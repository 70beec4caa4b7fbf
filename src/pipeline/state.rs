//! Recording lifecycle states and the outbound notification types.
//!
//! [`RecordingState`] is the controller's state machine value.  Exactly one
//! value is current at any time; only the controller task writes it, and it
//! publishes every change twice: through a `tokio::sync::watch` channel (read
//! by the hotkey edge dispatcher) and as a [`StateChange`] notification on an
//! unbounded channel (read by whatever is observing — the binary logs them).
//! Observers have no write access and can never block the controller.

// ---------------------------------------------------------------------------
// RecordingState
// ---------------------------------------------------------------------------

/// States of the recording lifecycle.
///
/// The state machine transitions are:
///
/// ```text
/// Idle ──start (model ready)──▶ Recording
///      ──start (model cold)───▶ ModelLoading ──ready──▶ Recording
/// Recording ──stop / silence / max duration──▶ Processing
///           ──cancel──▶ Cancelled ──▶ Idle
///           ──short silent clip──▶ Idle            (engine never invoked)
/// Processing ──transcription done──▶ Idle          (delivery happens here)
///            ──cancel──▶ Cancelled ──▶ Idle        (result discarded later)
/// ```
///
/// Unlisted `(state, event)` pairs are explicit no-ops, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// Waiting for a start-capable hotkey press.
    Idle,

    /// A start is pending while the transcription model loads in the
    /// background.
    ModelLoading,

    /// Microphone is active; frames are accumulating in the session buffer.
    Recording,

    /// Audio has been handed to the engine; a worker is transcribing it.
    Processing,

    /// Transient: a cancel was just accepted.  The machine never rests here —
    /// the controller publishes it and settles back to `Idle` in the same
    /// dispatch.
    Cancelled,
}

impl RecordingState {
    /// Returns `true` while a session is alive (recording or processing).
    pub fn is_busy(&self) -> bool {
        matches!(self, RecordingState::Recording | RecordingState::Processing)
    }

    /// A short human-readable label for status display.
    pub fn label(&self) -> &'static str {
        match self {
            RecordingState::Idle => "Idle",
            RecordingState::ModelLoading => "Loading model",
            RecordingState::Recording => "Recording",
            RecordingState::Processing => "Transcribing",
            RecordingState::Cancelled => "Cancelled",
        }
    }
}

impl Default for RecordingState {
    fn default() -> Self {
        RecordingState::Idle
    }
}

// ---------------------------------------------------------------------------
// ChangeReason
// ---------------------------------------------------------------------------

/// Why a state transition happened.  Carried on every [`StateChange`] so an
/// observer can tell apart, say, a hotkey stop from a silence auto-stop
/// without reconstructing controller internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// A start-capable hotkey was accepted.
    HotkeyStart,
    /// The model was cold; an async load was kicked off.
    ModelLoadStarted,
    /// The model finished loading.
    ModelReady,
    /// The model failed to load; the pending start was abandoned.
    ModelLoadFailed,
    /// The microphone could not be started.
    AudioStartFailed,
    /// A stop-capable hotkey ended the recording.
    HotkeyStop,
    /// Trailing silence ended the recording.
    SilenceTimeout,
    /// The hard recording-length ceiling ended the recording.
    MaxDuration,
    /// The user cancelled.
    Cancelled,
    /// A short recording contained no speech; transcription was skipped.
    NoSpeech,
    /// The engine returned an empty transcript.
    EmptyTranscript,
    /// Text was delivered to the focused application.
    Delivered,
    /// A voice command matched and was dispatched.
    CommandDispatched,
    /// No voice command matched the transcript.
    CommandUnmatched,
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeReason::HotkeyStart => "hotkey start",
            ChangeReason::ModelLoadStarted => "model load started",
            ChangeReason::ModelReady => "model ready",
            ChangeReason::ModelLoadFailed => "model load failed",
            ChangeReason::AudioStartFailed => "could not start recording",
            ChangeReason::HotkeyStop => "hotkey stop",
            ChangeReason::SilenceTimeout => "silence timeout",
            ChangeReason::MaxDuration => "max duration reached",
            ChangeReason::Cancelled => "cancelled",
            ChangeReason::NoSpeech => "no speech detected",
            ChangeReason::EmptyTranscript => "empty transcript",
            ChangeReason::Delivered => "text delivered",
            ChangeReason::CommandDispatched => "command dispatched",
            ChangeReason::CommandUnmatched => "no command matched",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// StateChange
// ---------------------------------------------------------------------------

/// One state transition as seen from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub old: RecordingState,
    pub new: RecordingState,
    pub reason: ChangeReason,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
