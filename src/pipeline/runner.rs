//! Recording lifecycle controller — the serialized state machine driving the
//! hotkey → record → transcribe → deliver pipeline.
//!
//! [`RecordingController`] owns all mutable lifecycle state and responds to
//! [`ControlEvent`]s received over a single `tokio::sync::mpsc` channel.
//! Draining that channel from one task is the whole concurrency story: the
//! hotkey dispatcher, the audio forwarder, and the transcription workers are
//! just producers, and every transition is applied in enqueue order.
//!
//! # Event flow
//!
//! ```text
//! StartRequested
//!   ├─ model ready   → start audio, create session          [Recording]
//!   └─ model cold    → queue start, load model async        [ModelLoading]
//!
//! AudioFrame (while Recording)
//!   └─ append to session; continuous VAD may synthesize a
//!      silence/max-duration stop
//!
//! StopRequested / silence timeout / max duration
//!   ├─ short clip, VAD says silence → discard               [Idle]
//!   └─ spawn_blocking(engine.transcribe)                    [Processing]
//!
//! TranscriptionDone { session_id, text }
//!   ├─ stale id      → discard silently                     [unchanged]
//!   ├─ empty text    → log, no delivery                     [Idle]
//!   ├─ command mode  → longest-trigger match → execute      [Idle]
//!   └─ text mode     → TextSink::deliver (exactly once)     [Idle]
//!
//! CancelRequested
//!   ├─ Recording     → discard audio immediately            [Cancelled → Idle]
//!   └─ Processing    → mark result stale, return at once    [Cancelled → Idle]
//! ```
//!
//! Every `(state, event)` pair not listed is an explicit no-op logged at
//! debug level — users mash keys, and unmodeled pairs must never be
//! undefined behaviour.
//!
//! Blocking work (Whisper inference, model load) is pushed onto
//! `tokio::task::spawn_blocking`; completions come back as events on the same
//! channel, so the controller itself never blocks — with one deliberate
//! exception: text delivery runs synchronously inside the transition, because
//! the contract is "deliver exactly once, before reporting idle again".

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::audio::{AudioSource, SpeechDetector};
use crate::commands::{CommandSet, CommandSink};
use crate::config::AudioConfig;
use crate::inject::TextSink;
use crate::stt::EngineLoader;

use super::event::{ControlEvent, StopCause};
use super::session::RecordingSession;
use super::state::{ChangeReason, RecordingState, StateChange};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// The external collaborators the controller drives.  All of them sit behind
/// trait seams so the whole lifecycle is testable with in-memory doubles.
pub struct Collaborators {
    /// Microphone gate; frames arrive separately as [`ControlEvent::AudioFrame`].
    pub audio: Arc<dyn AudioSource>,
    /// Lazily loaded transcription engine.
    pub engine: EngineLoader,
    /// Speech/silence classifier for the pre-check and the continuous
    /// monitor.
    pub vad: Arc<dyn SpeechDetector>,
    /// Text delivery into the focused application.
    pub text_sink: Arc<dyn TextSink>,
    /// Voice-command table (command-mode sessions only).
    pub commands: CommandSet,
    /// Fire-and-forget command executor.
    pub command_sink: Arc<dyn CommandSink>,
}

// ---------------------------------------------------------------------------
// RecordingController
// ---------------------------------------------------------------------------

/// The recording lifecycle state machine.
///
/// Construct with [`RecordingController::new`], then either call
/// [`run`](Self::run) on a tokio task (production) or feed events directly
/// through [`handle_event`](Self::handle_event) (tests — the transition logic
/// is a plain synchronous function of the current state and one event).
pub struct RecordingController {
    audio_cfg: AudioConfig,
    collab: Collaborators,

    state: RecordingState,
    session: Option<RecordingSession>,
    next_session_id: u64,
    /// Command-mode flag of a start that is waiting for the model to load.
    pending_start: Option<bool>,

    /// Handed to workers so completions come back through the same queue.
    event_tx: mpsc::Sender<ControlEvent>,
    /// Current state, published for the hotkey edge dispatcher.
    state_tx: watch::Sender<RecordingState>,
    /// Outbound notifications; unbounded so an absent or slow observer can
    /// never block a transition.
    notice_tx: mpsc::UnboundedSender<StateChange>,
}

impl RecordingController {
    pub fn new(
        audio_cfg: AudioConfig,
        collab: Collaborators,
        event_tx: mpsc::Sender<ControlEvent>,
        state_tx: watch::Sender<RecordingState>,
        notice_tx: mpsc::UnboundedSender<StateChange>,
    ) -> Self {
        Self {
            audio_cfg,
            collab,
            state: RecordingState::Idle,
            session: None,
            next_session_id: 1,
            pending_start: None,
            event_tx,
            state_tx,
            notice_tx,
        }
    }

    /// Current state.  Only meaningful from the controller task itself;
    /// other tasks read the published `watch` channel.
    pub fn state(&self) -> RecordingState {
        self.state
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    /// Drain the event channel until it closes or a
    /// [`ControlEvent::Shutdown`] arrives.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<ControlEvent>) {
        log::info!("pipeline: controller running");

        while let Some(event) = event_rx.recv().await {
            if matches!(event, ControlEvent::Shutdown) {
                if self.state == RecordingState::Recording {
                    self.collab.audio.cancel();
                }
                log::info!("pipeline: shutdown requested");
                break;
            }
            self.handle_event(event);
        }

        log::info!("pipeline: controller stopped");
    }

    /// Apply one event to the state machine.
    ///
    /// This is the serialization point: in production it is only ever called
    /// from [`run`], one event at a time.
    pub fn handle_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::StartRequested { command_mode } => self.handle_start(command_mode),
            ControlEvent::StopRequested { auto_enter } => self.handle_stop(auto_enter),
            ControlEvent::CancelRequested => self.handle_cancel(),
            ControlEvent::ModelReady => self.handle_model_ready(),
            ControlEvent::ModelLoadFailed { message } => self.handle_model_load_failed(&message),
            ControlEvent::TranscriptionDone { session_id, text } => {
                self.handle_transcription_done(session_id, text)
            }
            ControlEvent::AudioFrame { samples } => self.handle_frame(samples),
            ControlEvent::Shutdown => {
                // Only reachable when events are fed directly; run() handles
                // shutdown before dispatching.
            }
        }
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    fn handle_start(&mut self, command_mode: bool) {
        match self.state {
            RecordingState::Idle => {
                if self.collab.engine.is_ready() {
                    self.begin_session(command_mode, ChangeReason::HotkeyStart);
                } else {
                    self.pending_start = Some(command_mode);
                    self.collab.engine.begin_load(self.event_tx.clone());
                    self.set_state(RecordingState::ModelLoading, ChangeReason::ModelLoadStarted);
                }
            }
            RecordingState::ModelLoading => {
                log::debug!("pipeline: start ignored, model still loading");
            }
            state => {
                log::debug!("pipeline: start ignored in state {state:?}");
            }
        }
    }

    fn handle_model_ready(&mut self) {
        if self.state != RecordingState::ModelLoading {
            log::debug!("pipeline: model ready in state {:?}, nothing to do", self.state);
            return;
        }
        match self.pending_start.take() {
            Some(command_mode) => self.begin_session(command_mode, ChangeReason::ModelReady),
            None => self.set_state(RecordingState::Idle, ChangeReason::ModelReady),
        }
    }

    fn handle_model_load_failed(&mut self, message: &str) {
        if self.state != RecordingState::ModelLoading {
            log::debug!("pipeline: model load failure in state {:?} ignored", self.state);
            return;
        }
        log::warn!("pipeline: model load failed, dropping pending start: {message}");
        self.pending_start = None;
        self.set_state(RecordingState::Idle, ChangeReason::ModelLoadFailed);
    }

    fn handle_stop(&mut self, auto_enter: bool) {
        if self.state != RecordingState::Recording {
            log::debug!("pipeline: stop ignored in state {:?}", self.state);
            return;
        }
        if auto_enter {
            if let Some(session) = self.session.as_mut() {
                session.auto_enter = true;
            }
        }
        self.finish_recording(StopCause::Hotkey);
    }

    fn handle_cancel(&mut self) {
        match self.state {
            RecordingState::Recording => {
                self.collab.audio.cancel();
                if let Some(session) = self.session.take() {
                    log::info!(
                        "pipeline: session {} cancelled, {} samples discarded",
                        session.id,
                        session.len()
                    );
                }
                self.set_state(RecordingState::Cancelled, ChangeReason::Cancelled);
                self.set_state(RecordingState::Idle, ChangeReason::Cancelled);
            }
            RecordingState::Processing => {
                // The engine has no preemption contract; the in-flight work
                // keeps running, but dropping the session makes its eventual
                // result stale.
                if let Some(session) = self.session.take() {
                    log::info!(
                        "pipeline: session {} cancelled, in-flight result will be discarded",
                        session.id
                    );
                }
                self.set_state(RecordingState::Cancelled, ChangeReason::Cancelled);
                self.set_state(RecordingState::Idle, ChangeReason::Cancelled);
            }
            state => {
                log::debug!("pipeline: cancel ignored in state {state:?}");
            }
        }
    }

    fn handle_frame(&mut self, samples: Vec<f32>) {
        if self.state != RecordingState::Recording {
            log::debug!("pipeline: audio frame dropped in state {:?}", self.state);
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        session.append(&samples);

        let sample_rate = self.audio_cfg.sample_rate;
        let mut cause: Option<StopCause> = None;

        if self.audio_cfg.silence_autostop {
            let is_speech = match self.collab.vad.is_speech(&samples) {
                Ok(b) => b,
                Err(e) => {
                    log::warn!("pipeline: VAD monitor failed ({e}), assuming speech");
                    true
                }
            };
            session.silence.observe(is_speech, samples.len());

            if session.silence.trailing_secs(sample_rate) >= self.audio_cfg.silence_timeout_secs {
                cause = Some(StopCause::Silence);
            }
        }

        if cause.is_none() && session.duration_secs(sample_rate) >= self.audio_cfg.max_recording_secs
        {
            cause = Some(StopCause::MaxDuration);
        }

        if let Some(cause) = cause {
            self.finish_recording(cause);
        }
    }

    fn handle_transcription_done(&mut self, session_id: u64, text: String) {
        let live = self.session.as_ref().map(|s| s.id);
        if self.state != RecordingState::Processing || live != Some(session_id) {
            log::debug!("pipeline: stale transcription for session {session_id} discarded");
            return;
        }
        let Some(session) = self.session.take() else {
            return;
        };

        let text = text.trim();
        if text.is_empty() {
            log::info!("pipeline: session {session_id} produced no speech");
            self.set_state(RecordingState::Idle, ChangeReason::EmptyTranscript);
            return;
        }

        if session.command_mode {
            let reason = match self.collab.commands.find_match(text) {
                Some(command) => {
                    log::info!(
                        "pipeline: session {session_id} matched command {:?}",
                        command.trigger
                    );
                    self.collab.command_sink.execute(command);
                    ChangeReason::CommandDispatched
                }
                None => {
                    log::info!("pipeline: session {session_id} matched no command");
                    ChangeReason::CommandUnmatched
                }
            };
            self.set_state(RecordingState::Idle, reason);
            return;
        }

        if let Err(e) = self.collab.text_sink.deliver(text, session.auto_enter) {
            log::warn!("pipeline: session {session_id} delivery failed: {e}");
        } else {
            log::info!(
                "pipeline: session {session_id} delivered {} chars",
                text.chars().count()
            );
        }
        self.set_state(RecordingState::Idle, ChangeReason::Delivered);
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn begin_session(&mut self, command_mode: bool, reason: ChangeReason) {
        let id = self.next_session_id;
        self.next_session_id += 1;

        if let Err(e) = self.collab.audio.start() {
            log::warn!("pipeline: could not start audio capture: {e}");
            self.session = None;
            self.set_state(RecordingState::Idle, ChangeReason::AudioStartFailed);
            return;
        }

        self.session = Some(RecordingSession::new(id, command_mode));
        log::info!("pipeline: session {id} recording (command_mode: {command_mode})");
        self.set_state(RecordingState::Recording, reason);
    }

    /// Common tail of every way out of `Recording`: stop the audio gate, run
    /// the short-clip pre-check, and either discard or dispatch to the
    /// engine.
    fn finish_recording(&mut self, cause: StopCause) {
        self.collab.audio.stop();

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let samples = session.take_samples();
        let session_id = session.id;

        let sample_rate = self.audio_cfg.sample_rate.max(1);
        let duration = samples.len() as f32 / sample_rate as f32;

        if duration < self.audio_cfg.precheck_max_secs {
            let speech = match self.collab.vad.is_speech(&samples) {
                Ok(b) => b,
                Err(e) => {
                    log::warn!("pipeline: VAD pre-check failed ({e}), assuming speech");
                    true
                }
            };
            if !speech {
                log::info!(
                    "pipeline: session {session_id} is {duration:.2}s of silence, \
                     skipping transcription"
                );
                self.session = None;
                self.set_state(RecordingState::Idle, ChangeReason::NoSpeech);
                return;
            }
        }

        let Some(engine) = self.collab.engine.engine() else {
            log::warn!("pipeline: engine unavailable at stop, dropping session {session_id}");
            self.session = None;
            self.set_state(RecordingState::Idle, ChangeReason::EmptyTranscript);
            return;
        };

        let event_tx = self.event_tx.clone();
        tokio::task::spawn_blocking(move || {
            let text = match engine.transcribe(&samples) {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("pipeline: transcription failed: {e}");
                    String::new()
                }
            };
            let _ = event_tx.blocking_send(ControlEvent::TranscriptionDone { session_id, text });
        });

        self.set_state(RecordingState::Processing, stop_reason(cause));
    }

    fn set_state(&mut self, new: RecordingState, reason: ChangeReason) {
        let old = self.state;
        self.state = new;
        self.state_tx.send_replace(new);
        let _ = self.notice_tx.send(StateChange { old, new, reason });

        if old != new {
            log::info!("pipeline: {} -> {} ({reason})", old.label(), new.label());
        }
    }
}

fn stop_reason(cause: StopCause) -> ChangeReason {
    match cause {
        StopCause::Hotkey => ChangeReason::HotkeyStop,
        StopCause::Silence => ChangeReason::SilenceTimeout,
        StopCause::MaxDuration => ChangeReason::MaxDuration,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{CaptureError, RmsVad, VadError};
    use crate::commands::{CommandAction, VoiceCommand};
    use crate::inject::InjectError;
    use crate::stt::{MockSttEngine, SttEngine, SttError};

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Audio source that counts calls; optionally fails every start.
    #[derive(Default)]
    struct FakeAudio {
        started: AtomicUsize,
        stopped: AtomicUsize,
        cancelled: AtomicUsize,
        fail_start: bool,
    }

    impl FakeAudio {
        fn failing() -> Self {
            Self {
                fail_start: true,
                ..Default::default()
            }
        }
    }

    impl AudioSource for FakeAudio {
        fn start(&self) -> Result<(), CaptureError> {
            if self.fail_start {
                return Err(CaptureError::Unavailable("mic offline".into()));
            }
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }

        fn cancel(&self) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Detector that always fails, for the degrade-to-speech paths.
    struct FailingVad;

    impl SpeechDetector for FailingVad {
        fn is_speech(&self, _samples: &[f32]) -> Result<bool, VadError> {
            Err(VadError::Unavailable("model not loaded".into()))
        }
    }

    /// Engine wrapper that counts transcription calls.
    struct CountingEngine {
        inner: MockSttEngine,
        calls: Arc<AtomicUsize>,
    }

    impl SttEngine for CountingEngine {
        fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.transcribe(audio)
        }
    }

    /// Sink that records every delivery.
    #[derive(Default)]
    struct RecordingSink {
        delivered: StdMutex<Vec<(String, bool)>>,
    }

    impl TextSink for RecordingSink {
        fn deliver(&self, text: &str, auto_enter: bool) -> Result<(), InjectError> {
            self.delivered
                .lock()
                .unwrap()
                .push((text.to_string(), auto_enter));
            Ok(())
        }
    }

    /// Command sink that records every execution.
    #[derive(Default)]
    struct RecordingCommandSink {
        executed: StdMutex<Vec<String>>,
    }

    impl CommandSink for RecordingCommandSink {
        fn execute(&self, command: &VoiceCommand) {
            self.executed.lock().unwrap().push(command.trigger.clone());
        }
    }

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    struct Harness {
        controller: RecordingController,
        event_rx: mpsc::Receiver<ControlEvent>,
        notice_rx: mpsc::UnboundedReceiver<StateChange>,
        audio: Arc<FakeAudio>,
        text_sink: Arc<RecordingSink>,
        command_sink: Arc<RecordingCommandSink>,
        engine_calls: Arc<AtomicUsize>,
    }

    impl Harness {
        fn drain_notices(&mut self) -> Vec<StateChange> {
            let mut notices = Vec::new();
            while let Ok(n) = self.notice_rx.try_recv() {
                notices.push(n);
            }
            notices
        }

        fn last_reason(&mut self) -> Option<ChangeReason> {
            self.drain_notices().last().map(|n| n.reason)
        }

        /// Feed `secs` of constant-amplitude audio in 0.1 s frames.
        fn feed_audio(&mut self, secs: f32, amplitude: f32) {
            let frames = (secs * 10.0).round() as usize;
            for _ in 0..frames {
                self.controller.handle_event(ControlEvent::AudioFrame {
                    samples: vec![amplitude; 1_600],
                });
            }
        }

        /// Await the event a background worker sent (transcription or model
        /// load completion).
        async fn next_worker_event(&mut self) -> ControlEvent {
            self.event_rx.recv().await.expect("worker event")
        }
    }

    fn default_cfg() -> AudioConfig {
        AudioConfig {
            silence_autostop: false,
            ..AudioConfig::default()
        }
    }

    fn build_harness(
        engine: EngineLoader,
        engine_calls: Arc<AtomicUsize>,
        vad: Arc<dyn SpeechDetector>,
        audio_cfg: AudioConfig,
        commands: CommandSet,
        audio: Arc<FakeAudio>,
    ) -> Harness {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (state_tx, _state_rx) = watch::channel(RecordingState::Idle);
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let text_sink = Arc::new(RecordingSink::default());
        let command_sink = Arc::new(RecordingCommandSink::default());

        let collab = Collaborators {
            audio: Arc::clone(&audio) as Arc<dyn AudioSource>,
            engine,
            vad,
            text_sink: Arc::clone(&text_sink) as Arc<dyn TextSink>,
            commands,
            command_sink: Arc::clone(&command_sink) as Arc<dyn CommandSink>,
        };

        let controller =
            RecordingController::new(audio_cfg, collab, event_tx, state_tx, notice_tx);

        Harness {
            controller,
            event_rx,
            notice_rx,
            audio,
            text_sink,
            command_sink,
            engine_calls,
        }
    }

    /// Ready engine returning `transcript`, real RMS VAD, default config.
    fn harness(transcript: &str) -> Harness {
        harness_with_cfg(transcript, default_cfg())
    }

    fn harness_with_cfg(transcript: &str, cfg: AudioConfig) -> Harness {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = EngineLoader::preloaded(Arc::new(CountingEngine {
            inner: MockSttEngine::ok(transcript),
            calls: Arc::clone(&calls),
        }));
        build_harness(
            engine,
            calls,
            Arc::new(RmsVad::new(0.01)),
            cfg,
            CommandSet::default(),
            Arc::new(FakeAudio::default()),
        )
    }

    fn start(h: &mut Harness) {
        h.controller.handle_event(ControlEvent::StartRequested {
            command_mode: false,
        });
    }

    fn stop(h: &mut Harness) {
        h.controller
            .handle_event(ControlEvent::StopRequested { auto_enter: false });
    }

    // -----------------------------------------------------------------------
    // Happy path
    // -----------------------------------------------------------------------

    /// Toggle press, 2 s of speech, toggle press, engine returns text →
    /// delivered once with auto_enter = false, back to Idle.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn happy_path_delivers_text() {
        let mut h = harness("hello world");

        start(&mut h);
        assert_eq!(h.controller.state(), RecordingState::Recording);
        assert_eq!(h.audio.started.load(Ordering::SeqCst), 1);

        h.feed_audio(2.0, 0.5);
        stop(&mut h);
        assert_eq!(h.controller.state(), RecordingState::Processing);
        assert_eq!(h.audio.stopped.load(Ordering::SeqCst), 1);

        let done = h.next_worker_event().await;
        assert_eq!(
            done,
            ControlEvent::TranscriptionDone {
                session_id: 1,
                text: "hello world".into()
            }
        );
        h.controller.handle_event(done);

        assert_eq!(h.controller.state(), RecordingState::Idle);
        assert_eq!(
            *h.text_sink.delivered.lock().unwrap(),
            vec![("hello world".to_string(), false)]
        );
        assert_eq!(h.last_reason(), Some(ChangeReason::Delivered));
    }

    /// The stop binding's auto-enter flag rides the session into delivery.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn auto_enter_flag_propagates_to_delivery() {
        let mut h = harness("ship it");

        start(&mut h);
        h.feed_audio(3.0, 0.5);
        h.controller
            .handle_event(ControlEvent::StopRequested { auto_enter: true });

        let done = h.next_worker_event().await;
        h.controller.handle_event(done);

        assert_eq!(
            *h.text_sink.delivered.lock().unwrap(),
            vec![("ship it".to_string(), true)]
        );
    }

    // -----------------------------------------------------------------------
    // Idempotence / no-op transitions
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn repeated_start_while_recording_is_noop() {
        let mut h = harness("text");

        start(&mut h);
        h.feed_audio(1.0, 0.5);
        start(&mut h);
        start(&mut h);

        assert_eq!(h.controller.state(), RecordingState::Recording);
        assert_eq!(h.audio.started.load(Ordering::SeqCst), 1);
        assert_eq!(h.controller.session.as_ref().map(|s| s.id), Some(1));
    }

    #[tokio::test]
    async fn stop_and_cancel_in_idle_are_noops() {
        let mut h = harness("text");

        stop(&mut h);
        h.controller.handle_event(ControlEvent::CancelRequested);

        assert_eq!(h.controller.state(), RecordingState::Idle);
        assert!(h.drain_notices().is_empty());
        assert_eq!(h.audio.stopped.load(Ordering::SeqCst), 0);
    }

    /// Frames that were already in flight when the recording stopped must
    /// not corrupt the next state.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn late_audio_frame_is_dropped_after_stop() {
        let mut h = harness("text");

        start(&mut h);
        h.feed_audio(3.0, 0.5);
        stop(&mut h);
        assert_eq!(h.controller.state(), RecordingState::Processing);

        h.controller.handle_event(ControlEvent::AudioFrame {
            samples: vec![0.5; 1_600],
        });
        assert_eq!(h.controller.state(), RecordingState::Processing);
    }

    // -----------------------------------------------------------------------
    // Cancellation / stale results
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn cancel_while_recording_discards_audio() {
        let mut h = harness("text");

        start(&mut h);
        h.feed_audio(1.0, 0.5);
        h.controller.handle_event(ControlEvent::CancelRequested);

        assert_eq!(h.controller.state(), RecordingState::Idle);
        assert_eq!(h.audio.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(h.engine_calls.load(Ordering::SeqCst), 0);

        // The transient Cancelled state is visible to the observer.
        let notices = h.drain_notices();
        let cancelled = notices
            .iter()
            .find(|n| n.new == RecordingState::Cancelled)
            .expect("transient Cancelled notification");
        assert_eq!(cancelled.old, RecordingState::Recording);
        assert_eq!(notices.last().map(|n| n.new), Some(RecordingState::Idle));
    }

    /// Toggle, 3 s audio, stop (Processing), cancel 10 ms later, then the
    /// engine finishes → the result never reaches the sink.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_during_processing_discards_late_result() {
        let mut h = harness("ignored text");

        start(&mut h);
        h.feed_audio(3.0, 0.5);
        stop(&mut h);
        assert_eq!(h.controller.state(), RecordingState::Processing);

        h.controller.handle_event(ControlEvent::CancelRequested);
        assert_eq!(h.controller.state(), RecordingState::Idle);

        let done = h.next_worker_event().await;
        assert!(matches!(
            done,
            ControlEvent::TranscriptionDone { session_id: 1, .. }
        ));
        h.controller.handle_event(done);

        assert!(h.text_sink.delivered.lock().unwrap().is_empty());
        assert_eq!(h.controller.state(), RecordingState::Idle);
    }

    /// A result for a superseded session is discarded even after a new
    /// session has started.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stale_result_does_not_leak_into_new_session() {
        let mut h = harness("stale");

        start(&mut h);
        h.feed_audio(3.0, 0.5);
        stop(&mut h);
        h.controller.handle_event(ControlEvent::CancelRequested);

        // New session starts while the old worker is still running.
        start(&mut h);
        assert_eq!(h.controller.session.as_ref().map(|s| s.id), Some(2));

        let stale = h.next_worker_event().await;
        h.controller.handle_event(stale);

        // Still recording session 2; nothing was delivered.
        assert_eq!(h.controller.state(), RecordingState::Recording);
        assert!(h.text_sink.delivered.lock().unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // VAD pre-check
    // -----------------------------------------------------------------------

    /// 0.5 s of silence → straight back to Idle, engine never invoked.
    #[tokio::test]
    async fn short_silent_clip_skips_the_engine() {
        let mut h = harness("should never appear");

        start(&mut h);
        h.feed_audio(0.5, 0.0);
        stop(&mut h);

        assert_eq!(h.controller.state(), RecordingState::Idle);
        assert_eq!(h.engine_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.last_reason(), Some(ChangeReason::NoSpeech));
        assert!(h.text_sink.delivered.lock().unwrap().is_empty());
    }

    /// A short clip *with* speech goes to the engine normally.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn short_clip_with_speech_is_transcribed() {
        let mut h = harness("quick note");

        start(&mut h);
        h.feed_audio(1.0, 0.5);
        stop(&mut h);
        assert_eq!(h.controller.state(), RecordingState::Processing);

        let done = h.next_worker_event().await;
        h.controller.handle_event(done);
        assert_eq!(h.engine_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.text_sink.delivered.lock().unwrap().len(), 1);
    }

    /// Recordings at or above the pre-check threshold skip the VAD gate
    /// entirely.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn long_silent_clip_still_reaches_the_engine() {
        let mut h = harness("hallucination guard is out of scope here");

        start(&mut h);
        h.feed_audio(3.0, 0.0);
        stop(&mut h);

        assert_eq!(h.controller.state(), RecordingState::Processing);
        let done = h.next_worker_event().await;
        h.controller.handle_event(done);
        assert_eq!(h.engine_calls.load(Ordering::SeqCst), 1);
    }

    /// A broken detector must degrade to "assume speech", never block.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn vad_failure_assumes_speech() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = EngineLoader::preloaded(Arc::new(CountingEngine {
            inner: MockSttEngine::ok("made it through"),
            calls: Arc::clone(&calls),
        }));
        let mut h = build_harness(
            engine,
            calls,
            Arc::new(FailingVad),
            default_cfg(),
            CommandSet::default(),
            Arc::new(FakeAudio::default()),
        );

        start(&mut h);
        h.feed_audio(0.5, 0.0);
        stop(&mut h);

        assert_eq!(h.controller.state(), RecordingState::Processing);
        let done = h.next_worker_event().await;
        h.controller.handle_event(done);
        assert_eq!(h.engine_calls.load(Ordering::SeqCst), 1);
    }

    // -----------------------------------------------------------------------
    // Continuous VAD monitor / max duration
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn trailing_silence_auto_stops() {
        let cfg = AudioConfig {
            silence_autostop: true,
            silence_timeout_secs: 1.0,
            precheck_max_secs: 0.0,
            ..AudioConfig::default()
        };
        let mut h = harness_with_cfg("auto stopped", cfg);

        start(&mut h);
        h.feed_audio(1.0, 0.5); // speech
        assert_eq!(h.controller.state(), RecordingState::Recording);

        h.feed_audio(1.0, 0.0); // trailing silence crosses the threshold
        assert_eq!(h.controller.state(), RecordingState::Processing);

        let notices = h.drain_notices();
        assert!(notices
            .iter()
            .any(|n| n.reason == ChangeReason::SilenceTimeout));

        let done = h.next_worker_event().await;
        h.controller.handle_event(done);
        assert_eq!(h.text_sink.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn speech_resets_the_silence_clock() {
        let cfg = AudioConfig {
            silence_autostop: true,
            silence_timeout_secs: 1.0,
            ..AudioConfig::default()
        };
        let mut h = harness_with_cfg("still going", cfg);

        start(&mut h);
        h.feed_audio(0.8, 0.0);
        h.feed_audio(0.1, 0.5); // speech just before the timeout
        h.feed_audio(0.8, 0.0);

        assert_eq!(h.controller.state(), RecordingState::Recording);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn max_duration_stops_regardless_of_speech() {
        let cfg = AudioConfig {
            max_recording_secs: 1.0,
            ..default_cfg()
        };
        let mut h = harness_with_cfg("capped", cfg);

        start(&mut h);
        h.feed_audio(1.5, 0.5); // continuous speech, no silence at all

        assert_eq!(h.controller.state(), RecordingState::Processing);
        let notices = h.drain_notices();
        assert!(notices.iter().any(|n| n.reason == ChangeReason::MaxDuration));

        let done = h.next_worker_event().await;
        h.controller.handle_event(done);
        assert_eq!(h.controller.state(), RecordingState::Idle);
    }

    // -----------------------------------------------------------------------
    // Model loading
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cold_model_queues_start_until_ready() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = EngineLoader::new(|| Ok(Arc::new(MockSttEngine::ok("warm now")) as _));
        let mut h = build_harness(
            engine,
            calls,
            Arc::new(RmsVad::new(0.01)),
            default_cfg(),
            CommandSet::default(),
            Arc::new(FakeAudio::default()),
        );

        start(&mut h);
        assert_eq!(h.controller.state(), RecordingState::ModelLoading);
        assert_eq!(h.audio.started.load(Ordering::SeqCst), 0);

        // A second press while loading is idempotent.
        start(&mut h);
        assert_eq!(h.controller.state(), RecordingState::ModelLoading);

        let ready = h.next_worker_event().await;
        assert_eq!(ready, ControlEvent::ModelReady);
        h.controller.handle_event(ready);

        assert_eq!(h.controller.state(), RecordingState::Recording);
        assert_eq!(h.audio.started.load(Ordering::SeqCst), 1);
        assert_eq!(h.controller.session.as_ref().map(|s| s.id), Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn model_load_failure_abandons_pending_start() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine =
            EngineLoader::new(|| Err(SttError::ModelNotFound("/missing/model.bin".into())));
        let mut h = build_harness(
            engine,
            calls,
            Arc::new(RmsVad::new(0.01)),
            default_cfg(),
            CommandSet::default(),
            Arc::new(FakeAudio::default()),
        );

        start(&mut h);
        assert_eq!(h.controller.state(), RecordingState::ModelLoading);

        let failed = h.next_worker_event().await;
        assert!(matches!(failed, ControlEvent::ModelLoadFailed { .. }));
        h.controller.handle_event(failed);

        assert_eq!(h.controller.state(), RecordingState::Idle);
        assert_eq!(h.last_reason(), Some(ChangeReason::ModelLoadFailed));
        assert_eq!(h.audio.started.load(Ordering::SeqCst), 0);
    }

    // -----------------------------------------------------------------------
    // Delivery branching
    // -----------------------------------------------------------------------

    fn browser_commands() -> CommandSet {
        CommandSet::new(vec![
            VoiceCommand {
                trigger: "open".into(),
                action: CommandAction::RunShell {
                    command: "true".into(),
                },
            },
            VoiceCommand {
                trigger: "open browser".into(),
                action: CommandAction::RunShell {
                    command: "xdg-open https://".into(),
                },
            },
        ])
        .expect("valid command table")
    }

    /// Command-mode session: transcript goes through the matcher, the text
    /// sink is never touched, longest trigger wins.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn command_mode_routes_to_the_matcher() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = EngineLoader::preloaded(Arc::new(CountingEngine {
            inner: MockSttEngine::ok("please open browser now"),
            calls: Arc::clone(&calls),
        }));
        let mut h = build_harness(
            engine,
            calls,
            Arc::new(RmsVad::new(0.01)),
            default_cfg(),
            browser_commands(),
            Arc::new(FakeAudio::default()),
        );

        h.controller
            .handle_event(ControlEvent::StartRequested { command_mode: true });
        assert!(h.controller.session.as_ref().is_some_and(|s| s.command_mode));

        h.feed_audio(3.0, 0.5);
        stop(&mut h);
        let done = h.next_worker_event().await;
        h.controller.handle_event(done);

        assert_eq!(
            *h.command_sink.executed.lock().unwrap(),
            vec!["open browser".to_string()]
        );
        assert!(h.text_sink.delivered.lock().unwrap().is_empty());
        assert_eq!(h.last_reason(), Some(ChangeReason::CommandDispatched));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn command_mode_without_match_executes_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = EngineLoader::preloaded(Arc::new(CountingEngine {
            inner: MockSttEngine::ok("close everything"),
            calls: Arc::clone(&calls),
        }));
        let mut h = build_harness(
            engine,
            calls,
            Arc::new(RmsVad::new(0.01)),
            default_cfg(),
            browser_commands(),
            Arc::new(FakeAudio::default()),
        );

        h.controller
            .handle_event(ControlEvent::StartRequested { command_mode: true });
        h.feed_audio(3.0, 0.5);
        stop(&mut h);
        let done = h.next_worker_event().await;
        h.controller.handle_event(done);

        assert!(h.command_sink.executed.lock().unwrap().is_empty());
        assert!(h.text_sink.delivered.lock().unwrap().is_empty());
        assert_eq!(h.last_reason(), Some(ChangeReason::CommandUnmatched));
    }

    // -----------------------------------------------------------------------
    // Collaborator failures
    // -----------------------------------------------------------------------

    /// Engine failure surfaces as an empty transcript: logged, no delivery,
    /// clean return to Idle.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn transcription_error_is_treated_as_empty_text() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = EngineLoader::preloaded(Arc::new(CountingEngine {
            inner: MockSttEngine::err(SttError::Transcription("inference blew up".into())),
            calls: Arc::clone(&calls),
        }));
        let mut h = build_harness(
            engine,
            calls,
            Arc::new(RmsVad::new(0.01)),
            default_cfg(),
            CommandSet::default(),
            Arc::new(FakeAudio::default()),
        );

        start(&mut h);
        h.feed_audio(3.0, 0.5);
        stop(&mut h);

        let done = h.next_worker_event().await;
        assert_eq!(
            done,
            ControlEvent::TranscriptionDone {
                session_id: 1,
                text: String::new()
            }
        );
        h.controller.handle_event(done);

        assert_eq!(h.controller.state(), RecordingState::Idle);
        assert!(h.text_sink.delivered.lock().unwrap().is_empty());
        assert_eq!(h.last_reason(), Some(ChangeReason::EmptyTranscript));
    }

    /// A whitespace-only transcript counts as "no speech".
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn whitespace_transcript_is_not_delivered() {
        let mut h = harness("   ");

        start(&mut h);
        h.feed_audio(3.0, 0.5);
        stop(&mut h);
        let done = h.next_worker_event().await;
        h.controller.handle_event(done);

        assert!(h.text_sink.delivered.lock().unwrap().is_empty());
        assert_eq!(h.last_reason(), Some(ChangeReason::EmptyTranscript));
    }

    /// Audio-source failure is user-visible and leaves the machine idle.
    #[tokio::test]
    async fn audio_start_failure_returns_to_idle_with_signal() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = EngineLoader::preloaded(Arc::new(CountingEngine {
            inner: MockSttEngine::ok("unreachable"),
            calls: Arc::clone(&calls),
        }));
        let mut h = build_harness(
            engine,
            calls,
            Arc::new(RmsVad::new(0.01)),
            default_cfg(),
            CommandSet::default(),
            Arc::new(FakeAudio::failing()),
        );

        start(&mut h);

        assert_eq!(h.controller.state(), RecordingState::Idle);
        assert!(h.controller.session.is_none());
        assert_eq!(h.last_reason(), Some(ChangeReason::AudioStartFailed));
    }

    // -----------------------------------------------------------------------
    // Session identity across cycles
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn session_ids_are_monotonic_across_cycles() {
        let mut h = harness("cycle");

        for expected_id in 1..=2u64 {
            start(&mut h);
            h.feed_audio(3.0, 0.5);
            stop(&mut h);

            let done = h.next_worker_event().await;
            assert!(matches!(
                done,
                ControlEvent::TranscriptionDone { session_id, .. } if session_id == expected_id
            ));
            h.controller.handle_event(done);
            assert_eq!(h.controller.state(), RecordingState::Idle);
        }

        assert_eq!(h.text_sink.delivered.lock().unwrap().len(), 2);
    }

    // -----------------------------------------------------------------------
    // Run loop
    // -----------------------------------------------------------------------

    /// Events fed through the channel are applied in order, and Shutdown
    /// stops the loop.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_loop_applies_events_in_order() {
        let mut h = harness("loop");
        let audio = Arc::clone(&h.audio);
        let tx = h.controller.event_tx.clone();

        let handle = tokio::spawn(h.controller.run(h.event_rx));

        tx.send(ControlEvent::StartRequested {
            command_mode: false,
        })
        .await
        .unwrap();
        tx.send(ControlEvent::CancelRequested).await.unwrap();
        tx.send(ControlEvent::Shutdown).await.unwrap();

        handle.await.expect("controller task");
        assert_eq!(audio.started.load(Ordering::SeqCst), 1);
        assert_eq!(audio.cancelled.load(Ordering::SeqCst), 1);
    }
}
