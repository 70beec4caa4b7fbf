//! Background model loading.
//!
//! Loading a Whisper model takes seconds; the controller must never block on
//! it.  [`EngineLoader`] holds the (initially empty) engine slot and loads it
//! on a `spawn_blocking` worker when asked, reporting completion back to the
//! controller as a [`ControlEvent::ModelReady`] / [`ControlEvent::ModelLoadFailed`]
//! on the same event channel everything else uses — the controller just sees
//! one more serialized event.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use tokio::sync::mpsc;

use crate::pipeline::ControlEvent;
use crate::stt::{SttEngine, SttError, TranscribeParams, WhisperEngine};

// ---------------------------------------------------------------------------
// EngineLoader
// ---------------------------------------------------------------------------

/// Factory that produces a ready engine.  Runs on a blocking worker, so it
/// may take as long as it needs.
type EngineFactory = Arc<dyn Fn() -> Result<Arc<dyn SttEngine>, SttError> + Send + Sync>;

/// Lazily loaded transcription engine slot.
///
/// Cheap to clone; all clones share the slot, so one `begin_load` serves
/// every holder.  `begin_load` is idempotent: repeated calls while a load is
/// in flight (or after it finished) do nothing.
#[derive(Clone)]
pub struct EngineLoader {
    slot: Arc<Mutex<Option<Arc<dyn SttEngine>>>>,
    loading: Arc<AtomicBool>,
    factory: EngineFactory,
}

impl EngineLoader {
    /// Create a loader around an arbitrary engine factory.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn SttEngine>, SttError> + Send + Sync + 'static,
    {
        Self {
            slot: Arc::new(Mutex::new(None)),
            loading: Arc::new(AtomicBool::new(false)),
            factory: Arc::new(factory),
        }
    }

    /// Create a loader that loads a Whisper GGML model from `model_path`.
    pub fn whisper(model_path: PathBuf, params: TranscribeParams) -> Self {
        Self::new(move || {
            WhisperEngine::load(&model_path, params.clone())
                .map(|e| Arc::new(e) as Arc<dyn SttEngine>)
        })
    }

    /// Create a loader whose engine is ready from the start.  Used in tests
    /// and whenever the model was loaded eagerly at startup.
    pub fn preloaded(engine: Arc<dyn SttEngine>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(engine))),
            loading: Arc::new(AtomicBool::new(false)),
            factory: Arc::new(|| {
                Err(SttError::ContextInit(
                    "preloaded engine has no factory".into(),
                ))
            }),
        }
    }

    /// Returns `true` once an engine is available for transcription.
    pub fn is_ready(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }

    /// The loaded engine, if any.
    pub fn engine(&self) -> Option<Arc<dyn SttEngine>> {
        self.slot.lock().unwrap().clone()
    }

    /// Kick off an asynchronous load.
    ///
    /// Completion is reported on `events`; nothing happens synchronously
    /// here beyond flagging the load as in flight.  Calling this while ready
    /// re-announces readiness; calling it while a load is already running is
    /// a no-op.
    pub fn begin_load(&self, events: mpsc::Sender<ControlEvent>) {
        if self.is_ready() {
            let _ = events.try_send(ControlEvent::ModelReady);
            return;
        }
        if self.loading.swap(true, Ordering::SeqCst) {
            log::debug!("stt: model load already in flight");
            return;
        }

        let slot = Arc::clone(&self.slot);
        let loading = Arc::clone(&self.loading);
        let factory = Arc::clone(&self.factory);

        tokio::task::spawn_blocking(move || {
            log::info!("stt: loading transcription model");
            let started = std::time::Instant::now();

            let event = match factory() {
                Ok(engine) => {
                    *slot.lock().unwrap() = Some(engine);
                    log::info!(
                        "stt: model loaded in {} ms",
                        started.elapsed().as_millis()
                    );
                    ControlEvent::ModelReady
                }
                Err(e) => {
                    log::warn!("stt: model load failed: {e}");
                    ControlEvent::ModelLoadFailed {
                        message: e.to_string(),
                    }
                }
            };

            loading.store(false, Ordering::SeqCst);
            let _ = events.blocking_send(event);
        });
    }
}

impl std::fmt::Debug for EngineLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLoader")
            .field("ready", &self.is_ready())
            .field("loading", &self.loading.load(Ordering::SeqCst))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
