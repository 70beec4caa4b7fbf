//! Application entry point — Push-to-Type.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Build and validate the hotkey binding table (duplicate chords and
//!    malformed combinations refuse startup here, before any event flows).
//! 4. Load the voice-command table.
//! 5. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 6. Wire the channels: raw edges → dispatcher → controller events, plus
//!    the state watch and the observer notifications.
//! 7. Start audio capture (a missing microphone degrades to a source whose
//!    start attempts fail visibly — the app still runs).
//! 8. Spawn the edge dispatcher, the status observer, and the Ctrl-C
//!    handler; start the hotkey listener thread.
//! 9. Run the controller loop on the runtime — blocks until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use push_to_type::{
    audio::{AudioCapture, AudioSource, CaptureService, RmsVad, UnavailableAudioSource},
    commands::{CommandSet, SystemCommandSink},
    config::{AppConfig, AppPaths},
    hotkey::{build_bindings, watched_keys, EdgeDispatcher, HotkeyListener},
    inject::TextInjector,
    pipeline::{Collaborators, ControlEvent, RecordingController, RecordingState},
    stt::{EngineLoader, TranscribeParams},
};

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Push-to-Type starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Hotkey bindings — configuration errors are fatal before any event
    //    is accepted.
    let bindings = build_bindings(&config.hotkeys)
        .map_err(|e| anyhow::anyhow!("hotkey configuration invalid: {e}"))?;
    log::info!(
        "{} hotkey binding(s), toggle = {:?}",
        bindings.len(),
        config.hotkeys.toggle
    );

    // 4. Voice commands
    let paths = AppPaths::new();
    let commands = CommandSet::load_from(&paths.commands_file)
        .map_err(|e| anyhow::anyhow!("voice command table invalid: {e}"))?;
    if !commands.is_empty() {
        log::info!("{} voice command(s) loaded", commands.len());
    }

    // 5. Tokio runtime (2 workers — transcription and model loading go to
    //    the blocking pool anyway)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    // 6. Channels
    let (event_tx, event_rx) = mpsc::channel::<ControlEvent>(64);
    let (edge_tx, edge_rx) = mpsc::channel(64);
    let (state_tx, state_rx) = watch::channel(RecordingState::Idle);
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();

    // Transcription engine — loaded lazily on the first start request, so a
    // slow model never delays startup.
    let model_path = paths.models_dir.join(format!("{}.bin", config.stt.model));
    if !model_path.exists() {
        log::warn!(
            "Model file {} not found; the first recording will fail to load it",
            model_path.display()
        );
    }
    let params = TranscribeParams {
        language: config.stt.language.clone(),
        ..TranscribeParams::default()
    };
    let engine = EngineLoader::whisper(model_path, params);

    // 7. Audio capture — degrade to a visibly failing source when absent.
    let (audio, _stream_handle): (Arc<dyn AudioSource>, _) = match AudioCapture::new() {
        Ok(capture) => {
            let rate = capture.sample_rate();
            let channels = capture.channels();
            match CaptureService::spawn(capture, event_tx.clone()) {
                Ok((service, handle)) => {
                    log::info!("Audio capture ready ({rate} Hz, {channels} ch)");
                    (Arc::new(service), Some(handle))
                }
                Err(e) => {
                    log::warn!("Failed to start audio stream: {e}");
                    (Arc::new(UnavailableAudioSource::new(e.to_string())), None)
                }
            }
        }
        Err(e) => {
            log::warn!("Audio capture unavailable: {e}");
            (Arc::new(UnavailableAudioSource::new(e.to_string())), None)
        }
    };

    let collab = Collaborators {
        audio,
        engine,
        vad: Arc::new(RmsVad::new(config.audio.vad_threshold)),
        text_sink: Arc::new(TextInjector::from_config(&config.delivery)),
        commands,
        command_sink: Arc::new(SystemCommandSink),
    };

    let controller = RecordingController::new(
        config.audio.clone(),
        collab,
        event_tx.clone(),
        state_tx,
        notice_tx,
    );

    // 8. Hotkey listener thread + edge dispatcher task
    let _listener = HotkeyListener::start(watched_keys(&bindings), edge_tx);
    let dispatcher = EdgeDispatcher::new(
        bindings,
        Duration::from_secs(config.hotkeys.release_watchdog_secs),
        state_rx,
    );
    rt.spawn(dispatcher.run(edge_rx, event_tx.clone()));

    // Status observer — the read-only notification consumer (a tray icon
    // would subscribe here the same way).
    rt.spawn(async move {
        while let Some(change) = notice_rx.recv().await {
            log::info!("status: {} ({})", change.new.label(), change.reason);
        }
    });

    // Ctrl-C → clean shutdown through the same event queue as everything
    // else.
    {
        let event_tx = event_tx.clone();
        rt.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = event_tx.send(ControlEvent::Shutdown).await;
            }
        });
    }

    // 9. Controller loop — blocks until Shutdown.
    rt.block_on(controller.run(event_rx));

    log::info!("Push-to-Type shut down");
    Ok(())
}
