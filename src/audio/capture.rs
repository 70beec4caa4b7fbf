//! Microphone capture via `cpal`, and the [`AudioSource`] seam the recording
//! controller drives.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle.  The cpal
//! callback runs on its own audio thread and never talks to the controller
//! directly: it sends raw [`AudioChunk`]s to a forwarder thread which
//! downmixes, resamples to 16 kHz mono, and — only while the capture gate is
//! open — forwards [`ControlEvent::AudioFrame`]s into the controller's event
//! channel.  [`CaptureService`] owns the gate and implements [`AudioSource`].

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::audio::{resample_to_16k, stereo_to_mono};
use crate::pipeline::ControlEvent;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`, at the device's
/// native rate and channel count.  The forwarder thread converts them to
/// 16 kHz mono before they reach the controller.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000, 16000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping this value stops the underlying hardware stream.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running the audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("audio capture unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// AudioSource
// ---------------------------------------------------------------------------

/// The controller's view of the microphone.
///
/// `start` opens the frame gate (frames begin arriving as
/// [`ControlEvent::AudioFrame`]s), `stop` and `cancel` close it.  The two
/// closers exist because they mean different things to the caller — a stop
/// keeps the captured audio, a cancel discards it — even though the source
/// itself only gates the frame flow either way; buffer ownership lives with
/// the session, not here.
pub trait AudioSource: Send + Sync {
    fn start(&self) -> Result<(), CaptureError>;
    fn stop(&self);
    fn cancel(&self);
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone capture device wrapper built on top of `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::mpsc;
/// use push_to_type::audio::{AudioCapture, AudioChunk};
///
/// let (tx, rx) = mpsc::channel::<AudioChunk>();
/// let capture = AudioCapture::new().unwrap();
/// let _handle = capture.start(tx).unwrap();
/// // `_handle` keeps the stream alive; drop it to stop recording.
/// ```
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    /// Native sample rate reported by the device (Hz).
    sample_rate: u32,
    /// Number of interleaved channels reported by the device.
    channels: u16,
}

impl AudioCapture {
    /// Create a new [`AudioCapture`] using the system default input device.
    ///
    /// Queries the device's preferred stream configuration (sample rate,
    /// channels, buffer size) so no manual configuration is required.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NoDevice`] when no input device is available,
    /// or [`CaptureError::DefaultConfig`] when the device cannot report a
    /// default stream configuration.
    pub fn new() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
        })
    }

    /// Start the hardware stream and send [`AudioChunk`]s to `tx`.
    ///
    /// The cpal callback runs on a dedicated audio thread; each time the
    /// hardware delivers a buffer the raw `f32` samples are wrapped in an
    /// [`AudioChunk`] and forwarded over the channel.  Send errors (receiver
    /// dropped) are silently ignored so the audio thread never panics.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::BuildStream`] or [`CaptureError::PlayStream`]
    /// if the platform rejects the stream configuration.
    pub fn start(&self, tx: mpsc::Sender<AudioChunk>) -> Result<StreamHandle, CaptureError> {
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                };
                // Ignore send errors; the receiver may have been dropped.
                let _ = tx.send(chunk);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None, // no timeout
        )?;

        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }

    /// Native sample rate of the capture stream in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels in each [`AudioChunk`].
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// CaptureService
// ---------------------------------------------------------------------------

/// Production [`AudioSource`]: gates the flow of converted frames from the
/// hardware stream into the controller's event channel.
///
/// The hardware stream runs for the lifetime of the process (cpal streams
/// are cheap to keep open); recording start/stop only flips the gate, which
/// keeps start latency at a single atomic store.
pub struct CaptureService {
    recording: Arc<AtomicBool>,
}

impl CaptureService {
    /// Wire a capture device to the controller's event channel.
    ///
    /// Spawns the forwarder thread and starts the hardware stream.  The
    /// returned [`StreamHandle`] must be kept alive by the caller; dropping
    /// it stops the hardware stream.
    pub fn spawn(
        capture: AudioCapture,
        event_tx: tokio::sync::mpsc::Sender<ControlEvent>,
    ) -> Result<(Self, StreamHandle), CaptureError> {
        let recording = Arc::new(AtomicBool::new(false));
        let gate = Arc::clone(&recording);
        let channels = capture.channels();

        let (chunk_tx, chunk_rx) = mpsc::channel::<AudioChunk>();

        std::thread::Builder::new()
            .name("audio-forward".into())
            .spawn(move || {
                while let Ok(chunk) = chunk_rx.recv() {
                    if !gate.load(Ordering::Relaxed) {
                        continue;
                    }

                    let mono = if channels > 1 {
                        stereo_to_mono(&chunk.samples, channels)
                    } else {
                        chunk.samples
                    };

                    let samples = if chunk.sample_rate != 16_000 {
                        resample_to_16k(&mono, chunk.sample_rate)
                    } else {
                        mono
                    };

                    if event_tx
                        .blocking_send(ControlEvent::AudioFrame { samples })
                        .is_err()
                    {
                        break;
                    }
                }
            })
            .map_err(|e| CaptureError::Unavailable(format!("forwarder thread: {e}")))?;

        let handle = capture.start(chunk_tx)?;
        Ok((Self { recording }, handle))
    }
}

impl AudioSource for CaptureService {
    fn start(&self) -> Result<(), CaptureError> {
        self.recording.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&self) {
        self.recording.store(false, Ordering::Relaxed);
    }

    fn cancel(&self) {
        self.recording.store(false, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// UnavailableAudioSource
// ---------------------------------------------------------------------------

/// Stand-in [`AudioSource`] used when no capture device could be opened at
/// startup.  Every start attempt fails with the original reason, so the user
/// gets a visible "could not start recording" signal instead of a silent
/// no-op.
pub struct UnavailableAudioSource {
    reason: String,
}

impl UnavailableAudioSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl AudioSource for UnavailableAudioSource {
    fn start(&self) -> Result<(), CaptureError> {
        Err(CaptureError::Unavailable(self.reason.clone()))
    }

    fn stop(&self) {}

    fn cancel(&self) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
