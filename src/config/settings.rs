//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper STT engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// GGML model name / file stem (e.g. `"ggml-base.en"`).
    pub model: String,
    /// Primary speech language as an ISO-639-1 code, or `"auto"` for
    /// Whisper's built-in language detection.
    pub language: String,
    /// Audio input device name — `None` means the system default.
    pub audio_device: Option<String>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "ggml-base.en".into(),
            language: "en".into(),
            audio_device: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for audio capture, voice-activity detection and auto-stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Target sample rate in Hz passed to Whisper (must be 16 000).
    pub sample_rate: u32,
    /// RMS amplitude threshold (0.0 – 1.0); frames above this level count as
    /// voice activity.
    pub vad_threshold: f32,
    /// Recordings shorter than this many seconds get a one-shot VAD check
    /// before transcription; pure silence is discarded without ever touching
    /// the engine.
    pub precheck_max_secs: f32,
    /// Stop the recording automatically after sustained trailing silence.
    pub silence_autostop: bool,
    /// Trailing-silence duration in seconds that triggers the auto-stop.
    pub silence_timeout_secs: f32,
    /// Hard ceiling on recording length in seconds; always enforced,
    /// regardless of the VAD monitor.
    pub max_recording_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            vad_threshold: 0.01,
            precheck_max_secs: 2.0,
            silence_autostop: false,
            silence_timeout_secs: 2.5,
            max_recording_secs: 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Global hotkey bindings, one combination string per role.
///
/// Combination strings are `+`-separated key names, e.g. `"Ctrl+Shift+Space"`
/// or a bare modifier like `"Ctrl"`.  Parsing and duplicate-chord detection
/// happen at startup in [`crate::hotkey::build_bindings`]; a malformed or
/// conflicting combination refuses startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotkeyConfig {
    /// The only binding that can start a dictation session; pressing it again
    /// while recording stops the session.
    pub toggle: String,
    /// Optional stop-only binding that stops the recording and appends an
    /// Enter keystroke after delivery.  `None` disables the role.
    pub auto_enter_stop: Option<String>,
    /// Optional binding that aborts the current recording or discards an
    /// in-flight transcription.
    pub cancel: Option<String>,
    /// Optional binding that starts a command-mode session (the transcript is
    /// matched against the voice-command table instead of being pasted).
    pub command: Option<String>,
    /// Seconds after which an engaged modifier guard is force-cleared when no
    /// release edge arrives (e.g. the release was swallowed by focus loss).
    pub release_watchdog_secs: u64,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            toggle: "Ctrl+Shift+Space".into(),
            auto_enter_stop: None,
            cancel: Some("Escape".into()),
            command: None,
            release_watchdog_secs: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// DeliveryConfig
// ---------------------------------------------------------------------------

/// Settings for clipboard-paste text delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Milliseconds to wait after setting the clipboard before simulating
    /// the paste chord.
    pub paste_delay_ms: u64,
    /// Milliseconds to wait after the paste before restoring the original
    /// clipboard content.
    pub restore_delay_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            paste_delay_ms: 50,
            restore_delay_ms: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use push_to_type::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// STT engine settings.
    pub stt: SttConfig,
    /// Audio capture / VAD / auto-stop settings.
    pub audio: AudioConfig,
    /// Global hotkey bindings.
    pub hotkeys: HotkeyConfig,
    /// Text delivery settings.
    pub delivery: DeliveryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stt: SttConfig::default(),
            audio: AudioConfig::default(),
            hotkeys: HotkeyConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns `true` when no `settings.toml` file exists yet.
    pub fn is_first_run() -> bool {
        !AppPaths::new().settings_file.exists()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
