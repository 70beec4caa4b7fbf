//! Text delivery — clipboard-based injection into the focused application.
//!
//! # Overview
//!
//! Direct per-character key simulation is fragile across layouts and IMEs,
//! so delivery goes through the clipboard:
//!
//! 1. **Save** the original clipboard content.
//! 2. **Set** the transcript into the clipboard.
//! 3. **Simulate** Ctrl+V (or ⌘V on macOS) to paste into the focused window.
//! 4. Optionally **press Enter** (auto-enter sessions).
//! 5. **Restore** the original clipboard content (best-effort).
//!
//! The controller drives this through the [`TextSink`] trait and calls it at
//! most once per session, synchronously, before returning to idle — a result
//! belonging to a cancelled session never reaches a sink.

pub mod clipboard;
pub mod keyboard;

pub use clipboard::{restore_clipboard, save_clipboard, set_clipboard};
pub use keyboard::{press_enter, send_combo, simulate_paste};

use thiserror::Error;

use crate::config::DeliveryConfig;

// ---------------------------------------------------------------------------
// InjectError
// ---------------------------------------------------------------------------

/// All errors that can surface during text delivery.
#[derive(Debug, Error)]
pub enum InjectError {
    /// Could not open or read the system clipboard.
    #[error("cannot access clipboard: {0}")]
    ClipboardAccess(String),

    /// Could not write text to the system clipboard.
    #[error("cannot set clipboard text: {0}")]
    ClipboardSet(String),

    /// Could not simulate a key press/release event.
    #[error("cannot simulate key press: {0}")]
    KeySimulation(String),

    /// A synthetic hotkey payload could not be parsed.
    #[error("invalid key combination {0:?}")]
    InvalidCombo(String),
}

// ---------------------------------------------------------------------------
// TextSink
// ---------------------------------------------------------------------------

/// The controller's delivery seam.
///
/// Implementations must tolerate being called from the controller task (the
/// call blocks it for the few milliseconds the paste takes — intentionally,
/// so the delivery lands before the machine reports idle again).
pub trait TextSink: Send + Sync {
    /// Deliver `text` to the focused application.  With `auto_enter`, follow
    /// the paste with an Enter keystroke.
    fn deliver(&self, text: &str, auto_enter: bool) -> Result<(), InjectError>;
}

// ---------------------------------------------------------------------------
// TextInjector
// ---------------------------------------------------------------------------

/// Clipboard-paste text injector with configurable inter-step delays.
///
/// The delays cover slow clipboard managers and apps with sluggish paste
/// handling; the defaults (50 ms / 100 ms) are fine on typical desktops.
#[derive(Debug, Clone)]
pub struct TextInjector {
    /// Milliseconds to wait after setting the clipboard before simulating
    /// the paste chord.
    pub delay_ms: u64,
    /// Milliseconds to wait after simulating paste before restoring the
    /// original clipboard.
    pub restore_delay_ms: u64,
}

impl Default for TextInjector {
    fn default() -> Self {
        Self {
            delay_ms: 50,
            restore_delay_ms: 100,
        }
    }
}

impl TextInjector {
    /// Create a `TextInjector` with the default delays (50 ms / 100 ms).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `TextInjector` from the delivery section of the app config.
    pub fn from_config(cfg: &DeliveryConfig) -> Self {
        Self {
            delay_ms: cfg.paste_delay_ms,
            restore_delay_ms: cfg.restore_delay_ms,
        }
    }

    /// Full clipboard-paste pipeline.
    ///
    /// Steps (in order): save → set → wait → paste → (enter) → wait →
    /// restore.  The restore is always attempted but its result is
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns the first [`InjectError`] encountered before the restore
    /// step.
    pub fn inject(&self, text: &str, auto_enter: bool) -> Result<(), InjectError> {
        let saved = save_clipboard()?;

        set_clipboard(text)?;

        // Small delay so the clipboard manager flushes before the target
        // reads it.
        std::thread::sleep(std::time::Duration::from_millis(self.delay_ms));

        simulate_paste()?;

        if auto_enter {
            press_enter()?;
        }

        // Let the target app finish pasting before we clobber the clipboard.
        std::thread::sleep(std::time::Duration::from_millis(self.restore_delay_ms));

        let _ = restore_clipboard(saved);

        Ok(())
    }
}

impl TextSink for TextInjector {
    fn deliver(&self, text: &str, auto_enter: bool) -> Result<(), InjectError> {
        self.inject(text, auto_enter)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
