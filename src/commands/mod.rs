//! Voice commands — trigger-phrase matching and fire-and-forget execution.
//!
//! In command mode the transcript is not pasted; it is matched against a
//! user-defined table of trigger phrases loaded from `commands.json`:
//!
//! ```json
//! [
//!   { "trigger": "open browser", "action": "run_shell", "command": "xdg-open https://" },
//!   { "trigger": "next tab",     "action": "send_hotkey", "keys": "Ctrl+Tab" }
//! ]
//! ```
//!
//! Matching is case-insensitive substring search with **longest trigger
//! wins**: given triggers `"open"` and `"open browser"`, the transcript
//! `"please open browser now"` matches `"open browser"`.  Ties fall back to
//! table order.
//!
//! Execution is fire-and-forget through [`CommandSink`]: a failing shell
//! command or key chord is logged and never affects the recording lifecycle.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CommandError
// ---------------------------------------------------------------------------

/// Configuration-time failures of the voice-command table.  Fatal at
/// startup, like every other configuration error.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("cannot read command file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse command file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("command #{index} has an empty trigger phrase")]
    EmptyTrigger { index: usize },
}

// ---------------------------------------------------------------------------
// VoiceCommand / CommandAction
// ---------------------------------------------------------------------------

/// What a matched command does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommandAction {
    /// Spawn a shell command line.
    RunShell { command: String },
    /// Send a synthetic key chord to the focused application.
    SendHotkey { keys: String },
}

/// One immutable entry of the voice-command table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceCommand {
    /// Trigger phrase, matched case-insensitively as a substring of the
    /// transcript.
    pub trigger: String,
    #[serde(flatten)]
    pub action: CommandAction,
}

// ---------------------------------------------------------------------------
// CommandSet
// ---------------------------------------------------------------------------

/// The loaded, read-only voice-command table.
#[derive(Debug, Clone, Default)]
pub struct CommandSet {
    commands: Vec<VoiceCommand>,
}

impl CommandSet {
    /// Build a set from an in-memory table.  Rejects empty trigger phrases —
    /// an empty trigger would match every transcript.
    pub fn new(commands: Vec<VoiceCommand>) -> Result<Self, CommandError> {
        if let Some(index) = commands
            .iter()
            .position(|c| c.trigger.trim().is_empty())
        {
            return Err(CommandError::EmptyTrigger { index });
        }
        Ok(Self { commands })
    }

    /// Load `commands.json`.  A missing file is not an error — it just means
    /// no commands are configured.
    pub fn load_from(path: &Path) -> Result<Self, CommandError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let commands: Vec<VoiceCommand> = serde_json::from_str(&content)?;
        Self::new(commands)
    }

    /// Find the best-matching command for a transcript.
    ///
    /// Scans for triggers that occur (case-insensitively) anywhere in
    /// `text`; among matches the longest trigger wins, ties broken by table
    /// order.  Returns `None` when nothing matches.
    pub fn find_match(&self, text: &str) -> Option<&VoiceCommand> {
        let haystack = text.to_lowercase();

        self.commands
            .iter()
            .filter(|cmd| haystack.contains(&cmd.trigger.to_lowercase()))
            // max_by_key returns the LAST maximum; reverse the index so the
            // first-listed command wins trigger-length ties.
            .enumerate()
            .max_by_key(|(i, cmd)| (cmd.trigger.len(), usize::MAX - i))
            .map(|(_, cmd)| cmd)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

// ---------------------------------------------------------------------------
// CommandSink
// ---------------------------------------------------------------------------

/// Fire-and-forget command executor.
///
/// Implementations must never panic and must not block the caller beyond
/// process spawn / keystroke delivery; failures are theirs to log.
pub trait CommandSink: Send + Sync {
    fn execute(&self, command: &VoiceCommand);
}

/// Production sink: shell commands via `sh -c` / `cmd /C`, hotkeys via the
/// delivery layer's chord sender.
pub struct SystemCommandSink;

impl CommandSink for SystemCommandSink {
    fn execute(&self, command: &VoiceCommand) {
        match &command.action {
            CommandAction::RunShell { command: line } => {
                log::info!("commands: running {line:?}");

                #[cfg(target_os = "windows")]
                let spawned = std::process::Command::new("cmd").args(["/C", line]).spawn();
                #[cfg(not(target_os = "windows"))]
                let spawned = std::process::Command::new("sh").args(["-c", line]).spawn();

                if let Err(e) = spawned {
                    log::warn!("commands: failed to spawn {line:?}: {e}");
                }
            }
            CommandAction::SendHotkey { keys } => {
                log::info!("commands: sending hotkey {keys:?}");
                if let Err(e) = crate::inject::send_combo(keys) {
                    log::warn!("commands: failed to send {keys:?}: {e}");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
