//! Keyboard simulation helpers backed by the `enigo` crate.
//!
//! Provides the synthetic keystrokes the delivery layer needs:
//!
//! * [`simulate_paste`] — the OS-appropriate paste shortcut.
//! * [`press_enter`] — the trailing Enter for auto-enter sessions.
//! * [`send_combo`] — an arbitrary chord (voice commands with a
//!   `send_hotkey` action).
//!
//! | Platform | Paste shortcut |
//! |----------|----------------|
//! | macOS    | ⌘V (Meta + V)  |
//! | Windows  | Ctrl+V         |
//! | Linux    | Ctrl+V         |
//!
//! A new [`Enigo`] instance is created per call because `Enigo` is not
//! `Send` and the handle is cheap to construct.

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use super::InjectError;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Simulate the system paste shortcut in the currently focused window.
///
/// # Errors
///
/// Returns [`InjectError::KeySimulation`] if the enigo backend cannot be
/// initialised or if any key event fails to be delivered.
pub fn simulate_paste() -> Result<(), InjectError> {
    let mut enigo = new_enigo()?;

    #[cfg(target_os = "macos")]
    {
        // macOS: ⌘V
        key(&mut enigo, Key::Meta, Direction::Press)?;
        key(&mut enigo, Key::Unicode('v'), Direction::Click)?;
        key(&mut enigo, Key::Meta, Direction::Release)?;
    }

    #[cfg(not(target_os = "macos"))]
    {
        // Windows / Linux: Ctrl+V
        key(&mut enigo, Key::Control, Direction::Press)?;
        key(&mut enigo, Key::Unicode('v'), Direction::Click)?;
        key(&mut enigo, Key::Control, Direction::Release)?;
    }

    Ok(())
}

/// Press and release Enter in the currently focused window.
pub fn press_enter() -> Result<(), InjectError> {
    let mut enigo = new_enigo()?;
    key(&mut enigo, Key::Return, Direction::Click)
}

/// Send an arbitrary key chord, e.g. `"Ctrl+Shift+T"` or `"Alt+F4"`.
///
/// Modifiers are pressed in written order, the final (non-modifier) key is
/// clicked, then the modifiers are released in reverse order.  A chord that
/// is all modifiers clicks the last modifier instead.
///
/// # Errors
///
/// Returns [`InjectError::InvalidCombo`] for an empty or unparseable chord,
/// or [`InjectError::KeySimulation`] if delivery fails.
pub fn send_combo(combo: &str) -> Result<(), InjectError> {
    let keys = parse_combo(combo)?;
    let mut enigo = new_enigo()?;

    let Some((main, modifiers)) = keys.split_last() else {
        return Err(InjectError::InvalidCombo(combo.to_string()));
    };

    for &m in modifiers {
        key(&mut enigo, m, Direction::Press)?;
    }
    let result = key(&mut enigo, *main, Direction::Click);
    for &m in modifiers.iter().rev() {
        // Best-effort release so a failed click cannot leave modifiers stuck.
        let _ = key(&mut enigo, m, Direction::Release);
    }

    result
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn new_enigo() -> Result<Enigo, InjectError> {
    Enigo::new(&Settings::default()).map_err(|e| InjectError::KeySimulation(e.to_string()))
}

fn key(enigo: &mut Enigo, k: Key, direction: Direction) -> Result<(), InjectError> {
    enigo
        .key(k, direction)
        .map_err(|e| InjectError::KeySimulation(e.to_string()))
}

/// Parse a `+`-separated chord into enigo keys, modifiers first.
fn parse_combo(combo: &str) -> Result<Vec<Key>, InjectError> {
    let mut modifiers = Vec::new();
    let mut main: Option<Key> = None;

    for part in combo.split('+').map(str::trim).filter(|p| !p.is_empty()) {
        match part.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => modifiers.push(Key::Control),
            "shift" => modifiers.push(Key::Shift),
            "alt" => modifiers.push(Key::Alt),
            "meta" | "win" | "cmd" | "super" => modifiers.push(Key::Meta),
            "enter" | "return" => main = Some(Key::Return),
            "tab" => main = Some(Key::Tab),
            "escape" | "esc" => main = Some(Key::Escape),
            "space" => main = Some(Key::Space),
            "backspace" => main = Some(Key::Backspace),
            "delete" | "del" => main = Some(Key::Delete),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => main = Some(Key::Unicode(c)),
                    _ => return Err(InjectError::InvalidCombo(combo.to_string())),
                }
            }
        }
    }

    let mut keys = modifiers;
    match main {
        Some(k) => keys.push(k),
        None if !keys.is_empty() => {}
        None => return Err(InjectError::InvalidCombo(combo.to_string())),
    }
    Ok(keys)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
