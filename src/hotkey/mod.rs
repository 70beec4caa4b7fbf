//! Global hotkey bindings for the recording lifecycle, backed by `rdev`.
//!
//! # Design
//!
//! Raw key edges come from a dedicated OS thread running `rdev::listen`
//! ([`listener::HotkeyListener`]).  The [`edges::EdgeDispatcher`] turns those
//! edges into abstract controller events, applying the role policy (only the
//! toggle and command bindings can start a session, stop-only bindings can
//! only end one) and the modifier-release debounce.
//!
//! This module owns the configuration side: combination-string parsing,
//! the per-role [`HotkeyBinding`] table, duplicate-chord detection, and the
//! derived shared-modifier field the debounce logic runs on.  All of it is
//! computed once at startup; nothing here is mutated afterwards.

pub mod edges;
pub mod listener;

pub use edges::EdgeDispatcher;
pub use listener::HotkeyListener;

use std::collections::HashSet;

use thiserror::Error;

use crate::config::HotkeyConfig;

// ---------------------------------------------------------------------------
// HotkeyError
// ---------------------------------------------------------------------------

/// Configuration-time hotkey failures.  All of these refuse startup; none can
/// occur after the binding table is built.
#[derive(Debug, Clone, Error)]
pub enum HotkeyError {
    /// A combination string contained a key name the parser does not know.
    #[error("unknown key name {name:?} in combination {combo:?}")]
    UnknownKey { name: String, combo: String },

    /// A combination string was empty or contained only separators.
    #[error("empty hotkey combination for {role:?}")]
    EmptyCombination { role: HotkeyRole },

    /// A combination contained more than one non-modifier key.
    #[error("combination {combo:?} has more than one non-modifier key")]
    MultipleMainKeys { combo: String },

    /// Two roles resolved to the same physical chord.
    #[error("{first:?} and {second:?} are both bound to {combo:?}")]
    DuplicateChord {
        combo: String,
        first: HotkeyRole,
        second: HotkeyRole,
    },
}

// ---------------------------------------------------------------------------
// HotkeyRole
// ---------------------------------------------------------------------------

/// What a binding is allowed to do to the recording lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyRole {
    /// Starts a dictation session when idle, stops it when recording.
    Toggle,
    /// Stop-only: ends the recording and appends Enter after delivery.
    StopAutoEnter,
    /// Stop-only: aborts the recording or discards an in-flight result.
    Cancel,
    /// Starts a command-mode session when idle, stops when recording.
    Command,
}

impl HotkeyRole {
    /// Returns `true` for roles that may create a new session.
    pub fn can_start(self) -> bool {
        matches!(self, HotkeyRole::Toggle | HotkeyRole::Command)
    }
}

// ---------------------------------------------------------------------------
// ModifierKey
// ---------------------------------------------------------------------------

/// A side-agnostic modifier key.  `rdev` reports left/right variants
/// separately; combination strings don't distinguish them, so each
/// `ModifierKey` matches both physical variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModifierKey {
    Ctrl,
    Shift,
    Alt,
    Meta,
}

impl ModifierKey {
    /// Parse a modifier name from a combination string.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ctrl" | "control" => Some(Self::Ctrl),
            "shift" => Some(Self::Shift),
            "alt" => Some(Self::Alt),
            "meta" | "win" | "cmd" | "super" => Some(Self::Meta),
            _ => None,
        }
    }

    /// The physical `rdev` keys this modifier matches.
    pub fn variants(self) -> &'static [rdev::Key] {
        match self {
            Self::Ctrl => &[rdev::Key::ControlLeft, rdev::Key::ControlRight],
            Self::Shift => &[rdev::Key::ShiftLeft, rdev::Key::ShiftRight],
            Self::Alt => &[rdev::Key::Alt, rdev::Key::AltGr],
            Self::Meta => &[rdev::Key::MetaLeft, rdev::Key::MetaRight],
        }
    }

    /// Returns the side-agnostic modifier a physical key belongs to, if any.
    pub fn of_key(key: rdev::Key) -> Option<Self> {
        match key {
            rdev::Key::ControlLeft | rdev::Key::ControlRight => Some(Self::Ctrl),
            rdev::Key::ShiftLeft | rdev::Key::ShiftRight => Some(Self::Shift),
            rdev::Key::Alt | rdev::Key::AltGr => Some(Self::Alt),
            rdev::Key::MetaLeft | rdev::Key::MetaRight => Some(Self::Meta),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Ctrl => "Ctrl",
            Self::Shift => "Shift",
            Self::Alt => "Alt",
            Self::Meta => "Meta",
        }
    }
}

// ---------------------------------------------------------------------------
// KeyCombo
// ---------------------------------------------------------------------------

/// A parsed, normalised key combination: a set of modifiers plus at most one
/// non-modifier key.  Modifiers are kept sorted so chord equality (and
/// duplicate detection) is independent of the order they were written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    /// Sorted, de-duplicated modifier set.
    pub modifiers: Vec<ModifierKey>,
    /// The non-modifier key, or `None` for a modifier-only chord.
    pub key: Option<rdev::Key>,
}

impl KeyCombo {
    /// Parse a `+`-separated combination string, e.g. `"Ctrl+Shift+Space"`,
    /// `"F9"` or a bare `"Ctrl"`.
    pub fn parse(combo: &str, role: HotkeyRole) -> Result<Self, HotkeyError> {
        let mut modifiers: Vec<ModifierKey> = Vec::new();
        let mut key: Option<rdev::Key> = None;

        for part in combo.split('+').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(m) = ModifierKey::parse(part) {
                if !modifiers.contains(&m) {
                    modifiers.push(m);
                }
            } else if let Some(k) = parse_key(part) {
                if key.is_some() {
                    return Err(HotkeyError::MultipleMainKeys {
                        combo: combo.to_string(),
                    });
                }
                key = Some(k);
            } else {
                return Err(HotkeyError::UnknownKey {
                    name: part.to_string(),
                    combo: combo.to_string(),
                });
            }
        }

        if modifiers.is_empty() && key.is_none() {
            return Err(HotkeyError::EmptyCombination { role });
        }

        modifiers.sort();
        Ok(Self { modifiers, key })
    }

    /// The first modifier of the chord in normalised order, if any.
    pub fn first_modifier(&self) -> Option<ModifierKey> {
        self.modifiers.first().copied()
    }

    /// Returns `true` when the chord is exactly one modifier and nothing else.
    pub fn is_single_modifier(&self) -> bool {
        self.key.is_none() && self.modifiers.len() == 1
    }

    /// Number of constituent keys (modifiers + main key).  Used to rank
    /// chords when a single press edge completes more than one binding.
    pub fn arity(&self) -> usize {
        self.modifiers.len() + usize::from(self.key.is_some())
    }

    /// Human-readable normalised form, used in error messages.
    pub fn display(&self) -> String {
        let mut parts: Vec<String> = self.modifiers.iter().map(|m| m.label().into()).collect();
        if let Some(k) = self.key {
            parts.push(format!("{k:?}"));
        }
        parts.join("+")
    }
}

// ---------------------------------------------------------------------------
// HotkeyBinding
// ---------------------------------------------------------------------------

/// One configured binding: role, parsed chord, and the derived
/// shared-modifier field the release debounce runs on.
///
/// `shared_modifier` is `Some(m)` when the chord reduces to the single
/// modifier `m` and `m` is also a constituent of the toggle chord — the
/// configuration in which a stop press and the start chord ride the same
/// physical key and need the release guard.  Computed once here, never
/// re-derived per event.
#[derive(Debug, Clone)]
pub struct HotkeyBinding {
    pub role: HotkeyRole,
    pub combo: KeyCombo,
    pub shared_modifier: Option<ModifierKey>,
}

/// Build the binding table from configuration.
///
/// Roles are registered in a fixed order (toggle, auto-enter stop, cancel,
/// command); that order breaks ties everywhere a "first registered wins"
/// rule applies.  Duplicate chords across roles are detected here and refuse
/// startup — they must never surface as a press-time surprise.
pub fn build_bindings(cfg: &HotkeyConfig) -> Result<Vec<HotkeyBinding>, HotkeyError> {
    let toggle_combo = KeyCombo::parse(&cfg.toggle, HotkeyRole::Toggle)?;

    let mut bindings = vec![HotkeyBinding {
        role: HotkeyRole::Toggle,
        combo: toggle_combo.clone(),
        shared_modifier: None,
    }];

    let optional: [(&Option<String>, HotkeyRole); 3] = [
        (&cfg.auto_enter_stop, HotkeyRole::StopAutoEnter),
        (&cfg.cancel, HotkeyRole::Cancel),
        (&cfg.command, HotkeyRole::Command),
    ];

    for (combo_str, role) in optional {
        let Some(combo_str) = combo_str else { continue };
        let combo = KeyCombo::parse(combo_str, role)?;

        let shared_modifier = combo
            .is_single_modifier()
            .then(|| combo.modifiers[0])
            .filter(|m| toggle_combo.modifiers.contains(m));

        bindings.push(HotkeyBinding {
            role,
            combo,
            shared_modifier,
        });
    }

    for i in 0..bindings.len() {
        for j in (i + 1)..bindings.len() {
            if bindings[i].combo == bindings[j].combo {
                return Err(HotkeyError::DuplicateChord {
                    combo: bindings[i].combo.display(),
                    first: bindings[i].role,
                    second: bindings[j].role,
                });
            }
        }
    }

    Ok(bindings)
}

/// The set of physical keys the listener thread should forward edges for.
///
/// Modifiers expand to both left/right variants; everything else passes
/// through unchanged.  Keys outside this set never leave the listener
/// thread.
pub fn watched_keys(bindings: &[HotkeyBinding]) -> HashSet<rdev::Key> {
    let mut keys = HashSet::new();
    for binding in bindings {
        for m in &binding.combo.modifiers {
            keys.extend(m.variants().iter().copied());
        }
        if let Some(k) = binding.combo.key {
            keys.insert(k);
        }
    }
    keys
}

// ---------------------------------------------------------------------------
// KeyEdge
// ---------------------------------------------------------------------------

/// Direction of a raw key edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    Press,
    Release,
}

/// A raw press/release edge as forwarded by the listener thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyEdge {
    pub key: rdev::Key,
    pub direction: EdgeDirection,
}

impl KeyEdge {
    pub fn press(key: rdev::Key) -> Self {
        Self {
            key,
            direction: EdgeDirection::Press,
        }
    }

    pub fn release(key: rdev::Key) -> Self {
        Self {
            key,
            direction: EdgeDirection::Release,
        }
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a non-modifier key name from a combination string into an
/// [`rdev::Key`].
///
/// Supports F1–F12, common named keys, and single ASCII letters in either
/// case.  Returns `None` for unrecognised names so callers can surface a
/// configuration error naming the offending part.
///
/// # Examples
///
/// ```
/// use push_to_type::hotkey::parse_key;
///
/// assert_eq!(parse_key("F9"),     Some(rdev::Key::F9));
/// assert_eq!(parse_key("Space"),  Some(rdev::Key::Space));
/// assert_eq!(parse_key("a"),      Some(rdev::Key::KeyA));
/// assert_eq!(parse_key("xyz"),    None);
/// ```
pub fn parse_key(key_str: &str) -> Option<rdev::Key> {
    match key_str {
        // Function keys
        "F1" => Some(rdev::Key::F1),
        "F2" => Some(rdev::Key::F2),
        "F3" => Some(rdev::Key::F3),
        "F4" => Some(rdev::Key::F4),
        "F5" => Some(rdev::Key::F5),
        "F6" => Some(rdev::Key::F6),
        "F7" => Some(rdev::Key::F7),
        "F8" => Some(rdev::Key::F8),
        "F9" => Some(rdev::Key::F9),
        "F10" => Some(rdev::Key::F10),
        "F11" => Some(rdev::Key::F11),
        "F12" => Some(rdev::Key::F12),

        // Navigation / control
        "Escape" | "Esc" => Some(rdev::Key::Escape),
        "Space" => Some(rdev::Key::Space),
        "Return" | "Enter" => Some(rdev::Key::Return),
        "Tab" => Some(rdev::Key::Tab),
        "Backspace" => Some(rdev::Key::Backspace),
        "Delete" | "Del" => Some(rdev::Key::Delete),
        "Home" => Some(rdev::Key::Home),
        "End" => Some(rdev::Key::End),
        "PageUp" => Some(rdev::Key::PageUp),
        "PageDown" => Some(rdev::Key::PageDown),
        "UpArrow" | "Up" => Some(rdev::Key::UpArrow),
        "DownArrow" | "Down" => Some(rdev::Key::DownArrow),
        "LeftArrow" | "Left" => Some(rdev::Key::LeftArrow),
        "RightArrow" | "Right" => Some(rdev::Key::RightArrow),

        // Lock / special
        "CapsLock" => Some(rdev::Key::CapsLock),
        "NumLock" => Some(rdev::Key::NumLock),
        "ScrollLock" => Some(rdev::Key::ScrollLock),
        "PrintScreen" => Some(rdev::Key::PrintScreen),
        "Pause" => Some(rdev::Key::Pause),

        // Letter keys (case-insensitive)
        "A" | "a" => Some(rdev::Key::KeyA),
        "B" | "b" => Some(rdev::Key::KeyB),
        "C" | "c" => Some(rdev::Key::KeyC),
        "D" | "d" => Some(rdev::Key::KeyD),
        "E" | "e" => Some(rdev::Key::KeyE),
        "F" | "f" => Some(rdev::Key::KeyF),
        "G" | "g" => Some(rdev::Key::KeyG),
        "H" | "h" => Some(rdev::Key::KeyH),
        "I" | "i" => Some(rdev::Key::KeyI),
        "J" | "j" => Some(rdev::Key::KeyJ),
        "K" | "k" => Some(rdev::Key::KeyK),
        "L" | "l" => Some(rdev::Key::KeyL),
        "M" | "m" => Some(rdev::Key::KeyM),
        "N" | "n" => Some(rdev::Key::KeyN),
        "O" | "o" => Some(rdev::Key::KeyO),
        "P" | "p" => Some(rdev::Key::KeyP),
        "Q" | "q" => Some(rdev::Key::KeyQ),
        "R" | "r" => Some(rdev::Key::KeyR),
        "S" | "s" => Some(rdev::Key::KeyS),
        "T" | "t" => Some(rdev::Key::KeyT),
        "U" | "u" => Some(rdev::Key::KeyU),
        "V" | "v" => Some(rdev::Key::KeyV),
        "W" | "w" => Some(rdev::Key::KeyW),
        "X" | "x" => Some(rdev::Key::KeyX),
        "Y" | "y" => Some(rdev::Key::KeyY),
        "Z" | "z" => Some(rdev::Key::KeyZ),

        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HotkeyConfig;

    fn config(
        toggle: &str,
        auto_enter: Option<&str>,
        cancel: Option<&str>,
        command: Option<&str>,
    ) -> HotkeyConfig {
        HotkeyConfig {
            toggle: toggle.into(),
            auto_enter_stop: auto_enter.map(Into::into),
            cancel: cancel.map(Into::into),
            command: command.map(Into::into),
            release_watchdog_secs: 5,
        }
    }

    // ---- parse_key ---------------------------------------------------------

    #[test]
    fn parse_function_and_named_keys() {
        assert_eq!(parse_key("F9"), Some(rdev::Key::F9));
        assert_eq!(parse_key("Escape"), Some(rdev::Key::Escape));
        assert_eq!(parse_key("Esc"), Some(rdev::Key::Escape));
        assert_eq!(parse_key("Space"), Some(rdev::Key::Space));
        assert_eq!(parse_key("Enter"), Some(rdev::Key::Return));
    }

    #[test]
    fn parse_letter_keys_case_insensitive() {
        assert_eq!(parse_key("A"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("a"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("z"), Some(rdev::Key::KeyZ));
    }

    #[test]
    fn parse_unknown_key_returns_none() {
        assert_eq!(parse_key("xyz"), None);
        assert_eq!(parse_key(""), None);
    }

    // ---- KeyCombo::parse ---------------------------------------------------

    #[test]
    fn combo_with_modifiers_and_key() {
        let combo = KeyCombo::parse("Ctrl+Shift+Space", HotkeyRole::Toggle).unwrap();
        assert_eq!(combo.modifiers, vec![ModifierKey::Ctrl, ModifierKey::Shift]);
        assert_eq!(combo.key, Some(rdev::Key::Space));
        assert_eq!(combo.arity(), 3);
    }

    #[test]
    fn combo_modifier_order_is_normalised() {
        let a = KeyCombo::parse("Shift+Ctrl+Space", HotkeyRole::Toggle).unwrap();
        let b = KeyCombo::parse("Ctrl+Shift+Space", HotkeyRole::Toggle).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn combo_single_modifier() {
        let combo = KeyCombo::parse("Ctrl", HotkeyRole::StopAutoEnter).unwrap();
        assert!(combo.is_single_modifier());
        assert_eq!(combo.first_modifier(), Some(ModifierKey::Ctrl));
    }

    #[test]
    fn combo_meta_aliases() {
        for alias in ["Win", "Meta", "Cmd", "Super"] {
            let combo = KeyCombo::parse(alias, HotkeyRole::Cancel).unwrap();
            assert_eq!(combo.modifiers, vec![ModifierKey::Meta]);
        }
    }

    #[test]
    fn combo_unknown_key_errors() {
        let err = KeyCombo::parse("Ctrl+Bogus", HotkeyRole::Toggle).unwrap_err();
        assert!(matches!(err, HotkeyError::UnknownKey { .. }));
    }

    #[test]
    fn combo_two_main_keys_errors() {
        let err = KeyCombo::parse("A+B", HotkeyRole::Toggle).unwrap_err();
        assert!(matches!(err, HotkeyError::MultipleMainKeys { .. }));
    }

    #[test]
    fn combo_empty_errors() {
        let err = KeyCombo::parse("  ", HotkeyRole::Toggle).unwrap_err();
        assert!(matches!(err, HotkeyError::EmptyCombination { .. }));
    }

    // ---- build_bindings ----------------------------------------------------

    #[test]
    fn toggle_only_config_builds_one_binding() {
        let bindings = build_bindings(&config("F9", None, None, None)).unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].role, HotkeyRole::Toggle);
        assert!(bindings[0].shared_modifier.is_none());
    }

    #[test]
    fn shared_modifier_derived_for_single_modifier_stop() {
        // toggle = Ctrl+Meta, stop = bare Ctrl: the stop chord rides a
        // constituent of the toggle chord and needs the release guard.
        let bindings = build_bindings(&config("Ctrl+Win", Some("Ctrl"), None, None)).unwrap();
        let stop = &bindings[1];
        assert_eq!(stop.role, HotkeyRole::StopAutoEnter);
        assert_eq!(stop.shared_modifier, Some(ModifierKey::Ctrl));
    }

    #[test]
    fn no_shared_modifier_for_disjoint_stop() {
        let bindings = build_bindings(&config("Ctrl+Win", Some("Alt"), None, None)).unwrap();
        assert!(bindings[1].shared_modifier.is_none());
    }

    #[test]
    fn no_shared_modifier_for_multi_key_stop() {
        let bindings =
            build_bindings(&config("Ctrl+Win", Some("Ctrl+Shift"), None, None)).unwrap();
        assert!(bindings[1].shared_modifier.is_none());
    }

    #[test]
    fn duplicate_chord_is_rejected() {
        let err =
            build_bindings(&config("Ctrl+Shift+Space", None, Some("Shift+Ctrl+Space"), None))
                .unwrap_err();
        match err {
            HotkeyError::DuplicateChord { first, second, .. } => {
                assert_eq!(first, HotkeyRole::Toggle);
                assert_eq!(second, HotkeyRole::Cancel);
            }
            other => panic!("expected DuplicateChord, got {other:?}"),
        }
    }

    #[test]
    fn all_four_roles_build() {
        let bindings = build_bindings(&config(
            "Ctrl+Shift+Space",
            Some("Ctrl"),
            Some("Escape"),
            Some("Ctrl+Shift+K"),
        ))
        .unwrap();
        assert_eq!(bindings.len(), 4);
        assert_eq!(bindings[3].role, HotkeyRole::Command);
    }

    // ---- watched_keys ------------------------------------------------------

    #[test]
    fn watched_keys_expand_modifier_variants() {
        let bindings = build_bindings(&config("Ctrl+Space", None, None, None)).unwrap();
        let keys = watched_keys(&bindings);
        assert!(keys.contains(&rdev::Key::ControlLeft));
        assert!(keys.contains(&rdev::Key::ControlRight));
        assert!(keys.contains(&rdev::Key::Space));
        assert!(!keys.contains(&rdev::Key::KeyA));
    }
}
