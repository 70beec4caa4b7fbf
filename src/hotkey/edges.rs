//! Edge dispatcher — raw key edges in, controller events out.
//!
//! The dispatcher sits between the listener thread and the controller.  For
//! every press edge it decides which binding (if any) the press completes,
//! applies the role policy against the controller's current state, and
//! forwards the resulting [`ControlEvent`].  Release edges never produce
//! events; they only update bookkeeping.
//!
//! # Policies
//!
//! * **Role policy** — only the toggle and command bindings can start a
//!   session; stop-only bindings are dropped outright unless a session can
//!   actually be stopped.  A press the policy rejects is a logged no-op, not
//!   an error: users mash keys.
//! * **Repeat suppression** — the OS auto-repeats press edges while a key is
//!   held.  A press of a key already in the held set is a repeat and is
//!   dropped.
//! * **Modifier guard** — when a stop binding rides a single modifier that is
//!   also part of the toggle chord (e.g. toggle `Ctrl+Win`, stop `Ctrl`),
//!   firing the stop engages a guard on that modifier.  While engaged, press
//!   edges of the modifier are dropped *and* the modifier does not count
//!   toward other chords, until its release edge clears the guard — exactly
//!   once per release.  A watchdog force-clears a guard whose release edge
//!   never arrives (focus loss can swallow it).
//!
//! All decisions take an explicit `now: Instant`, so any edge sequence can be
//! replayed deterministically in tests.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};

use crate::pipeline::{ControlEvent, RecordingState};

use super::{EdgeDirection, HotkeyBinding, HotkeyRole, KeyEdge, ModifierKey};

// ---------------------------------------------------------------------------
// ModifierGuard
// ---------------------------------------------------------------------------

/// Per-modifier release debounce flag.
///
/// The guard map is created from the binding table at startup: the first
/// registered binding that claims a modifier creates the entry, later
/// bindings sharing the modifier reuse it.
#[derive(Debug, Default)]
struct ModifierGuard {
    awaiting_release: bool,
    engaged_at: Option<Instant>,
}

impl ModifierGuard {
    fn engage(&mut self, now: Instant) {
        self.awaiting_release = true;
        self.engaged_at = Some(now);
    }

    fn clear(&mut self) {
        self.awaiting_release = false;
        self.engaged_at = None;
    }
}

// ---------------------------------------------------------------------------
// EdgeDispatcher
// ---------------------------------------------------------------------------

/// Converts raw press/release edges into abstract controller events.
///
/// Owns all mutable hotkey-layer state (held keys, modifier guards); the
/// controller's state is only *read*, through a `watch` channel, and the
/// state machine's own no-op guards remain the final authority on races.
pub struct EdgeDispatcher {
    bindings: Vec<HotkeyBinding>,
    held: HashSet<rdev::Key>,
    guards: HashMap<ModifierKey, ModifierGuard>,
    watchdog: Duration,
    state_rx: watch::Receiver<RecordingState>,
}

impl EdgeDispatcher {
    /// Build a dispatcher over a validated binding table.
    pub fn new(
        bindings: Vec<HotkeyBinding>,
        watchdog: Duration,
        state_rx: watch::Receiver<RecordingState>,
    ) -> Self {
        let mut guards = HashMap::new();
        for binding in &bindings {
            if let Some(m) = binding.shared_modifier {
                guards.entry(m).or_insert_with(ModifierGuard::default);
            }
        }

        Self {
            bindings,
            held: HashSet::new(),
            guards,
            watchdog,
            state_rx,
        }
    }

    /// Drain raw edges and forward translated events until either channel
    /// closes.
    pub async fn run(
        mut self,
        mut edge_rx: mpsc::Receiver<KeyEdge>,
        event_tx: mpsc::Sender<ControlEvent>,
    ) {
        while let Some(edge) = edge_rx.recv().await {
            if let Some(event) = self.translate(edge, Instant::now()) {
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
        }
        log::info!("hotkey: edge channel closed, dispatcher shutting down");
    }

    /// Translate one raw edge into at most one controller event.
    pub fn translate(&mut self, edge: KeyEdge, now: Instant) -> Option<ControlEvent> {
        self.expire_guards(now);

        match edge.direction {
            EdgeDirection::Release => {
                self.held.remove(&edge.key);

                if let Some(m) = ModifierKey::of_key(edge.key) {
                    if let Some(guard) = self.guards.get_mut(&m) {
                        if guard.awaiting_release {
                            guard.clear();
                            log::debug!("hotkey: guard on {m:?} cleared by release edge");
                        }
                    }
                }
                None
            }

            EdgeDirection::Press => {
                // Guard check comes before everything else: a guarded
                // modifier's press edges are invisible until its release.
                if let Some(m) = ModifierKey::of_key(edge.key) {
                    if self.guard_engaged(m) {
                        log::debug!("hotkey: press of guarded modifier {m:?} ignored");
                        return None;
                    }
                }

                if !self.held.insert(edge.key) {
                    log::debug!("hotkey: repeat press of {:?} ignored", edge.key);
                    return None;
                }

                self.fire(edge.key, now)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn guard_engaged(&self, m: ModifierKey) -> bool {
        self.guards.get(&m).is_some_and(|g| g.awaiting_release)
    }

    /// Force-clear guards whose release edge never arrived.  The wedged
    /// modifier is also dropped from the held set — a missed release means
    /// the key is almost certainly up by now.
    fn expire_guards(&mut self, now: Instant) {
        for (m, guard) in &mut self.guards {
            let expired = guard
                .engaged_at
                .is_some_and(|t| now.duration_since(t) >= self.watchdog);
            if guard.awaiting_release && expired {
                guard.clear();
                for v in m.variants() {
                    self.held.remove(v);
                }
                log::warn!("hotkey: guard on {m:?} force-cleared by watchdog");
            }
        }
    }

    /// A required modifier counts as held only when one of its physical
    /// variants is down and it is not hidden behind an engaged guard.
    fn modifier_satisfied(&self, m: ModifierKey) -> bool {
        !self.guard_engaged(m) && m.variants().iter().any(|v| self.held.contains(v))
    }

    /// Does the press of `key` complete this binding's chord?
    fn completes(&self, binding: &HotkeyBinding, key: rdev::Key) -> bool {
        let combo = &binding.combo;

        match combo.key {
            // Main-key chords fire on the main key's press edge.
            Some(main) => {
                key == main && combo.modifiers.iter().all(|&m| self.modifier_satisfied(m))
            }
            // Modifier-only chords fire on the press of any constituent,
            // once every constituent is down.
            None => {
                let Some(pressed) = ModifierKey::of_key(key) else {
                    return false;
                };
                combo.modifiers.contains(&pressed)
                    && combo.modifiers.iter().all(|&m| self.modifier_satisfied(m))
            }
        }
    }

    /// Pick the binding this press completes (most constituents wins, ties
    /// by registration order) and apply its role policy.
    fn fire(&mut self, key: rdev::Key, now: Instant) -> Option<ControlEvent> {
        let mut best: Option<usize> = None;
        for i in 0..self.bindings.len() {
            if !self.completes(&self.bindings[i], key) {
                continue;
            }
            best = match best {
                Some(j) if self.bindings[j].combo.arity() >= self.bindings[i].combo.arity() => {
                    Some(j)
                }
                _ => Some(i),
            };
        }

        let i = best?;
        let role = self.bindings[i].role;
        let shared = self.bindings[i].shared_modifier;
        let state = *self.state_rx.borrow();

        match (role, state) {
            (HotkeyRole::Toggle, RecordingState::Idle | RecordingState::ModelLoading) => {
                Some(ControlEvent::StartRequested {
                    command_mode: false,
                })
            }
            (HotkeyRole::Toggle, RecordingState::Recording) => {
                Some(ControlEvent::StopRequested { auto_enter: false })
            }

            (HotkeyRole::Command, RecordingState::Idle | RecordingState::ModelLoading) => {
                Some(ControlEvent::StartRequested { command_mode: true })
            }
            (HotkeyRole::Command, RecordingState::Recording) => {
                self.engage_guard(shared, now);
                Some(ControlEvent::StopRequested { auto_enter: false })
            }

            (HotkeyRole::StopAutoEnter, RecordingState::Recording) => {
                self.engage_guard(shared, now);
                Some(ControlEvent::StopRequested { auto_enter: true })
            }
            (HotkeyRole::StopAutoEnter, _) => {
                log::debug!("hotkey: {role:?} press ignored: stop-only");
                None
            }

            (HotkeyRole::Cancel, RecordingState::Recording | RecordingState::Processing) => {
                self.engage_guard(shared, now);
                Some(ControlEvent::CancelRequested)
            }

            (role, state) => {
                log::debug!("hotkey: {role:?} press ignored in state {state:?}");
                None
            }
        }
    }

    fn engage_guard(&mut self, shared: Option<ModifierKey>, now: Instant) {
        if let Some(m) = shared {
            if let Some(guard) = self.guards.get_mut(&m) {
                guard.engage(now);
                log::debug!("hotkey: guard engaged on {m:?}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
