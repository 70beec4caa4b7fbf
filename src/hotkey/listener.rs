//! Dedicated OS-thread hotkey listener using `rdev::listen`.
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread.
//! [`HotkeyListener`] owns that thread and a stop flag; dropping it sets the
//! flag so the callback silently ignores further events.
//!
//! Only edges for the configured binding keys (see
//! [`crate::hotkey::watched_keys`]) are forwarded — every other keystroke is
//! discarded inside the callback and never leaves the listener thread.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has **no graceful shutdown API**.  Setting the stop flag
//! prevents events from being forwarded, but the OS thread itself will remain
//! blocked in the rdev event loop until the process exits.  This is safe and
//! expected — rdev holds no resources that need explicit cleanup.

use std::collections::HashSet;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use super::KeyEdge;

// ---------------------------------------------------------------------------
// HotkeyListener
// ---------------------------------------------------------------------------

/// Handle to a running hotkey listener thread.
///
/// Construct one with [`HotkeyListener::start`].  Drop it to stop forwarding
/// edges.
///
/// The underlying OS thread will continue to exist until the process exits
/// because `rdev::listen` cannot be interrupted, but it will silently discard
/// all events once the stop flag is set.
pub struct HotkeyListener {
    /// Shared stop flag — set `true` on [`Drop`].
    stop: Arc<AtomicBool>,
    /// The thread handle.  Kept alive so the thread is not detached
    /// prematurely; we never `join` it because `rdev::listen` never returns.
    _thread: std::thread::JoinHandle<()>,
}

impl HotkeyListener {
    /// Spawn a dedicated OS thread that listens for global key events and
    /// forwards a [`KeyEdge`] on `tx` for every press or release of a key in
    /// `watched`.
    ///
    /// # Arguments
    ///
    /// * `watched` — the physical keys to forward, typically from
    ///   [`crate::hotkey::watched_keys`].
    /// * `tx` — a `tokio::sync::mpsc` sender.  The background thread uses
    ///   `blocking_send` so it works correctly from a non-async context.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the thread (extremely unlikely).
    pub fn start(watched: HashSet<rdev::Key>, tx: mpsc::Sender<KeyEdge>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    // Bail out if the listener has been stopped.
                    if stop_clone.load(Ordering::Relaxed) {
                        return;
                    }

                    let edge = match event.event_type {
                        rdev::EventType::KeyPress(k) if watched.contains(&k) => {
                            KeyEdge::press(k)
                        }
                        rdev::EventType::KeyRelease(k) if watched.contains(&k) => {
                            KeyEdge::release(k)
                        }
                        _ => return,
                    };

                    // blocking_send is safe to call from non-async threads.
                    let _ = tx.blocking_send(edge);
                });

                if let Err(e) = result {
                    log::error!("hotkey-listener: rdev::listen exited with error: {:?}", e);
                }
            })
            .expect("failed to spawn hotkey-listener thread");

        Self {
            stop,
            _thread: thread,
        }
    }
}

impl Drop for HotkeyListener {
    /// Set the stop flag so the rdev callback stops forwarding edges.
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // The OS thread continues to exist blocked inside rdev::listen until
        // the process exits — this is safe and requires no further cleanup.
    }
}
