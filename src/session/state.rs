//! Cross-task session flags
//!
//! `SharedSessionState` is written by the control loop and by the transport's
//! event-loop task; `RunFlag` is written by the signal listener. Both are plain
//! atomics: stores use `Release`, loads use `Acquire`, and the promotion to
//! `Connected` is a compare-and-swap so that a concurrent connection-lost
//! store is never overwritten.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Logical state of the single broker session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Connecting,
            2 => SessionState::Connected,
            _ => SessionState::Disconnected,
        }
    }
}

/// Session state shared between the control loop and transport callbacks
#[derive(Debug, Clone)]
pub struct SharedSessionState {
    inner: Arc<AtomicU8>,
}

impl Default for SharedSessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedSessionState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(SessionState::Disconnected as u8)),
        }
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.get() == SessionState::Connected
    }

    pub fn set(&self, state: SessionState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    /// Mark the start of a local connect attempt
    pub fn begin_attempt(&self) {
        self.set(SessionState::Connecting);
    }

    /// Promote `Connecting` to `Connected`.
    ///
    /// Returns false when the state changed underneath the attempt, which only
    /// happens when the transport reported the connection lost mid-birth.
    pub fn promote_to_connected(&self) -> bool {
        self.inner
            .compare_exchange(
                SessionState::Connecting as u8,
                SessionState::Connected as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Unconditional transition to `Disconnected`, returning the previous state
    pub fn mark_lost(&self) -> SessionState {
        SessionState::from_u8(
            self.inner
                .swap(SessionState::Disconnected as u8, Ordering::AcqRel),
        )
    }
}

/// Process-wide "keep running" flag, cleared once on termination
#[derive(Debug, Clone)]
pub struct RunFlag {
    running: Arc<AtomicBool>,
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl RunFlag {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clear the flag. Returns true only for the call that actually flipped it.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }

    /// Sleep for `total`, waking every `tick` to re-check the flag.
    ///
    /// Returns true if the full duration elapsed, false if the flag was cleared.
    pub async fn sleep(&self, total: Duration, tick: Duration) -> bool {
        let deadline = Instant::now() + total;
        loop {
            if !self.is_running() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            tokio::time::sleep((deadline - now).min(tick)).await;
        }
    }
}
