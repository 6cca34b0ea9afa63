//! Pause and stop signalling shared by the pipeline phases.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct ControlState {
    paused: bool,
    stopped: bool,
}

/// Pause/stop flags with blocking wait support.
///
/// Phases call [`ScanControl::wait_while_paused`] at their iteration
/// boundaries (each walked entry, each claimed batch). Pausing therefore never
/// interrupts a file that is already being hashed or extracted.
#[derive(Debug, Default)]
pub struct ScanControl {
    state: Mutex<ControlState>,
    changed: Condvar,
}

impl ScanControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear both flags for a new run.
    pub fn reset(&self) {
        *self.lock() = ControlState::default();
        self.changed.notify_all();
    }

    /// Request a pause; returns `true` if the state changed.
    pub fn pause(&self) -> bool {
        let mut state = self.lock();
        if state.paused || state.stopped {
            return false;
        }
        state.paused = true;
        true
    }

    /// Lift a pause; returns `true` if the state changed.
    pub fn resume(&self) -> bool {
        let mut state = self.lock();
        if !state.paused {
            return false;
        }
        state.paused = false;
        drop(state);
        self.changed.notify_all();
        true
    }

    /// Request a stop and wake every paused phase; returns `true` if the
    /// state changed.
    pub fn stop(&self) -> bool {
        let mut state = self.lock();
        if state.stopped {
            return false;
        }
        state.stopped = true;
        state.paused = false;
        drop(state);
        self.changed.notify_all();
        true
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Block while paused. Returns `false` if the run was stopped and the
    /// caller must abandon its current work.
    pub fn wait_while_paused(&self) -> bool {
        let mut state = self.lock();
        while state.paused && !state.stopped {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        !state.stopped
    }
}
