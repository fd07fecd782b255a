use std::{
    sync::{Condvar, Mutex, PoisonError},
    time::Duration,
};

/// Enums the different errors possible when driving the session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },
}

/// Phase of the single receive-then-send session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Receiving,
    Sending,
    Idle,
}

impl SessionState {
    /// The only legal edges are Receiving to Sending and Sending to Idle.
    /// Idle is terminal and nothing ever returns to Receiving.
    fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Receiving, SessionState::Sending)
                | (SessionState::Sending, SessionState::Idle)
        )
    }
}

/// Synchronized cell holding the state shared by the receive and send
/// tasks. Transitions notify waiters, so the sender blocks on the cell
/// instead of spinning, and the lock makes a transition visible to the
/// other task before it can observe the new state.
pub struct SessionFlag {
    state: Mutex<SessionState>,
    changed: Condvar,
}

impl SessionFlag {
    pub fn new() -> Self {
        SessionFlag {
            state: Mutex::new(SessionState::Receiving),
            changed: Condvar::new(),
        }
    }

    pub fn current(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the state from `from` to `to` and wakes every waiter. Fails
    /// when the current state is not `from` or the edge is not a legal one.
    pub fn transition(&self, from: SessionState, to: SessionState) -> Result<(), StateError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != from || !from.can_transition_to(to) {
            return Err(StateError::InvalidTransition { from: *state, to });
        }
        *state = to;
        self.changed.notify_all();
        Ok(())
    }

    /// Blocks until the state equals `target` or `poll_interval` elapses,
    /// whichever comes first, and reports whether it was reached. Callers
    /// re-invoke this in a loop so a shutdown request is noticed between
    /// waits.
    pub fn wait_for(&self, target: SessionState, poll_interval: Duration) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (state, _) = self
            .changed
            .wait_timeout_while(state, poll_interval, |current| *current != target)
            .unwrap_or_else(PoisonError::into_inner);
        *state == target
    }
}

impl Default for SessionFlag {
    fn default() -> Self {
        Self::new()
    }
}
