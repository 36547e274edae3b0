//! Connection state machine.
//!
//! A session only ever moves forward:
//!
//! ```text
//! Connecting ──► Connected ──► ShuttingDown ──► Closed
//! ```
//!
//! [`StateCell`] stores the current state behind a mutex and signals a
//! condition variable on every transition.  The receive loop sleeps on that
//! signal with a timeout, so a shutdown wakes it at once while the timeout
//! keeps it polling the socket.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Lifecycle of one connection.  Ordering follows the legal direction of
/// travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectionState {
    /// Socket open, `LOGIN` not yet sent.
    Connecting,
    /// Loops are running.
    Connected,
    /// The session is ending; loops stop at their next check.
    ShuttingDown,
    /// Transport released.
    Closed,
}

/// Returned when a transition would not move the state forward.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal connection state transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// Shared, observable [`ConnectionState`].
#[derive(Debug)]
pub struct StateCell {
    state: Mutex<ConnectionState>,
    changed: Condvar,
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCell {
    /// Starts in [`ConnectionState::Connecting`].
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Connecting),
            changed: Condvar::new(),
        }
    }

    /// Current state.
    pub fn get(&self) -> ConnectionState {
        *self.lock()
    }

    /// Moves to `to` if that is strictly forward, waking every waiter.
    ///
    /// Returns the previous state.  Skipping intermediate states is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if `to` is not after the current state.
    pub fn advance(&self, to: ConnectionState) -> Result<ConnectionState, TransitionError> {
        let mut state = self.lock();
        let from = *state;
        if to <= from {
            return Err(TransitionError { from, to });
        }
        *state = to;
        drop(state);
        debug!("connection state {from:?} -> {to:?}");
        self.changed.notify_all();
        Ok(from)
    }

    /// Sleeps while the state is still `current`, at most `timeout`.
    ///
    /// Returns the state observed on waking.
    pub fn wait_while_in(&self, current: ConnectionState, timeout: Duration) -> ConnectionState {
        let guard = self.lock();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |state| *state == current)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    /// Blocks until the state is at or beyond `target`.
    pub fn wait_until_reached(&self, target: ConnectionState) -> ConnectionState {
        let guard = self.lock();
        let guard = self
            .changed
            .wait_while(guard, |state| *state < target)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    /// Like [`wait_until_reached`](Self::wait_until_reached) but gives up
    /// after `timeout`.  Returns `true` if `target` was reached.
    pub fn wait_until_reached_for(&self, target: ConnectionState, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |state| *state < target)
            .unwrap_or_else(PoisonError::into_inner);
        *guard >= target
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use ConnectionState::{Closed, Connected, Connecting, ShuttingDown};

    #[test]
    fn test_starts_connecting() {
        assert_eq!(StateCell::new().get(), Connecting);
    }

    #[test]
    fn test_full_forward_path() {
        let cell = StateCell::new();
        assert_eq!(cell.advance(Connected), Ok(Connecting));
        assert_eq!(cell.advance(ShuttingDown), Ok(Connected));
        assert_eq!(cell.advance(Closed), Ok(ShuttingDown));
        assert_eq!(cell.get(), Closed);
    }

    #[test]
    fn test_skipping_forward_is_allowed() {
        let cell = StateCell::new();
        cell.advance(Connected).unwrap();
        assert_eq!(cell.advance(Closed), Ok(Connected));
    }

    #[test]
    fn test_backward_transition_is_rejected() {
        // Arrange
        let cell = StateCell::new();
        cell.advance(ShuttingDown).unwrap();

        // Act
        let result = cell.advance(Connected);

        // Assert
        assert_eq!(
            result,
            Err(TransitionError {
                from: ShuttingDown,
                to: Connected
            })
        );
        assert_eq!(cell.get(), ShuttingDown, "state must not change");
    }

    #[test]
    fn test_same_state_transition_is_rejected() {
        let cell = StateCell::new();
        cell.advance(Connected).unwrap();
        assert!(cell.advance(Connected).is_err());
    }

    #[test]
    fn test_wait_while_in_times_out_without_change() {
        let cell = StateCell::new();
        cell.advance(Connected).unwrap();

        let started = Instant::now();
        let observed = cell.wait_while_in(Connected, Duration::from_millis(20));

        assert_eq!(observed, Connected);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_while_in_wakes_on_transition() {
        // Arrange
        let cell = Arc::new(StateCell::new());
        cell.advance(Connected).unwrap();
        let waiter = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.wait_while_in(Connected, Duration::from_secs(10)))
        };

        // Act
        thread::sleep(Duration::from_millis(20));
        cell.advance(ShuttingDown).unwrap();

        // Assert
        assert_eq!(waiter.join().unwrap(), ShuttingDown);
    }

    #[test]
    fn test_wait_until_reached_returns_later_state() {
        let cell = Arc::new(StateCell::new());
        let waiter = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.wait_until_reached(ShuttingDown))
        };

        cell.advance(Connected).unwrap();
        cell.advance(Closed).unwrap();

        assert_eq!(waiter.join().unwrap(), Closed);
    }

    #[test]
    fn test_wait_until_reached_for_gives_up() {
        let cell = StateCell::new();
        assert!(!cell.wait_until_reached_for(Closed, Duration::from_millis(10)));
        cell.advance(Closed).unwrap();
        assert!(cell.wait_until_reached_for(Closed, Duration::from_millis(10)));
    }
}
