//! Mock line transport for unit testing.
//!
//! # Why a mock transport?
//!
//! The coordinator's interesting behaviour (ordering, shutdown handling,
//! error recovery) is timing-sensitive when driven through a real socket.
//! `MockTransport` replaces the socket with in-memory records:
//!
//! - every line passed to `send_line` is appended to `sent`;
//! - lines pushed with [`MockTransport::push_inbound`] are returned one by
//!   one from `try_read_line`;
//! - failure switches simulate a broken socket.
//!
//! The mock is a cheap handle around shared state, so a test keeps one clone
//! for assertions and moves another into the coordinator.
//!
//! ```ignore
//! let mock = MockTransport::new();
//! let coordinator = ConnectionCoordinator::start(Box::new(mock.clone()), identity, interval)?;
//! mock.push_inbound("CLIENT_NAME:Bob;MESSAGE:Hi");
//! assert_eq!(mock.sent().len(), 1); // the LOGIN envelope
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{LineTransport, TransportError};

#[derive(Debug)]
struct MockState {
    sent: Vec<String>,
    inbound: VecDeque<String>,
    connected: bool,
    close_calls: usize,
    fail_writes: bool,
    fail_reads: bool,
    peer_closed: bool,
}

/// An in-memory transport that records all calls.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a connected mock with no scripted input.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                sent: Vec::new(),
                inbound: VecDeque::new(),
                connected: true,
                close_calls: 0,
                fail_writes: false,
                fail_reads: false,
                peer_closed: false,
            })),
        }
    }

    /// Queues a line for `try_read_line` to return.
    pub fn push_inbound(&self, line: impl Into<String>) {
        self.lock().inbound.push_back(line.into());
    }

    /// Every line successfully sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Number of `close` calls, including no-op repeats.
    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }

    /// Lines pushed with `push_inbound` that have not been read yet.
    pub fn unread_inbound(&self) -> usize {
        self.lock().inbound.len()
    }

    /// When `true`, `send_line` fails like a broken socket.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// When `true`, `try_read_line` fails like a broken socket.
    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Simulates the server closing its end once scripted input runs out.
    pub fn close_from_peer(&self) {
        self.lock().peer_closed = true;
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn broken_pipe() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::BrokenPipe, "mock failure")
}

impl LineTransport for MockTransport {
    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.fail_writes {
            state.connected = false;
            return Err(TransportError::Write(broken_pipe()));
        }
        state.sent.push(line.to_string());
        Ok(())
    }

    fn try_read_line(&mut self) -> Result<Option<String>, TransportError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.fail_reads {
            state.connected = false;
            return Err(TransportError::Read(broken_pipe()));
        }
        match state.inbound.pop_front() {
            Some(line) => Ok(Some(line)),
            None if state.peer_closed => {
                state.connected = false;
                Err(TransportError::Closed)
            }
            None => Ok(None),
        }
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn close(&mut self) {
        let mut state = self.lock();
        state.close_calls += 1;
        state.connected = false;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sent_lines_are_recorded_in_order() {
        let mut mock = MockTransport::new();
        mock.send_line("a").unwrap();
        mock.send_line("b").unwrap();
        assert_eq!(mock.sent(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_clones_share_state() {
        let observer = MockTransport::new();
        let mut inner = observer.clone();

        inner.send_line("shared").unwrap();
        inner.close();

        assert_eq!(observer.sent(), vec!["shared".to_string()]);
        assert!(!observer.is_connected());
    }

    #[test]
    fn test_scripted_inbound_then_none() {
        let mut mock = MockTransport::new();
        mock.push_inbound("one");

        assert_eq!(mock.try_read_line().unwrap().as_deref(), Some("one"));
        assert_eq!(mock.try_read_line().unwrap(), None);
    }

    #[test]
    fn test_fail_writes_disconnects() {
        let mut mock = MockTransport::new();
        mock.set_fail_writes(true);

        assert!(matches!(mock.send_line("x"), Err(TransportError::Write(_))));
        assert!(!mock.is_connected());
    }

    #[test]
    fn test_peer_close_after_scripted_input() {
        let mut mock = MockTransport::new();
        mock.push_inbound("bye");
        mock.close_from_peer();

        assert_eq!(mock.try_read_line().unwrap().as_deref(), Some("bye"));
        assert!(matches!(mock.try_read_line(), Err(TransportError::Closed)));
        assert!(!mock.is_connected());
    }

    #[test]
    fn test_close_counts_every_call() {
        let mut mock = MockTransport::new();
        mock.close();
        mock.close();
        assert_eq!(mock.close_calls(), 2);
    }
}
