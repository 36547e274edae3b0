//! TCP implementation of [`LineTransport`].
//!
//! The socket stays in blocking mode for writes.  A read switches it to
//! non-blocking for a single `read` call and back again, so
//! [`try_read_line`](LineTransport::try_read_line) returns immediately when
//! nothing is waiting.  This is safe because the coordinator never reads and
//! writes concurrently: both go through the same lock.
//!
//! Bytes are accumulated in `pending` until a `\n` arrives; a trailing `\r`
//! is stripped as well.  Invalid UTF-8 is replaced rather than rejected.  A
//! peer that sends more than [`MAX_LINE_LEN`] bytes without a terminator is
//! disconnected.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{LineTransport, TransportError};

/// Size of one non-blocking read.
const READ_CHUNK: usize = 4096;

/// Longest unterminated input kept while waiting for a line terminator.
pub const MAX_LINE_LEN: usize = 1024 * 1024;

/// Line transport over a TCP stream.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
    /// Received bytes not yet returned as a complete line.
    pending: Vec<u8>,
    max_line_len: usize,
}

impl TcpTransport {
    /// Resolves `host` and connects to the first address that accepts.
    ///
    /// `timeout` bounds each connect attempt and later blocked writes.
    ///
    /// # Errors
    ///
    /// [`TransportError::Resolve`] / [`TransportError::NoAddress`] when the
    /// host cannot be resolved, otherwise [`TransportError::ConnectFailed`]
    /// for the last address tried.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                host: host.to_string(),
                source,
            })?
            .collect();

        let mut last_err = TransportError::NoAddress {
            host: host.to_string(),
        };
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    info!("connected to chat server at {addr}");
                    if let Err(e) = stream.set_write_timeout(Some(timeout)) {
                        warn!("could not set write timeout: {e}");
                    }
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("could not disable Nagle: {e}");
                    }
                    return Ok(Self::from_stream(stream));
                }
                Err(source) => {
                    debug!("connect to {addr} failed: {source}");
                    last_err = TransportError::ConnectFailed { addr, source };
                }
            }
        }
        Err(last_err)
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            peer: stream.peer_addr().ok(),
            stream: Some(stream),
            pending: Vec::new(),
            max_line_len: MAX_LINE_LEN,
        }
    }

    /// Pops one complete line out of `pending`.
    fn take_buffered_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let mut raw: Vec<u8> = self.pending.drain(..=end).collect();
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        Some(String::from_utf8_lossy(&raw).into_owned())
    }
}

/// One `read` with the socket switched to non-blocking mode.
///
/// Blocking mode is restored before the read result is looked at; failing to
/// restore it is reported as the error.
fn read_nonblocking(stream: &mut TcpStream, buf: &mut [u8]) -> io::Result<usize> {
    stream.set_nonblocking(true)?;
    let result = stream.read(buf);
    stream.set_nonblocking(false)?;
    result
}

impl LineTransport for TcpTransport {
    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        let result = stream.write_all(&buf).and_then(|()| stream.flush());
        if let Err(e) = result {
            self.close();
            return Err(TransportError::Write(e));
        }
        Ok(())
    }

    fn try_read_line(&mut self) -> Result<Option<String>, TransportError> {
        if let Some(line) = self.take_buffered_line() {
            return Ok(Some(line));
        }
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        let mut chunk = [0u8; READ_CHUNK];
        match read_nonblocking(stream, &mut chunk) {
            Ok(0) => {
                if !self.pending.is_empty() {
                    debug!(
                        "discarding {} bytes of unterminated input",
                        self.pending.len()
                    );
                }
                self.close();
                Err(TransportError::Closed)
            }
            Ok(n) => {
                self.pending.extend_from_slice(&chunk[..n]);
                if let Some(line) = self.take_buffered_line() {
                    return Ok(Some(line));
                }
                if self.pending.len() > self.max_line_len {
                    warn!(
                        "peer sent {} bytes without a line terminator",
                        self.pending.len()
                    );
                    self.close();
                    return Err(TransportError::LineTooLong {
                        limit: self.max_line_len,
                    });
                }
                Ok(None)
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => Ok(None),
            Err(e) => {
                self.close();
                Err(TransportError::Read(e))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        // Shutdown fails with NotConnected when the peer already reset the
        // connection; the descriptor is released on drop either way.
        match stream.shutdown(Shutdown::Both) {
            Ok(()) => debug!("socket shut down"),
            Err(e) => debug!("socket shutdown failed: {e}"),
        }
        drop(stream);
        self.pending.clear();
        match self.peer {
            Some(peer) => info!("closed connection to {peer}"),
            None => info!("closed connection"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::time::Instant;

    /// Returns a connected (client transport, server-side stream) pair.
    fn pair() -> (TcpTransport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    /// Polls `try_read_line` until it yields something or two seconds pass.
    fn read_line_eventually(
        transport: &mut TcpTransport,
    ) -> Result<Option<String>, TransportError> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            match transport.try_read_line() {
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(5))
                }
                other => return other,
            }
        }
    }

    #[test]
    fn test_connect_is_connected() {
        let (client, _server) = pair();
        assert!(client.is_connected());
    }

    #[test]
    fn test_socket_stays_blocking_for_writes_after_empty_poll() {
        // Arrange – an empty poll toggles non-blocking mode on and off
        let (mut client, server) = pair();
        assert_eq!(client.try_read_line().unwrap(), None);
        let body = "x".repeat(8 * 1024 * 1024);
        let reader = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            let mut received = String::new();
            BufReader::new(server).read_line(&mut received).unwrap();
            received.len()
        });

        // Act – larger than any socket buffer, so a non-blocking socket
        // would fail with WouldBlock part way through
        let result = client.send_line(&body);

        // Assert
        assert!(result.is_ok(), "write failed: {result:?}");
        assert_eq!(reader.join().unwrap(), body.len() + 1);
    }

    #[test]
    fn test_overlong_unterminated_input_disconnects() {
        // Arrange
        let (mut client, mut server) = pair();
        client.max_line_len = 64;
        server.write_all(&[b'a'; 200]).unwrap();
        server.flush().unwrap();

        // Act
        let result = read_line_eventually(&mut client);

        // Assert
        assert!(matches!(result, Err(TransportError::LineTooLong { limit: 64 })));
        assert!(!client.is_connected());
    }

    #[test]
    fn test_terminated_line_under_limit_is_delivered() {
        let (mut client, mut server) = pair();
        client.max_line_len = 64;
        // Terminator arrives in the same chunk, so the limit is not hit.
        server.write_all(b"short\n").unwrap();

        assert_eq!(read_line_eventually(&mut client).unwrap().as_deref(), Some("short"));
    }

    #[test]
    fn test_try_read_line_returns_none_without_data() {
        // Arrange
        let (mut client, _server) = pair();

        // Act
        let started = Instant::now();
        let result = client.try_read_line().unwrap();

        // Assert – must not block
        assert_eq!(result, None);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_try_read_line_strips_terminators() {
        let (mut client, mut server) = pair();
        server.write_all(b"first\r\nsecond\n").unwrap();

        assert_eq!(read_line_eventually(&mut client).unwrap().as_deref(), Some("first"));
        assert_eq!(read_line_eventually(&mut client).unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_partial_line_is_buffered_until_terminator() {
        // Arrange
        let (mut client, mut server) = pair();
        server.write_all(b"hel").unwrap();
        server.flush().unwrap();
        std::thread::sleep(Duration::from_millis(50));

        // Act / Assert – nothing complete yet
        assert_eq!(client.try_read_line().unwrap(), None);

        server.write_all(b"lo\n").unwrap();
        assert_eq!(read_line_eventually(&mut client).unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn test_send_line_appends_newline() {
        let (mut client, server) = pair();
        client.send_line("VERSION_INFO:1.0.0;MESSAGE:hi").unwrap();

        let mut received = String::new();
        BufReader::new(server).read_line(&mut received).unwrap();
        assert_eq!(received, "VERSION_INFO:1.0.0;MESSAGE:hi\n");
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut client, _server) = pair();

        client.close();
        client.close();

        assert!(!client.is_connected());
    }

    #[test]
    fn test_send_after_close_is_not_connected() {
        let (mut client, _server) = pair();
        client.close();

        assert!(matches!(
            client.send_line("late"),
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            client.try_read_line(),
            Err(TransportError::NotConnected)
        ));
    }

    #[test]
    fn test_peer_close_disconnects_transport() {
        let (mut client, server) = pair();
        drop(server);

        let result = read_line_eventually(&mut client);

        assert!(matches!(result, Err(TransportError::Closed)));
        assert!(!client.is_connected());
    }

    #[test]
    fn test_lines_received_before_peer_close_are_delivered() {
        let (mut client, mut server) = pair();
        server.write_all(b"last words\n").unwrap();
        drop(server);

        assert_eq!(
            read_line_eventually(&mut client).unwrap().as_deref(),
            Some("last words")
        );
    }

    #[test]
    fn test_connect_to_closed_port_fails() {
        // Arrange – grab a free port, then release it
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        // Act
        let result = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(2));

        // Assert
        assert!(matches!(result, Err(TransportError::ConnectFailed { .. })));
    }
}
