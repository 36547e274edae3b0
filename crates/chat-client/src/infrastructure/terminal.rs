//! Terminal adapters: operator input into the outbound mailbox, inbound
//! mailbox onto the screen.
//!
//! Both adapters run on their own named threads.  The loops themselves take
//! any `BufRead`/`Write`, so tests drive them with in-memory buffers.
//!
//! The input thread is never joined: a read on stdin cannot be cancelled, so
//! the thread may stay parked until the process exits.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chat_core::Mailbox;
use tracing::{debug, warn};

/// Printed before every operator line.
pub const PROMPT: &str = "> ";

/// Reads lines from `reader` into `outbound` until end of input or until
/// `outbound` is closed.
///
/// Line terminators are stripped and blank lines are skipped.  A prompt is
/// written to `prompt_out` before every read.
///
/// # Errors
///
/// Returns the first I/O error from `reader` or `prompt_out`.
pub fn run_input_loop<R: BufRead, W: Write>(
    mut reader: R,
    mut prompt_out: W,
    outbound: &Mailbox,
) -> io::Result<()> {
    let mut line = String::new();
    while !outbound.is_closed() {
        prompt_out.write_all(PROMPT.as_bytes())?;
        prompt_out.flush()?;

        line.clear();
        if reader.read_line(&mut line)? == 0 {
            debug!("end of terminal input");
            return Ok(());
        }
        let text = line.trim_end_matches(['\n', '\r']);
        if text.trim().is_empty() {
            continue;
        }
        outbound.enqueue(text);
    }
    debug!("outbound mailbox closed; input loop stopped");
    Ok(())
}

/// Writes every entry of `inbound` to `out`, one per line, until `inbound`
/// is closed and empty.
///
/// # Errors
///
/// Returns the first write error.
pub fn run_output_loop<W: Write>(inbound: &Mailbox, mut out: W, interval: Duration) -> io::Result<()> {
    loop {
        inbound.wait_for_data(interval);
        let entries = inbound.drain_all();
        if !entries.is_empty() {
            for entry in &entries {
                writeln!(out, "{entry}")?;
            }
            out.flush()?;
        }
        if inbound.is_closed() && inbound.is_empty() {
            return Ok(());
        }
    }
}

/// Spawns the `chat-stdin` thread feeding `outbound` from standard input.
///
/// `on_exit` runs once the loop ends, whether by end of input, a closed
/// mailbox or a read error.
///
/// # Errors
///
/// Returns the error from [`thread::Builder::spawn`].
pub fn spawn_input_reader<F>(outbound: Arc<Mailbox>, on_exit: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name("chat-stdin".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            if let Err(e) = run_input_loop(stdin.lock(), io::stdout(), &outbound) {
                warn!("terminal input failed: {e}");
            }
            on_exit();
        })
}

/// Spawns the `chat-stdout` thread printing `inbound` to standard output.
///
/// # Errors
///
/// Returns the error from [`thread::Builder::spawn`].
pub fn spawn_output_writer(inbound: Arc<Mailbox>, interval: Duration) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("chat-stdout".to_string())
        .spawn(move || {
            if let Err(e) = run_output_loop(&inbound, io::stdout(), interval) {
                warn!("terminal output failed: {e}");
            }
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
