use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, trace};

use super::TransportError;

/// How the end of a response is detected on an un-framed line stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// Accumulate lines until a line ending in `}` or `]` closes a parseable document.
    /// Lines before the first `{` or `[` are skipped.
    ///
    /// This is best effort: the engine emits pretty-printed JSON with no length prefix.
    /// It is always bounded by the read timeout.
    #[default]
    Heuristic,
    /// One complete JSON document per line.
    JsonLines,
}

/// Reads framed JSON responses from the lines of a child process' stdout.
///
/// Lines are delivered through a channel so that every read can be bounded with a timeout.
#[derive(Debug)]
pub struct ResponseReader {
    lines: Receiver<String>,
    framing: Framing,
}

impl ResponseReader {
    pub fn new(lines: Receiver<String>, framing: Framing) -> ResponseReader {
        ResponseReader { lines, framing }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Discard everything already received. Returns the number of discarded lines.
    ///
    /// Returns `Err(TransportError::Closed)` if the stream ended and nothing was left.
    pub fn drain(&self) -> Result<usize, TransportError> {
        let mut count = 0;
        loop {
            match self.lines.try_recv() {
                Ok(line) => {
                    debug!(line, "discarding stale engine output");
                    count += 1;
                }
                Err(TryRecvError::Empty) => return Ok(count),
                Err(TryRecvError::Disconnected) if count == 0 => return Err(TransportError::Closed),
                Err(TryRecvError::Disconnected) => return Ok(count),
            }
        }
    }

    /// Wait for one complete response, for at most `timeout`.
    pub fn read_response(&self, timeout: Duration) -> Result<Value, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut buffer = String::new();
        let mut closed = false;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let line = match self.lines.recv_timeout(remaining) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    closed = true;
                    break;
                }
            };
            trace!(line, "engine output");

            match self.framing {
                Framing::JsonLines => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Ok(serde_json::from_str(&line)?);
                }
                Framing::Heuristic => {
                    if buffer.is_empty() && !opens_document(&line) {
                        debug!(line, "skipping non-JSON engine output");
                        continue;
                    }
                    buffer.push_str(&line);
                    buffer.push('\n');
                    if closes_document(&line) {
                        if let Ok(value) = serde_json::from_str(&buffer) {
                            return Ok(value);
                        }
                    }
                }
            }
        }

        if buffer.trim().is_empty() {
            return Err(if closed {
                TransportError::Closed
            } else {
                TransportError::Timeout(timeout)
            });
        }
        // partial answer, last chance
        Ok(serde_json::from_str(&buffer)?)
    }
}

fn opens_document(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with('{') || line.starts_with('[')
}

fn closes_document(line: &str) -> bool {
    let line = line.trim_end();
    line.ends_with('}') || line.ends_with(']')
}
