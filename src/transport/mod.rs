//! Request/response plumbing towards the engine and the policy server.
//!
//! Two transports are provided:
//! - [`HttpTransport`]: blocking HTTP with a bounded timeout per call
//! - [`ResponseReader`]: line-oriented reads over a child process' stdout, framed by
//!   [`Framing`]
//!
//! Both return a [`TransportError`] instead of panicking. Callers above this layer are
//! expected to degrade to a safe default and shout about it with [`warn_fallback`].

use std::time::Duration;

mod http;
mod pipe;

pub use http::HttpTransport;
pub use pipe::{Framing, ResponseReader};

/// Everything that can go wrong between asking the engine (or the policy) something and
/// getting a JSON value back.
#[derive(Debug)]
pub enum TransportError {
    /// Could not reach the other side at all.
    Connect(String),
    /// No (complete) answer within the allowed duration.
    Timeout(Duration),
    /// The server answered with a non-2xx status.
    Status(u16),
    /// The engine process closed its output or is gone.
    Closed,
    /// Any other I/O failure.
    Io(std::io::Error),
    /// The answer was not valid JSON (or not the expected shape).
    Parse(String),
}

impl TransportError {
    /// Parse failures and transport failures are reported differently.
    pub fn is_parse(&self) -> bool {
        matches!(self, TransportError::Parse(_))
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Connect(msg) => write!(f, "connection failed: {msg}"),
            TransportError::Timeout(d) => write!(f, "no response after {d:?}"),
            TransportError::Status(code) => write!(f, "unexpected HTTP status {code}"),
            TransportError::Closed => write!(f, "engine closed the connection"),
            TransportError::Io(e) => write!(f, "I/O error: {e}"),
            TransportError::Parse(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::UnexpectedEof => {
                TransportError::Closed
            }
            _ => TransportError::Io(e),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Parse(e.to_string())
    }
}

/// Log a fallback loudly: a `warn!` event and a red banner on stderr.
///
/// Used every time a failure is swallowed and replaced by a default value, so that an
/// unattended run never silently plays garbage.
pub fn warn_fallback(what: &str, error: &TransportError, replacement: &str) {
    let kind = if error.is_parse() { "parse" } else { "transport" };
    tracing::warn!(%error, kind, replacement, "FALLBACK: {what}");
    // red, banner, reset
    eprintln!(
        "\x1b[91m{bar}\n FALLBACK ({kind}): {what}: {error}\n    Using {replacement} instead!\n{bar}\x1b[0m",
        bar = "=".repeat(60)
    );
}
