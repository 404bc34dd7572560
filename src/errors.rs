//! Unified error types for the expect engine.
//!
//! [`PipeError`] and [`ScriptError`] are the per-subsystem error enums;
//! [`ExpectError`] is the umbrella type every public operation returns,
//! mirroring the `CoreError`/`SessionError`/`FileError` split this crate's
//! error hierarchy is descended from: one top-level enum with `#[from]`
//! conversions from the lower layers, so callers can `match` on variant
//! instead of string-sniffing a message.

use thiserror::Error;

/// Errors surfaced by [`crate::pipe::Pipe`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipeError {
    /// The pipe was closed with no further explanation.
    #[error("pipe closed")]
    Closed,

    /// The pipe was closed after an upstream read/write failure.
    #[error("pipe closed: {0}")]
    ClosedWithReason(String),

    /// A read or write did not complete within its deadline.
    #[error("timed out")]
    Timeout,
}

/// Errors surfaced while parsing or executing a script.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// A line could not be parsed (unknown verb, malformed arguments, an
    /// unterminated `{ ... }` block).
    #[error("{line}: {message} -- {text}")]
    Parse {
        line: usize,
        text: String,
        message: String,
    },

    /// A step ran but failed; `command` names which verb, `line` which
    /// source line.
    #[error("{line}: step '{command}' failed: {source}")]
    Step {
        line: usize,
        command: String,
        #[source]
        source: Box<ExpectError>,
    },
}

/// Top-level error type for every public operation in this crate.
#[derive(Error, Debug)]
pub enum ExpectError {
    /// The underlying byte pipe failed.
    #[error("pipe error: {0}")]
    Pipe(#[from] PipeError),

    /// A low-level I/O error from the injected transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `read_until` exhausted its retry budget or the transport closed
    /// before any of the expected patterns matched.
    #[error("read until '{expected}' failed\r\n{received}")]
    Timeout { expected: String, received: String },

    /// The transport was closed while a read or write was in flight.
    #[error("connection closed")]
    Closed,

    /// A read completed with zero bytes and no error — the transport made
    /// no progress.
    #[error("no progress")]
    NoProgress,

    /// The transport itself reported a connection-level timeout (e.g. a
    /// dial or keepalive timeout surfaced as literal `Network error:` text
    /// in the byte stream).
    #[error("network error: connection timed out: {0}")]
    ProtocolTimeout(String),

    /// Username/password was rejected (one of the default error prompts
    /// matched during login).
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The device reported the command or session lacks permission.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// `Expect` ran for `limit` iterations without settling.
    #[error("retry count exceeded ({limit})")]
    RetryExhausted { limit: usize },

    /// `UserLogin` exhausted its own internal retry budget.
    #[error("user login failed after repeated attempts\r\n{0}")]
    LoginExhausted(String),

    /// A script could not be parsed.
    #[error("script parse error: {0}")]
    ScriptParse(#[from] ScriptError),

    /// A referenced placeholder or session variable was never registered.
    #[error("unknown placeholder or variable '{0}'")]
    UnknownVariable(String),

    /// Catch-all for conditions with no dedicated variant (mirrors the
    /// Go source's bare `errors.New(...)` call sites).
    #[error("{0}")]
    Other(String),
}

impl ExpectError {
    /// True when this error represents a read/write deadline expiring,
    /// as opposed to the transport actually closing.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExpectError::Pipe(PipeError::Timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipe_error_display() {
        assert_eq!(PipeError::Closed.to_string(), "pipe closed");
        assert_eq!(PipeError::Timeout.to_string(), "timed out");
        assert_eq!(
            PipeError::ClosedWithReason("eof".into()).to_string(),
            "pipe closed: eof"
        );
    }

    #[test]
    fn expect_error_from_pipe_error() {
        let err: ExpectError = PipeError::Timeout.into();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "pipe error: timed out");
    }

    #[test]
    fn expect_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broke");
        let err: ExpectError = io_err.into();
        assert_eq!(err.to_string(), "I/O error: broke");
    }

    #[test]
    fn non_timeout_error_is_not_timeout() {
        let err = ExpectError::Closed;
        assert!(!err.is_timeout());
    }

    #[test]
    fn script_error_wraps_expect_error() {
        let inner = ExpectError::PermissionDenied("Access denied".into());
        let script_err = ScriptError::Step {
            line: 12,
            command: "@exec".into(),
            source: Box::new(inner),
        };
        let msg = script_err.to_string();
        assert!(msg.contains("@exec"));
        assert!(msg.contains("12"));
    }
}
