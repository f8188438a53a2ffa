//! Error types for the SIMCom AT engine.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures, command outcomes
//! and engine lifecycle errors are all captured here.

use crate::types::Response;

/// The error type for all SIMCom engine operations.
///
/// Command outcomes are split three ways: the modem never answered
/// ([`Error::Timeout`]), the modem answered with an error result code
/// ([`Error::Response`]), or the modem reported success but the result code
/// did not match the pattern the caller asked for ([`Error::Mismatch`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port open, write or read failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// No terminal result line arrived within the command's timeout.
    #[error("timeout waiting for response")]
    Timeout,

    /// The modem answered with an error result code (`ERROR`, `+CME ERROR: …`,
    /// `NO CARRIER`, …). The full response is attached for diagnostics.
    #[error("modem returned error result: {}", .response.result_code)]
    Response {
        /// The response collected up to and including the error code.
        response: Box<Response>,
    },

    /// The modem reported success but the result code did not match the
    /// expected pattern.
    #[error("unexpected result: {}", .response.result_code)]
    Mismatch {
        /// The response whose result code failed the match.
        response: Box<Response>,
    },

    /// The engine was closed before the command could complete.
    #[error("modem closed")]
    Closed,

    /// No engine is running for this modem.
    #[error("not connected")]
    NotConnected,

    /// The connection to the modem was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// A command is already outstanding and the caller asked not to queue.
    #[error("modem busy")]
    Busy,

    /// An invalid parameter was passed to an engine operation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The external PDU codec failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(String),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The response attached to a [`Error::Response`] or [`Error::Mismatch`].
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::Response { response } | Error::Mismatch { response } => Some(response),
            _ => None,
        }
    }

    /// Whether this error ends the engine rather than a single command.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::ConnectionLost | Error::NotConnected | Error::Io(_)
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
