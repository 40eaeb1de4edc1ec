//! Client-side errors.

use eigion_proto::errors::ProtocolError;
use eigion_proto::ErrorCode;
use thiserror::Error;

/// Errors surfaced to client callers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The wire format was violated by either side.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The HTTP transport failed before a response arrived.
    #[error("transport error: {context}")]
    Transport {
        /// Transport-level detail.
        context: String,
    },

    /// The server returned an HTTP failure with no protocol payload.
    #[error("unexpected http status {status}")]
    Http {
        /// The HTTP status code.
        status: u16,
    },

    /// The server advertises no protocol this client speaks.
    #[error("no mutually supported protocol")]
    NoSupportedProtocols,

    /// The server rejected the command.
    #[error("server error {code}: {message}")]
    Server {
        /// The typed error code.
        code: ErrorCode,
        /// The server's description.
        message: String,
    },
}

impl ClientError {
    /// Shorthand for a [`ClientError::Transport`] error.
    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport { context: context.into() }
    }

    /// The server error code, if this is a server rejection.
    pub fn server_code(&self) -> Option<&ErrorCode> {
        match self {
            Self::Server { code, .. } => Some(code),
            _ => None,
        }
    }
}
