//! Protocol error types.

use thiserror::Error;

/// Errors arising while encoding or decoding protocol data.
///
/// These are transport-level failures: the bytes on the wire do not form a
/// valid message for the codec in use. They are distinct from the
/// [`crate::codes::ErrorCode`] taxonomy that crosses the wire inside an
/// error response.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is shorter than the fixed header.
    #[error("message truncated: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Minimum number of bytes required.
        expected: usize,
        /// Number of bytes actually present.
        actual: usize,
    },

    /// The header magic number did not match.
    #[error("invalid magic number: 0x{actual:08x} (expected 0x{expected:08x})")]
    InvalidMagic {
        /// Expected magic value.
        expected: u32,
        /// Value found on the wire.
        actual: u32,
    },

    /// The frame was produced by a different protocol or version.
    #[error("unsupported protocol or version: {context}")]
    UnsupportedProtocol {
        /// Description of the mismatch.
        context: String,
    },

    /// The header carries a message kind this codec does not know.
    #[error("unrecognized message kind: 0x{kind:04x}")]
    UnrecognizedKind {
        /// Kind tag found on the wire.
        kind: u16,
    },

    /// The declared payload length disagrees with the frame, or exceeds the
    /// limit.
    #[error("invalid payload length: {context}")]
    InvalidLength {
        /// Description of the disagreement.
        context: String,
    },

    /// The CBOR payload could not be encoded or decoded.
    #[error("payload encoding error: {context}")]
    Cbor {
        /// Underlying encoder or decoder message.
        context: String,
    },

    /// A decoded value failed domain validation.
    ///
    /// Covers unrecognized enumeration values, malformed identifiers,
    /// out-of-range page sizes and over-long strings. Never coerced.
    #[error("invalid value for {field}: {context}")]
    Validity {
        /// Field whose value was rejected.
        field: &'static str,
        /// Why the value was rejected.
        context: String,
    },
}

impl ProtocolError {
    /// Shorthand for a [`ProtocolError::Validity`] error.
    pub fn validity(field: &'static str, context: impl Into<String>) -> Self {
        Self::Validity { field, context: context.into() }
    }
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
