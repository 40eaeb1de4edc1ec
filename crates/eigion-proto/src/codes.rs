//! The error code taxonomy carried by error responses.
//!
//! Codes are string-valued on the wire. The set generated by the server is
//! closed; clients preserve unrecognized strings verbatim so that a newer
//! server can introduce codes without breaking an older client.

use std::fmt;

/// A typed error code.
///
/// This is the only error information that crosses the wire: no stack
/// traces, no internal exception state. Clients dispatch on the code, never
/// on message text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    /// Login failed, or the session is missing or expired.
    AuthenticationError,
    /// The bytes on the wire did not form a valid message, or a content
    /// type did not match.
    ProtocolError,
    /// Version negotiation found no mutually supported protocol.
    NoSupportedProtocols,
    /// The security policy denied the attempted action.
    SecurityPolicyDenied,
    /// The command was used incorrectly, such as paging without a prior
    /// search begin.
    UsageError,
    /// A group creation request was not in the state the command requires.
    GroupRequestWrongState,
    /// A group creation request with this token already exists.
    GroupRequestDuplicate,
    /// A group with this name already exists.
    GroupDuplicate,
    /// The named entity does not exist.
    NotFound,
    /// The database reported an error.
    SqlError,
    /// A transport-level I/O failure.
    IoError,
    /// An unanticipated server-side failure; details are logged server-side
    /// only.
    InternalError,
    /// A code this client does not recognize, preserved verbatim.
    Other(String),
}

impl ErrorCode {
    /// The wire representation of this code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthenticationError => "AUTHENTICATION_ERROR",
            Self::ProtocolError => "PROTOCOL_ERROR",
            Self::NoSupportedProtocols => "NO_SUPPORTED_PROTOCOLS",
            Self::SecurityPolicyDenied => "SECURITY_POLICY_DENIED",
            Self::UsageError => "USAGE_ERROR",
            Self::GroupRequestWrongState => "GROUP_REQUEST_WRONG_STATE",
            Self::GroupRequestDuplicate => "GROUP_REQUEST_DUPLICATE",
            Self::GroupDuplicate => "GROUP_DUPLICATE",
            Self::NotFound => "NOT_FOUND",
            Self::SqlError => "SQL_ERROR",
            Self::IoError => "IO_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Other(code) => code,
        }
    }

    /// Translate a wire string back to a code.
    ///
    /// Unknown strings become [`ErrorCode::Other`] rather than an error;
    /// the taxonomy is forward-compatible by design.
    pub fn from_wire(code: &str) -> Self {
        match code {
            "AUTHENTICATION_ERROR" => Self::AuthenticationError,
            "PROTOCOL_ERROR" => Self::ProtocolError,
            "NO_SUPPORTED_PROTOCOLS" => Self::NoSupportedProtocols,
            "SECURITY_POLICY_DENIED" => Self::SecurityPolicyDenied,
            "USAGE_ERROR" => Self::UsageError,
            "GROUP_REQUEST_WRONG_STATE" => Self::GroupRequestWrongState,
            "GROUP_REQUEST_DUPLICATE" => Self::GroupRequestDuplicate,
            "GROUP_DUPLICATE" => Self::GroupDuplicate,
            "NOT_FOUND" => Self::NotFound,
            "SQL_ERROR" => Self::SqlError,
            "IO_ERROR" => Self::IoError,
            "INTERNAL_ERROR" => Self::InternalError,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_round_trip() {
        let codes = [
            ErrorCode::AuthenticationError,
            ErrorCode::ProtocolError,
            ErrorCode::NoSupportedProtocols,
            ErrorCode::SecurityPolicyDenied,
            ErrorCode::UsageError,
            ErrorCode::GroupRequestWrongState,
            ErrorCode::GroupRequestDuplicate,
            ErrorCode::GroupDuplicate,
            ErrorCode::NotFound,
            ErrorCode::SqlError,
            ErrorCode::IoError,
            ErrorCode::InternalError,
        ];
        for code in codes {
            assert_eq!(ErrorCode::from_wire(code.as_str()), code);
        }
    }

    #[test]
    fn unknown_code_preserved() {
        let code = ErrorCode::from_wire("SOMETHING_NEW");
        assert_eq!(code, ErrorCode::Other("SOMETHING_NEW".to_string()));
        assert_eq!(code.as_str(), "SOMETHING_NEW");
    }
}
