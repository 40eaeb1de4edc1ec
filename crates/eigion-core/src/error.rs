//! Core error types and the central mapping to wire error codes.

use eigion_proto::ErrorCode;
use thiserror::Error;

use crate::store::StoreError;

/// Errors raised inside command handlers.
///
/// Every failure is mapped by kind, at one place, to the error code the
/// client sees; handlers never construct wire responses themselves.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The security policy denied the action.
    #[error("{message}")]
    Security {
        /// Why the action was denied.
        message: String,
    },

    /// A domain validation failed, carrying its specific code.
    #[error("{message}")]
    Domain {
        /// The code forwarded to the client.
        code: ErrorCode,
        /// A human-readable description.
        message: String,
    },

    /// The database failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An unanticipated failure. Full detail is logged server-side; the
    /// client sees only the generic code.
    #[error("{message}")]
    Internal {
        /// Internal detail, never sent to the client.
        message: String,
    },
}

impl CoreError {
    /// A security-policy denial.
    pub fn security(message: impl Into<String>) -> Self {
        Self::Security { message: message.into() }
    }

    /// A domain error with a specific code.
    pub fn domain(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Domain { code, message: message.into() }
    }

    /// A command used incorrectly.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::domain(ErrorCode::UsageError, message)
    }

    /// An entity that does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::domain(ErrorCode::NotFound, message)
    }

    /// An unanticipated failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// The error code this failure maps to on the wire.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Security { .. } => ErrorCode::SecurityPolicyDenied,
            Self::Domain { code, .. } => code.clone(),
            Self::Store(StoreError::Duplicate { .. }) => ErrorCode::GroupRequestDuplicate,
            Self::Store(StoreError::Sql { .. }) => ErrorCode::SqlError,
            Self::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// The message the client is allowed to see.
    ///
    /// Internal failures are replaced with a fixed string; everything else
    /// is already written for clients.
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal { .. } => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_detail_is_not_client_visible() {
        let error = CoreError::internal("connection string was postgres://secret");
        assert_eq!(error.error_code(), ErrorCode::InternalError);
        assert_eq!(error.client_message(), "internal server error");
    }

    #[test]
    fn domain_errors_keep_their_code() {
        let error = CoreError::domain(ErrorCode::GroupRequestWrongState, "already cancelled");
        assert_eq!(error.error_code(), ErrorCode::GroupRequestWrongState);
        assert_eq!(error.client_message(), "already cancelled");
    }
}
