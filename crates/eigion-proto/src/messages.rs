//! The closed command and response unions.
//!
//! Every command declares the response kind it expects; an error response is
//! additionally a valid reply to any command. Commands carry no request id:
//! the server assigns one per request and echoes it in the response.

use uuid::Uuid;

use crate::codes::ErrorCode;
use crate::model::{
    AuditEvent, AuditFilter, GroupCreationRequest, GroupName, Page, RequestToken, User,
};

/// A command sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Authenticate and open a session.
    Login {
        /// The user name.
        user_name: String,
        /// The password.
        password: String,
    },
    /// Close the current session.
    Logout,
    /// Open a group creation request.
    GroupCreateBegin {
        /// The name of the group to create.
        group_name: GroupName,
    },
    /// Complete an in-progress group creation request.
    GroupCreateReady {
        /// The token of the request to complete.
        token: RequestToken,
    },
    /// Cancel an in-progress group creation request.
    GroupCreateCancel {
        /// The token of the request to cancel.
        token: RequestToken,
    },
    /// Begin a search over the caller's group creation requests.
    GroupCreateRequestsBegin {
        /// Items per page.
        page_size: u32,
    },
    /// Advance the group-creation-request search to the next page.
    GroupCreateRequestsNext,
    /// Move the group-creation-request search to the previous page.
    GroupCreateRequestsPrevious,
    /// Begin a search over groups by name.
    GroupSearchBegin {
        /// Substring to match against group names; empty matches all.
        query: String,
        /// Items per page.
        page_size: u32,
    },
    /// Advance the group search to the next page.
    GroupSearchNext,
    /// Move the group search to the previous page.
    GroupSearchPrevious,
    /// Begin a search over the audit log.
    AuditSearchBegin {
        /// The audit filter.
        filter: AuditFilter,
        /// Items per page.
        page_size: u32,
    },
    /// Advance the audit search to the next page.
    AuditSearchNext,
    /// Move the audit search to the previous page.
    AuditSearchPrevious,
}

impl Command {
    /// The stable name of this command variant, used for trace spans,
    /// policy actions and audit events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::GroupCreateBegin { .. } => "GROUP_CREATE_BEGIN",
            Self::GroupCreateReady { .. } => "GROUP_CREATE_READY",
            Self::GroupCreateCancel { .. } => "GROUP_CREATE_CANCEL",
            Self::GroupCreateRequestsBegin { .. } => "GROUP_CREATE_REQUESTS_BEGIN",
            Self::GroupCreateRequestsNext => "GROUP_CREATE_REQUESTS_NEXT",
            Self::GroupCreateRequestsPrevious => "GROUP_CREATE_REQUESTS_PREVIOUS",
            Self::GroupSearchBegin { .. } => "GROUP_SEARCH_BEGIN",
            Self::GroupSearchNext => "GROUP_SEARCH_NEXT",
            Self::GroupSearchPrevious => "GROUP_SEARCH_PREVIOUS",
            Self::AuditSearchBegin { .. } => "AUDIT_SEARCH_BEGIN",
            Self::AuditSearchNext => "AUDIT_SEARCH_NEXT",
            Self::AuditSearchPrevious => "AUDIT_SEARCH_PREVIOUS",
        }
    }

    /// The response kind this command expects on success.
    pub fn response_kind(&self) -> ResponseKind {
        match self {
            Self::Login { .. } => ResponseKind::Login,
            Self::Logout => ResponseKind::Logout,
            Self::GroupCreateBegin { .. } => ResponseKind::GroupCreateBegin,
            Self::GroupCreateReady { .. } => ResponseKind::GroupCreateReady,
            Self::GroupCreateCancel { .. } => ResponseKind::GroupCreateCancel,
            Self::GroupCreateRequestsBegin { .. }
            | Self::GroupCreateRequestsNext
            | Self::GroupCreateRequestsPrevious => ResponseKind::GroupRequestsPage,
            Self::GroupSearchBegin { .. } | Self::GroupSearchNext | Self::GroupSearchPrevious => {
                ResponseKind::GroupsPage
            }
            Self::AuditSearchBegin { .. } | Self::AuditSearchNext | Self::AuditSearchPrevious => {
                ResponseKind::AuditPage
            }
        }
    }
}

/// The kind of a response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// An error response.
    Error,
    /// A login response.
    Login,
    /// A logout response.
    Logout,
    /// A group-creation-begin response.
    GroupCreateBegin,
    /// A group-creation-ready response.
    GroupCreateReady,
    /// A group-creation-cancel response.
    GroupCreateCancel,
    /// A page of group creation requests.
    GroupRequestsPage,
    /// A page of group names.
    GroupsPage,
    /// A page of audit events.
    AuditPage,
}

/// The payload of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePayload {
    /// The command failed; valid as a reply to any command.
    Error {
        /// The typed error code.
        code: ErrorCode,
        /// A human-readable description.
        message: String,
    },
    /// Login succeeded.
    Login {
        /// The authenticated user.
        user: User,
    },
    /// Logout succeeded.
    Logout,
    /// A group creation request was opened.
    GroupCreateBegin {
        /// The token of the new request.
        token: RequestToken,
    },
    /// A group creation request completed.
    GroupCreateReady,
    /// A group creation request was cancelled.
    GroupCreateCancel,
    /// A page of the caller's group creation requests.
    GroupRequestsPage {
        /// The page.
        page: Page<GroupCreationRequest>,
    },
    /// A page of group names.
    GroupsPage {
        /// The page.
        page: Page<GroupName>,
    },
    /// A page of audit events.
    AuditPage {
        /// The page.
        page: Page<AuditEvent>,
    },
}

impl ResponsePayload {
    /// The kind of this payload.
    pub fn kind(&self) -> ResponseKind {
        match self {
            Self::Error { .. } => ResponseKind::Error,
            Self::Login { .. } => ResponseKind::Login,
            Self::Logout => ResponseKind::Logout,
            Self::GroupCreateBegin { .. } => ResponseKind::GroupCreateBegin,
            Self::GroupCreateReady => ResponseKind::GroupCreateReady,
            Self::GroupCreateCancel => ResponseKind::GroupCreateCancel,
            Self::GroupRequestsPage { .. } => ResponseKind::GroupRequestsPage,
            Self::GroupsPage { .. } => ResponseKind::GroupsPage,
            Self::AuditPage { .. } => ResponseKind::AuditPage,
        }
    }

    /// Whether this payload is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// A response to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The server-assigned correlation id for the request.
    pub request_id: Uuid,
    /// The response payload.
    pub payload: ResponsePayload,
}

impl Response {
    /// Construct a successful response.
    pub fn new(request_id: Uuid, payload: ResponsePayload) -> Self {
        Self { request_id, payload }
    }

    /// Construct an error response.
    pub fn error(request_id: Uuid, code: ErrorCode, message: impl Into<String>) -> Self {
        Self { request_id, payload: ResponsePayload::Error { code, message: message.into() } }
    }
}

/// The transport unit: a command or a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A command sent by a client.
    Command(Command),
    /// A response sent by a server.
    Response(Response),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_commands_share_a_response_kind() {
        assert_eq!(
            Command::AuditSearchBegin { filter: AuditFilter::default(), page_size: 10 }
                .response_kind(),
            ResponseKind::AuditPage
        );
        assert_eq!(Command::AuditSearchNext.response_kind(), ResponseKind::AuditPage);
        assert_eq!(Command::AuditSearchPrevious.response_kind(), ResponseKind::AuditPage);
    }

    #[test]
    fn error_payload_is_error() {
        let payload = ResponsePayload::Error {
            code: ErrorCode::UsageError,
            message: "no search is in progress".to_string(),
        };
        assert!(payload.is_error());
        assert_eq!(payload.kind(), ResponseKind::Error);
    }
}
