//! Domain model types shared by clients and servers.
//!
//! These are the rich in-memory forms. Their wire representations live in
//! [`crate::wire_v1`] behind explicit mapping tables; nothing here derives a
//! wire encoding directly.

use std::collections::BTreeSet;
use std::fmt;

use uuid::Uuid;

use crate::errors::ProtocolError;

/// Upper bound on group name length, in bytes.
pub const GROUP_NAME_MAX_LENGTH: usize = 64;

/// Length of a request token in hexadecimal characters.
pub const REQUEST_TOKEN_LENGTH: usize = 32;

/// A permission held by a user.
///
/// The set is closed: permissions are checked explicitly, never inferred
/// from other permissions or from roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    /// May create groups.
    GroupCreate,
    /// May search and read groups.
    GroupRead,
    /// May search the audit log.
    AuditRead,
    /// May use the Amberjack administrative protocol at all.
    AmberjackAccess,
}

impl Permission {
    /// Every permission, in wire order.
    pub const ALL: [Self; 4] =
        [Self::GroupCreate, Self::GroupRead, Self::AuditRead, Self::AmberjackAccess];
}

/// An authenticated user: identity plus granted permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// The user's unique identifier.
    pub id: Uuid,
    /// The permissions granted to the user.
    pub permissions: BTreeSet<Permission>,
}

impl User {
    /// Whether the user holds `permission`.
    pub fn holds(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// A validated group name.
///
/// Names are lowercase dotted segments, reverse-DNS style: each segment
/// starts with a letter and continues with letters, digits or `_`, and the
/// whole name is at most [`GROUP_NAME_MAX_LENGTH`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupName(String);

impl GroupName {
    /// Validate and construct a group name.
    pub fn new(name: impl Into<String>) -> Result<Self, ProtocolError> {
        let name = name.into();
        if name.is_empty() || name.len() > GROUP_NAME_MAX_LENGTH {
            return Err(ProtocolError::validity(
                "group_name",
                format!("length must be 1..={GROUP_NAME_MAX_LENGTH} bytes"),
            ));
        }
        for segment in name.split('.') {
            let mut chars = segment.chars();
            let valid_head = chars.next().is_some_and(|c| c.is_ascii_lowercase());
            let valid_tail =
                chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
            if !(valid_head && valid_tail) {
                return Err(ProtocolError::validity(
                    "group_name",
                    format!("invalid segment {segment:?}"),
                ));
            }
        }
        Ok(Self(name))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The token uniquely identifying a group creation request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(String);

impl RequestToken {
    /// Validate and construct a token: exactly [`REQUEST_TOKEN_LENGTH`]
    /// lowercase hexadecimal characters.
    pub fn new(token: impl Into<String>) -> Result<Self, ProtocolError> {
        let token = token.into();
        let valid = token.len() == REQUEST_TOKEN_LENGTH
            && token.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if valid {
            Ok(Self(token))
        } else {
            Err(ProtocolError::validity(
                "token",
                format!("must be {REQUEST_TOKEN_LENGTH} lowercase hex characters"),
            ))
        }
    }

    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The state machine of a group creation request.
///
/// Transitions are one-way: `InProgress` may move to any terminal state,
/// and terminal states never change again. Times are unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStatus {
    /// The request is open and may still complete or be cancelled.
    InProgress {
        /// When the request was created.
        time_started: u64,
    },
    /// The request completed and the group was created.
    Succeeded {
        /// When the request was created.
        time_started: u64,
        /// When the request completed.
        time_completed: u64,
    },
    /// The request failed.
    Failed {
        /// When the request was created.
        time_started: u64,
        /// When the request failed.
        time_completed: u64,
        /// A human-readable failure description.
        message: String,
    },
    /// The founder cancelled the request.
    Cancelled {
        /// When the request was created.
        time_started: u64,
        /// When the request was cancelled.
        time_completed: u64,
    },
}

impl RequestStatus {
    /// When the request was created, regardless of state.
    pub fn time_started(&self) -> u64 {
        match self {
            Self::InProgress { time_started }
            | Self::Succeeded { time_started, .. }
            | Self::Failed { time_started, .. }
            | Self::Cancelled { time_started, .. } => *time_started,
        }
    }

    /// Whether the request may still transition.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress { .. })
    }
}

/// A request to create a group, uniquely identified by its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCreationRequest {
    /// The name of the group to create.
    pub group_name: GroupName,
    /// The user that opened the request.
    pub founder: Uuid,
    /// The token identifying the request.
    pub token: RequestToken,
    /// The current state of the request.
    pub status: RequestStatus,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// The items on this page, in search order.
    pub items: Vec<T>,
    /// The 1-based index of this page.
    pub page_index: u64,
    /// The total number of pages for the current result set.
    pub page_count: u64,
    /// The total number of matching items.
    pub total_count: u64,
}

impl<T> Page<T> {
    /// Map the items of this page, preserving paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page_index: self.page_index,
            page_count: self.page_count,
            total_count: self.total_count,
        }
    }
}

/// One entry in the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// The event's server-assigned sequence number.
    pub id: u64,
    /// When the event occurred, unix milliseconds.
    pub time: u64,
    /// The user that caused the event.
    pub owner: Uuid,
    /// The event kind, such as `GROUP_CREATE_BEGIN`.
    pub kind: String,
    /// Event detail.
    pub message: String,
}

/// Filter parameters for an audit search.
///
/// All fields are conjunctive; `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    /// Restrict to events owned by this user.
    pub owner: Option<Uuid>,
    /// Restrict to events of this kind.
    pub kind: Option<String>,
    /// Inclusive lower bound on event time.
    pub time_from: Option<u64>,
    /// Inclusive upper bound on event time.
    pub time_to: Option<u64>,
}

impl AuditFilter {
    /// Whether `event` satisfies this filter.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        self.owner.is_none_or(|o| o == event.owner)
            && self.kind.as_deref().is_none_or(|k| k == event.kind)
            && self.time_from.is_none_or(|t| event.time >= t)
            && self.time_to.is_none_or(|t| event.time <= t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_name_accepts_dotted_segments() {
        assert!(GroupName::new("example").is_ok());
        assert!(GroupName::new("com.example.group_1").is_ok());
    }

    #[test]
    fn group_name_rejects_invalid() {
        assert!(GroupName::new("").is_err());
        assert!(GroupName::new("Example").is_err());
        assert!(GroupName::new("com..example").is_err());
        assert!(GroupName::new("1leading").is_err());
        assert!(GroupName::new("a".repeat(GROUP_NAME_MAX_LENGTH + 1)).is_err());
    }

    #[test]
    fn request_token_shape() {
        assert!(RequestToken::new("0123456789abcdef0123456789abcdef").is_ok());
        assert!(RequestToken::new("0123456789ABCDEF0123456789ABCDEF").is_err());
        assert!(RequestToken::new("0123").is_err());
    }

    #[test]
    fn audit_filter_conjunction() {
        let owner = Uuid::from_u128(7);
        let event = AuditEvent {
            id: 1,
            time: 100,
            owner,
            kind: "USER_LOGGED_IN".to_string(),
            message: String::new(),
        };
        assert!(AuditFilter::default().matches(&event));
        assert!(AuditFilter { owner: Some(owner), ..AuditFilter::default() }.matches(&event));
        assert!(
            !AuditFilter { owner: Some(Uuid::from_u128(8)), ..AuditFilter::default() }
                .matches(&event)
        );
        assert!(
            !AuditFilter { time_from: Some(101), ..AuditFilter::default() }.matches(&event)
        );
        assert!(AuditFilter { time_to: Some(100), ..AuditFilter::default() }.matches(&event));
    }
}
