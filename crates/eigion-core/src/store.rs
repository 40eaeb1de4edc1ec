//! The transactional query-object interface.
//!
//! The database is an external collaborator consumed only through these
//! traits: a store hands out connections per role, a connection opens one
//! transaction per command, and a transaction exposes typed query objects.
//! Committing consumes the transaction; dropping it without a commit rolls
//! back, which is what gives commands their no-partial-writes guarantee.

use eigion_proto::model::{
    AuditEvent, AuditFilter, GroupCreationRequest, GroupName, Permission, RequestStatus,
    RequestToken, User,
};
use thiserror::Error;
use uuid::Uuid;

/// The client role a connection is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Ordinary users.
    Pike,
    /// Administrators.
    Amberjack,
}

/// Errors reported by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated.
    #[error("duplicate {entity}: {key}")]
    Duplicate {
        /// The kind of entity, such as `group` or `request`.
        entity: &'static str,
        /// The conflicting key.
        key: String,
    },

    /// The underlying database failed.
    #[error("database error: {context}")]
    Sql {
        /// Driver-level detail.
        context: String,
    },
}

impl StoreError {
    /// Shorthand for a [`StoreError::Sql`] error.
    pub fn sql(context: impl Into<String>) -> Self {
        Self::Sql { context: context.into() }
    }
}

/// Filter for the group-by-name search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSearchFilter {
    /// Substring matched against group names; empty matches every group.
    pub query: String,
}

/// Filter for the group-creation-request search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRequestFilter {
    /// Only requests opened by this user.
    pub founder: Uuid,
}

/// Queries over users and their permissions.
pub trait UserQueries {
    /// Fetch the user with this id, creating an empty-permission record on
    /// first sight, and load the granted permission set.
    fn user_get_or_create(&mut self, id: Uuid, name: &str) -> Result<User, StoreError>;

    /// Grant a permission to a user. Granting twice is not an error.
    fn user_permission_grant(&mut self, user: Uuid, permission: Permission)
    -> Result<(), StoreError>;
}

/// Queries over groups.
pub trait GroupQueries {
    /// Whether a group with this name exists.
    fn group_exists(&mut self, name: &GroupName) -> Result<bool, StoreError>;

    /// Create a group. An existing name is a [`StoreError::Duplicate`].
    fn group_create(&mut self, name: &GroupName, founder: Uuid, time: u64)
    -> Result<(), StoreError>;

    /// Count the groups matching `filter`.
    fn group_search_count(&mut self, filter: &GroupSearchFilter) -> Result<u64, StoreError>;

    /// Fetch one page of groups matching `filter`, ordered by name.
    fn group_search_page(
        &mut self,
        filter: &GroupSearchFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<GroupName>, StoreError>;
}

/// Queries over group creation requests.
pub trait GroupRequestQueries {
    /// Store a new request. An existing token is a [`StoreError::Duplicate`].
    fn request_create(&mut self, request: &GroupCreationRequest) -> Result<(), StoreError>;

    /// Fetch the request with this token.
    fn request_get(
        &mut self,
        token: &RequestToken,
    ) -> Result<Option<GroupCreationRequest>, StoreError>;

    /// Replace the status of the request with this token.
    fn request_update_status(
        &mut self,
        token: &RequestToken,
        status: &RequestStatus,
    ) -> Result<(), StoreError>;

    /// Count the requests matching `filter`.
    fn request_search_count(&mut self, filter: &GroupRequestFilter) -> Result<u64, StoreError>;

    /// Fetch one page of requests matching `filter`, in creation order.
    fn request_search_page(
        &mut self,
        filter: &GroupRequestFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<GroupCreationRequest>, StoreError>;
}

/// Queries over the audit log.
pub trait AuditQueries {
    /// Append an audit event.
    fn audit_put(
        &mut self,
        time: u64,
        owner: Uuid,
        kind: &str,
        message: &str,
    ) -> Result<(), StoreError>;

    /// Count the events matching `filter`.
    fn audit_search_count(&mut self, filter: &AuditFilter) -> Result<u64, StoreError>;

    /// Fetch one page of events matching `filter`, in event order.
    fn audit_search_page(
        &mut self,
        filter: &AuditFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<AuditEvent>, StoreError>;
}

/// One database transaction.
///
/// Query objects are obtained through the supertraits. Dropping the
/// transaction without calling [`Transaction::commit`] rolls it back.
pub trait Transaction: UserQueries + GroupQueries + GroupRequestQueries + AuditQueries {
    /// Commit the transaction.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// One database connection.
pub trait StoreConnection: Send {
    /// Open a transaction. At most one is open per connection at a time.
    fn open_transaction(&mut self) -> Result<Box<dyn Transaction + '_>, StoreError>;
}

/// The database itself.
pub trait Store: Send + Sync {
    /// Open a connection for `role`.
    fn connect(&self, role: Role) -> Result<Box<dyn StoreConnection>, StoreError>;
}
