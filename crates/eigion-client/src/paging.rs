//! Paged search adapters.
//!
//! Each search exposes the same three moves: begin with a filter, step
//! forward, step backward. The adapter pairs the three command shapes with
//! a projector that pulls the right page variant out of the response, so
//! callers work with typed pages instead of raw payloads.

use eigion_proto::errors::ProtocolError;
use eigion_proto::messages::{Command, ResponsePayload};
use eigion_proto::model::{AuditEvent, AuditFilter, GroupCreationRequest, GroupName, Page};

use crate::error::ClientError;
use crate::handler::ProtocolHandler;
use crate::transport::HttpTransport;

/// A live paged search over one result type.
pub struct PagedSearch<'a, T, I> {
    handler: &'a ProtocolHandler<T>,
    begin: Command,
    next: Command,
    previous: Command,
    project: fn(ResponsePayload) -> Option<Page<I>>,
}

impl<'a, T: HttpTransport, I> PagedSearch<'a, T, I> {
    /// Open the search and fetch the first page.
    pub async fn begin(&self) -> Result<Page<I>, ClientError> {
        self.step(&self.begin).await
    }

    /// Fetch the next page; at the last page the server repeats it.
    pub async fn next(&self) -> Result<Page<I>, ClientError> {
        self.step(&self.next).await
    }

    /// Fetch the previous page; at the first page the server repeats it.
    pub async fn previous(&self) -> Result<Page<I>, ClientError> {
        self.step(&self.previous).await
    }

    async fn step(&self, command: &Command) -> Result<Page<I>, ClientError> {
        let payload = self.handler.call(command).await?;
        (self.project)(payload).ok_or_else(|| {
            ClientError::Protocol(ProtocolError::validity("response", "expected a result page"))
        })
    }
}

impl<'a, T: HttpTransport> PagedSearch<'a, T, GroupName> {
    /// A group search by name substring.
    pub fn groups(handler: &'a ProtocolHandler<T>, query: String, page_size: u32) -> Self {
        Self {
            handler,
            begin: Command::GroupSearchBegin { query, page_size },
            next: Command::GroupSearchNext,
            previous: Command::GroupSearchPrevious,
            project: |payload| match payload {
                ResponsePayload::GroupsPage { page } => Some(page),
                _ => None,
            },
        }
    }
}

impl<'a, T: HttpTransport> PagedSearch<'a, T, GroupCreationRequest> {
    /// A search over the caller's group creation requests.
    pub fn group_requests(handler: &'a ProtocolHandler<T>, page_size: u32) -> Self {
        Self {
            handler,
            begin: Command::GroupCreateRequestsBegin { page_size },
            next: Command::GroupCreateRequestsNext,
            previous: Command::GroupCreateRequestsPrevious,
            project: |payload| match payload {
                ResponsePayload::GroupRequestsPage { page } => Some(page),
                _ => None,
            },
        }
    }
}

impl<'a, T: HttpTransport> PagedSearch<'a, T, AuditEvent> {
    /// An audit log search.
    pub fn audit(handler: &'a ProtocolHandler<T>, filter: AuditFilter, page_size: u32) -> Self {
        Self {
            handler,
            begin: Command::AuditSearchBegin { filter, page_size },
            next: Command::AuditSearchNext,
            previous: Command::AuditSearchPrevious,
            project: |payload| match payload {
                ResponsePayload::AuditPage { page } => Some(page),
                _ => None,
            },
        }
    }
}
