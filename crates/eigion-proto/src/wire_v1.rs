//! Version 1 wire schema and codec.
//!
//! Frames are a fixed [`MessageHeader`] followed by a CBOR payload. Each
//! message variant maps to exactly one wire record through the exhaustive
//! `to_wire` / `from_wire` tables below; an unmatched variant cannot exist
//! because the unions are closed, and an unmatched kind tag on the wire is
//! a protocol error. Enumerated sub-values (permissions, request status)
//! are translated through explicit matches; an unrecognized value on the
//! wire is a validity error, never coerced.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codes::ErrorCode;
use crate::errors::ProtocolError;
use crate::header::{MessageHeader, PAYLOAD_LIMIT};
use crate::ids::{AMBERJACK_PROTOCOL, PIKE_PROTOCOL, ProtocolId};
use crate::messages::{Command, Message, Response, ResponsePayload};
use crate::model::{
    AuditEvent, AuditFilter, GroupCreationRequest, GroupName, Page, Permission, RequestStatus,
    RequestToken, User,
};

/// Content type declared by the Pike codec.
pub const PIKE_CONTENT_TYPE: &str = "application/eigion_pike+cbor";

/// Content type declared by the Amberjack codec.
pub const AMBERJACK_CONTENT_TYPE: &str = "application/eigion_amberjack+cbor";

/// Upper bound on the length of any string field, in bytes.
pub const STRING_LIMIT: usize = 1024;

/// Largest permitted page size for searches.
pub const PAGE_SIZE_LIMIT: u32 = 1000;

/// Message kind tags carried in the header.
///
/// Commands occupy the low range, responses have the top bit set.
mod kinds {
    pub const CMD_LOGIN: u16 = 0x0001;
    pub const CMD_LOGOUT: u16 = 0x0002;
    pub const CMD_GROUP_CREATE_BEGIN: u16 = 0x0010;
    pub const CMD_GROUP_CREATE_READY: u16 = 0x0011;
    pub const CMD_GROUP_CREATE_CANCEL: u16 = 0x0012;
    pub const CMD_GROUP_REQUESTS_BEGIN: u16 = 0x0020;
    pub const CMD_GROUP_REQUESTS_NEXT: u16 = 0x0021;
    pub const CMD_GROUP_REQUESTS_PREVIOUS: u16 = 0x0022;
    pub const CMD_GROUP_SEARCH_BEGIN: u16 = 0x0030;
    pub const CMD_GROUP_SEARCH_NEXT: u16 = 0x0031;
    pub const CMD_GROUP_SEARCH_PREVIOUS: u16 = 0x0032;
    pub const CMD_AUDIT_SEARCH_BEGIN: u16 = 0x0040;
    pub const CMD_AUDIT_SEARCH_NEXT: u16 = 0x0041;
    pub const CMD_AUDIT_SEARCH_PREVIOUS: u16 = 0x0042;

    pub const RSP_ERROR: u16 = 0x8000;
    pub const RSP_LOGIN: u16 = 0x8001;
    pub const RSP_LOGOUT: u16 = 0x8002;
    pub const RSP_GROUP_CREATE_BEGIN: u16 = 0x8010;
    pub const RSP_GROUP_CREATE_READY: u16 = 0x8011;
    pub const RSP_GROUP_CREATE_CANCEL: u16 = 0x8012;
    pub const RSP_GROUP_REQUESTS_PAGE: u16 = 0x8020;
    pub const RSP_GROUPS_PAGE: u16 = 0x8030;
    pub const RSP_AUDIT_PAGE: u16 = 0x8040;
}

// Wire records. One record per message variant carrying data; variants with
// no fields travel as an empty payload.

#[derive(Serialize, Deserialize)]
struct WvCommandLogin {
    user_name: String,
    password: String,
}

#[derive(Serialize, Deserialize)]
struct WvCommandGroupName {
    group_name: String,
}

#[derive(Serialize, Deserialize)]
struct WvCommandToken {
    token: String,
}

#[derive(Serialize, Deserialize)]
struct WvCommandPageBegin {
    page_size: u32,
}

#[derive(Serialize, Deserialize)]
struct WvCommandGroupSearchBegin {
    query: String,
    page_size: u32,
}

#[derive(Serialize, Deserialize)]
struct WvCommandAuditSearchBegin {
    owner: Option<String>,
    kind: Option<String>,
    time_from: Option<u64>,
    time_to: Option<u64>,
    page_size: u32,
}

#[derive(Serialize, Deserialize)]
struct WvResponseError {
    request_id: String,
    code: String,
    message: String,
}

#[derive(Serialize, Deserialize)]
struct WvResponseLogin {
    request_id: String,
    user: WvUser,
}

#[derive(Serialize, Deserialize)]
struct WvResponseBare {
    request_id: String,
}

#[derive(Serialize, Deserialize)]
struct WvResponseToken {
    request_id: String,
    token: String,
}

#[derive(Serialize, Deserialize)]
struct WvResponsePage<T> {
    request_id: String,
    items: Vec<T>,
    page_index: u64,
    page_count: u64,
    total_count: u64,
}

#[derive(Serialize, Deserialize)]
struct WvUser {
    id: String,
    permissions: Vec<u32>,
}

#[derive(Serialize, Deserialize)]
struct WvGroupRequest {
    group_name: String,
    founder: String,
    token: String,
    status: WvRequestStatus,
}

#[derive(Serialize, Deserialize)]
struct WvRequestStatus {
    kind: u8,
    time_started: u64,
    time_completed: Option<u64>,
    message: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WvAuditEvent {
    id: u64,
    time: u64,
    owner: String,
    kind: String,
    message: String,
}

// Enumerated sub-value translation. Explicit in both directions so that an
// unrecognized wire value surfaces as a validity error.

fn permission_to_wire(permission: Permission) -> u32 {
    match permission {
        Permission::GroupCreate => 0,
        Permission::GroupRead => 1,
        Permission::AuditRead => 2,
        Permission::AmberjackAccess => 3,
    }
}

fn permission_from_wire(value: u32) -> Result<Permission, ProtocolError> {
    match value {
        0 => Ok(Permission::GroupCreate),
        1 => Ok(Permission::GroupRead),
        2 => Ok(Permission::AuditRead),
        3 => Ok(Permission::AmberjackAccess),
        other => Err(ProtocolError::validity("permission", format!("unrecognized value {other}"))),
    }
}

fn status_to_wire(status: &RequestStatus) -> WvRequestStatus {
    match status {
        RequestStatus::InProgress { time_started } => WvRequestStatus {
            kind: 0,
            time_started: *time_started,
            time_completed: None,
            message: None,
        },
        RequestStatus::Succeeded { time_started, time_completed } => WvRequestStatus {
            kind: 1,
            time_started: *time_started,
            time_completed: Some(*time_completed),
            message: None,
        },
        RequestStatus::Failed { time_started, time_completed, message } => WvRequestStatus {
            kind: 2,
            time_started: *time_started,
            time_completed: Some(*time_completed),
            message: Some(message.clone()),
        },
        RequestStatus::Cancelled { time_started, time_completed } => WvRequestStatus {
            kind: 3,
            time_started: *time_started,
            time_completed: Some(*time_completed),
            message: None,
        },
    }
}

fn status_from_wire(wire: WvRequestStatus) -> Result<RequestStatus, ProtocolError> {
    let WvRequestStatus { kind, time_started, time_completed, message } = wire;
    let completed = |t: Option<u64>| {
        t.ok_or_else(|| ProtocolError::validity("status", "terminal state missing completion time"))
    };
    match kind {
        0 => match (time_completed, message) {
            (None, None) => Ok(RequestStatus::InProgress { time_started }),
            _ => Err(ProtocolError::validity("status", "in-progress state carries extra fields")),
        },
        1 => Ok(RequestStatus::Succeeded {
            time_started,
            time_completed: completed(time_completed)?,
        }),
        2 => Ok(RequestStatus::Failed {
            time_started,
            time_completed: completed(time_completed)?,
            message: message
                .ok_or_else(|| ProtocolError::validity("status", "failed state missing message"))?,
        }),
        3 => Ok(RequestStatus::Cancelled {
            time_started,
            time_completed: completed(time_completed)?,
        }),
        other => Err(ProtocolError::validity("status", format!("unrecognized value {other}"))),
    }
}

fn uuid_from_wire(value: &str, field: &'static str) -> Result<Uuid, ProtocolError> {
    Uuid::parse_str(value).map_err(|e| ProtocolError::validity(field, e.to_string()))
}

fn string_from_wire(value: String, field: &'static str) -> Result<String, ProtocolError> {
    if value.len() > STRING_LIMIT {
        return Err(ProtocolError::validity(
            field,
            format!("length {} exceeds limit {STRING_LIMIT}", value.len()),
        ));
    }
    Ok(value)
}

fn string_to_wire(value: &str, field: &'static str) -> Result<String, ProtocolError> {
    if value.len() > STRING_LIMIT {
        return Err(ProtocolError::validity(
            field,
            format!("length {} exceeds limit {STRING_LIMIT}", value.len()),
        ));
    }
    Ok(value.to_string())
}

fn page_size_from_wire(value: u32) -> Result<u32, ProtocolError> {
    if (1..=PAGE_SIZE_LIMIT).contains(&value) {
        Ok(value)
    } else {
        Err(ProtocolError::validity("page_size", format!("must be 1..={PAGE_SIZE_LIMIT}")))
    }
}

fn user_to_wire(user: &User) -> WvUser {
    WvUser {
        id: user.id.to_string(),
        permissions: user.permissions.iter().map(|p| permission_to_wire(*p)).collect(),
    }
}

fn user_from_wire(wire: WvUser) -> Result<User, ProtocolError> {
    let id = uuid_from_wire(&wire.id, "user.id")?;
    let mut permissions = BTreeSet::new();
    for value in wire.permissions {
        permissions.insert(permission_from_wire(value)?);
    }
    Ok(User { id, permissions })
}

fn group_request_to_wire(request: &GroupCreationRequest) -> WvGroupRequest {
    WvGroupRequest {
        group_name: request.group_name.as_str().to_string(),
        founder: request.founder.to_string(),
        token: request.token.as_str().to_string(),
        status: status_to_wire(&request.status),
    }
}

fn group_request_from_wire(wire: WvGroupRequest) -> Result<GroupCreationRequest, ProtocolError> {
    Ok(GroupCreationRequest {
        group_name: GroupName::new(wire.group_name)?,
        founder: uuid_from_wire(&wire.founder, "request.founder")?,
        token: RequestToken::new(wire.token)?,
        status: status_from_wire(wire.status)?,
    })
}

fn audit_event_to_wire(event: &AuditEvent) -> Result<WvAuditEvent, ProtocolError> {
    Ok(WvAuditEvent {
        id: event.id,
        time: event.time,
        owner: event.owner.to_string(),
        kind: string_to_wire(&event.kind, "event.kind")?,
        message: string_to_wire(&event.message, "event.message")?,
    })
}

fn audit_event_from_wire(wire: WvAuditEvent) -> Result<AuditEvent, ProtocolError> {
    Ok(AuditEvent {
        id: wire.id,
        time: wire.time,
        owner: uuid_from_wire(&wire.owner, "event.owner")?,
        kind: string_from_wire(wire.kind, "event.kind")?,
        message: string_from_wire(wire.message, "event.message")?,
    })
}

fn page_to_wire<T, W>(
    request_id: Uuid,
    page: &Page<T>,
    mut item: impl FnMut(&T) -> Result<W, ProtocolError>,
) -> Result<WvResponsePage<W>, ProtocolError> {
    Ok(WvResponsePage {
        request_id: request_id.to_string(),
        items: page.items.iter().map(&mut item).collect::<Result<Vec<_>, _>>()?,
        page_index: page.page_index,
        page_count: page.page_count,
        total_count: page.total_count,
    })
}

fn page_from_wire<T, W>(
    wire: WvResponsePage<W>,
    item: impl Fn(W) -> Result<T, ProtocolError>,
) -> Result<(Uuid, Page<T>), ProtocolError> {
    let request_id = uuid_from_wire(&wire.request_id, "request_id")?;
    let items = wire.items.into_iter().map(item).collect::<Result<Vec<_>, _>>()?;
    Ok((
        request_id,
        Page {
            items,
            page_index: wire.page_index,
            page_count: wire.page_count,
            total_count: wire.total_count,
        },
    ))
}

fn encode_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut buffer = Vec::new();
    ciborium::ser::into_writer(value, &mut buffer)
        .map_err(|e| ProtocolError::Cbor { context: e.to_string() })?;
    Ok(buffer)
}

fn decode_cbor<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    ciborium::de::from_reader(data).map_err(|e| ProtocolError::Cbor { context: e.to_string() })
}

/// Map a message to its kind tag and encoded wire record.
///
/// Exhaustive over the closed message set; adding a variant without
/// extending this table is a compile error.
fn to_wire(message: &Message) -> Result<(u16, Vec<u8>), ProtocolError> {
    match message {
        Message::Command(command) => match command {
            Command::Login { user_name, password } => Ok((
                kinds::CMD_LOGIN,
                encode_cbor(&WvCommandLogin {
                    user_name: string_to_wire(user_name, "user_name")?,
                    password: string_to_wire(password, "password")?,
                })?,
            )),
            Command::Logout => Ok((kinds::CMD_LOGOUT, Vec::new())),
            Command::GroupCreateBegin { group_name } => Ok((
                kinds::CMD_GROUP_CREATE_BEGIN,
                encode_cbor(&WvCommandGroupName { group_name: group_name.as_str().to_string() })?,
            )),
            Command::GroupCreateReady { token } => Ok((
                kinds::CMD_GROUP_CREATE_READY,
                encode_cbor(&WvCommandToken { token: token.as_str().to_string() })?,
            )),
            Command::GroupCreateCancel { token } => Ok((
                kinds::CMD_GROUP_CREATE_CANCEL,
                encode_cbor(&WvCommandToken { token: token.as_str().to_string() })?,
            )),
            Command::GroupCreateRequestsBegin { page_size } => Ok((
                kinds::CMD_GROUP_REQUESTS_BEGIN,
                encode_cbor(&WvCommandPageBegin { page_size: *page_size })?,
            )),
            Command::GroupCreateRequestsNext => Ok((kinds::CMD_GROUP_REQUESTS_NEXT, Vec::new())),
            Command::GroupCreateRequestsPrevious => {
                Ok((kinds::CMD_GROUP_REQUESTS_PREVIOUS, Vec::new()))
            }
            Command::GroupSearchBegin { query, page_size } => Ok((
                kinds::CMD_GROUP_SEARCH_BEGIN,
                encode_cbor(&WvCommandGroupSearchBegin {
                    query: string_to_wire(query, "query")?,
                    page_size: *page_size,
                })?,
            )),
            Command::GroupSearchNext => Ok((kinds::CMD_GROUP_SEARCH_NEXT, Vec::new())),
            Command::GroupSearchPrevious => Ok((kinds::CMD_GROUP_SEARCH_PREVIOUS, Vec::new())),
            Command::AuditSearchBegin { filter, page_size } => Ok((
                kinds::CMD_AUDIT_SEARCH_BEGIN,
                encode_cbor(&WvCommandAuditSearchBegin {
                    owner: filter.owner.map(|o| o.to_string()),
                    kind: filter
                        .kind
                        .as_deref()
                        .map(|kind| string_to_wire(kind, "filter.kind"))
                        .transpose()?,
                    time_from: filter.time_from,
                    time_to: filter.time_to,
                    page_size: *page_size,
                })?,
            )),
            Command::AuditSearchNext => Ok((kinds::CMD_AUDIT_SEARCH_NEXT, Vec::new())),
            Command::AuditSearchPrevious => Ok((kinds::CMD_AUDIT_SEARCH_PREVIOUS, Vec::new())),
        },
        Message::Response(response) => {
            let request_id = response.request_id;
            match &response.payload {
                ResponsePayload::Error { code, message } => Ok((
                    kinds::RSP_ERROR,
                    encode_cbor(&WvResponseError {
                        request_id: request_id.to_string(),
                        code: code.as_str().to_string(),
                        message: string_to_wire(message, "message")?,
                    })?,
                )),
                ResponsePayload::Login { user } => Ok((
                    kinds::RSP_LOGIN,
                    encode_cbor(&WvResponseLogin {
                        request_id: request_id.to_string(),
                        user: user_to_wire(user),
                    })?,
                )),
                ResponsePayload::Logout => Ok((
                    kinds::RSP_LOGOUT,
                    encode_cbor(&WvResponseBare { request_id: request_id.to_string() })?,
                )),
                ResponsePayload::GroupCreateBegin { token } => Ok((
                    kinds::RSP_GROUP_CREATE_BEGIN,
                    encode_cbor(&WvResponseToken {
                        request_id: request_id.to_string(),
                        token: token.as_str().to_string(),
                    })?,
                )),
                ResponsePayload::GroupCreateReady => Ok((
                    kinds::RSP_GROUP_CREATE_READY,
                    encode_cbor(&WvResponseBare { request_id: request_id.to_string() })?,
                )),
                ResponsePayload::GroupCreateCancel => Ok((
                    kinds::RSP_GROUP_CREATE_CANCEL,
                    encode_cbor(&WvResponseBare { request_id: request_id.to_string() })?,
                )),
                ResponsePayload::GroupRequestsPage { page } => Ok((
                    kinds::RSP_GROUP_REQUESTS_PAGE,
                    encode_cbor(&page_to_wire(request_id, page, |request| {
                        Ok(group_request_to_wire(request))
                    })?)?,
                )),
                ResponsePayload::GroupsPage { page } => Ok((
                    kinds::RSP_GROUPS_PAGE,
                    encode_cbor(&page_to_wire(request_id, page, |name: &GroupName| {
                        Ok(name.as_str().to_string())
                    })?)?,
                )),
                ResponsePayload::AuditPage { page } => Ok((
                    kinds::RSP_AUDIT_PAGE,
                    encode_cbor(&page_to_wire(request_id, page, audit_event_to_wire)?)?,
                )),
            }
        }
    }
}

/// Map a kind tag and payload back to a message.
///
/// An unrecognized kind is a protocol error; a non-empty payload on a
/// field-less variant is a length error.
fn from_wire(kind: u16, payload: &[u8]) -> Result<Message, ProtocolError> {
    let empty = |payload: &[u8]| {
        if payload.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::InvalidLength {
                context: format!("kind 0x{kind:04x} expects an empty payload"),
            })
        }
    };
    match kind {
        kinds::CMD_LOGIN => {
            let wire: WvCommandLogin = decode_cbor(payload)?;
            Ok(Message::Command(Command::Login {
                user_name: string_from_wire(wire.user_name, "user_name")?,
                password: string_from_wire(wire.password, "password")?,
            }))
        }
        kinds::CMD_LOGOUT => {
            empty(payload)?;
            Ok(Message::Command(Command::Logout))
        }
        kinds::CMD_GROUP_CREATE_BEGIN => {
            let wire: WvCommandGroupName = decode_cbor(payload)?;
            Ok(Message::Command(Command::GroupCreateBegin {
                group_name: GroupName::new(wire.group_name)?,
            }))
        }
        kinds::CMD_GROUP_CREATE_READY => {
            let wire: WvCommandToken = decode_cbor(payload)?;
            Ok(Message::Command(Command::GroupCreateReady {
                token: RequestToken::new(wire.token)?,
            }))
        }
        kinds::CMD_GROUP_CREATE_CANCEL => {
            let wire: WvCommandToken = decode_cbor(payload)?;
            Ok(Message::Command(Command::GroupCreateCancel {
                token: RequestToken::new(wire.token)?,
            }))
        }
        kinds::CMD_GROUP_REQUESTS_BEGIN => {
            let wire: WvCommandPageBegin = decode_cbor(payload)?;
            Ok(Message::Command(Command::GroupCreateRequestsBegin {
                page_size: page_size_from_wire(wire.page_size)?,
            }))
        }
        kinds::CMD_GROUP_REQUESTS_NEXT => {
            empty(payload)?;
            Ok(Message::Command(Command::GroupCreateRequestsNext))
        }
        kinds::CMD_GROUP_REQUESTS_PREVIOUS => {
            empty(payload)?;
            Ok(Message::Command(Command::GroupCreateRequestsPrevious))
        }
        kinds::CMD_GROUP_SEARCH_BEGIN => {
            let wire: WvCommandGroupSearchBegin = decode_cbor(payload)?;
            Ok(Message::Command(Command::GroupSearchBegin {
                query: string_from_wire(wire.query, "query")?,
                page_size: page_size_from_wire(wire.page_size)?,
            }))
        }
        kinds::CMD_GROUP_SEARCH_NEXT => {
            empty(payload)?;
            Ok(Message::Command(Command::GroupSearchNext))
        }
        kinds::CMD_GROUP_SEARCH_PREVIOUS => {
            empty(payload)?;
            Ok(Message::Command(Command::GroupSearchPrevious))
        }
        kinds::CMD_AUDIT_SEARCH_BEGIN => {
            let wire: WvCommandAuditSearchBegin = decode_cbor(payload)?;
            let owner = match wire.owner {
                Some(value) => Some(uuid_from_wire(&value, "filter.owner")?),
                None => None,
            };
            let filter_kind = match wire.kind {
                Some(value) => Some(string_from_wire(value, "filter.kind")?),
                None => None,
            };
            Ok(Message::Command(Command::AuditSearchBegin {
                filter: AuditFilter {
                    owner,
                    kind: filter_kind,
                    time_from: wire.time_from,
                    time_to: wire.time_to,
                },
                page_size: page_size_from_wire(wire.page_size)?,
            }))
        }
        kinds::CMD_AUDIT_SEARCH_NEXT => {
            empty(payload)?;
            Ok(Message::Command(Command::AuditSearchNext))
        }
        kinds::CMD_AUDIT_SEARCH_PREVIOUS => {
            empty(payload)?;
            Ok(Message::Command(Command::AuditSearchPrevious))
        }
        kinds::RSP_ERROR => {
            let wire: WvResponseError = decode_cbor(payload)?;
            Ok(Message::Response(Response {
                request_id: uuid_from_wire(&wire.request_id, "request_id")?,
                payload: ResponsePayload::Error {
                    code: ErrorCode::from_wire(&wire.code),
                    message: string_from_wire(wire.message, "message")?,
                },
            }))
        }
        kinds::RSP_LOGIN => {
            let wire: WvResponseLogin = decode_cbor(payload)?;
            Ok(Message::Response(Response {
                request_id: uuid_from_wire(&wire.request_id, "request_id")?,
                payload: ResponsePayload::Login { user: user_from_wire(wire.user)? },
            }))
        }
        kinds::RSP_LOGOUT => {
            let wire: WvResponseBare = decode_cbor(payload)?;
            Ok(Message::Response(Response {
                request_id: uuid_from_wire(&wire.request_id, "request_id")?,
                payload: ResponsePayload::Logout,
            }))
        }
        kinds::RSP_GROUP_CREATE_BEGIN => {
            let wire: WvResponseToken = decode_cbor(payload)?;
            Ok(Message::Response(Response {
                request_id: uuid_from_wire(&wire.request_id, "request_id")?,
                payload: ResponsePayload::GroupCreateBegin { token: RequestToken::new(wire.token)? },
            }))
        }
        kinds::RSP_GROUP_CREATE_READY => {
            let wire: WvResponseBare = decode_cbor(payload)?;
            Ok(Message::Response(Response {
                request_id: uuid_from_wire(&wire.request_id, "request_id")?,
                payload: ResponsePayload::GroupCreateReady,
            }))
        }
        kinds::RSP_GROUP_CREATE_CANCEL => {
            let wire: WvResponseBare = decode_cbor(payload)?;
            Ok(Message::Response(Response {
                request_id: uuid_from_wire(&wire.request_id, "request_id")?,
                payload: ResponsePayload::GroupCreateCancel,
            }))
        }
        kinds::RSP_GROUP_REQUESTS_PAGE => {
            let wire: WvResponsePage<WvGroupRequest> = decode_cbor(payload)?;
            let (request_id, page) = page_from_wire(wire, group_request_from_wire)?;
            Ok(Message::Response(Response {
                request_id,
                payload: ResponsePayload::GroupRequestsPage { page },
            }))
        }
        kinds::RSP_GROUPS_PAGE => {
            let wire: WvResponsePage<String> = decode_cbor(payload)?;
            let (request_id, page) = page_from_wire(wire, GroupName::new)?;
            Ok(Message::Response(Response {
                request_id,
                payload: ResponsePayload::GroupsPage { page },
            }))
        }
        kinds::RSP_AUDIT_PAGE => {
            let wire: WvResponsePage<WvAuditEvent> = decode_cbor(payload)?;
            let (request_id, page) = page_from_wire(wire, audit_event_from_wire)?;
            Ok(Message::Response(Response {
                request_id,
                payload: ResponsePayload::AuditPage { page },
            }))
        }
        other => Err(ProtocolError::UnrecognizedKind { kind: other }),
    }
}

/// The version 1 codec for one protocol.
///
/// Pike and Amberjack share this message schema; they differ in protocol
/// UUID and content type, and servers enforce the administrative permission
/// on the Amberjack endpoint. A codec owns no state beyond its identity.
#[derive(Debug, Clone)]
pub struct WireCodec {
    protocol: ProtocolId,
    content_type: &'static str,
}

impl WireCodec {
    /// The Pike version 1 codec.
    pub fn pike_v1() -> Self {
        Self { protocol: ProtocolId::new(PIKE_PROTOCOL, 1, 0), content_type: PIKE_CONTENT_TYPE }
    }

    /// The Amberjack version 1 codec.
    pub fn amberjack_v1() -> Self {
        Self {
            protocol: ProtocolId::new(AMBERJACK_PROTOCOL, 1, 0),
            content_type: AMBERJACK_CONTENT_TYPE,
        }
    }

    /// The codec appropriate for `protocol`, if this crate supports it.
    pub fn for_protocol(protocol: &ProtocolId) -> Option<Self> {
        match (protocol.id, protocol.version_major) {
            (id, 1) if id == PIKE_PROTOCOL => Some(Self::pike_v1()),
            (id, 1) if id == AMBERJACK_PROTOCOL => Some(Self::amberjack_v1()),
            _ => None,
        }
    }

    /// The protocol identity this codec speaks.
    pub fn protocol(&self) -> &ProtocolId {
        &self.protocol
    }

    /// The HTTP content type this codec declares.
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Serialize a message to its framed binary form.
    pub fn serialize(&self, message: &Message) -> Result<Vec<u8>, ProtocolError> {
        let (kind, payload) = to_wire(message)?;
        if payload.len() > PAYLOAD_LIMIT as usize {
            return Err(ProtocolError::InvalidLength {
                context: format!("payload of {} bytes exceeds limit {PAYLOAD_LIMIT}", payload.len()),
            });
        }
        let header =
            MessageHeader { protocol: self.protocol, kind, payload_len: payload.len() as u32 };
        let mut frame = Vec::with_capacity(MessageHeader::SIZE + payload.len());
        frame.extend_from_slice(&header.encode());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Parse a framed message.
    ///
    /// Rejects frames from other protocols, frames with a different major
    /// version, and frames whose length disagrees with the header. The
    /// minor version is forward-compatible and not checked.
    pub fn parse(&self, data: &[u8]) -> Result<Message, ProtocolError> {
        let header = MessageHeader::decode(data)?;
        if header.protocol.id != self.protocol.id {
            return Err(ProtocolError::UnsupportedProtocol {
                context: format!(
                    "frame protocol {} does not match codec protocol {}",
                    header.protocol.id, self.protocol.id
                ),
            });
        }
        if header.protocol.version_major != self.protocol.version_major {
            return Err(ProtocolError::UnsupportedProtocol {
                context: format!(
                    "frame major version {} does not match codec major version {}",
                    header.protocol.version_major, self.protocol.version_major
                ),
            });
        }
        let expected = MessageHeader::SIZE + header.payload_len as usize;
        if data.len() != expected {
            return Err(ProtocolError::InvalidLength {
                context: format!("frame is {} bytes, header declares {expected}", data.len()),
            });
        }
        from_wire(header.kind, &data[MessageHeader::SIZE..])
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn pike_rejects_amberjack_frames() {
        let pike = WireCodec::pike_v1();
        let amberjack = WireCodec::amberjack_v1();
        let frame = amberjack.serialize(&Message::Command(Command::Logout)).unwrap();
        let result = pike.parse(&frame);
        assert!(matches!(result, Err(ProtocolError::UnsupportedProtocol { .. })));
    }

    #[test]
    fn parse_rejects_unrecognized_kind() {
        let codec = WireCodec::pike_v1();
        let mut frame = codec.serialize(&Message::Command(Command::Logout)).unwrap();
        frame[28] = 0x7f;
        frame[29] = 0xff;
        let result = codec.parse(&frame);
        assert!(matches!(result, Err(ProtocolError::UnrecognizedKind { kind: 0x7fff })));
    }

    #[test]
    fn parse_rejects_trailing_bytes() {
        let codec = WireCodec::pike_v1();
        let mut frame = codec.serialize(&Message::Command(Command::Logout)).unwrap();
        frame.push(0);
        let result = codec.parse(&frame);
        assert!(matches!(result, Err(ProtocolError::InvalidLength { .. })));
    }

    #[test]
    fn parse_rejects_unrecognized_permission() {
        let codec = WireCodec::pike_v1();
        let record = WvResponseLogin {
            request_id: Uuid::from_u128(1).to_string(),
            user: WvUser { id: Uuid::from_u128(2).to_string(), permissions: vec![0, 99] },
        };
        let payload = encode_cbor(&record).unwrap();
        let header = MessageHeader {
            protocol: *codec.protocol(),
            kind: kinds::RSP_LOGIN,
            payload_len: payload.len() as u32,
        };
        let mut frame = header.encode().to_vec();
        frame.extend_from_slice(&payload);
        let result = codec.parse(&frame);
        assert!(matches!(result, Err(ProtocolError::Validity { field: "permission", .. })));
    }

    #[test]
    fn parse_rejects_over_length_string() {
        let codec = WireCodec::pike_v1();
        let record = WvCommandLogin {
            user_name: "u".repeat(STRING_LIMIT + 1),
            password: String::new(),
        };
        let payload = encode_cbor(&record).unwrap();
        let header = MessageHeader {
            protocol: *codec.protocol(),
            kind: kinds::CMD_LOGIN,
            payload_len: payload.len() as u32,
        };
        let mut frame = header.encode().to_vec();
        frame.extend_from_slice(&payload);
        let result = codec.parse(&frame);
        assert!(matches!(result, Err(ProtocolError::Validity { field: "user_name", .. })));
    }

    #[test]
    fn parse_rejects_inconsistent_status() {
        // An in-progress status must not carry a completion time.
        let wire = WvRequestStatus {
            kind: 0,
            time_started: 5,
            time_completed: Some(6),
            message: None,
        };
        assert!(status_from_wire(wire).is_err());

        // A failed status must carry a message.
        let wire =
            WvRequestStatus { kind: 2, time_started: 5, time_completed: Some(6), message: None };
        assert!(status_from_wire(wire).is_err());
    }

    #[test]
    fn minor_version_is_forward_compatible() {
        let codec = WireCodec::pike_v1();
        let mut frame = codec.serialize(&Message::Command(Command::Logout)).unwrap();
        // Bump the minor version in the encoded header.
        frame[24..28].copy_from_slice(&7u32.to_be_bytes());
        assert!(codec.parse(&frame).is_ok());
    }
}
