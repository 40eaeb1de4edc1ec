//! Wire format for the Eigion protocols.
//!
//! Frames consist of a fixed 34-byte header (plain big-endian binary)
//! followed by a variable-length CBOR payload. The header carries the
//! protocol identity, a per-variant kind tag and the payload length, so
//! both sides can reject foreign or oversized frames before deserializing
//! anything.
//!
//! Two protocols share the version 1 message schema: Pike for ordinary
//! users and Amberjack for administrators. Each has its own protocol UUID
//! and content type; servers advertise both through the version discovery
//! document and clients negotiate the best mutual version before sending
//! any command.
//!
//! All payload limits are enforced during parsing: 1 MiB per payload, 1 KiB
//! per string field. No fast paths that skip validation.

pub mod codes;
pub mod errors;
pub mod header;
pub mod ids;
pub mod messages;
pub mod model;
pub mod versions;
pub mod wire_v1;

pub use codes::ErrorCode;
pub use errors::ProtocolError;
pub use header::MessageHeader;
pub use ids::ProtocolId;
pub use messages::{Command, Message, Response, ResponseKind, ResponsePayload};
pub use model::{
    AuditEvent, AuditFilter, GroupCreationRequest, GroupName, Page, Permission, RequestStatus,
    RequestToken, User,
};
pub use versions::{SupportedProtocol, VersionsDocument};
pub use wire_v1::WireCodec;
