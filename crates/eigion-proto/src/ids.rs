//! Protocol identifiers and version ordering.

use std::fmt;

use uuid::Uuid;

/// The protocol UUID for Pike, the ordinary-user protocol.
pub const PIKE_PROTOCOL: Uuid = Uuid::from_bytes([
    0x8e, 0x1b, 0x51, 0xc4, 0x14, 0x3d, 0x41, 0x9f, 0x9a, 0x51, 0x1a, 0x84, 0x1f, 0x7c, 0x2e, 0x50,
]);

/// The protocol UUID for Amberjack, the administrative protocol.
pub const AMBERJACK_PROTOCOL: Uuid = Uuid::from_bytes([
    0xd4, 0xf5, 0x8a, 0x0b, 0x6a, 0x21, 0x47, 0x2e, 0x8c, 0x7d, 0x35, 0x9e, 0xc9, 0x07, 0xb1, 0x6a,
]);

/// Identifies one version of one wire protocol.
///
/// Advertised by servers in the version discovery document and used by
/// clients to select a codec during negotiation. Versions of the same
/// protocol order lexicographically by `(version_major, version_minor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolId {
    /// The protocol's unique identifier.
    pub id: Uuid,
    /// Incompatible revisions of the wire format.
    pub version_major: u32,
    /// Forward-compatible revisions within a major version.
    pub version_minor: u32,
}

impl ProtocolId {
    /// Construct a protocol identifier.
    pub const fn new(id: Uuid, version_major: u32, version_minor: u32) -> Self {
        Self { id, version_major, version_minor }
    }

    /// Whether `other` is the same protocol, ignoring versions.
    pub fn is_same_protocol(&self, other: &Self) -> bool {
        self.id == other.id
    }

    /// The `(major, minor)` pair used to order versions of one protocol.
    pub const fn version(&self) -> (u32, u32) {
        (self.version_major, self.version_minor)
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.id, self.version_major, self.version_minor)
    }
}
