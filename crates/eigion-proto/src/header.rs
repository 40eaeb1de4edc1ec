//! The fixed binary message header.
//!
//! Every frame starts with a 34-byte big-endian header carrying the
//! protocol identifier, the message kind tag and the payload length. The
//! header exists so that both sides can reject foreign or oversized frames
//! before touching the CBOR payload.

use uuid::Uuid;

use crate::errors::ProtocolError;
use crate::ids::ProtocolId;

/// Frame magic: the ASCII bytes `EIGN`.
pub const MAGIC: u32 = 0x4549_474E;

/// Upper bound on payload length accepted during parsing (1 MiB).
pub const PAYLOAD_LIMIT: u32 = 1024 * 1024;

/// The fixed header preceding every CBOR payload.
///
/// Layout, all integers big-endian:
///
/// ```text
/// offset  size  field
///      0     4  magic (0x4549474E, "EIGN")
///      4    16  protocol UUID
///     20     4  version major
///     24     4  version minor
///     28     2  message kind tag
///     30     4  payload length
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// The protocol and version that produced the frame.
    pub protocol: ProtocolId,
    /// The per-variant message kind tag.
    pub kind: u16,
    /// The length of the CBOR payload that follows.
    pub payload_len: u32,
}

impl MessageHeader {
    /// Size of the encoded header in bytes.
    pub const SIZE: usize = 34;

    /// Encode the header into its fixed binary form.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&MAGIC.to_be_bytes());
        bytes[4..20].copy_from_slice(self.protocol.id.as_bytes());
        bytes[20..24].copy_from_slice(&self.protocol.version_major.to_be_bytes());
        bytes[24..28].copy_from_slice(&self.protocol.version_minor.to_be_bytes());
        bytes[28..30].copy_from_slice(&self.kind.to_be_bytes());
        bytes[30..34].copy_from_slice(&self.payload_len.to_be_bytes());
        bytes
    }

    /// Decode a header from the start of `data`.
    ///
    /// Validates the magic number and the payload limit. Protocol and kind
    /// validation belong to the codec, which knows which protocol it is.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < Self::SIZE {
            return Err(ProtocolError::Truncated { expected: Self::SIZE, actual: data.len() });
        }
        let magic = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        if magic != MAGIC {
            return Err(ProtocolError::InvalidMagic { expected: MAGIC, actual: magic });
        }
        let mut uuid_bytes = [0u8; 16];
        uuid_bytes.copy_from_slice(&data[4..20]);
        let version_major = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
        let version_minor = u32::from_be_bytes([data[24], data[25], data[26], data[27]]);
        let kind = u16::from_be_bytes([data[28], data[29]]);
        let payload_len = u32::from_be_bytes([data[30], data[31], data[32], data[33]]);
        if payload_len > PAYLOAD_LIMIT {
            return Err(ProtocolError::InvalidLength {
                context: format!("payload of {payload_len} bytes exceeds limit {PAYLOAD_LIMIT}"),
            });
        }
        Ok(Self {
            protocol: ProtocolId::new(Uuid::from_bytes(uuid_bytes), version_major, version_minor),
            kind,
            payload_len,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::ids::PIKE_PROTOCOL;

    fn header() -> MessageHeader {
        MessageHeader {
            protocol: ProtocolId::new(PIKE_PROTOCOL, 1, 0),
            kind: 0x0001,
            payload_len: 17,
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let h = header();
        let bytes = h.encode();
        assert_eq!(MessageHeader::decode(&bytes).unwrap(), h);
    }

    #[test]
    fn decode_rejects_truncation() {
        let bytes = header().encode();
        let result = MessageHeader::decode(&bytes[..MessageHeader::SIZE - 1]);
        assert!(matches!(result, Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let mut bytes = header().encode();
        bytes[0] ^= 0xff;
        let result = MessageHeader::decode(&bytes);
        assert!(matches!(result, Err(ProtocolError::InvalidMagic { .. })));
    }

    #[test]
    fn decode_rejects_oversized_payload() {
        let mut bytes = header().encode();
        bytes[30..34].copy_from_slice(&(PAYLOAD_LIMIT + 1).to_be_bytes());
        let result = MessageHeader::decode(&bytes);
        assert!(matches!(result, Err(ProtocolError::InvalidLength { .. })));
    }
}
