//! The version discovery document.
//!
//! Served at the root endpoint, this small binary document lists the
//! protocol versions a server supports together with the endpoint path for
//! each. Clients fetch it once during negotiation and retain nothing from
//! it beyond the handler they construct.

use uuid::Uuid;

use crate::errors::ProtocolError;
use crate::ids::ProtocolId;

/// Content type of the version discovery document.
pub const VERSIONS_CONTENT_TYPE: &str = "application/eigion_versions";

/// Document magic: the ASCII bytes `EIGV`.
pub const VERSIONS_MAGIC: u32 = 0x4549_4756;

/// Upper bound on advertised protocols.
pub const PROTOCOL_LIMIT: u32 = 64;

/// Upper bound on an endpoint path, in bytes.
pub const PATH_LIMIT: usize = 256;

/// One advertised protocol version and where to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedProtocol {
    /// The protocol and version.
    pub protocol: ProtocolId,
    /// The endpoint path, resolved against the discovery base URI.
    pub endpoint_path: String,
}

/// The set of protocols a server supports.
///
/// Layout, all integers big-endian: magic, entry count, then per entry the
/// protocol UUID (16 bytes), major, minor, path length (u16) and the UTF-8
/// path bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionsDocument {
    /// The advertised protocols, in server preference order.
    pub protocols: Vec<SupportedProtocol>,
}

impl VersionsDocument {
    /// Encode the document to its binary form.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.protocols.len() > PROTOCOL_LIMIT as usize {
            return Err(ProtocolError::InvalidLength {
                context: format!("{} protocols exceeds limit {PROTOCOL_LIMIT}", self.protocols.len()),
            });
        }
        let mut out = Vec::new();
        out.extend_from_slice(&VERSIONS_MAGIC.to_be_bytes());
        out.extend_from_slice(&(self.protocols.len() as u32).to_be_bytes());
        for entry in &self.protocols {
            let path = entry.endpoint_path.as_bytes();
            if path.len() > PATH_LIMIT {
                return Err(ProtocolError::validity(
                    "endpoint_path",
                    format!("length {} exceeds limit {PATH_LIMIT}", path.len()),
                ));
            }
            out.extend_from_slice(entry.protocol.id.as_bytes());
            out.extend_from_slice(&entry.protocol.version_major.to_be_bytes());
            out.extend_from_slice(&entry.protocol.version_minor.to_be_bytes());
            out.extend_from_slice(&(path.len() as u16).to_be_bytes());
            out.extend_from_slice(path);
        }
        Ok(out)
    }

    /// Decode a document, validating bounds and UTF-8.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = Reader { data, offset: 0 };
        let magic = reader.u32()?;
        if magic != VERSIONS_MAGIC {
            return Err(ProtocolError::InvalidMagic { expected: VERSIONS_MAGIC, actual: magic });
        }
        let count = reader.u32()?;
        if count > PROTOCOL_LIMIT {
            return Err(ProtocolError::InvalidLength {
                context: format!("{count} protocols exceeds limit {PROTOCOL_LIMIT}"),
            });
        }
        let mut protocols = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let id = Uuid::from_bytes(reader.uuid()?);
            let version_major = reader.u32()?;
            let version_minor = reader.u32()?;
            let path_len = reader.u16()? as usize;
            if path_len > PATH_LIMIT {
                return Err(ProtocolError::validity(
                    "endpoint_path",
                    format!("length {path_len} exceeds limit {PATH_LIMIT}"),
                ));
            }
            let path = reader.bytes(path_len)?;
            let endpoint_path = std::str::from_utf8(path)
                .map_err(|e| ProtocolError::validity("endpoint_path", e.to_string()))?
                .to_string();
            protocols.push(SupportedProtocol {
                protocol: ProtocolId::new(id, version_major, version_minor),
                endpoint_path,
            });
        }
        if reader.offset != data.len() {
            return Err(ProtocolError::InvalidLength {
                context: format!("{} trailing bytes after document", data.len() - reader.offset),
            });
        }
        Ok(Self { protocols })
    }
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl Reader<'_> {
    fn bytes(&mut self, len: usize) -> Result<&[u8], ProtocolError> {
        let end = self.offset.checked_add(len).ok_or(ProtocolError::InvalidLength {
            context: "length overflow".to_string(),
        })?;
        if end > self.data.len() {
            return Err(ProtocolError::Truncated { expected: end, actual: self.data.len() });
        }
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn uuid(&mut self) -> Result<[u8; 16], ProtocolError> {
        let b = self.bytes(16)?;
        let mut out = [0u8; 16];
        out.copy_from_slice(b);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::ids::{AMBERJACK_PROTOCOL, PIKE_PROTOCOL};

    fn document() -> VersionsDocument {
        VersionsDocument {
            protocols: vec![
                SupportedProtocol {
                    protocol: ProtocolId::new(PIKE_PROTOCOL, 1, 0),
                    endpoint_path: "/pike/1/0".to_string(),
                },
                SupportedProtocol {
                    protocol: ProtocolId::new(AMBERJACK_PROTOCOL, 1, 0),
                    endpoint_path: "/amberjack/1/0".to_string(),
                },
            ],
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let doc = document();
        let bytes = doc.encode().unwrap();
        assert_eq!(VersionsDocument::decode(&bytes).unwrap(), doc);
    }

    #[test]
    fn empty_document_round_trips() {
        let doc = VersionsDocument::default();
        let bytes = doc.encode().unwrap();
        assert_eq!(VersionsDocument::decode(&bytes).unwrap(), doc);
    }

    #[test]
    fn decode_rejects_truncation() {
        let bytes = document().encode().unwrap();
        for len in 0..bytes.len() {
            assert!(VersionsDocument::decode(&bytes[..len]).is_err());
        }
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let mut bytes = document().encode().unwrap();
        bytes.push(0);
        assert!(matches!(
            VersionsDocument::decode(&bytes),
            Err(ProtocolError::InvalidLength { .. })
        ));
    }

    #[test]
    fn decode_rejects_excessive_count() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&VERSIONS_MAGIC.to_be_bytes());
        bytes.extend_from_slice(&(PROTOCOL_LIMIT + 1).to_be_bytes());
        assert!(matches!(
            VersionsDocument::decode(&bytes),
            Err(ProtocolError::InvalidLength { .. })
        ));
    }
}
