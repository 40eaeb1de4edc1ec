//! Protocol version negotiation.
//!
//! The client fetches the discovery document from the server root and picks
//! the highest advertised version it can speak. Versions are compared per
//! protocol UUID; a different major version is a different language, so a
//! match requires the same UUID and major, and the minor is advisory.

use eigion_proto::ids::ProtocolId;
use eigion_proto::versions::{SupportedProtocol, VersionsDocument, VERSIONS_CONTENT_TYPE};
use tracing::debug;

use crate::error::ClientError;
use crate::transport::{HttpTransport, TransportResponse};

/// Pick the best mutually supported protocol from a discovery document.
///
/// `speaks` lists the protocol versions this client implements. Among the
/// advertised entries matching one of them by UUID and major version, the
/// highest `(major, minor)` wins.
pub fn select_protocol(
    document: &VersionsDocument,
    speaks: &[ProtocolId],
) -> Result<SupportedProtocol, ClientError> {
    document
        .protocols
        .iter()
        .filter(|entry| {
            speaks.iter().any(|ours| {
                ours.is_same_protocol(&entry.protocol)
                    && ours.version_major == entry.protocol.version_major
            })
        })
        .max_by_key(|entry| entry.protocol.version())
        .cloned()
        .ok_or(ClientError::NoSupportedProtocols)
}

/// Fetch the discovery document and negotiate a protocol.
pub async fn negotiate(
    transport: &dyn HttpTransport,
    speaks: &[ProtocolId],
) -> Result<SupportedProtocol, ClientError> {
    let response = transport.get("/").await?;
    let document = decode_versions(&response)?;
    let selected = select_protocol(&document, speaks)?;
    debug!(protocol = %selected.protocol, path = %selected.endpoint_path, "negotiated protocol");
    Ok(selected)
}

fn decode_versions(response: &TransportResponse) -> Result<VersionsDocument, ClientError> {
    if response.status != 200 {
        return Err(ClientError::Http { status: response.status });
    }
    if response.content_type.as_deref() != Some(VERSIONS_CONTENT_TYPE) {
        return Err(ClientError::transport(format!(
            "discovery document has content type {:?}",
            response.content_type
        )));
    }
    Ok(VersionsDocument::decode(&response.body)?)
}
