//! The HTTP transport seam.
//!
//! The protocol handler talks to an [`HttpTransport`] trait so tests can
//! script exchanges without a network. The production implementation wraps
//! `reqwest` with an in-process cookie store, which is what carries the
//! session cookie between requests.

use async_trait::async_trait;

use crate::error::ClientError;

/// One HTTP response, reduced to what the protocol needs.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// The response body.
    pub body: Vec<u8>,
}

/// An HTTP client scoped to one server base URI.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// `GET` a path relative to the base URI.
    async fn get(&self, path: &str) -> Result<TransportResponse, ClientError>;

    /// `POST` a binary body to a path relative to the base URI.
    async fn post(
        &self,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<TransportResponse, ClientError>;
}

/// The production transport: `reqwest` with cookies enabled.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base: reqwest::Url,
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport for one server.
    pub fn new(base: &str) -> Result<Self, ClientError> {
        let base = reqwest::Url::parse(base)
            .map_err(|source| ClientError::transport(format!("invalid base uri: {source}")))?;
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(concat!("eigion-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ClientError::transport(source.to_string()))?;
        Ok(Self { base, client })
    }

    fn resolve(&self, path: &str) -> Result<reqwest::Url, ClientError> {
        self.base
            .join(path)
            .map_err(|source| ClientError::transport(format!("invalid path {path:?}: {source}")))
    }

    async fn reduce(response: reqwest::Response) -> Result<TransportResponse, ClientError> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|source| ClientError::transport(source.to_string()))?;
        Ok(TransportResponse { status, content_type, body: body.to_vec() })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, path: &str) -> Result<TransportResponse, ClientError> {
        let url = self.resolve(path)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ClientError::transport(source.to_string()))?;
        Self::reduce(response).await
    }

    async fn post(
        &self,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<TransportResponse, ClientError> {
        let url = self.resolve(path)?;
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|source| ClientError::transport(source.to_string()))?;
        Self::reduce(response).await
    }
}
