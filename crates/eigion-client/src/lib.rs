//! HTTP client for the Eigion protocol.
//!
//! The client negotiates a protocol version against the server's discovery
//! document, authenticates, and then exchanges framed binary commands over
//! HTTP. Session handling is transparent: the cookie store carries the
//! session, and an expired session triggers a bounded re-login-and-retry.
//!
//! Group creation from this side is a two-step conversation:
//!
//! ```no_run
//! # async fn demo() -> Result<(), eigion_client::ClientError> {
//! use eigion_client::{ClientRole, Credentials, ProtocolHandler, ReqwestTransport};
//! use eigion_proto::messages::{Command, ResponsePayload};
//! use eigion_proto::model::GroupName;
//!
//! let transport = ReqwestTransport::new("http://localhost:8080/")?;
//! let credentials = Credentials { user_name: "alice".into(), password: "secret".into() };
//! let (handler, _user) = ProtocolHandler::connect(transport, ClientRole::Pike, credentials).await?;
//!
//! let group_name = GroupName::new("com.example.readers")?;
//! let begun = handler.call(&Command::GroupCreateBegin { group_name }).await?;
//! if let ResponsePayload::GroupCreateBegin { token } = begun {
//!     handler.call(&Command::GroupCreateReady { token }).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handler;
pub mod negotiation;
pub mod paging;
pub mod transport;

pub use error::ClientError;
pub use handler::{ClientRole, Credentials, ProtocolHandler, MAX_COMMAND_ATTEMPTS};
pub use paging::PagedSearch;
pub use transport::{HttpTransport, ReqwestTransport, TransportResponse};
