//! The protocol handler: authenticated command exchange over HTTP.
//!
//! A handler owns a negotiated codec and endpoint path plus the caller's
//! credentials. Sessions are invisible to callers: the transport's cookie
//! store carries the session cookie, and when the server reports an expired
//! session the handler re-authenticates and retries, up to a fixed number
//! of attempts.

use eigion_proto::errors::ProtocolError;
use eigion_proto::ids::ProtocolId;
use eigion_proto::messages::{Command, Message, ResponsePayload};
use eigion_proto::model::User;
use eigion_proto::wire_v1::WireCodec;
use eigion_proto::ErrorCode;
use tracing::debug;

use crate::error::ClientError;
use crate::negotiation;
use crate::transport::{HttpTransport, TransportResponse};

/// How many times one command is attempted before giving up; retries after
/// the first attempt re-authenticate first.
pub const MAX_COMMAND_ATTEMPTS: u32 = 3;

/// The role a client connects as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRole {
    /// An ordinary user.
    Pike,
    /// An administrator.
    Amberjack,
}

impl ClientRole {
    fn codec(self) -> WireCodec {
        match self {
            Self::Pike => WireCodec::pike_v1(),
            Self::Amberjack => WireCodec::amberjack_v1(),
        }
    }
}

/// Login credentials, held for transparent re-authentication.
#[derive(Clone)]
pub struct Credentials {
    /// The user name.
    pub user_name: String,
    /// The password.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("user_name", &self.user_name).finish_non_exhaustive()
    }
}

/// One negotiated, authenticated protocol conversation.
pub struct ProtocolHandler<T> {
    transport: T,
    codec: WireCodec,
    endpoint_path: String,
    credentials: Credentials,
}

impl<T: HttpTransport> ProtocolHandler<T> {
    /// Negotiate a protocol with the server and log in.
    pub async fn connect(
        transport: T,
        role: ClientRole,
        credentials: Credentials,
    ) -> Result<(Self, User), ClientError> {
        let codec = role.codec();
        let speaks: [ProtocolId; 1] = [*codec.protocol()];
        let selected = negotiation::negotiate(&transport, &speaks).await?;
        let codec = WireCodec::for_protocol(&selected.protocol)
            .ok_or(ClientError::NoSupportedProtocols)?;
        let handler =
            Self { transport, codec, endpoint_path: selected.endpoint_path, credentials };
        let user = handler.login().await?;
        Ok((handler, user))
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The endpoint path commands are posted under.
    pub fn endpoint_path(&self) -> &str {
        &self.endpoint_path
    }

    /// Authenticate, replacing any previous session.
    pub async fn login(&self) -> Result<User, ClientError> {
        let command = Command::Login {
            user_name: self.credentials.user_name.clone(),
            password: self.credentials.password.clone(),
        };
        let payload = self.post(&command, "login").await?;
        match payload {
            ResponsePayload::Login { user } => Ok(user),
            ResponsePayload::Error { code, message } => Err(ClientError::Server { code, message }),
            other => Err(unexpected_payload(&other)),
        }
    }

    /// Close the current session.
    pub async fn logout(&self) -> Result<(), ClientError> {
        match self.post(&Command::Logout, "command").await? {
            ResponsePayload::Logout => Ok(()),
            ResponsePayload::Error { code, message } => Err(ClientError::Server { code, message }),
            other => Err(unexpected_payload(&other)),
        }
    }

    /// Execute one command, re-authenticating on session expiry.
    ///
    /// The command is attempted at most [`MAX_COMMAND_ATTEMPTS`] times.
    /// A bounded loop rather than recursion keeps the retry budget obvious.
    pub async fn call(&self, command: &Command) -> Result<ResponsePayload, ClientError> {
        for attempt in 1..=MAX_COMMAND_ATTEMPTS {
            if attempt > 1 {
                debug!(attempt, command = command.name(), "re-authenticating before retry");
                self.login().await?;
            }
            match self.post(command, "command").await? {
                ResponsePayload::Error { code: ErrorCode::AuthenticationError, message } => {
                    debug!(command = command.name(), %message, "session rejected");
                }
                ResponsePayload::Error { code, message } => {
                    return Err(ClientError::Server { code, message });
                }
                payload => {
                    if payload.kind() != command.response_kind() {
                        return Err(unexpected_payload(&payload));
                    }
                    return Ok(payload);
                }
            }
        }
        Err(ClientError::Server {
            code: ErrorCode::AuthenticationError,
            message: format!("session rejected {MAX_COMMAND_ATTEMPTS} times"),
        })
    }

    async fn post(&self, command: &Command, route: &str) -> Result<ResponsePayload, ClientError> {
        let frame = self.codec.serialize(&Message::Command(command.clone()))?;
        let path = format!("{}/{route}", self.endpoint_path.trim_end_matches('/'));
        let response =
            self.transport.post(&path, self.codec.content_type(), frame).await?;
        self.parse(&response)
    }

    fn parse(&self, response: &TransportResponse) -> Result<ResponsePayload, ClientError> {
        if response.content_type.as_deref() != Some(self.codec.content_type()) {
            // Non-protocol responses, such as proxy error pages, are
            // transport failures, not server errors.
            if response.status != 200 && response.body.is_empty() {
                return Err(ClientError::Http { status: response.status });
            }
            return Err(ClientError::Protocol(ProtocolError::UnsupportedProtocol {
                context: format!("response content type {:?}", response.content_type),
            }));
        }
        match self.codec.parse(&response.body)? {
            Message::Response(response) => Ok(response.payload),
            Message::Command(_) => Err(ClientError::Protocol(ProtocolError::validity(
                "message",
                "expected a response frame",
            ))),
        }
    }
}

fn unexpected_payload(payload: &ResponsePayload) -> ClientError {
    ClientError::Protocol(ProtocolError::UnsupportedProtocol {
        context: format!("unexpected response payload {:?}", payload.kind()),
    })
}
