//! HTTP surface: version discovery, login and command endpoints.
//!
//! The wire protocol rides POST bodies; HTTP contributes routing, body
//! limits and the session cookie. Every protocol-level failure is returned
//! as a framed error response so clients only ever parse one format. Once a
//! command has been dispatched, the status line is always 200 and the typed
//! error travels in the body; non-200 statuses are reserved for failures
//! that occur before a response exists.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::{get, post};
use axum::Router;
use eigion_core::clock::{Clock, SystemClock};
use eigion_core::dispatch::dispatch_command;
use eigion_core::idp::{IdentityProvider, IdpError};
use eigion_core::policy::SecurityPolicy;
use eigion_core::session::{SessionManager, SessionSecret};
use eigion_core::store::{Role, Store, StoreError};
use eigion_proto::header::{MessageHeader, PAYLOAD_LIMIT};
use eigion_proto::messages::{Command, Message, Response, ResponsePayload};
use eigion_proto::model::{Permission, User};
use eigion_proto::versions::{SupportedProtocol, VersionsDocument, VERSIONS_CONTENT_TYPE};
use eigion_proto::wire_v1::WireCodec;
use eigion_proto::ErrorCode;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "EIGION_SESSION";

/// Path of the Pike version 1 endpoint.
pub const PIKE_ENDPOINT: &str = "/pike/1/0";

/// Path of the Amberjack version 1 endpoint.
pub const AMBERJACK_ENDPOINT: &str = "/amberjack/1/0";

/// Body limit for login requests: one header plus a 1 KiB payload.
const LOGIN_BODY_LIMIT: usize = MessageHeader::SIZE + 1024;

/// Body limit for command requests: one maximal frame.
const COMMAND_BODY_LIMIT: usize = MessageHeader::SIZE + PAYLOAD_LIMIT as usize;

/// Shared server state.
pub struct AppState {
    store: Arc<dyn Store>,
    idp: Arc<dyn IdentityProvider>,
    sessions: Arc<SessionManager>,
    policy: Arc<dyn SecurityPolicy>,
    admin: Option<String>,
    clock: SystemClock,
}

impl AppState {
    /// Assemble server state from its collaborators.
    pub fn new(
        store: Arc<dyn Store>,
        idp: Arc<dyn IdentityProvider>,
        sessions: Arc<SessionManager>,
        policy: Arc<dyn SecurityPolicy>,
        admin: Option<String>,
    ) -> Self {
        Self { store, idp, sessions, policy, admin, clock: SystemClock }
    }

    /// The session manager, shared with the purge task.
    pub fn sessions(&self) -> Arc<SessionManager> {
        Arc::clone(&self.sessions)
    }
}

/// Build the server router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(get_versions))
        .route(
            &format!("{PIKE_ENDPOINT}/login"),
            post(pike_login).layer(DefaultBodyLimit::max(LOGIN_BODY_LIMIT)),
        )
        .route(
            &format!("{PIKE_ENDPOINT}/command"),
            post(pike_command).layer(DefaultBodyLimit::max(COMMAND_BODY_LIMIT)),
        )
        .route(
            &format!("{AMBERJACK_ENDPOINT}/login"),
            post(amberjack_login).layer(DefaultBodyLimit::max(LOGIN_BODY_LIMIT)),
        )
        .route(
            &format!("{AMBERJACK_ENDPOINT}/command"),
            post(amberjack_command).layer(DefaultBodyLimit::max(COMMAND_BODY_LIMIT)),
        )
        .with_state(state)
}

async fn get_versions() -> HttpResponse {
    let document = VersionsDocument {
        protocols: vec![
            SupportedProtocol {
                protocol: *WireCodec::pike_v1().protocol(),
                endpoint_path: PIKE_ENDPOINT.to_string(),
            },
            SupportedProtocol {
                protocol: *WireCodec::amberjack_v1().protocol(),
                endpoint_path: AMBERJACK_ENDPOINT.to_string(),
            },
        ],
    };
    match document.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, VERSIONS_CONTENT_TYPE)], body).into_response(),
        Err(failure) => {
            error!(error = %failure, "failed to encode versions document");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn pike_login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    run_blocking(move || login(&state, Role::Pike, &headers, &body)).await
}

async fn amberjack_login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    run_blocking(move || login(&state, Role::Amberjack, &headers, &body)).await
}

async fn pike_command(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    run_blocking(move || command(&state, Role::Pike, &headers, &body)).await
}

async fn amberjack_command(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    run_blocking(move || command(&state, Role::Amberjack, &headers, &body)).await
}

/// Request bodies touch the store through synchronous rusqlite calls, so
/// they run on the blocking pool, not a runtime worker.
async fn run_blocking(task: impl FnOnce() -> HttpResponse + Send + 'static) -> HttpResponse {
    match tokio::task::spawn_blocking(task).await {
        Ok(response) => response,
        Err(failure) => {
            error!(error = %failure, "request task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// A protocol-level rejection, rendered as a framed error response.
struct Reject {
    status: StatusCode,
    code: ErrorCode,
    message: String,
}

impl Reject {
    fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    fn database() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::SqlError, "database error")
    }
}

impl From<StoreError> for Reject {
    fn from(error: StoreError) -> Self {
        warn!(error = %error, "store failure");
        Self::database()
    }
}

fn codec_for(role: Role) -> WireCodec {
    match role {
        Role::Pike => WireCodec::pike_v1(),
        Role::Amberjack => WireCodec::amberjack_v1(),
    }
}

fn login(state: &AppState, role: Role, headers: &HeaderMap, body: &[u8]) -> HttpResponse {
    let codec = codec_for(role);
    let request_id = Uuid::new_v4();
    match login_inner(state, role, &codec, request_id, headers, body) {
        Ok(response) => response,
        Err(reject) => wire_error(&codec, request_id, &reject),
    }
}

fn login_inner(
    state: &AppState,
    role: Role,
    codec: &WireCodec,
    request_id: Uuid,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<HttpResponse, Reject> {
    let Command::Login { user_name, password } = parse_command(codec, headers, body)? else {
        return Err(Reject::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::UsageError,
            "only LOGIN is accepted on the login endpoint",
        ));
    };

    let (idp_user, mut handle) = match state.idp.login(&user_name, &password) {
        Ok(authenticated) => authenticated,
        Err(IdpError::AuthenticationFailed) => {
            debug!(user = %user_name, "authentication failed");
            return Err(Reject::new(
                StatusCode::UNAUTHORIZED,
                ErrorCode::AuthenticationError,
                "authentication failed",
            ));
        }
        Err(IdpError::Io { context }) => {
            error!(context = %context, "identity provider unavailable");
            return Err(Reject::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::IoError,
                "identity provider unavailable",
            ));
        }
    };

    let user = match register_user(state, role, &idp_user.id, &idp_user.name) {
        Ok(user) => user,
        Err(reject) => {
            close_handle(&mut *handle);
            return Err(reject);
        }
    };

    if role == Role::Amberjack && !user.holds(Permission::AmberjackAccess) {
        close_handle(&mut *handle);
        return Err(Reject::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::SecurityPolicyDenied,
            "administrative access denied",
        ));
    }

    let (secret, _session) = state
        .sessions
        .create_session(Instant::now(), user.clone(), handle)
        .map_err(|failure| {
            error!(error = %failure, "session creation failed");
            Reject::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InternalError,
                "internal server error",
            )
        })?;

    let response = Response::new(request_id, ResponsePayload::Login { user });
    let cookie =
        format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Strict", secret.expose());
    wire_reply(codec, StatusCode::OK, &response, Some(cookie))
}

/// Ensure the user row exists, apply the admin grant, and record the login.
fn register_user(state: &AppState, role: Role, id: &Uuid, name: &str) -> Result<User, Reject> {
    let mut connection = state.store.connect(role)?;
    let mut transaction = connection.open_transaction()?;
    let mut user = transaction.user_get_or_create(*id, name)?;
    if state.admin.as_deref() == Some(name) {
        for permission in Permission::ALL {
            transaction.user_permission_grant(*id, permission)?;
            user.permissions.insert(permission);
        }
    }
    transaction.audit_put(state.clock.now_millis(), *id, "LOGIN", "user logged in")?;
    transaction.commit()?;
    Ok(user)
}

fn command(state: &AppState, role: Role, headers: &HeaderMap, body: &[u8]) -> HttpResponse {
    let codec = codec_for(role);
    let request_id = Uuid::new_v4();
    match command_inner(state, role, &codec, request_id, headers, body) {
        Ok(response) => response,
        Err(reject) => wire_error(&codec, request_id, &reject),
    }
}

fn command_inner(
    state: &AppState,
    role: Role,
    codec: &WireCodec,
    request_id: Uuid,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<HttpResponse, Reject> {
    let command = parse_command(codec, headers, body)?;
    let secret = session_cookie(headers).ok_or_else(|| {
        Reject::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::AuthenticationError,
            "no valid session",
        )
    })?;
    let session = state.sessions.find_session(&secret, Instant::now()).ok_or_else(|| {
        Reject::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::AuthenticationError,
            "no valid session",
        )
    })?;

    if matches!(command, Command::Logout) {
        let owner = session.user().id;
        state.sessions.delete_session(&secret);
        record_logout(state, role, owner);
        let response = Response::new(request_id, ResponsePayload::Logout);
        let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0");
        return wire_reply(codec, StatusCode::OK, &response, Some(cookie));
    }

    let mut connection = state.store.connect(role)?;
    let response = dispatch_command(
        connection.as_mut(),
        &session,
        state.policy.as_ref(),
        role,
        request_id,
        state.clock.now_millis(),
        &command,
    )?;

    // A dispatched response always rides a 200; the error, if any, is in
    // the body.
    wire_reply(codec, StatusCode::OK, &response, None)
}

/// Best-effort logout audit record; the session is gone either way.
fn record_logout(state: &AppState, role: Role, owner: Uuid) {
    let result = (|| -> Result<(), StoreError> {
        let mut connection = state.store.connect(role)?;
        let mut transaction = connection.open_transaction()?;
        transaction.audit_put(state.clock.now_millis(), owner, "LOGOUT", "user logged out")?;
        transaction.commit()
    })();
    if let Err(failure) = result {
        warn!(error = %failure, "failed to record logout");
    }
}

fn parse_command(
    codec: &WireCodec,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Command, Reject> {
    let content_type =
        headers.get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok());
    if content_type != Some(codec.content_type()) {
        return Err(Reject::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::ProtocolError,
            format!("expected content type {}", codec.content_type()),
        ));
    }
    match codec.parse(body) {
        Ok(Message::Command(command)) => Ok(command),
        Ok(Message::Response(_)) => Err(Reject::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::ProtocolError,
            "expected a command frame",
        )),
        Err(failure) => Err(Reject::new(
            StatusCode::BAD_REQUEST,
            ErrorCode::ProtocolError,
            failure.to_string(),
        )),
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<SessionSecret> {
    let value = headers.get(header::COOKIE)?.to_str().ok()?;
    value.split(';').map(str::trim).find_map(|pair| {
        pair.strip_prefix(SESSION_COOKIE)?
            .strip_prefix('=')
            .and_then(|secret| SessionSecret::parse(secret).ok())
    })
}

fn wire_reply(
    codec: &WireCodec,
    status: StatusCode,
    response: &Response,
    cookie: Option<String>,
) -> Result<HttpResponse, Reject> {
    let frame = codec.serialize(&Message::Response(response.clone())).map_err(|failure| {
        error!(error = %failure, "failed to serialize response");
        Reject::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError,
            "internal server error",
        )
    })?;
    let mut builder = axum::http::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, codec.content_type());
    if let Some(cookie) = cookie {
        builder = builder.header(header::SET_COOKIE, cookie);
    }
    builder.body(axum::body::Body::from(frame)).map_err(|failure| {
        error!(error = %failure, "failed to build response");
        Reject::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError,
            "internal server error",
        )
    })
}

fn wire_error(codec: &WireCodec, request_id: Uuid, reject: &Reject) -> HttpResponse {
    let response = Response::error(request_id, reject.code.clone(), reject.message.clone());
    match wire_reply(codec, reject.status, &response, None) {
        Ok(response) => response,
        // Serialization of a plain error cannot realistically fail; fall
        // back to a bare status so the client at least sees the class.
        Err(_) => reject.status.into_response(),
    }
}

fn close_handle(handle: &mut dyn eigion_core::idp::IdentityHandle) {
    if let Err(failure) = handle.close() {
        warn!(error = %failure, "failed to close identity handle");
    }
}
