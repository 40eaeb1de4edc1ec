//! Command execution.
//!
//! Every command runs the same pipeline: policy check, handler, central
//! error mapping. Handlers return `Result<ResponsePayload, CoreError>` and
//! never build error responses themselves; [`execute`] converts failures to
//! wire errors in exactly one place. The caller owns the transaction and
//! commits it only when the returned payload is not an error.

use eigion_proto::messages::{Command, Response, ResponsePayload};
use eigion_proto::model::{
    AuditFilter, GroupCreationRequest, GroupName, RequestStatus, RequestToken,
};
use eigion_proto::ErrorCode;
use rand::RngCore;
use tracing::{debug, error, info_span};
use uuid::Uuid;

use crate::cursor::{PageNav, SearchCursor, SearchKind, SessionCursor};
use crate::error::CoreError;
use crate::policy::{Action, SecurityPolicy};
use crate::session::Session;
use crate::store::{GroupRequestFilter, GroupSearchFilter, Role, Transaction};

/// Everything one command execution needs.
pub struct ExecContext<'a> {
    /// The open transaction; the caller commits or rolls back.
    pub transaction: &'a mut (dyn Transaction + 'a),
    /// The caller's session.
    pub session: &'a Session,
    /// The security policy.
    pub policy: &'a dyn SecurityPolicy,
    /// The role of the endpoint the command arrived on.
    pub role: Role,
    /// The server-assigned correlation id, echoed in the response.
    pub request_id: Uuid,
    /// The current time, unix milliseconds.
    pub now: u64,
}

/// Run one command and produce its response.
///
/// Never fails: handler errors become error responses. The caller must
/// commit the transaction only when the response payload is not an error.
pub fn execute(ctx: &mut ExecContext<'_>, command: &Command) -> Response {
    let span = info_span!("command", name = command.name(), request_id = %ctx.request_id);
    let _guard = span.enter();
    match run(ctx, command) {
        Ok(payload) => {
            debug!("command succeeded");
            Response::new(ctx.request_id, payload)
        }
        Err(failure) => {
            let code = failure.error_code();
            if matches!(code, ErrorCode::InternalError | ErrorCode::SqlError) {
                error!(%code, detail = %failure, "command failed");
            } else {
                debug!(%code, detail = %failure, "command rejected");
            }
            Response::error(ctx.request_id, code, failure.client_message())
        }
    }
}

fn run(ctx: &mut ExecContext<'_>, command: &Command) -> Result<ResponsePayload, CoreError> {
    check_policy(ctx, command)?;
    match command {
        // Authentication is handled before a session exists; on the
        // command path both are usage errors.
        Command::Login { .. } => Err(CoreError::usage("already logged in")),
        Command::Logout => Err(CoreError::usage("logout is handled by the transport")),
        Command::GroupCreateBegin { group_name } => group_create_begin(ctx, group_name),
        Command::GroupCreateReady { token } => group_create_ready(ctx, token),
        Command::GroupCreateCancel { token } => group_create_cancel(ctx, token),
        Command::GroupCreateRequestsBegin { page_size } => {
            let filter = GroupRequestFilter { founder: ctx.session.user().id };
            ctx.session.cursors().insert(
                SearchKind::GroupRequests,
                SessionCursor::GroupRequests(SearchCursor::new(filter, *page_size)),
            );
            request_search_page(ctx, PageNav::Current)
        }
        Command::GroupCreateRequestsNext => request_search_page(ctx, PageNav::Next),
        Command::GroupCreateRequestsPrevious => request_search_page(ctx, PageNav::Previous),
        Command::GroupSearchBegin { query, page_size } => {
            let filter = GroupSearchFilter { query: query.clone() };
            ctx.session.cursors().insert(
                SearchKind::GroupsByName,
                SessionCursor::GroupsByName(SearchCursor::new(filter, *page_size)),
            );
            group_search_page(ctx, PageNav::Current)
        }
        Command::GroupSearchNext => group_search_page(ctx, PageNav::Next),
        Command::GroupSearchPrevious => group_search_page(ctx, PageNav::Previous),
        Command::AuditSearchBegin { filter, page_size } => {
            ctx.session.cursors().insert(
                SearchKind::Audit,
                SessionCursor::Audit(SearchCursor::new(filter.clone(), *page_size)),
            );
            audit_search_page(ctx, PageNav::Current)
        }
        Command::AuditSearchNext => audit_search_page(ctx, PageNav::Next),
        Command::AuditSearchPrevious => audit_search_page(ctx, PageNav::Previous),
    }
}

fn check_policy(ctx: &ExecContext<'_>, command: &Command) -> Result<(), CoreError> {
    let resource = match command {
        Command::GroupCreateBegin { group_name } => Some(group_name.as_str()),
        Command::GroupCreateReady { token } | Command::GroupCreateCancel { token } => {
            Some(token.as_str())
        }
        _ => None,
    };
    let action = Action {
        user: ctx.session.user(),
        command: command.name(),
        role: ctx.role,
        resource,
    };
    ctx.policy.check(&action).map_err(|denied| CoreError::security(denied.message))
}

fn group_create_begin(
    ctx: &mut ExecContext<'_>,
    group_name: &GroupName,
) -> Result<ResponsePayload, CoreError> {
    if ctx.transaction.group_exists(group_name)? {
        return Err(CoreError::domain(
            ErrorCode::GroupDuplicate,
            format!("group {group_name} already exists"),
        ));
    }
    let token = generate_token()?;
    let founder = ctx.session.user().id;
    let request = GroupCreationRequest {
        group_name: group_name.clone(),
        founder,
        token: token.clone(),
        status: RequestStatus::InProgress { time_started: ctx.now },
    };
    ctx.transaction.request_create(&request)?;
    ctx.transaction.audit_put(
        ctx.now,
        founder,
        "GROUP_CREATE_BEGIN",
        &format!("opened request {token} for group {group_name}"),
    )?;
    Ok(ResponsePayload::GroupCreateBegin { token })
}

fn group_create_ready(
    ctx: &mut ExecContext<'_>,
    token: &RequestToken,
) -> Result<ResponsePayload, CoreError> {
    let request = fetch_own_request(ctx, token)?;
    if ctx.transaction.group_exists(&request.group_name)? {
        return Err(CoreError::domain(
            ErrorCode::GroupDuplicate,
            format!("group {} already exists", request.group_name),
        ));
    }
    ctx.transaction.group_create(&request.group_name, request.founder, ctx.now)?;
    let status = RequestStatus::Succeeded {
        time_started: request.status.time_started(),
        time_completed: ctx.now,
    };
    ctx.transaction.request_update_status(token, &status)?;
    ctx.transaction.audit_put(
        ctx.now,
        request.founder,
        "GROUP_CREATE_READY",
        &format!("created group {} from request {token}", request.group_name),
    )?;
    Ok(ResponsePayload::GroupCreateReady)
}

fn group_create_cancel(
    ctx: &mut ExecContext<'_>,
    token: &RequestToken,
) -> Result<ResponsePayload, CoreError> {
    let request = fetch_own_request(ctx, token)?;
    let status = RequestStatus::Cancelled {
        time_started: request.status.time_started(),
        time_completed: ctx.now,
    };
    ctx.transaction.request_update_status(token, &status)?;
    ctx.transaction.audit_put(
        ctx.now,
        request.founder,
        "GROUP_CREATE_CANCEL",
        &format!("cancelled request {token} for group {}", request.group_name),
    )?;
    Ok(ResponsePayload::GroupCreateCancel)
}

/// Load an in-progress request and verify the caller opened it.
fn fetch_own_request(
    ctx: &mut ExecContext<'_>,
    token: &RequestToken,
) -> Result<GroupCreationRequest, CoreError> {
    let request = ctx
        .transaction
        .request_get(token)?
        .ok_or_else(|| CoreError::not_found(format!("no request with token {token}")))?;
    if request.founder != ctx.session.user().id {
        // Do not leak whether the token exists.
        return Err(CoreError::security(format!("no request with token {token}")));
    }
    if !request.status.is_in_progress() {
        return Err(CoreError::domain(
            ErrorCode::GroupRequestWrongState,
            format!("request {token} is no longer in progress"),
        ));
    }
    Ok(request)
}

fn request_search_page(
    ctx: &mut ExecContext<'_>,
    nav: PageNav,
) -> Result<ResponsePayload, CoreError> {
    let (filter, plan) = {
        let mut cursors = ctx.session.cursors();
        let Some(SessionCursor::GroupRequests(cursor)) = cursors.get_mut(&SearchKind::GroupRequests)
        else {
            return Err(CoreError::usage("no group request search is in progress"));
        };
        let filter = cursor.filter;
        let total = ctx.transaction.request_search_count(&filter)?;
        (filter, cursor.step(nav, total))
    };
    let items = ctx.transaction.request_search_page(&filter, plan.offset, plan.limit)?;
    Ok(ResponsePayload::GroupRequestsPage { page: plan.into_page(items) })
}

fn group_search_page(
    ctx: &mut ExecContext<'_>,
    nav: PageNav,
) -> Result<ResponsePayload, CoreError> {
    let (filter, plan) = {
        let mut cursors = ctx.session.cursors();
        let Some(SessionCursor::GroupsByName(cursor)) = cursors.get_mut(&SearchKind::GroupsByName)
        else {
            return Err(CoreError::usage("no group search is in progress"));
        };
        let filter = cursor.filter.clone();
        let total = ctx.transaction.group_search_count(&filter)?;
        (filter, cursor.step(nav, total))
    };
    let items = ctx.transaction.group_search_page(&filter, plan.offset, plan.limit)?;
    Ok(ResponsePayload::GroupsPage { page: plan.into_page(items) })
}

fn audit_search_page(
    ctx: &mut ExecContext<'_>,
    nav: PageNav,
) -> Result<ResponsePayload, CoreError> {
    let (filter, plan) = {
        let mut cursors = ctx.session.cursors();
        let Some(SessionCursor::Audit(cursor)) = cursors.get_mut(&SearchKind::Audit) else {
            return Err(CoreError::usage("no audit search is in progress"));
        };
        let filter: AuditFilter = cursor.filter.clone();
        let total = ctx.transaction.audit_search_count(&filter)?;
        (filter, cursor.step(nav, total))
    };
    let items = ctx.transaction.audit_search_page(&filter, plan.offset, plan.limit)?;
    Ok(ResponsePayload::AuditPage { page: plan.into_page(items) })
}

/// Generate a fresh request token from the operating system's RNG.
pub fn generate_token() -> Result<RequestToken, CoreError> {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    RequestToken::new(hex::encode(bytes))
        .map_err(|source| CoreError::internal(format!("generated token rejected: {source}")))
}
