//! End-to-end executor tests against an in-memory transactional store.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]
#![allow(missing_docs)]

mod support;

use std::collections::BTreeSet;
use std::time::Instant;

use eigion_core::dispatch::dispatch_command;
use eigion_core::idp::NullIdentityHandle;
use eigion_core::policy::PermissionPolicy;
use eigion_core::session::{Session, SessionManager, SessionManagerConfig};
use eigion_core::store::Role;
use eigion_proto::messages::{Command, Response, ResponsePayload};
use eigion_proto::model::{
    GroupCreationRequest, GroupName, Permission, RequestStatus, RequestToken, User,
};
use eigion_proto::ErrorCode;
use std::sync::Arc;
use uuid::Uuid;

use support::MemStore;

const CALLER: Uuid = Uuid::from_u128(1);

struct Fixture {
    store: MemStore,
    _manager: SessionManager,
    session: Arc<Session>,
}

impl Fixture {
    fn new(permissions: &[Permission]) -> Self {
        let store = MemStore::new();
        let manager = SessionManager::new(SessionManagerConfig::default());
        let user = User { id: CALLER, permissions: permissions.iter().copied().collect() };
        let (_, session) = manager
            .create_session(Instant::now(), user, Box::new(NullIdentityHandle))
            .unwrap();
        Self { store, _manager: manager, session }
    }

    fn run_as(&self, role: Role, command: Command) -> Response {
        let mut connection = self.store.connection();
        dispatch_command(
            &mut connection,
            &self.session,
            &PermissionPolicy,
            role,
            Uuid::from_u128(0xfeed),
            1_000,
            &command,
        )
        .unwrap()
    }

    fn run(&self, command: Command) -> Response {
        self.run_as(Role::Pike, command)
    }
}

fn error_code(response: &Response) -> Option<ErrorCode> {
    match &response.payload {
        ResponsePayload::Error { code, .. } => Some(code.clone()),
        _ => None,
    }
}

fn group(name: &str) -> GroupName {
    GroupName::new(name).unwrap()
}

fn seed_request(fixture: &Fixture, founder: Uuid, name: &str, token: &str) -> RequestToken {
    let token = RequestToken::new(token).unwrap();
    let request = GroupCreationRequest {
        group_name: group(name),
        founder,
        token: token.clone(),
        status: RequestStatus::InProgress { time_started: 500 },
    };
    fixture.store.with_state(|state| state.requests.push(request));
    token
}

#[test]
fn begin_is_denied_without_group_create() {
    let fixture = Fixture::new(&[]);
    let response = fixture.run(Command::GroupCreateBegin { group_name: group("com.example") });
    assert_eq!(error_code(&response), Some(ErrorCode::SecurityPolicyDenied));
    fixture.store.with_state(|state| assert!(state.requests.is_empty()));
}

#[test]
fn group_creation_lifecycle() {
    let fixture = Fixture::new(&[Permission::GroupCreate]);

    let response = fixture.run(Command::GroupCreateBegin { group_name: group("com.example") });
    let token = match response.payload {
        ResponsePayload::GroupCreateBegin { token } => token,
        other => panic!("unexpected payload: {other:?}"),
    };
    fixture.store.with_state(|state| {
        assert_eq!(state.requests.len(), 1);
        assert!(state.requests[0].status.is_in_progress());
        assert_eq!(state.audit.len(), 1);
        assert_eq!(state.audit[0].kind, "GROUP_CREATE_BEGIN");
    });

    let response = fixture.run(Command::GroupCreateReady { token: token.clone() });
    assert_eq!(response.payload, ResponsePayload::GroupCreateReady);
    fixture.store.with_state(|state| {
        assert!(state.groups.contains_key(&group("com.example")));
        assert!(matches!(state.requests[0].status, RequestStatus::Succeeded { .. }));
    });

    // The group now exists, so a new request for the same name is refused.
    let response = fixture.run(Command::GroupCreateBegin { group_name: group("com.example") });
    assert_eq!(error_code(&response), Some(ErrorCode::GroupDuplicate));
}

#[test]
fn cancelled_request_cannot_complete() {
    let fixture = Fixture::new(&[Permission::GroupCreate]);
    let token = seed_request(&fixture, CALLER, "com.example", &"ab".repeat(16));

    let response = fixture.run(Command::GroupCreateCancel { token: token.clone() });
    assert_eq!(response.payload, ResponsePayload::GroupCreateCancel);

    let response = fixture.run(Command::GroupCreateReady { token });
    assert_eq!(error_code(&response), Some(ErrorCode::GroupRequestWrongState));
    fixture.store.with_state(|state| assert!(state.groups.is_empty()));
}

#[test]
fn unknown_token_is_not_found() {
    let fixture = Fixture::new(&[Permission::GroupCreate]);
    let token = RequestToken::new("00".repeat(16)).unwrap();
    let response = fixture.run(Command::GroupCreateReady { token });
    assert_eq!(error_code(&response), Some(ErrorCode::NotFound));
}

#[test]
fn foreign_request_is_denied_without_leaking_existence() {
    let fixture = Fixture::new(&[Permission::GroupCreate]);
    let token = seed_request(&fixture, Uuid::from_u128(2), "com.example", &"cd".repeat(16));
    let response = fixture.run(Command::GroupCreateReady { token });
    assert_eq!(error_code(&response), Some(ErrorCode::SecurityPolicyDenied));
}

#[test]
fn failed_command_leaves_no_partial_writes() {
    let fixture = Fixture::new(&[Permission::GroupCreate]);
    fixture.store.fail_audit_writes();

    // The request row is written before the audit row fails; the rollback
    // must discard it.
    let response = fixture.run(Command::GroupCreateBegin { group_name: group("com.example") });
    assert_eq!(error_code(&response), Some(ErrorCode::SqlError));
    fixture.store.with_state(|state| {
        assert!(state.requests.is_empty());
        assert!(state.audit.is_empty());
    });
}

#[test]
fn group_search_pages_clamp_at_both_ends() {
    let fixture = Fixture::new(&[Permission::GroupRead]);
    fixture.store.with_state(|state| {
        for name in ["com.a", "com.b", "com.c"] {
            state.groups.insert(group(name), (CALLER, 0));
        }
    });

    let page = |response: Response| match response.payload {
        ResponsePayload::GroupsPage { page } => page,
        other => panic!("unexpected payload: {other:?}"),
    };

    let first = page(fixture.run(Command::GroupSearchBegin {
        query: "com.".to_string(),
        page_size: 2,
    }));
    assert_eq!(first.page_index, 1);
    assert_eq!(first.page_count, 2);
    assert_eq!(first.total_count, 3);
    assert_eq!(first.items, vec![group("com.a"), group("com.b")]);

    let second = page(fixture.run(Command::GroupSearchNext));
    assert_eq!(second.page_index, 2);
    assert_eq!(second.items, vec![group("com.c")]);

    // Stepping past the last page stays on it.
    let clamped = page(fixture.run(Command::GroupSearchNext));
    assert_eq!(clamped.page_index, 2);

    let back = page(fixture.run(Command::GroupSearchPrevious));
    assert_eq!(back.page_index, 1);

    let clamped = page(fixture.run(Command::GroupSearchPrevious));
    assert_eq!(clamped.page_index, 1);
}

#[test]
fn page_step_without_begin_is_a_usage_error() {
    let fixture = Fixture::new(&[Permission::GroupRead, Permission::AuditRead]);
    assert_eq!(error_code(&fixture.run(Command::GroupSearchNext)), Some(ErrorCode::UsageError));
    assert_eq!(
        error_code(&fixture.run(Command::AuditSearchPrevious)),
        Some(ErrorCode::UsageError)
    );
}

#[test]
fn request_search_sees_only_the_callers_requests() {
    let fixture = Fixture::new(&[Permission::GroupCreate]);
    seed_request(&fixture, CALLER, "com.mine", &"0a".repeat(16));
    seed_request(&fixture, Uuid::from_u128(2), "com.theirs", &"0b".repeat(16));

    let response = fixture.run(Command::GroupCreateRequestsBegin { page_size: 10 });
    match response.payload {
        ResponsePayload::GroupRequestsPage { page } => {
            assert_eq!(page.total_count, 1);
            assert_eq!(page.items[0].group_name, group("com.mine"));
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn amberjack_endpoint_requires_access_permission() {
    let fixture = Fixture::new(&[Permission::GroupRead]);
    let command = Command::GroupSearchBegin { query: String::new(), page_size: 5 };
    let response = fixture.run_as(Role::Amberjack, command.clone());
    assert_eq!(error_code(&response), Some(ErrorCode::SecurityPolicyDenied));

    let admin = Fixture::new(&[Permission::GroupRead, Permission::AmberjackAccess]);
    let response = admin.run_as(Role::Amberjack, command);
    assert!(!response.payload.is_error());
}

#[test]
fn login_on_the_command_path_is_a_usage_error() {
    let fixture = Fixture::new(&[]);
    let response = fixture.run(Command::Login {
        user_name: "alice".to_string(),
        password: "secret".to_string(),
    });
    assert_eq!(error_code(&response), Some(ErrorCode::UsageError));
}

#[test]
fn every_permission_set_is_accepted_by_user_type() {
    // Guards the closed permission set used by the policy tests above.
    let user = User { id: CALLER, permissions: BTreeSet::from(Permission::ALL) };
    for permission in Permission::ALL {
        assert!(user.holds(permission));
    }
}
