//! In-memory store with real transaction semantics for executor tests.
//!
//! A transaction works on a snapshot of the shared state; commit writes the
//! snapshot back, drop discards it. That gives the same rollback behavior
//! the production store has, which the commit-discipline tests rely on.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use eigion_core::store::{
    AuditQueries, GroupQueries, GroupRequestFilter, GroupRequestQueries, GroupSearchFilter, Role,
    Store, StoreConnection, StoreError, Transaction, UserQueries,
};
use eigion_proto::model::{
    AuditEvent, AuditFilter, GroupCreationRequest, GroupName, Permission, RequestStatus,
    RequestToken, User,
};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct MemState {
    pub users: HashMap<Uuid, (String, BTreeSet<Permission>)>,
    pub groups: BTreeMap<GroupName, (Uuid, u64)>,
    pub requests: Vec<GroupCreationRequest>,
    pub audit: Vec<AuditEvent>,
    next_audit_id: u64,
}

/// An in-memory store shared by reference with the test body.
#[derive(Debug, Default)]
pub struct MemStore {
    shared: Arc<Mutex<MemState>>,
    fail_audit: Arc<AtomicBool>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `audit_put` fail with a database error.
    pub fn fail_audit_writes(&self) {
        self.fail_audit.store(true, Ordering::SeqCst);
    }

    /// Run `f` against the committed state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut MemState) -> R) -> R {
        f(&mut self.shared.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn connection(&self) -> MemConnection {
        MemConnection {
            shared: Arc::clone(&self.shared),
            fail_audit: Arc::clone(&self.fail_audit),
        }
    }
}

impl Store for MemStore {
    fn connect(&self, _role: Role) -> Result<Box<dyn StoreConnection>, StoreError> {
        Ok(Box::new(self.connection()))
    }
}

pub struct MemConnection {
    shared: Arc<Mutex<MemState>>,
    fail_audit: Arc<AtomicBool>,
}

impl StoreConnection for MemConnection {
    fn open_transaction(&mut self) -> Result<Box<dyn Transaction + '_>, StoreError> {
        let snapshot = self.shared.lock().unwrap_or_else(PoisonError::into_inner).clone();
        Ok(Box::new(MemTransaction {
            shared: Arc::clone(&self.shared),
            fail_audit: Arc::clone(&self.fail_audit),
            state: snapshot,
        }))
    }
}

pub struct MemTransaction {
    shared: Arc<Mutex<MemState>>,
    fail_audit: Arc<AtomicBool>,
    state: MemState,
}

impl UserQueries for MemTransaction {
    fn user_get_or_create(&mut self, id: Uuid, name: &str) -> Result<User, StoreError> {
        let (_, permissions) = self
            .state
            .users
            .entry(id)
            .or_insert_with(|| (name.to_string(), BTreeSet::new()));
        Ok(User { id, permissions: permissions.clone() })
    }

    fn user_permission_grant(
        &mut self,
        user: Uuid,
        permission: Permission,
    ) -> Result<(), StoreError> {
        let entry = self.state.users.entry(user).or_insert_with(Default::default);
        entry.1.insert(permission);
        Ok(())
    }
}

impl GroupQueries for MemTransaction {
    fn group_exists(&mut self, name: &GroupName) -> Result<bool, StoreError> {
        Ok(self.state.groups.contains_key(name))
    }

    fn group_create(&mut self, name: &GroupName, founder: Uuid, time: u64) -> Result<(), StoreError> {
        if self.state.groups.contains_key(name) {
            return Err(StoreError::Duplicate { entity: "group", key: name.to_string() });
        }
        self.state.groups.insert(name.clone(), (founder, time));
        Ok(())
    }

    fn group_search_count(&mut self, filter: &GroupSearchFilter) -> Result<u64, StoreError> {
        Ok(self
            .state
            .groups
            .keys()
            .filter(|name| name.as_str().contains(&filter.query))
            .count() as u64)
    }

    fn group_search_page(
        &mut self,
        filter: &GroupSearchFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<GroupName>, StoreError> {
        Ok(self
            .state
            .groups
            .keys()
            .filter(|name| name.as_str().contains(&filter.query))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

impl GroupRequestQueries for MemTransaction {
    fn request_create(&mut self, request: &GroupCreationRequest) -> Result<(), StoreError> {
        if self.state.requests.iter().any(|r| r.token == request.token) {
            return Err(StoreError::Duplicate {
                entity: "request",
                key: request.token.to_string(),
            });
        }
        self.state.requests.push(request.clone());
        Ok(())
    }

    fn request_get(
        &mut self,
        token: &RequestToken,
    ) -> Result<Option<GroupCreationRequest>, StoreError> {
        Ok(self.state.requests.iter().find(|r| &r.token == token).cloned())
    }

    fn request_update_status(
        &mut self,
        token: &RequestToken,
        status: &RequestStatus,
    ) -> Result<(), StoreError> {
        for request in &mut self.state.requests {
            if &request.token == token {
                request.status = status.clone();
                return Ok(());
            }
        }
        Err(StoreError::sql(format!("no request with token {token}")))
    }

    fn request_search_count(&mut self, filter: &GroupRequestFilter) -> Result<u64, StoreError> {
        Ok(self.state.requests.iter().filter(|r| r.founder == filter.founder).count() as u64)
    }

    fn request_search_page(
        &mut self,
        filter: &GroupRequestFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<GroupCreationRequest>, StoreError> {
        Ok(self
            .state
            .requests
            .iter()
            .filter(|r| r.founder == filter.founder)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

impl AuditQueries for MemTransaction {
    fn audit_put(
        &mut self,
        time: u64,
        owner: Uuid,
        kind: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(StoreError::sql("audit table unavailable"));
        }
        self.state.next_audit_id += 1;
        self.state.audit.push(AuditEvent {
            id: self.state.next_audit_id,
            time,
            owner,
            kind: kind.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    fn audit_search_count(&mut self, filter: &AuditFilter) -> Result<u64, StoreError> {
        Ok(self.state.audit.iter().filter(|e| filter.matches(e)).count() as u64)
    }

    fn audit_search_page(
        &mut self,
        filter: &AuditFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<AuditEvent>, StoreError> {
        Ok(self
            .state
            .audit
            .iter()
            .filter(|e| filter.matches(e))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

impl Transaction for MemTransaction {
    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        *self.shared.lock().unwrap_or_else(PoisonError::into_inner) = self.state;
        Ok(())
    }
}
