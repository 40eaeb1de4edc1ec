//! SQLite store.
//!
//! One connection per request, one transaction per command. The rusqlite
//! transaction rolls back on drop, which is exactly the behavior the
//! dispatch layer's commit-on-success rule needs. All times are unix
//! milliseconds stored as integers; identifiers are stored as text.

use std::path::{Path, PathBuf};
use std::time::Duration;

use eigion_core::store::{
    AuditQueries, GroupQueries, GroupRequestFilter, GroupRequestQueries, GroupSearchFilter, Role,
    Store, StoreConnection, StoreError, Transaction, UserQueries,
};
use eigion_proto::model::{
    AuditEvent, AuditFilter, GroupCreationRequest, GroupName, Permission, RequestStatus,
    RequestToken, User,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id   TEXT PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS user_permissions (
    user_id    TEXT NOT NULL REFERENCES users(id),
    permission INTEGER NOT NULL,
    PRIMARY KEY (user_id, permission)
);
CREATE TABLE IF NOT EXISTS groups (
    name         TEXT PRIMARY KEY,
    founder      TEXT NOT NULL,
    time_created INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS group_requests (
    token          TEXT PRIMARY KEY,
    group_name     TEXT NOT NULL,
    founder        TEXT NOT NULL,
    status         INTEGER NOT NULL,
    time_started   INTEGER NOT NULL,
    time_completed INTEGER,
    message        TEXT
);
CREATE TABLE IF NOT EXISTS audit_log (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    time    INTEGER NOT NULL,
    owner   TEXT NOT NULL,
    kind    TEXT NOT NULL,
    message TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS group_requests_founder ON group_requests(founder);
CREATE INDEX IF NOT EXISTS audit_log_owner ON audit_log(owner);
";

/// A SQLite-backed [`Store`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open the database, creating the schema if needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let connection = open_connection(path)?;
        connection.execute_batch(SCHEMA).map_err(sql_error)?;
        info!(path = %path.display(), "database ready");
        Ok(Self { path: path.to_path_buf() })
    }
}

impl Store for SqliteStore {
    fn connect(&self, _role: Role) -> Result<Box<dyn StoreConnection>, StoreError> {
        Ok(Box::new(SqliteConnection { connection: open_connection(&self.path)? }))
    }
}

fn open_connection(path: &Path) -> Result<Connection, StoreError> {
    let connection = Connection::open(path).map_err(sql_error)?;
    connection.busy_timeout(Duration::from_secs(5)).map_err(sql_error)?;
    connection.pragma_update(None, "journal_mode", "WAL").map_err(sql_error)?;
    connection.pragma_update(None, "foreign_keys", "ON").map_err(sql_error)?;
    Ok(connection)
}

struct SqliteConnection {
    connection: Connection,
}

impl StoreConnection for SqliteConnection {
    fn open_transaction(&mut self) -> Result<Box<dyn Transaction + '_>, StoreError> {
        let inner = self.connection.transaction().map_err(sql_error)?;
        Ok(Box::new(SqliteTransaction { inner }))
    }
}

struct SqliteTransaction<'a> {
    inner: rusqlite::Transaction<'a>,
}

impl UserQueries for SqliteTransaction<'_> {
    fn user_get_or_create(&mut self, id: Uuid, name: &str) -> Result<User, StoreError> {
        self.inner
            .execute(
                "INSERT INTO users (id, name) VALUES (?1, ?2) ON CONFLICT (id) DO NOTHING",
                params![id.to_string(), name],
            )
            .map_err(sql_error)?;
        let mut statement = self
            .inner
            .prepare("SELECT permission FROM user_permissions WHERE user_id = ?1")
            .map_err(sql_error)?;
        let permissions = statement
            .query_map(params![id.to_string()], |row| row.get::<_, i64>(0))
            .map_err(sql_error)?
            .collect::<Result<Vec<i64>, _>>()
            .map_err(sql_error)?
            .into_iter()
            .map(permission_from_code)
            .collect::<Result<_, _>>()?;
        Ok(User { id, permissions })
    }

    fn user_permission_grant(
        &mut self,
        user: Uuid,
        permission: Permission,
    ) -> Result<(), StoreError> {
        self.inner
            .execute(
                "INSERT INTO user_permissions (user_id, permission) VALUES (?1, ?2)
                 ON CONFLICT (user_id, permission) DO NOTHING",
                params![user.to_string(), permission_code(permission)],
            )
            .map_err(sql_error)?;
        Ok(())
    }
}

impl GroupQueries for SqliteTransaction<'_> {
    fn group_exists(&mut self, name: &GroupName) -> Result<bool, StoreError> {
        self.inner
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM groups WHERE name = ?1)",
                params![name.as_str()],
                |row| row.get(0),
            )
            .map_err(sql_error)
    }

    fn group_create(
        &mut self,
        name: &GroupName,
        founder: Uuid,
        time: u64,
    ) -> Result<(), StoreError> {
        self.inner
            .execute(
                "INSERT INTO groups (name, founder, time_created) VALUES (?1, ?2, ?3)",
                params![name.as_str(), founder.to_string(), time as i64],
            )
            .map_err(|error| insert_error(error, "group", name.as_str()))?;
        Ok(())
    }

    fn group_search_count(&mut self, filter: &GroupSearchFilter) -> Result<u64, StoreError> {
        self.inner
            .query_row(
                "SELECT COUNT(*) FROM groups WHERE ?1 = '' OR instr(name, ?1) > 0",
                params![filter.query],
                |row| row.get::<_, i64>(0),
            )
            .map_err(sql_error)
            .map(|count| count as u64)
    }

    fn group_search_page(
        &mut self,
        filter: &GroupSearchFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<GroupName>, StoreError> {
        let mut statement = self
            .inner
            .prepare(
                "SELECT name FROM groups WHERE ?1 = '' OR instr(name, ?1) > 0
                 ORDER BY name LIMIT ?2 OFFSET ?3",
            )
            .map_err(sql_error)?;
        let names = statement
            .query_map(params![filter.query, i64::from(limit), offset as i64], |row| {
                row.get::<_, String>(0)
            })
            .map_err(sql_error)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(sql_error)?;
        names.into_iter().map(group_name_from_text).collect()
    }
}

impl GroupRequestQueries for SqliteTransaction<'_> {
    fn request_create(&mut self, request: &GroupCreationRequest) -> Result<(), StoreError> {
        let (status, time_started, time_completed, message) = status_columns(&request.status);
        self.inner
            .execute(
                "INSERT INTO group_requests
                 (token, group_name, founder, status, time_started, time_completed, message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    request.token.as_str(),
                    request.group_name.as_str(),
                    request.founder.to_string(),
                    status,
                    time_started,
                    time_completed,
                    message,
                ],
            )
            .map_err(|error| insert_error(error, "request", request.token.as_str()))?;
        Ok(())
    }

    fn request_get(
        &mut self,
        token: &RequestToken,
    ) -> Result<Option<GroupCreationRequest>, StoreError> {
        self.inner
            .query_row(
                "SELECT token, group_name, founder, status, time_started, time_completed, message
                 FROM group_requests WHERE token = ?1",
                params![token.as_str()],
                request_row,
            )
            .optional()
            .map_err(sql_error)?
            .map(request_from_row)
            .transpose()
    }

    fn request_update_status(
        &mut self,
        token: &RequestToken,
        status: &RequestStatus,
    ) -> Result<(), StoreError> {
        let (code, time_started, time_completed, message) = status_columns(status);
        let updated = self
            .inner
            .execute(
                "UPDATE group_requests
                 SET status = ?2, time_started = ?3, time_completed = ?4, message = ?5
                 WHERE token = ?1",
                params![token.as_str(), code, time_started, time_completed, message],
            )
            .map_err(sql_error)?;
        if updated == 0 {
            return Err(StoreError::sql(format!("no request with token {token}")));
        }
        Ok(())
    }

    fn request_search_count(&mut self, filter: &GroupRequestFilter) -> Result<u64, StoreError> {
        self.inner
            .query_row(
                "SELECT COUNT(*) FROM group_requests WHERE founder = ?1",
                params![filter.founder.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .map_err(sql_error)
            .map(|count| count as u64)
    }

    fn request_search_page(
        &mut self,
        filter: &GroupRequestFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<GroupCreationRequest>, StoreError> {
        let mut statement = self
            .inner
            .prepare(
                "SELECT token, group_name, founder, status, time_started, time_completed, message
                 FROM group_requests WHERE founder = ?1
                 ORDER BY rowid LIMIT ?2 OFFSET ?3",
            )
            .map_err(sql_error)?;
        let rows = statement
            .query_map(
                params![filter.founder.to_string(), i64::from(limit), offset as i64],
                request_row,
            )
            .map_err(sql_error)?
            .collect::<Result<Vec<RequestRow>, _>>()
            .map_err(sql_error)?;
        rows.into_iter().map(request_from_row).collect()
    }
}

impl AuditQueries for SqliteTransaction<'_> {
    fn audit_put(
        &mut self,
        time: u64,
        owner: Uuid,
        kind: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        self.inner
            .execute(
                "INSERT INTO audit_log (time, owner, kind, message) VALUES (?1, ?2, ?3, ?4)",
                params![time as i64, owner.to_string(), kind, message],
            )
            .map_err(sql_error)?;
        Ok(())
    }

    fn audit_search_count(&mut self, filter: &AuditFilter) -> Result<u64, StoreError> {
        let (owner, kind, from, to) = audit_filter_columns(filter);
        self.inner
            .query_row(
                "SELECT COUNT(*) FROM audit_log
                 WHERE (?1 IS NULL OR owner = ?1) AND (?2 IS NULL OR kind = ?2)
                   AND (?3 IS NULL OR time >= ?3) AND (?4 IS NULL OR time <= ?4)",
                params![owner, kind, from, to],
                |row| row.get::<_, i64>(0),
            )
            .map_err(sql_error)
            .map(|count| count as u64)
    }

    fn audit_search_page(
        &mut self,
        filter: &AuditFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<AuditEvent>, StoreError> {
        let mut statement = self
            .inner
            .prepare(
                "SELECT id, time, owner, kind, message FROM audit_log
                 WHERE (?1 IS NULL OR owner = ?1) AND (?2 IS NULL OR kind = ?2)
                   AND (?3 IS NULL OR time >= ?3) AND (?4 IS NULL OR time <= ?4)
                 ORDER BY id LIMIT ?5 OFFSET ?6",
            )
            .map_err(sql_error)?;
        let (owner, kind, from, to) = audit_filter_columns(filter);
        let rows = statement
            .query_map(params![owner, kind, from, to, i64::from(limit), offset as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_error)?;
        rows.into_iter()
            .map(|(id, time, owner, kind, message)| {
                Ok(AuditEvent {
                    id: id as u64,
                    time: time as u64,
                    owner: uuid_from_text(&owner)?,
                    kind,
                    message,
                })
            })
            .collect()
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit().map_err(sql_error)
    }
}

type RequestRow = (String, String, String, i64, i64, Option<i64>, Option<String>);

fn request_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn request_from_row(row: RequestRow) -> Result<GroupCreationRequest, StoreError> {
    let (token, group_name, founder, status, time_started, time_completed, message) = row;
    Ok(GroupCreationRequest {
        token: token_from_text(token)?,
        group_name: group_name_from_text(group_name)?,
        founder: uuid_from_text(&founder)?,
        status: status_from_columns(status, time_started, time_completed, message)?,
    })
}

fn audit_filter_columns(filter: &AuditFilter) -> (Option<String>, Option<&str>, Option<i64>, Option<i64>) {
    (
        filter.owner.map(|owner| owner.to_string()),
        filter.kind.as_deref(),
        filter.time_from.map(|t| t as i64),
        filter.time_to.map(|t| t as i64),
    )
}

const STATUS_IN_PROGRESS: i64 = 0;
const STATUS_SUCCEEDED: i64 = 1;
const STATUS_FAILED: i64 = 2;
const STATUS_CANCELLED: i64 = 3;

fn status_columns(status: &RequestStatus) -> (i64, i64, Option<i64>, Option<&str>) {
    match status {
        RequestStatus::InProgress { time_started } => {
            (STATUS_IN_PROGRESS, *time_started as i64, None, None)
        }
        RequestStatus::Succeeded { time_started, time_completed } => {
            (STATUS_SUCCEEDED, *time_started as i64, Some(*time_completed as i64), None)
        }
        RequestStatus::Failed { time_started, time_completed, message } => (
            STATUS_FAILED,
            *time_started as i64,
            Some(*time_completed as i64),
            Some(message.as_str()),
        ),
        RequestStatus::Cancelled { time_started, time_completed } => {
            (STATUS_CANCELLED, *time_started as i64, Some(*time_completed as i64), None)
        }
    }
}

fn status_from_columns(
    code: i64,
    time_started: i64,
    time_completed: Option<i64>,
    message: Option<String>,
) -> Result<RequestStatus, StoreError> {
    let time_started = time_started as u64;
    let completed = || {
        time_completed
            .map(|t| t as u64)
            .ok_or_else(|| StoreError::sql("completed request without completion time"))
    };
    match code {
        STATUS_IN_PROGRESS => Ok(RequestStatus::InProgress { time_started }),
        STATUS_SUCCEEDED => {
            Ok(RequestStatus::Succeeded { time_started, time_completed: completed()? })
        }
        STATUS_FAILED => Ok(RequestStatus::Failed {
            time_started,
            time_completed: completed()?,
            message: message.unwrap_or_default(),
        }),
        STATUS_CANCELLED => {
            Ok(RequestStatus::Cancelled { time_started, time_completed: completed()? })
        }
        other => Err(StoreError::sql(format!("unknown request status {other}"))),
    }
}

fn permission_code(permission: Permission) -> i64 {
    match permission {
        Permission::GroupCreate => 0,
        Permission::GroupRead => 1,
        Permission::AuditRead => 2,
        Permission::AmberjackAccess => 3,
    }
}

fn permission_from_code(code: i64) -> Result<Permission, StoreError> {
    match code {
        0 => Ok(Permission::GroupCreate),
        1 => Ok(Permission::GroupRead),
        2 => Ok(Permission::AuditRead),
        3 => Ok(Permission::AmberjackAccess),
        other => Err(StoreError::sql(format!("unknown permission code {other}"))),
    }
}

fn uuid_from_text(text: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(text).map_err(|_| StoreError::sql(format!("malformed uuid column {text:?}")))
}

fn group_name_from_text(text: String) -> Result<GroupName, StoreError> {
    GroupName::new(text).map_err(|error| StoreError::sql(format!("malformed group name: {error}")))
}

fn token_from_text(text: String) -> Result<RequestToken, StoreError> {
    RequestToken::new(text).map_err(|error| StoreError::sql(format!("malformed token: {error}")))
}

fn sql_error(error: rusqlite::Error) -> StoreError {
    StoreError::sql(error.to_string())
}

fn insert_error(error: rusqlite::Error, entity: &'static str, key: &str) -> StoreError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Duplicate { entity, key: key.to_string() }
        }
        _ => sql_error(error),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    fn group(name: &str) -> GroupName {
        GroupName::new(name).unwrap()
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let (_dir, store) = store();
        let mut connection = store.connect(Role::Pike).unwrap();
        {
            let mut tx = connection.open_transaction().unwrap();
            tx.group_create(&group("com.example"), Uuid::from_u128(1), 100).unwrap();
            // No commit.
        }
        let mut tx = connection.open_transaction().unwrap();
        assert!(!tx.group_exists(&group("com.example")).unwrap());
    }

    #[test]
    fn committed_writes_persist_across_connections() {
        let (_dir, store) = store();
        let mut connection = store.connect(Role::Pike).unwrap();
        let mut tx = connection.open_transaction().unwrap();
        tx.group_create(&group("com.example"), Uuid::from_u128(1), 100).unwrap();
        tx.commit().unwrap();
        drop(connection);

        let mut connection = store.connect(Role::Amberjack).unwrap();
        let mut tx = connection.open_transaction().unwrap();
        assert!(tx.group_exists(&group("com.example")).unwrap());
    }

    #[test]
    fn duplicate_group_is_reported_as_duplicate() {
        let (_dir, store) = store();
        let mut connection = store.connect(Role::Pike).unwrap();
        let mut tx = connection.open_transaction().unwrap();
        tx.group_create(&group("com.example"), Uuid::from_u128(1), 100).unwrap();
        let result = tx.group_create(&group("com.example"), Uuid::from_u128(2), 200);
        assert!(matches!(result, Err(StoreError::Duplicate { entity: "group", .. })));
    }

    #[test]
    fn request_round_trips_through_every_status() {
        let (_dir, store) = store();
        let mut connection = store.connect(Role::Pike).unwrap();
        let mut tx = connection.open_transaction().unwrap();
        let token = RequestToken::new("ab".repeat(16)).unwrap();
        let request = GroupCreationRequest {
            group_name: group("com.example"),
            founder: Uuid::from_u128(1),
            token: token.clone(),
            status: RequestStatus::InProgress { time_started: 10 },
        };
        tx.request_create(&request).unwrap();
        assert_eq!(tx.request_get(&token).unwrap().unwrap(), request);

        let failed = RequestStatus::Failed {
            time_started: 10,
            time_completed: 20,
            message: "storage failure".to_string(),
        };
        tx.request_update_status(&token, &failed).unwrap();
        assert_eq!(tx.request_get(&token).unwrap().unwrap().status, failed);
    }

    #[test]
    fn group_search_matches_substrings_in_name_order() {
        let (_dir, store) = store();
        let mut connection = store.connect(Role::Pike).unwrap();
        let mut tx = connection.open_transaction().unwrap();
        for name in ["org.zoo", "com.example.a", "com.example.b", "net.other"] {
            tx.group_create(&group(name), Uuid::from_u128(1), 0).unwrap();
        }
        assert_eq!(tx.group_search_count(&GroupSearchFilter { query: "example".into() }).unwrap(), 2);
        let page = tx
            .group_search_page(&GroupSearchFilter { query: "example".into() }, 0, 10)
            .unwrap();
        assert_eq!(page, vec![group("com.example.a"), group("com.example.b")]);

        // The empty query matches everything.
        assert_eq!(tx.group_search_count(&GroupSearchFilter { query: String::new() }).unwrap(), 4);
    }

    #[test]
    fn audit_filters_compose_conjunctively() {
        let (_dir, store) = store();
        let mut connection = store.connect(Role::Pike).unwrap();
        let mut tx = connection.open_transaction().unwrap();
        let alice = Uuid::from_u128(1);
        let bob = Uuid::from_u128(2);
        tx.audit_put(100, alice, "GROUP_CREATE_BEGIN", "a").unwrap();
        tx.audit_put(200, alice, "GROUP_CREATE_READY", "b").unwrap();
        tx.audit_put(300, bob, "GROUP_CREATE_BEGIN", "c").unwrap();

        let filter = AuditFilter { owner: Some(alice), ..AuditFilter::default() };
        assert_eq!(tx.audit_search_count(&filter).unwrap(), 2);

        let filter = AuditFilter {
            owner: Some(alice),
            kind: Some("GROUP_CREATE_BEGIN".to_string()),
            ..AuditFilter::default()
        };
        let events = tx.audit_search_page(&filter, 0, 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "a");

        let filter = AuditFilter { time_from: Some(150), time_to: Some(250), ..AuditFilter::default() };
        assert_eq!(tx.audit_search_count(&filter).unwrap(), 1);
    }

    #[test]
    fn permissions_accumulate_idempotently() {
        let (_dir, store) = store();
        let mut connection = store.connect(Role::Pike).unwrap();
        let mut tx = connection.open_transaction().unwrap();
        let id = Uuid::from_u128(1);
        let user = tx.user_get_or_create(id, "alice").unwrap();
        assert!(user.permissions.is_empty());

        tx.user_permission_grant(id, Permission::GroupRead).unwrap();
        tx.user_permission_grant(id, Permission::GroupRead).unwrap();
        let user = tx.user_get_or_create(id, "alice").unwrap();
        assert_eq!(user.permissions.len(), 1);
        assert!(user.holds(Permission::GroupRead));
    }
}
