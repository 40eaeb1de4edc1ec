//! Sessions and the session manager.
//!
//! A session is the single point of truth for "who is logged in" and "what
//! search cursor is open" on one connection. The manager owns all sessions
//! in a concurrent map with expire-after-access semantics; every removal
//! path — logout, explicit eviction, idle expiry — closes the session's
//! held identity-provider handle exactly once, and a close failure is
//! logged rather than propagated so teardown never aborts the evicting
//! operation.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use eigion_proto::model::User;
use rand::RngCore;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cursor::CursorMap;
use crate::idp::IdentityHandle;

/// Length of a session secret in hexadecimal characters.
pub const SESSION_SECRET_LENGTH: usize = 64;

/// Errors from session management.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A freshly generated secret collided with a live session.
    ///
    /// The identifier space is 256 bits; a collision means the random
    /// source is broken, so this is an invariant violation rather than a
    /// condition to retry.
    #[error("session secret collided with a live session")]
    SecretCollision,

    /// A presented secret does not match the required pattern.
    #[error("malformed session secret")]
    MalformedSecret,
}

/// A session secret identifier: a high-entropy bearer credential.
///
/// The value never appears in logs; `Debug` and `Display` are redacted.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionSecret(String);

impl SessionSecret {
    /// Generate a fresh secret from the operating system's RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Validate a presented secret against the fixed pattern: exactly
    /// [`SESSION_SECRET_LENGTH`] lowercase hexadecimal characters.
    pub fn parse(value: &str) -> Result<Self, SessionError> {
        let valid = value.len() == SESSION_SECRET_LENGTH
            && value.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if valid { Ok(Self(value.to_string())) } else { Err(SessionError::MalformedSecret) }
    }

    /// The secret value, for transmission to the owning client only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(redacted)")
    }
}

impl fmt::Display for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(redacted)")
    }
}

/// One live session.
///
/// The identity is fixed at creation; only the cursor table and the
/// last-access time change afterwards.
pub struct Session {
    user: User,
    last_access: Mutex<Instant>,
    cursors: Mutex<CursorMap>,
    identity: Mutex<Option<Box<dyn IdentityHandle>>>,
}

impl Session {
    fn new(now: Instant, user: User, identity: Box<dyn IdentityHandle>) -> Self {
        Self {
            user,
            last_access: Mutex::new(now),
            cursors: Mutex::new(CursorMap::new()),
            identity: Mutex::new(Some(identity)),
        }
    }

    /// The authenticated user.
    pub fn user(&self) -> &User {
        &self.user
    }

    /// The session's cursor table.
    pub fn cursors(&self) -> MutexGuard<'_, CursorMap> {
        self.cursors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self, now: Instant) {
        *self.last_access.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    fn is_expired(&self, now: Instant, idle_timeout: Duration) -> bool {
        let last = *self.last_access.lock().unwrap_or_else(PoisonError::into_inner);
        now.saturating_duration_since(last) > idle_timeout
    }

    /// Close the held identity handle. Safe to call more than once; the
    /// handle is closed at most once.
    fn close_resources(&self) {
        let handle = self.identity.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut handle) = handle {
            if let Err(error) = handle.close() {
                warn!(error = %error, "failed to close session identity handle");
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("user", &self.user.id).finish_non_exhaustive()
    }
}

/// Session manager configuration.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Idle duration after which an untouched session expires.
    pub idle_timeout: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self { idle_timeout: Duration::from_secs(30 * 60) }
    }
}

/// Creates, finds and evicts sessions.
///
/// Time is passed explicitly so expiry is deterministic under test; the
/// server supplies `Instant::now()`.
pub struct SessionManager {
    config: SessionManagerConfig,
    sessions: RwLock<HashMap<SessionSecret, Arc<Session>>>,
    gauge: AtomicUsize,
}

impl SessionManager {
    /// Create a manager with the given configuration.
    pub fn new(config: SessionManagerConfig) -> Self {
        Self { config, sessions: RwLock::new(HashMap::new()), gauge: AtomicUsize::new(0) }
    }

    /// Create a session for an authenticated user.
    ///
    /// Returns the secret the client must present on subsequent requests.
    pub fn create_session(
        &self,
        now: Instant,
        user: User,
        identity: Box<dyn IdentityHandle>,
    ) -> Result<(SessionSecret, Arc<Session>), SessionError> {
        let secret = SessionSecret::generate();
        let session = Arc::new(Session::new(now, user, identity));
        {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            // Check-then-insert is atomic under the write lock.
            if sessions.contains_key(&secret) {
                return Err(SessionError::SecretCollision);
            }
            sessions.insert(secret.clone(), Arc::clone(&session));
            self.publish_gauge(sessions.len());
        }
        Ok((secret, session))
    }

    /// Look up a live session, refreshing its last-access time.
    ///
    /// Expired sessions are evicted here and reported as absent; the
    /// caller cannot distinguish "expired" from "never existed".
    pub fn find_session(&self, secret: &SessionSecret, now: Instant) -> Option<Arc<Session>> {
        let found = {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            sessions.get(secret).cloned()
        };
        let session = found?;
        if session.is_expired(now, self.config.idle_timeout) {
            self.evict(secret, now);
            return None;
        }
        session.touch(now);
        Some(session)
    }

    /// Explicitly invalidate a session (logout). Returns whether a live
    /// session was removed.
    pub fn delete_session(&self, secret: &SessionSecret) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            let removed = sessions.remove(secret);
            self.publish_gauge(sessions.len());
            removed
        };
        match removed {
            Some(session) => {
                session.close_resources();
                true
            }
            None => false,
        }
    }

    /// Evict every expired session. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let expired: Vec<SessionSecret> = {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            sessions
                .iter()
                .filter(|(_, s)| s.is_expired(now, self.config.idle_timeout))
                .map(|(secret, _)| secret.clone())
                .collect()
        };
        let mut removed = 0;
        for secret in &expired {
            if self.evict(secret, now) {
                removed += 1;
            }
        }
        removed
    }

    /// The number of live sessions.
    pub fn session_count(&self) -> usize {
        self.gauge.load(Ordering::Relaxed)
    }

    fn evict(&self, secret: &SessionSecret, now: Instant) -> bool {
        let removed = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            // Re-check under the write lock: another thread may have
            // touched the session since we observed it as expired.
            match sessions.get(secret) {
                Some(session) if session.is_expired(now, self.config.idle_timeout) => {
                    let session = sessions.remove(secret);
                    self.publish_gauge(sessions.len());
                    session
                }
                _ => None,
            }
        };
        match removed {
            Some(session) => {
                session.close_resources();
                true
            }
            None => false,
        }
    }

    fn publish_gauge(&self, count: usize) {
        self.gauge.store(count, Ordering::Relaxed);
        debug!(sessions = count, "session gauge");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::BTreeSet;
    use std::sync::atomic::AtomicUsize;

    use uuid::Uuid;

    use super::*;
    use crate::idp::IdpError;

    struct CountingHandle {
        closes: Arc<AtomicUsize>,
    }

    impl IdentityHandle for CountingHandle {
        fn close(&mut self) -> Result<(), IdpError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn user() -> User {
        User { id: Uuid::from_u128(1), permissions: BTreeSet::new() }
    }

    fn manager(idle: Duration) -> SessionManager {
        SessionManager::new(SessionManagerConfig { idle_timeout: idle })
    }

    fn handle(closes: &Arc<AtomicUsize>) -> Box<dyn IdentityHandle> {
        Box::new(CountingHandle { closes: Arc::clone(closes) })
    }

    #[test]
    fn created_session_is_found() {
        let m = manager(Duration::from_secs(60));
        let t0 = Instant::now();
        let closes = Arc::new(AtomicUsize::new(0));
        let (secret, _) = m.create_session(t0, user(), handle(&closes)).unwrap();
        assert!(m.find_session(&secret, t0).is_some());
        assert_eq!(m.session_count(), 1);
    }

    #[test]
    fn deleted_session_is_gone_and_closed_once() {
        let m = manager(Duration::from_secs(60));
        let t0 = Instant::now();
        let closes = Arc::new(AtomicUsize::new(0));
        let (secret, _) = m.create_session(t0, user(), handle(&closes)).unwrap();
        assert!(m.delete_session(&secret));
        assert!(m.find_session(&secret, t0).is_none());
        assert!(!m.delete_session(&secret));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(m.session_count(), 0);
    }

    #[test]
    fn idle_session_expires() {
        let m = manager(Duration::from_secs(60));
        let t0 = Instant::now();
        let closes = Arc::new(AtomicUsize::new(0));
        let (secret, _) = m.create_session(t0, user(), handle(&closes)).unwrap();

        // Access within the idle window keeps the session alive.
        let t1 = t0 + Duration::from_secs(50);
        assert!(m.find_session(&secret, t1).is_some());

        // The earlier access reset the window.
        let t2 = t1 + Duration::from_secs(50);
        assert!(m.find_session(&secret, t2).is_some());

        // Beyond the window the session is gone and its handle closed.
        let t3 = t2 + Duration::from_secs(61);
        assert!(m.find_session(&secret, t3).is_none());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(m.session_count(), 0);
    }

    #[test]
    fn purge_removes_only_expired_sessions() {
        let m = manager(Duration::from_secs(60));
        let t0 = Instant::now();
        let closes = Arc::new(AtomicUsize::new(0));
        let (old, _) = m.create_session(t0, user(), handle(&closes)).unwrap();
        let t1 = t0 + Duration::from_secs(45);
        let (fresh, _) = m.create_session(t1, user(), handle(&closes)).unwrap();

        let t2 = t0 + Duration::from_secs(90);
        assert_eq!(m.purge_expired(t2), 1);
        assert!(m.find_session(&old, t2).is_none());
        assert!(m.find_session(&fresh, t2).is_some());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn secret_pattern_is_enforced() {
        let secret = SessionSecret::generate();
        assert!(SessionSecret::parse(secret.expose()).is_ok());
        assert!(SessionSecret::parse("short").is_err());
        assert!(SessionSecret::parse(&"G".repeat(SESSION_SECRET_LENGTH)).is_err());
    }

    #[test]
    fn debug_output_is_redacted() {
        let secret = SessionSecret::generate();
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains(secret.expose()));
    }
}
