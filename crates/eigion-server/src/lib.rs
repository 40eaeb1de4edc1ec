//! The Eigion server.
//!
//! Wires the transport-free core to its production collaborators: axum for
//! HTTP, SQLite for storage and a file-backed identity provider, plus a
//! background sweep for expired sessions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eigion_core::policy::PermissionPolicy;
use eigion_core::session::{SessionManager, SessionManagerConfig};
use tokio::net::TcpListener;
use tracing::{debug, info};

pub mod config;
pub mod error;
pub mod http;
pub mod sqlite;
pub mod users;

pub use config::ServerConfig;
pub use error::ServerError;
pub use http::{AppState, router, AMBERJACK_ENDPOINT, PIKE_ENDPOINT, SESSION_COOKIE};
pub use sqlite::SqliteStore;
pub use users::StaticIdentityProvider;

/// Build application state from the configuration.
pub fn build_state(config: &ServerConfig) -> Result<Arc<AppState>, ServerError> {
    let store = Arc::new(SqliteStore::open(&config.database)?);
    let idp = Arc::new(StaticIdentityProvider::load(&config.users_file)?);
    let sessions = Arc::new(SessionManager::new(SessionManagerConfig {
        idle_timeout: config.idle_timeout(),
    }));
    Ok(Arc::new(AppState::new(
        store,
        idp,
        sessions,
        Arc::new(PermissionPolicy),
        config.admin.clone(),
    )))
}

/// Run the server until the listener fails.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let state = build_state(&config)?;
    let listener = TcpListener::bind(config.listen).await?;
    info!(listen = %config.listen, "server listening");
    serve_on(listener, state, config.purge_interval()).await
}

/// Serve on an already-bound listener; used by tests to bind port zero.
pub async fn serve_on(
    listener: TcpListener,
    state: Arc<AppState>,
    purge_interval: Duration,
) -> Result<(), ServerError> {
    let sessions = state.sessions();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_interval);
        loop {
            ticker.tick().await;
            let removed = sessions.purge_expired(Instant::now());
            if removed > 0 {
                debug!(removed, "purged expired sessions");
            }
        }
    });
    axum::serve(listener, router(state)).await?;
    Ok(())
}
