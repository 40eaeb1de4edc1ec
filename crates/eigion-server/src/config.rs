//! Command-line configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Eigion protocol server.
#[derive(Debug, Clone, Parser)]
#[command(name = "eigion-server", version, about)]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Path to the SQLite database; created if missing.
    #[arg(long, default_value = "eigion.db")]
    pub database: PathBuf,

    /// Path to the user credentials file, one `name:password` per line.
    #[arg(long)]
    pub users_file: PathBuf,

    /// User granted every permission at login.
    #[arg(long)]
    pub admin: Option<String>,

    /// Seconds of inactivity after which a session expires.
    #[arg(long, default_value_t = 1800)]
    pub session_idle_secs: u64,

    /// Seconds between sweeps for expired sessions.
    #[arg(long, default_value_t = 60)]
    pub session_purge_secs: u64,
}

impl ServerConfig {
    /// The session idle timeout as a duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// The purge interval as a duration.
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.session_purge_secs.max(1))
    }
}
