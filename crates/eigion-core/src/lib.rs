//! Server-side core: sessions, security policy and command execution.
//!
//! This crate is transport-free and database-free. The HTTP layer hands it
//! decoded commands together with a session and an open store connection;
//! the database and the identity provider are consumed through the traits
//! in [`store`] and [`idp`]. Everything here is deterministic under test:
//! time is injected, and state machines take their inputs explicitly.

pub mod clock;
pub mod cursor;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod idp;
pub mod policy;
pub mod session;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use dispatch::dispatch_command;
pub use error::CoreError;
pub use policy::{PermissionPolicy, SecurityPolicy};
pub use session::{SessionManager, SessionManagerConfig, SessionSecret};
pub use store::{Role, Store};
