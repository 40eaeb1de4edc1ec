//! The external identity provider.
//!
//! Login credentials are checked against an identity provider the core does
//! not specify. A successful login yields the provider's view of the user
//! and a handle the session holds for its lifetime; the session manager
//! closes the handle exactly once when the session goes away.

use thiserror::Error;
use uuid::Uuid;

/// Errors from the identity provider.
#[derive(Debug, Error)]
pub enum IdpError {
    /// The credentials were rejected.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The provider could not be reached.
    #[error("identity provider unavailable: {context}")]
    Io {
        /// Transport-level detail.
        context: String,
    },
}

/// The identity provider's view of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpUser {
    /// The user's unique identifier, shared with the store.
    pub id: Uuid,
    /// The user's name.
    pub name: String,
}

/// A per-session resource held against the identity provider.
pub trait IdentityHandle: Send {
    /// Release the resource. Called exactly once by the session manager.
    fn close(&mut self) -> Result<(), IdpError>;
}

/// The identity provider itself.
pub trait IdentityProvider: Send + Sync {
    /// Check credentials and open a per-session handle.
    fn login(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<(IdpUser, Box<dyn IdentityHandle>), IdpError>;
}

/// A handle for providers that hold no per-session resources.
#[derive(Debug, Default)]
pub struct NullIdentityHandle;

impl IdentityHandle for NullIdentityHandle {
    fn close(&mut self) -> Result<(), IdpError> {
        Ok(())
    }
}
