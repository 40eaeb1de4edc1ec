//! File-backed identity provider.
//!
//! Credentials come from a plain text file, one `name:password` per line;
//! blank lines and `#` comments are ignored. User identifiers are derived
//! deterministically from the user name so the same name maps to the same
//! store row across restarts.

use std::collections::HashMap;
use std::path::Path;

use eigion_core::idp::{IdentityHandle, IdentityProvider, IdpError, IdpUser, NullIdentityHandle};
use tracing::info;
use uuid::Uuid;

use crate::error::ServerError;

/// Namespace for deriving user identifiers from names.
const USER_NAMESPACE: Uuid = Uuid::from_bytes([
    0x2f, 0x09, 0xa3, 0x77, 0x5e, 0x0c, 0x4c, 0x11, 0xb8, 0x2a, 0x64, 0x11, 0x8e, 0x5d, 0x40, 0x22,
]);

/// The stable identifier for a user name.
pub fn user_id(name: &str) -> Uuid {
    Uuid::new_v5(&USER_NAMESPACE, name.as_bytes())
}

/// An identity provider backed by a static credentials file.
pub struct StaticIdentityProvider {
    users: HashMap<String, String>,
}

impl StaticIdentityProvider {
    /// Load credentials from `path`.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let text = std::fs::read_to_string(path)?;
        let mut users = HashMap::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, password)) = line.split_once(':') else {
                return Err(ServerError::config(format!(
                    "{}:{}: expected name:password",
                    path.display(),
                    number + 1
                )));
            };
            if name.is_empty() {
                return Err(ServerError::config(format!(
                    "{}:{}: empty user name",
                    path.display(),
                    number + 1
                )));
            }
            users.insert(name.to_string(), password.to_string());
        }
        info!(users = users.len(), path = %path.display(), "loaded credentials");
        Ok(Self { users })
    }

    /// Build a provider from in-memory credentials.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self { users: pairs.into_iter().collect() }
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn login(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<(IdpUser, Box<dyn IdentityHandle>), IdpError> {
        match self.users.get(user_name) {
            Some(expected) if expected == password => {
                let user = IdpUser { id: user_id(user_name), name: user_name.to_string() };
                Ok((user, Box::new(NullIdentityHandle)))
            }
            _ => Err(IdpError::AuthenticationFailed),
        }
    }
}
