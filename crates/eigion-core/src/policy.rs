//! The security policy.
//!
//! Every command passes through the policy before its handler runs. The
//! policy sees a description of the attempted action, not the command
//! payload, so it stays decoupled from the wire schema.

use eigion_proto::model::{Permission, User};
use thiserror::Error;

use crate::store::Role;

/// A denial from the security policy.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct PolicyDenied {
    /// Why the action was denied.
    pub message: String,
}

impl PolicyDenied {
    /// Build a denial.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// One attempted action, described for the policy.
#[derive(Debug, Clone, Copy)]
pub struct Action<'a> {
    /// The user attempting the action.
    pub user: &'a User,
    /// The command name, such as `GROUP_CREATE_BEGIN`.
    pub command: &'a str,
    /// The role of the endpoint the command arrived on.
    pub role: Role,
    /// The specific resource acted on, if any.
    pub resource: Option<&'a str>,
}

/// Decides whether actions are allowed.
pub trait SecurityPolicy: Send + Sync {
    /// Check one action. `Ok(())` allows it.
    fn check(&self, action: &Action<'_>) -> Result<(), PolicyDenied>;
}

/// The default policy: permission-set checks per command.
///
/// Commands the policy does not know are denied.
#[derive(Debug, Default)]
pub struct PermissionPolicy;

impl PermissionPolicy {
    fn required_permission(command: &str) -> Option<Option<Permission>> {
        match command {
            "LOGIN" | "LOGOUT" => Some(None),
            "GROUP_CREATE_BEGIN" | "GROUP_CREATE_READY" | "GROUP_CREATE_CANCEL" => {
                Some(Some(Permission::GroupCreate))
            }
            "GROUP_CREATE_REQUESTS_BEGIN"
            | "GROUP_CREATE_REQUESTS_NEXT"
            | "GROUP_CREATE_REQUESTS_PREVIOUS" => Some(Some(Permission::GroupCreate)),
            "GROUP_SEARCH_BEGIN" | "GROUP_SEARCH_NEXT" | "GROUP_SEARCH_PREVIOUS" => {
                Some(Some(Permission::GroupRead))
            }
            "AUDIT_SEARCH_BEGIN" | "AUDIT_SEARCH_NEXT" | "AUDIT_SEARCH_PREVIOUS" => {
                Some(Some(Permission::AuditRead))
            }
            _ => None,
        }
    }
}

impl SecurityPolicy for PermissionPolicy {
    fn check(&self, action: &Action<'_>) -> Result<(), PolicyDenied> {
        if action.role == Role::Amberjack && !action.user.holds(Permission::AmberjackAccess) {
            return Err(PolicyDenied::new("administrative access denied"));
        }
        match Self::required_permission(action.command) {
            Some(None) => Ok(()),
            Some(Some(permission)) => {
                if action.user.holds(permission) {
                    Ok(())
                } else {
                    Err(PolicyDenied::new(format!("{} denied", action.command)))
                }
            }
            None => Err(PolicyDenied::new(format!("unknown command {}", action.command))),
        }
    }
}
