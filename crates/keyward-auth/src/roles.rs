//! Role policy for new accounts.
//!
//! A registration may ask for a set of allowed roles and a default role.
//! Requested roles must be a subset of the system's allowed roles, and the
//! default role must be one of the requested roles.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a role request violates the policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleError {
    /// A requested role is not in the system's allowed set.
    #[error("role not allowed: {0}")]
    NotAllowed(String),

    /// The default role is not among the requested roles.
    #[error("default role {0} is not in the allowed roles")]
    DefaultNotInAllowed(String),

    /// The request named no roles at all.
    #[error("at least one role is required")]
    Empty,
}

/// Roles settled for a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRoles {
    /// Roles the account may assume.
    pub allowed: Vec<String>,
    /// Role used when the client does not ask for one.
    pub default: String,
}

/// System-wide role configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePolicy {
    /// Every role a user may ever hold.
    pub system_roles: Vec<String>,
    /// Roles given when registration does not ask for any.
    pub default_allowed: Vec<String>,
    /// Default role given when registration does not ask for one.
    pub default_role: String,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self {
            system_roles: vec!["user".to_string(), "me".to_string()],
            default_allowed: vec!["user".to_string(), "me".to_string()],
            default_role: "user".to_string(),
        }
    }
}

impl RolePolicy {
    /// Resolve the roles for a new account.
    ///
    /// Missing values fall back to the policy defaults before validation.
    /// Duplicate requested roles are collapsed.
    ///
    /// # Errors
    ///
    /// Returns `RoleError::NotAllowed` for a role outside the system set,
    /// `RoleError::DefaultNotInAllowed` if the default is not requested, and
    /// `RoleError::Empty` if the resulting set is empty.
    pub fn resolve(
        &self,
        requested_allowed: Option<&[String]>,
        requested_default: Option<&str>,
    ) -> Result<ResolvedRoles, RoleError> {
        let requested = requested_allowed.unwrap_or(&self.default_allowed);

        let mut allowed: Vec<String> = Vec::with_capacity(requested.len());
        for role in requested {
            if !self.system_roles.contains(role) {
                return Err(RoleError::NotAllowed(role.clone()));
            }
            if !allowed.contains(role) {
                allowed.push(role.clone());
            }
        }
        if allowed.is_empty() {
            return Err(RoleError::Empty);
        }

        let default = requested_default.unwrap_or(&self.default_role);
        if !allowed.iter().any(|r| r == default) {
            return Err(RoleError::DefaultNotInAllowed(default.to_string()));
        }

        Ok(ResolvedRoles {
            allowed,
            default: default.to_string(),
        })
    }
}
