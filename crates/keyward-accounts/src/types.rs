//! Request and response types for account operations.
//!
//! These types define the API contracts between the gateway and the
//! account workflows.

use chrono::{DateTime, Duration, Utc};
use keyward_auth::{PasswordPolicy, RolePolicy};
use keyward_core::{AccountId, TicketKind, UserId};
use keyward_store::{Account, User};
use serde::{Deserialize, Serialize};

use crate::session::Session;

/// Request to register a new account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Sign-in email.
    pub email: String,
    /// Password. Omit for a passwordless registration through a magic link.
    #[serde(default)]
    pub password: Option<String>,
    /// Profile display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Profile picture URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Preferred locale for outgoing mail.
    #[serde(default)]
    pub locale: Option<String>,
    /// Roles to allow. Defaults to the system's default set.
    #[serde(default)]
    pub allowed_roles: Option<Vec<String>>,
    /// Default role. Must be one of the allowed roles.
    #[serde(default)]
    pub default_role: Option<String>,
}

impl RegisterRequest {
    /// Create a request with an email and password and defaults otherwise.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    /// Create a passwordless request.
    #[must_use]
    pub fn passwordless(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }
}

/// Request to sign in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Sign-in email.
    pub email: String,
    /// Password. Omit to receive a magic link instead.
    #[serde(default)]
    pub password: Option<String>,
}

/// Outcome of a registration.
#[derive(Debug, Clone)]
pub enum Registered {
    /// The account is active and signed in.
    Session(Session),
    /// A verification or magic-link mail was sent.
    VerificationPending,
}

/// Outcome of a sign-in.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// Credentials were valid.
    Session(Session),
    /// A magic link was mailed.
    MagicLinkSent,
}

/// The authenticated user's account and profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Account identifier.
    pub account_id: AccountId,
    /// User identifier, the JWT subject.
    pub user_id: UserId,
    /// Sign-in email.
    pub email: Option<String>,
    /// Address awaiting confirmation.
    pub new_email: Option<String>,
    /// Whether the account may sign in.
    pub active: bool,
    /// Default role.
    pub default_role: String,
    /// Allowed roles.
    pub roles: Vec<String>,
    /// Preferred locale.
    pub locale: String,
    /// Profile display name.
    pub display_name: Option<String>,
    /// Profile picture URL.
    pub avatar_url: Option<String>,
    /// Whether a password is set.
    pub has_password: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl AccountInfo {
    pub(crate) fn from_parts(account: Account, user: Option<User>) -> Self {
        let (display_name, avatar_url) = user
            .map(|u| (u.display_name, u.avatar_url))
            .unwrap_or_default();
        Self {
            account_id: account.account_id,
            user_id: account.user_id,
            email: account.email,
            new_email: account.new_email,
            active: account.active,
            default_role: account.default_role,
            roles: account.roles,
            locale: account.locale,
            display_name,
            avatar_url,
            has_password: account.password_hash.is_some(),
            created_at: account.created_at,
        }
    }
}

/// Configuration for the account workflows.
#[derive(Debug, Clone)]
pub struct AccountsConfig {
    /// Public URL of this service, used in activation and magic links.
    pub server_url: String,
    /// URL of the client application, used in email-change and reset links.
    pub client_url: String,
    /// Activate accounts at registration instead of mailing a ticket.
    pub auto_activate_new_users: bool,
    /// Require confirmation by mail before an email change takes effect.
    pub verify_emails: bool,
    /// Allow passwordless registration and magic-link sign-in.
    pub magic_link_enabled: bool,
    /// Notify the previous address after an email change.
    pub notify_email_change: bool,
    /// Allow users to delete their own account.
    pub allow_self_delete: bool,
    /// Domains accepted at registration. Empty accepts any domain.
    pub allowed_email_domains: Vec<String>,
    /// Lifetime of `verifyEmail` tickets (seconds).
    pub verify_email_ttl_secs: i64,
    /// Lifetime of `changeEmail` tickets (seconds).
    pub change_email_ttl_secs: i64,
    /// Lifetime of `passwordReset` tickets (seconds).
    pub password_reset_ttl_secs: i64,
    /// Lifetime of `magicLink` tickets (seconds).
    pub magic_link_ttl_secs: i64,
    /// Lifetime of refresh tokens (minutes).
    pub refresh_token_ttl_minutes: i64,
    /// Locale for accounts that do not choose one.
    pub default_locale: String,
    /// Policy for new passwords.
    pub password_policy: PasswordPolicy,
    /// Policy for requested roles.
    pub role_policy: RolePolicy,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            client_url: "http://localhost:3001".to_string(),
            auto_activate_new_users: false,
            verify_emails: false,
            magic_link_enabled: false,
            notify_email_change: false,
            allow_self_delete: false,
            allowed_email_domains: Vec::new(),
            verify_email_ttl_secs: 24 * 60 * 60,
            change_email_ttl_secs: 60 * 60,
            password_reset_ttl_secs: 60 * 60,
            magic_link_ttl_secs: 60 * 60,
            refresh_token_ttl_minutes: 43_200, // 30 days
            default_locale: "en".to_string(),
            password_policy: PasswordPolicy::default(),
            role_policy: RolePolicy::default(),
        }
    }
}

impl AccountsConfig {
    /// Lifetime of tickets of the given kind.
    #[must_use]
    pub fn ticket_ttl(&self, kind: TicketKind) -> Duration {
        let secs = match kind {
            TicketKind::VerifyEmail => self.verify_email_ttl_secs,
            TicketKind::ChangeEmail => self.change_email_ttl_secs,
            TicketKind::PasswordReset => self.password_reset_ttl_secs,
            TicketKind::MagicLink => self.magic_link_ttl_secs,
        };
        Duration::try_seconds(secs).unwrap_or(Duration::MAX)
    }

    /// Lifetime of refresh tokens.
    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        Duration::try_minutes(self.refresh_token_ttl_minutes).unwrap_or(Duration::MAX)
    }
}
