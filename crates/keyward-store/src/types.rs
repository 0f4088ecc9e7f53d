//! Domain types stored in the backend.
//!
//! These types represent the persisted state of accounts, user profiles,
//! provider links and refresh tokens.

use chrono::{DateTime, Utc};
use keyward_core::{AccountId, Ticket, UserId};
use serde::{Deserialize, Serialize};

/// An authentication account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account.
    pub account_id: AccountId,
    /// The user profile this account authenticates.
    pub user_id: UserId,
    /// Sign-in email. Provider accounts may have none.
    pub email: Option<String>,
    /// Address awaiting confirmation through a `changeEmail` ticket.
    pub new_email: Option<String>,
    /// Argon2 PHC string. `None` for passwordless and provider accounts.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Whether the account may sign in.
    pub active: bool,
    /// Role placed in `x-hasura-default-role`.
    pub default_role: String,
    /// Roles placed in `x-hasura-allowed-roles`.
    pub roles: Vec<String>,
    /// Pending ticket, as `prefix:uuid`.
    #[serde(skip_serializing)]
    pub ticket: Option<String>,
    /// Expiry of the pending ticket.
    pub ticket_expires_at: Option<DateTime<Utc>>,
    /// Preferred locale for outgoing mail.
    pub locale: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier for the user.
    pub user_id: UserId,
    /// Name shown to other users.
    pub display_name: Option<String>,
    /// Profile picture URL.
    pub avatar_url: Option<String>,
    /// Email copied from the account at creation.
    pub email: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// An external identity at an OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// Provider name, e.g. `github`.
    pub provider: String,
    /// The user's id at the provider.
    pub provider_user_id: String,
}

/// A stored link between a provider identity and an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderLink {
    /// The linked identity.
    #[serde(flatten)]
    pub identity: ProviderIdentity,
    /// The account it signs into.
    pub account_id: AccountId,
}

/// Everything needed to create an account and its user profile.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Sign-in email, already normalized.
    pub email: Option<String>,
    /// Argon2 PHC string.
    pub password_hash: Option<String>,
    /// Initial activation state.
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
    /// Ticket to store with the new account.
    pub ticket: Option<TicketGrant>,
    /// Provider identity to link at creation.
    pub provider: Option<ProviderIdentity>,
}

/// A ticket written onto an account.
///
/// Writing a grant replaces any previous ticket and pending email.
#[derive(Debug, Clone)]
pub struct TicketGrant {
    /// The ticket value.
    pub ticket: Ticket,
    /// Instant after which the ticket is rejected.
    pub expires_at: DateTime<Utc>,
    /// Pending email for `changeEmail` tickets.
    pub new_email: Option<String>,
}

/// The state change applied when a ticket is consumed.
///
/// Each action also carries a precondition on the account; if it does not
/// hold, the ticket is left in place and nothing is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketAction {
    /// Activate an inactive account.
    Activate,
    /// Sign in through a magic link, activating the account if needed.
    SignIn,
    /// Move the pending `new_email` into `email`.
    PromoteNewEmail,
    /// Replace the password hash.
    SetPassword(String),
}

impl TicketAction {
    /// Check the action's precondition against the current account state.
    #[must_use]
    pub fn applies_to(&self, account: &Account) -> bool {
        match self {
            Self::Activate => !account.active,
            Self::PromoteNewEmail => account.new_email.is_some(),
            Self::SignIn | Self::SetPassword(_) => true,
        }
    }
}

/// Result of a successful ticket consumption.
#[derive(Debug, Clone)]
pub struct ConsumedTicket {
    /// The account after the action was applied.
    pub account: Account,
    /// The email held before the action, if it changed.
    pub previous_email: Option<String>,
}

/// A persisted refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// blake3 hex digest of the raw token.
    pub token_digest: String,
    /// The account the token belongs to.
    pub account_id: AccountId,
    /// Instant after which the token is rejected.
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(active: bool, new_email: Option<&str>) -> Account {
        let now = Utc::now();
        Account {
            account_id: AccountId::generate(),
            user_id: UserId::generate(),
            email: Some("a@example.com".to_string()),
            new_email: new_email.map(String::from),
            password_hash: None,
            active,
            default_role: "user".to_string(),
            roles: vec!["user".to_string()],
            ticket: None,
            ticket_expires_at: None,
            locale: "en".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn activate_requires_inactive_account() {
        assert!(TicketAction::Activate.applies_to(&account(false, None)));
        assert!(!TicketAction::Activate.applies_to(&account(true, None)));
    }

    #[test]
    fn promote_requires_pending_email() {
        assert!(TicketAction::PromoteNewEmail.applies_to(&account(true, Some("b@example.com"))));
        assert!(!TicketAction::PromoteNewEmail.applies_to(&account(true, None)));
    }

    #[test]
    fn account_serialization_omits_secrets() {
        let mut acct = account(true, None);
        acct.password_hash = Some("$argon2id$...".to_string());
        acct.ticket = Some("magicLink:x".to_string());
        let json = serde_json::to_string(&acct).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("magicLink"));
    }
}
