//! Single-use verification tickets.
//!
//! One nullable `ticket` column on the account record serves every
//! link-click flow. The flow a ticket belongs to is encoded as a prefix:
//!
//! ```text
//! verifyEmail:3f0c8f4e-5b9d-4c53-9b41-8a1f3d2a7e10
//! └────┬────┘ └────────────────┬─────────────────┘
//!    kind                    nonce
//! ```
//!
//! A ticket is live while its expiry is strictly after "now". Consuming a
//! ticket clears the column, so a second use finds nothing to match.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The flow a ticket authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    /// Confirms the address given at registration and activates the account.
    VerifyEmail,
    /// Confirms a pending email change.
    ChangeEmail,
    /// Authorizes setting a new password without the old one.
    PasswordReset,
    /// Passwordless sign-in (and registration) link.
    MagicLink,
}

impl TicketKind {
    /// All ticket kinds.
    pub const ALL: [Self; 4] = [
        Self::VerifyEmail,
        Self::ChangeEmail,
        Self::PasswordReset,
        Self::MagicLink,
    ];

    /// The string prefix stored in front of the nonce.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::VerifyEmail => "verifyEmail",
            Self::ChangeEmail => "changeEmail",
            Self::PasswordReset => "passwordReset",
            Self::MagicLink => "magicLink",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A typed ticket: a kind plus a random nonce.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    kind: TicketKind,
    nonce: uuid::Uuid,
}

impl Ticket {
    /// Generate a fresh ticket of the given kind.
    #[must_use]
    pub fn generate(kind: TicketKind) -> Self {
        Self {
            kind,
            nonce: uuid::Uuid::new_v4(),
        }
    }

    /// The flow this ticket belongs to.
    #[must_use]
    pub const fn kind(&self) -> TicketKind {
        self.kind
    }

    /// Ensure the ticket belongs to the expected flow.
    ///
    /// # Errors
    ///
    /// Returns `TicketError::WrongKind` if the prefix names another flow.
    pub fn expect_kind(self, expected: TicketKind) -> Result<Self, TicketError> {
        if self.kind == expected {
            Ok(self)
        } else {
            Err(TicketError::WrongKind {
                expected,
                found: self.kind,
            })
        }
    }
}

impl FromStr for Ticket {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, nonce) = s.split_once(':').ok_or(TicketError::Malformed)?;
        let kind = TicketKind::from_prefix(prefix).ok_or(TicketError::Malformed)?;
        let nonce = uuid::Uuid::parse_str(nonce).map_err(|_| TicketError::Malformed)?;
        Ok(Self { kind, nonce })
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.prefix(), self.nonce)
    }
}

// Tickets are bearer credentials; keep the nonce out of debug output.
impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticket({}:…)", self.kind.prefix())
    }
}

/// Returns `true` while a ticket with this expiry may still be consumed.
#[must_use]
pub fn is_live(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at > now
}

/// Errors raised while interpreting a ticket string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketError {
    /// The string is not `<known prefix>:<uuid>`.
    #[error("malformed ticket")]
    Malformed,

    /// The ticket belongs to a different flow.
    #[error("ticket is for {found}, expected {expected}")]
    WrongKind {
        /// The kind the caller required.
        expected: TicketKind,
        /// The kind encoded in the ticket.
        found: TicketKind,
    },
}
