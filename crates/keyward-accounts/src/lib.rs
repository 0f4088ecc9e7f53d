//! Account workflows for keyward.
//!
//! This crate implements everything that happens to an account after the
//! HTTP layer has parsed a request:
//!
//! - Registration, with optional activation by mail or passwordless sign-up
//! - Sign-in with a password, a magic link or an OAuth provider profile
//! - Confirmed or direct email changes
//! - Password reset and change
//! - Session issuance and refresh-token rotation
//!
//! # Tickets
//!
//! Activation, email change, password reset and magic links all work the
//! same way. A ticket of the flow's kind is written onto the account with an
//! expiry, mailed as a link, and consumed by a single conditional update in
//! the store. A ticket completes at most one flow, is rejected once expired,
//! and never completes a flow of another kind.
//!
//! ```text
//!   register / request_*            link clicked
//!          │                             │
//!          ▼                             ▼
//!   set_ticket(kind:uuid, exp)   parse + expect_kind
//!          │                             │
//!          ▼                             ▼
//!       Mailer ──── mail ────▶   consume_ticket(now, action)
//!                                        │
//!                              None ─────┴───── Some(account)
//!                          InvalidTicket        apply action, clear ticket
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use keyward_accounts::{
//!     AccountManager, AccountService, AccountsConfig, LogMailer, RegisterRequest, Registered,
//! };
//! use keyward_auth::{JwtConfig, JwtService};
//! use keyward_store::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let jwt = JwtService::new(JwtConfig {
//!     secret: Some("a-secret-of-at-least-thirty-two-bytes".to_string()),
//!     ..JwtConfig::default()
//! })?;
//! let accounts = AccountManager::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(LogMailer::default()),
//!     Arc::new(jwt),
//!     AccountsConfig {
//!         auto_activate_new_users: true,
//!         ..AccountsConfig::default()
//!     },
//! );
//!
//! let outcome = accounts
//!     .register(RegisterRequest::new("ada@example.com", "correct horse"))
//!     .await?;
//! assert!(matches!(outcome, Registered::Session(_)));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod email;
pub mod error;
pub mod mailer;
pub mod service;
pub mod session;
pub mod ticket;
pub mod types;

pub use error::{AccountError, Result};
pub use mailer::{
    LogMailer, MagicLinkAction, Mail, MailError, MailTemplate, Mailer, SmtpConfig, SmtpMailer,
};
pub use service::{AccountManager, AccountService};
pub use session::Session;
pub use types::{
    AccountInfo, AccountsConfig, LoginOutcome, LoginRequest, RegisterRequest, Registered,
};

#[cfg(any(test, feature = "test-utils"))]
pub use mailer::RecordingMailer;
