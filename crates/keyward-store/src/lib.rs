//! GraphQL-backed storage layer for keyward.
//!
//! This crate persists accounts, user profiles, provider links and refresh
//! tokens. Production deployments talk to a Hasura-style GraphQL endpoint;
//! tests and dev mode use an in-memory store with the same semantics.
//!
//! # Architecture
//!
//! The backend exposes the following tables:
//!
//! - `auth_accounts`: credentials, activation flag, roles and the pending ticket
//! - `auth_account_roles`: allowed roles per account
//! - `auth_account_providers`: OAuth identities linked to an account
//! - `auth_refresh_tokens`: refresh token digests with expiry
//! - `users`: public profile, one per account
//!
//! Ticket consumption is a single conditional update. The backend matches
//! the ticket and checks its expiry in the same statement, so two concurrent
//! callers holding the same ticket cannot both succeed.
//!
//! # Example
//!
//! ```no_run
//! use keyward_store::{GraphqlConfig, GraphqlStore, Store};
//!
//! # async fn run() -> keyward_store::Result<()> {
//! let store = GraphqlStore::new(&GraphqlConfig {
//!     endpoint: "http://hasura:8080/v1/graphql".to_string(),
//!     admin_secret: Some("secret".to_string()),
//!     timeout_secs: 10,
//! })?;
//!
//! let account = store.account_by_email("ada@example.com").await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod graphql;
pub mod graphql_store;
pub mod memory;
pub mod queries;
pub mod types;

pub use error::{Result, StoreError};
pub use graphql::{GraphqlClient, GraphqlConfig};
pub use graphql_store::GraphqlStore;
pub use memory::MemoryStore;
pub use types::{
    Account, ConsumedTicket, NewAccount, ProviderIdentity, ProviderLink, RefreshTokenRecord,
    TicketAction, TicketGrant, User,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyward_core::{AccountId, Ticket, UserId};

/// The storage trait defining all backend operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (GraphQL over HTTP, in-memory for testing).
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Create an account together with its user profile, roles, optional
    /// ticket and optional provider link.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the email is already in use.
    async fn insert_account(&self, account: &NewAccount) -> Result<Account>;

    /// Get an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    async fn account_by_id(&self, account_id: AccountId) -> Result<Option<Account>>;

    /// Get the account of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    async fn account_by_user_id(&self, user_id: UserId) -> Result<Option<Account>>;

    /// Get an account by its sign-in email.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    async fn account_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Get the account linked to a provider identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    async fn account_by_provider(&self, identity: &ProviderIdentity) -> Result<Option<Account>>;

    /// Replace an account's password hash.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    async fn update_password(&self, account_id: AccountId, password_hash: &str) -> Result<()>;

    /// Replace an account's email and clear any pending email change.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist, or
    /// `StoreError::Conflict` if the email is already in use.
    async fn update_email(&self, account_id: AccountId, email: &str) -> Result<()>;

    /// Delete an account, its user profile, links and refresh tokens.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    async fn delete_account(&self, account_id: AccountId) -> Result<()>;

    // =========================================================================
    // User Operations
    // =========================================================================

    /// Get a user profile by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    async fn user_by_id(&self, user_id: UserId) -> Result<Option<User>>;

    // =========================================================================
    // Provider Operations
    // =========================================================================

    /// Link a provider identity to an existing account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the identity is already linked.
    async fn link_provider(&self, account_id: AccountId, identity: &ProviderIdentity)
        -> Result<()>;

    // =========================================================================
    // Ticket Operations
    // =========================================================================

    /// Store a ticket on an account, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    async fn set_ticket(&self, account_id: AccountId, grant: &TicketGrant) -> Result<()>;

    /// Consume a ticket and apply `action` to its account.
    ///
    /// Succeeds at most once per ticket. Returns `None` if no account holds
    /// the ticket, the ticket is not live at `now`, or the action's
    /// precondition does not hold.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    async fn consume_ticket(
        &self,
        ticket: &Ticket,
        now: DateTime<Utc>,
        action: &TicketAction,
    ) -> Result<Option<ConsumedTicket>>;

    // =========================================================================
    // Refresh Token Operations
    // =========================================================================

    /// Persist a refresh token record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> Result<()>;

    /// Remove and return a refresh token if it is still live at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    async fn take_refresh_token(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>>;

    /// Delete a single refresh token. Deleting an unknown token succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    async fn delete_refresh_token(&self, token_digest: &str) -> Result<()>;

    /// Delete every refresh token of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    async fn delete_refresh_tokens(&self, account_id: AccountId) -> Result<()>;
}
