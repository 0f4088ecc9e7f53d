//! In-memory storage implementation.
//!
//! Used by tests and by the gateway in dev mode. All state sits behind one
//! lock, so each operation is atomic with respect to the others.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyward_core::{is_live, AccountId, Ticket, UserId};
use parking_lot::RwLock;

use crate::error::{Result, StoreError};
use crate::types::{
    Account, ConsumedTicket, NewAccount, ProviderIdentity, RefreshTokenRecord, TicketAction,
    TicketGrant, User,
};
use crate::Store;

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    users: HashMap<UserId, User>,
    providers: HashMap<ProviderIdentity, AccountId>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<AccountId>) -> bool {
        self.accounts.values().any(|a| {
            Some(a.account_id) != except && a.email.as_deref().is_some_and(|e| e == email)
        })
    }

    fn account_mut(&mut self, account_id: AccountId) -> Result<&mut Account> {
        self.accounts
            .get_mut(&account_id)
            .ok_or(StoreError::NotFound)
    }
}

/// Store that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of refresh tokens currently stored for an account.
    #[must_use]
    pub fn refresh_token_count(&self, account_id: AccountId) -> usize {
        self.tables
            .read()
            .refresh_tokens
            .values()
            .filter(|r| r.account_id == account_id)
            .count()
    }
}

#[async_trait]
impl Store for MemoryStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    async fn insert_account(&self, new: &NewAccount) -> Result<Account> {
        let mut tables = self.tables.write();

        if let Some(email) = &new.email {
            if tables.email_taken(email, None) {
                return Err(StoreError::Conflict(format!("email already in use: {email}")));
            }
        }
        if let Some(identity) = &new.provider {
            if tables.providers.contains_key(identity) {
                return Err(StoreError::Conflict("provider identity already linked".to_string()));
            }
        }

        let now = Utc::now();
        let account = Account {
            account_id: AccountId::generate(),
            user_id: UserId::generate(),
            email: new.email.clone(),
            new_email: new.ticket.as_ref().and_then(|g| g.new_email.clone()),
            password_hash: new.password_hash.clone(),
            active: new.active,
            default_role: new.default_role.clone(),
            roles: new.roles.clone(),
            ticket: new.ticket.as_ref().map(|g| g.ticket.to_string()),
            ticket_expires_at: new.ticket.as_ref().map(|g| g.expires_at),
            locale: new.locale.clone(),
            created_at: now,
            updated_at: now,
        };
        let user = User {
            user_id: account.user_id,
            display_name: new.display_name.clone(),
            avatar_url: new.avatar_url.clone(),
            email: new.email.clone(),
            created_at: now,
        };

        if let Some(identity) = &new.provider {
            tables
                .providers
                .insert(identity.clone(), account.account_id);
        }
        tables.users.insert(user.user_id, user);
        tables.accounts.insert(account.account_id, account.clone());
        Ok(account)
    }

    async fn account_by_id(&self, account_id: AccountId) -> Result<Option<Account>> {
        Ok(self.tables.read().accounts.get(&account_id).cloned())
    }

    async fn account_by_user_id(&self, user_id: UserId) -> Result<Option<Account>> {
        Ok(self
            .tables
            .read()
            .accounts
            .values()
            .find(|a| a.user_id == user_id)
            .cloned())
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>> {
        Ok(self
            .tables
            .read()
            .accounts
            .values()
            .find(|a| a.email.as_deref() == Some(email))
            .cloned())
    }

    async fn account_by_provider(&self, identity: &ProviderIdentity) -> Result<Option<Account>> {
        let tables = self.tables.read();
        Ok(tables
            .providers
            .get(identity)
            .and_then(|id| tables.accounts.get(id))
            .cloned())
    }

    async fn update_password(&self, account_id: AccountId, password_hash: &str) -> Result<()> {
        let mut tables = self.tables.write();
        let account = tables.account_mut(account_id)?;
        account.password_hash = Some(password_hash.to_string());
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn update_email(&self, account_id: AccountId, email: &str) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.email_taken(email, Some(account_id)) {
            return Err(StoreError::Conflict(format!("email already in use: {email}")));
        }
        let account = tables.account_mut(account_id)?;
        account.email = Some(email.to_string());
        account.new_email = None;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_account(&self, account_id: AccountId) -> Result<()> {
        let mut tables = self.tables.write();
        let account = tables
            .accounts
            .remove(&account_id)
            .ok_or(StoreError::NotFound)?;
        tables.users.remove(&account.user_id);
        tables.providers.retain(|_, id| *id != account_id);
        tables.refresh_tokens.retain(|_, r| r.account_id != account_id);
        Ok(())
    }

    // =========================================================================
    // User Operations
    // =========================================================================

    async fn user_by_id(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().users.get(&user_id).cloned())
    }

    // =========================================================================
    // Provider Operations
    // =========================================================================

    async fn link_provider(
        &self,
        account_id: AccountId,
        identity: &ProviderIdentity,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        if !tables.accounts.contains_key(&account_id) {
            return Err(StoreError::NotFound);
        }
        if tables.providers.contains_key(identity) {
            return Err(StoreError::Conflict("provider identity already linked".to_string()));
        }
        tables.providers.insert(identity.clone(), account_id);
        Ok(())
    }

    // =========================================================================
    // Ticket Operations
    // =========================================================================

    async fn set_ticket(&self, account_id: AccountId, grant: &TicketGrant) -> Result<()> {
        let mut tables = self.tables.write();
        let account = tables.account_mut(account_id)?;
        account.ticket = Some(grant.ticket.to_string());
        account.ticket_expires_at = Some(grant.expires_at);
        account.new_email.clone_from(&grant.new_email);
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn consume_ticket(
        &self,
        ticket: &Ticket,
        now: DateTime<Utc>,
        action: &TicketAction,
    ) -> Result<Option<ConsumedTicket>> {
        let raw = ticket.to_string();
        let mut tables = self.tables.write();

        let Some(account_id) = tables
            .accounts
            .values()
            .find(|a| {
                a.ticket.as_deref() == Some(raw.as_str())
                    && a.ticket_expires_at.is_some_and(|exp| is_live(exp, now))
                    && action.applies_to(a)
            })
            .map(|a| a.account_id)
        else {
            return Ok(None);
        };

        if *action == TicketAction::PromoteNewEmail {
            let pending = tables
                .accounts
                .get(&account_id)
                .and_then(|a| a.new_email.clone());
            if let Some(new_email) = pending {
                if tables.email_taken(&new_email, Some(account_id)) {
                    return Err(StoreError::Conflict(format!(
                        "email already in use: {new_email}"
                    )));
                }
            }
        }

        let mut previous_email = None;

        let account = tables.account_mut(account_id)?;
        account.ticket = None;
        account.ticket_expires_at = None;
        account.updated_at = now;
        match action {
            TicketAction::Activate | TicketAction::SignIn => account.active = true,
            TicketAction::PromoteNewEmail => {
                if let Some(new_email) = account.new_email.take() {
                    previous_email = account.email.replace(new_email);
                }
            }
            TicketAction::SetPassword(hash) => account.password_hash = Some(hash.clone()),
        }

        Ok(Some(ConsumedTicket {
            account: account.clone(),
            previous_email,
        }))
    }

    // =========================================================================
    // Refresh Token Operations
    // =========================================================================

    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> Result<()> {
        self.tables
            .write()
            .refresh_tokens
            .insert(record.token_digest.clone(), record.clone());
        Ok(())
    }

    async fn take_refresh_token(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>> {
        let mut tables = self.tables.write();
        let live = tables
            .refresh_tokens
            .get(token_digest)
            .is_some_and(|r| r.expires_at > now);
        if !live {
            return Ok(None);
        }
        Ok(tables.refresh_tokens.remove(token_digest))
    }

    async fn delete_refresh_token(&self, token_digest: &str) -> Result<()> {
        self.tables.write().refresh_tokens.remove(token_digest);
        Ok(())
    }

    async fn delete_refresh_tokens(&self, account_id: AccountId) -> Result<()> {
        self.tables
            .write()
            .refresh_tokens
            .retain(|_, r| r.account_id != account_id);
        Ok(())
    }
}
