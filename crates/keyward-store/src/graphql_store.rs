//! GraphQL storage implementation.
//!
//! This module provides the `GraphqlStore` implementation of the `Store` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyward_core::{AccountId, Ticket, UserId};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::graphql::{GraphqlClient, GraphqlConfig};
use crate::queries;
use crate::types::{
    Account, ConsumedTicket, NewAccount, ProviderIdentity, RefreshTokenRecord, TicketAction,
    TicketGrant, User,
};
use crate::Store;

/// Store backed by a Hasura-style GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct GraphqlStore {
    client: GraphqlClient,
}

impl GraphqlStore {
    /// Connect to the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &GraphqlConfig) -> Result<Self> {
        Ok(Self {
            client: GraphqlClient::new(config)?,
        })
    }

    /// Run a document and decode one top-level field of `data`.
    async fn fetch<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        field: &str,
    ) -> Result<T> {
        let mut data: Value = self.client.execute(query, variables).await?;
        let value = data.get_mut(field).map(Value::take).unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// Run a mutation that reports `affected_rows`; zero rows is `NotFound`.
    async fn mutate_one(&self, query: &str, variables: Value, field: &str) -> Result<()> {
        let affected: Affected = self.fetch(query, variables, field).await?;
        if affected.affected_rows == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn first_account(&self, query: &str, variables: Value) -> Result<Option<Account>> {
        let rows: Vec<AccountRow> = self.fetch(query, variables, "auth_accounts").await?;
        Ok(rows.into_iter().next().map(Account::from))
    }
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(Deserialize)]
struct Affected {
    affected_rows: u64,
}

#[derive(Deserialize)]
struct Returning<T> {
    #[serde(default = "Vec::new")]
    returning: Vec<T>,
}

#[derive(Deserialize)]
struct RoleRow {
    role: String,
}

#[derive(Deserialize)]
struct AccountRow {
    id: Uuid,
    user_id: Uuid,
    email: Option<String>,
    new_email: Option<String>,
    password_hash: Option<String>,
    active: bool,
    default_role: String,
    ticket: Option<String>,
    ticket_expires_at: Option<DateTime<Utc>>,
    locale: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    account_roles: Vec<RoleRow>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            account_id: AccountId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            email: row.email,
            new_email: row.new_email,
            password_hash: row.password_hash,
            active: row.active,
            default_role: row.default_role,
            roles: row.account_roles.into_iter().map(|r| r.role).collect(),
            ticket: row.ticket,
            ticket_expires_at: row.ticket_expires_at,
            locale: row.locale,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct UserRow {
    id: Uuid,
    display_name: Option<String>,
    avatar_url: Option<String>,
    email: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            user_id: UserId::from_uuid(row.id),
            display_name: row.display_name,
            avatar_url: row.avatar_url,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

#[derive(Deserialize)]
struct InsertedUser {
    account: AccountRow,
}

#[derive(Deserialize)]
struct ProviderRow {
    account: AccountRow,
}

#[derive(Deserialize)]
struct RefreshTokenRow {
    refresh_token: String,
    account_id: Uuid,
    expires_at: DateTime<Utc>,
}

// =============================================================================
// Ticket Consumption
// =============================================================================

/// Build the `where` and `_set` clauses for consuming `ticket`.
fn consume_clauses(
    ticket: &Ticket,
    now: DateTime<Utc>,
    action: &TicketAction,
    pending_email: Option<&str>,
) -> (Value, Value) {
    let mut conditions = vec![
        json!({ "ticket": { "_eq": ticket.to_string() } }),
        json!({ "ticket_expires_at": { "_gt": now } }),
    ];
    let mut set = json!({ "ticket": null, "ticket_expires_at": null });

    match action {
        TicketAction::Activate => {
            conditions.push(json!({ "active": { "_eq": false } }));
            set["active"] = json!(true);
        }
        TicketAction::SignIn => {
            set["active"] = json!(true);
        }
        TicketAction::PromoteNewEmail => {
            // The swap happens in the same update that clears the ticket, so
            // a uniqueness violation leaves the ticket usable.
            conditions.push(json!({ "new_email": { "_eq": pending_email } }));
            set["email"] = json!(pending_email);
            set["new_email"] = Value::Null;
        }
        TicketAction::SetPassword(hash) => {
            set["password_hash"] = json!(hash);
        }
    }

    (json!({ "_and": conditions }), set)
}

#[async_trait]
impl Store for GraphqlStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    async fn insert_account(&self, account: &NewAccount) -> Result<Account> {
        let roles: Vec<Value> = account.roles.iter().map(|r| json!({ "role": r })).collect();
        let providers: Vec<Value> = account
            .provider
            .iter()
            .map(|p| {
                json!({
                    "auth_provider": p.provider,
                    "auth_provider_unique_id": p.provider_user_id,
                })
            })
            .collect();
        let ticket = account.ticket.as_ref();

        let variables = json!({
            "user": {
                "display_name": account.display_name,
                "avatar_url": account.avatar_url,
                "email": account.email,
                "account": {
                    "data": {
                        "email": account.email,
                        "password_hash": account.password_hash,
                        "active": account.active,
                        "default_role": account.default_role,
                        "locale": account.locale,
                        "ticket": ticket.map(|g| g.ticket.to_string()),
                        "ticket_expires_at": ticket.map(|g| g.expires_at),
                        "new_email": ticket.and_then(|g| g.new_email.clone()),
                        "account_roles": { "data": roles },
                        "account_providers": { "data": providers },
                    }
                }
            }
        });

        let inserted: InsertedUser = self
            .fetch(queries::INSERT_USER_WITH_ACCOUNT, variables, "insert_users_one")
            .await?;
        let account = Account::from(inserted.account);
        tracing::debug!(account_id = %account.account_id, "Inserted account");
        Ok(account)
    }

    async fn account_by_id(&self, account_id: AccountId) -> Result<Option<Account>> {
        let row: Option<AccountRow> = self
            .fetch(
                queries::ACCOUNT_BY_ID,
                json!({ "id": account_id.to_string() }),
                "auth_accounts_by_pk",
            )
            .await?;
        Ok(row.map(Account::from))
    }

    async fn account_by_user_id(&self, user_id: UserId) -> Result<Option<Account>> {
        self.first_account(
            queries::ACCOUNT_BY_USER_ID,
            json!({ "user_id": user_id.to_string() }),
        )
        .await
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.first_account(queries::ACCOUNT_BY_EMAIL, json!({ "email": email }))
            .await
    }

    async fn account_by_provider(&self, identity: &ProviderIdentity) -> Result<Option<Account>> {
        let rows: Vec<ProviderRow> = self
            .fetch(
                queries::ACCOUNT_BY_PROVIDER,
                json!({
                    "provider": identity.provider,
                    "provider_user_id": identity.provider_user_id,
                }),
                "auth_account_providers",
            )
            .await?;
        Ok(rows.into_iter().next().map(|r| Account::from(r.account)))
    }

    async fn update_password(&self, account_id: AccountId, password_hash: &str) -> Result<()> {
        self.mutate_one(
            queries::UPDATE_PASSWORD,
            json!({ "id": account_id.to_string(), "password_hash": password_hash }),
            "update_auth_accounts",
        )
        .await
    }

    async fn update_email(&self, account_id: AccountId, email: &str) -> Result<()> {
        self.mutate_one(
            queries::UPDATE_EMAIL,
            json!({ "id": account_id.to_string(), "email": email }),
            "update_auth_accounts",
        )
        .await
    }

    async fn delete_account(&self, account_id: AccountId) -> Result<()> {
        let account = self
            .account_by_id(account_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        self.mutate_one(
            queries::DELETE_ACCOUNT,
            json!({
                "account_id": account_id.to_string(),
                "user_id": account.user_id.to_string(),
            }),
            "delete_auth_accounts",
        )
        .await?;
        tracing::debug!(account_id = %account_id, "Deleted account");
        Ok(())
    }

    // =========================================================================
    // User Operations
    // =========================================================================

    async fn user_by_id(&self, user_id: UserId) -> Result<Option<User>> {
        let row: Option<UserRow> = self
            .fetch(
                queries::USER_BY_ID,
                json!({ "id": user_id.to_string() }),
                "users_by_pk",
            )
            .await?;
        Ok(row.map(User::from))
    }

    // =========================================================================
    // Provider Operations
    // =========================================================================

    async fn link_provider(
        &self,
        account_id: AccountId,
        identity: &ProviderIdentity,
    ) -> Result<()> {
        let _: Value = self
            .fetch(
                queries::LINK_PROVIDER,
                json!({
                    "account_id": account_id.to_string(),
                    "provider": identity.provider,
                    "provider_user_id": identity.provider_user_id,
                }),
                "insert_auth_account_providers_one",
            )
            .await?;
        Ok(())
    }

    // =========================================================================
    // Ticket Operations
    // =========================================================================

    async fn set_ticket(&self, account_id: AccountId, grant: &TicketGrant) -> Result<()> {
        self.mutate_one(
            queries::SET_TICKET,
            json!({
                "id": account_id.to_string(),
                "ticket": grant.ticket.to_string(),
                "expires_at": grant.expires_at,
                "new_email": grant.new_email,
            }),
            "update_auth_accounts",
        )
        .await
    }

    async fn consume_ticket(
        &self,
        ticket: &Ticket,
        now: DateTime<Utc>,
        action: &TicketAction,
    ) -> Result<Option<ConsumedTicket>> {
        // An email change needs the pending address up front to guard on it.
        let mut previous_email = None;
        let mut pending_email = None;
        if *action == TicketAction::PromoteNewEmail {
            let holder = self
                .first_account(
                    queries::ACCOUNT_BY_TICKET,
                    json!({ "ticket": ticket.to_string() }),
                )
                .await?;
            let Some((email, Some(new_email))) = holder.map(|a| (a.email, a.new_email)) else {
                tracing::debug!(kind = %ticket.kind(), "Ticket has no pending email");
                return Ok(None);
            };
            previous_email = email;
            pending_email = Some(new_email);
        }

        let (where_clause, set) = consume_clauses(ticket, now, action, pending_email.as_deref());
        let updated: Returning<AccountRow> = self
            .fetch(
                queries::UPDATE_ACCOUNTS_WHERE,
                json!({ "where": where_clause, "set": set }),
                "update_auth_accounts",
            )
            .await?;

        let Some(row) = updated.returning.into_iter().next() else {
            tracing::debug!(kind = %ticket.kind(), "Ticket did not match a live account");
            return Ok(None);
        };
        let account = Account::from(row);

        tracing::debug!(
            account_id = %account.account_id,
            kind = %ticket.kind(),
            "Consumed ticket"
        );
        Ok(Some(ConsumedTicket {
            account,
            previous_email,
        }))
    }

    // =========================================================================
    // Refresh Token Operations
    // =========================================================================

    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> Result<()> {
        let _: Value = self
            .fetch(
                queries::INSERT_REFRESH_TOKEN,
                json!({
                    "digest": record.token_digest,
                    "account_id": record.account_id.to_string(),
                    "expires_at": record.expires_at,
                }),
                "insert_auth_refresh_tokens_one",
            )
            .await?;
        Ok(())
    }

    async fn take_refresh_token(
        &self,
        token_digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>> {
        let deleted: Returning<RefreshTokenRow> = self
            .fetch(
                queries::TAKE_REFRESH_TOKEN,
                json!({ "digest": token_digest, "now": now }),
                "delete_auth_refresh_tokens",
            )
            .await?;

        Ok(deleted.returning.into_iter().next().map(|row| RefreshTokenRecord {
            token_digest: row.refresh_token,
            account_id: AccountId::from_uuid(row.account_id),
            expires_at: row.expires_at,
        }))
    }

    async fn delete_refresh_token(&self, token_digest: &str) -> Result<()> {
        let _: Affected = self
            .fetch(
                queries::DELETE_REFRESH_TOKEN,
                json!({ "digest": token_digest }),
                "delete_auth_refresh_tokens",
            )
            .await?;
        Ok(())
    }

    async fn delete_refresh_tokens(&self, account_id: AccountId) -> Result<()> {
        let _: Affected = self
            .fetch(
                queries::DELETE_REFRESH_TOKENS,
                json!({ "account_id": account_id.to_string() }),
                "delete_auth_refresh_tokens",
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_core::TicketKind;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ACCOUNT_ID: &str = "11111111-1111-4111-8111-111111111111";
    const USER_ID: &str = "22222222-2222-4222-8222-222222222222";

    fn account_json(email: &str, new_email: Option<&str>, active: bool) -> Value {
        json!({
            "id": ACCOUNT_ID,
            "user_id": USER_ID,
            "email": email,
            "new_email": new_email,
            "password_hash": null,
            "active": active,
            "default_role": "user",
            "ticket": null,
            "ticket_expires_at": null,
            "locale": "en",
            "created_at": "2024-01-01T00:00:00+00:00",
            "updated_at": "2024-01-01T00:00:00+00:00",
            "account_roles": [{ "role": "user" }, { "role": "editor" }]
        })
    }

    async fn store_for(server: &MockServer) -> GraphqlStore {
        GraphqlStore::new(&GraphqlConfig {
            endpoint: format!("{}/v1/graphql", server.uri()),
            admin_secret: None,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn account_by_email_decodes_roles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "auth_accounts": [account_json("ada@example.com", None, true)] }
            })))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let account = store
            .account_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(account.account_id.to_string(), ACCOUNT_ID);
        assert_eq!(account.roles, vec!["user", "editor"]);
        assert!(account.active);
    }

    #[tokio::test]
    async fn account_by_email_missing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "auth_accounts": [] }
            })))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        assert!(store.account_by_email("x@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn consume_ticket_with_no_match_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("update_auth_accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "update_auth_accounts": { "affected_rows": 0, "returning": [] } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let ticket = Ticket::generate(TicketKind::VerifyEmail);
        let consumed = store
            .consume_ticket(&ticket, Utc::now(), &TicketAction::Activate)
            .await
            .unwrap();
        assert!(consumed.is_none());
    }

    #[tokio::test]
    async fn consume_ticket_promotes_pending_email() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("auth_accounts(where: {ticket"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "auth_accounts": [
                    account_json("old@example.com", Some("new@example.com"), true)
                ] }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("update_auth_accounts(where: $where"))
            .and(body_string_contains("new@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "update_auth_accounts": {
                    "affected_rows": 1,
                    "returning": [account_json("new@example.com", None, true)]
                } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let ticket = Ticket::generate(TicketKind::ChangeEmail);
        let consumed = store
            .consume_ticket(&ticket, Utc::now(), &TicketAction::PromoteNewEmail)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(consumed.account.email.as_deref(), Some("new@example.com"));
        assert_eq!(consumed.account.new_email, None);
        assert_eq!(consumed.previous_email.as_deref(), Some("old@example.com"));
    }

    #[tokio::test]
    async fn email_conflict_leaves_ticket_in_place() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("auth_accounts(where: {ticket"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "auth_accounts": [
                    account_json("old@example.com", Some("taken@example.com"), true)
                ] }
            })))
            .expect(1)
            .mount(&server)
            .await;
        // The only write is the combined swap, and the backend rejects it as a whole.
        Mock::given(method("POST"))
            .and(body_string_contains("update_auth_accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{
                    "message": "Uniqueness violation",
                    "extensions": { "code": "constraint-violation" }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let ticket = Ticket::generate(TicketKind::ChangeEmail);
        let result = store
            .consume_ticket(&ticket, Utc::now(), &TicketAction::PromoteNewEmail)
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn email_change_without_pending_address_is_not_consumed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("auth_accounts(where: {ticket"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "auth_accounts": [account_json("old@example.com", None, true)] }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("update_auth_accounts"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let ticket = Ticket::generate(TicketKind::ChangeEmail);
        let consumed = store
            .consume_ticket(&ticket, Utc::now(), &TicketAction::PromoteNewEmail)
            .await
            .unwrap();
        assert!(consumed.is_none());
    }

    #[tokio::test]
    async fn take_refresh_token_returns_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "delete_auth_refresh_tokens": { "returning": [{
                    "refresh_token": "abc",
                    "account_id": ACCOUNT_ID,
                    "expires_at": "2999-01-01T00:00:00+00:00"
                }] } }
            })))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let record = store.take_refresh_token("abc", Utc::now()).await.unwrap().unwrap();
        assert_eq!(record.token_digest, "abc");
        assert_eq!(record.account_id.to_string(), ACCOUNT_ID);
    }

    #[tokio::test]
    async fn update_password_on_missing_account_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "update_auth_accounts": { "affected_rows": 0 } }
            })))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let result = store.update_password(AccountId::generate(), "hash").await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[test]
    fn activation_clause_requires_inactive_account() {
        let ticket = Ticket::generate(TicketKind::VerifyEmail);
        let (where_clause, set) = consume_clauses(&ticket, Utc::now(), &TicketAction::Activate, None);
        let conditions = where_clause["_and"].as_array().unwrap();
        assert_eq!(conditions.len(), 3);
        assert_eq!(conditions[2]["active"]["_eq"], json!(false));
        assert_eq!(set["active"], json!(true));
        assert_eq!(set["ticket"], Value::Null);
    }

    #[test]
    fn email_clause_guards_and_swaps_pending_address() {
        let ticket = Ticket::generate(TicketKind::ChangeEmail);
        let (where_clause, set) = consume_clauses(
            &ticket,
            Utc::now(),
            &TicketAction::PromoteNewEmail,
            Some("new@example.com"),
        );
        let conditions = where_clause["_and"].as_array().unwrap();
        assert_eq!(conditions[2]["new_email"]["_eq"], json!("new@example.com"));
        assert_eq!(set["email"], json!("new@example.com"));
        assert_eq!(set["new_email"], Value::Null);
        assert_eq!(set["ticket"], Value::Null);
    }

    #[test]
    fn password_clause_sets_hash() {
        let ticket = Ticket::generate(TicketKind::PasswordReset);
        let action = TicketAction::SetPassword("phc".to_string());
        let (_, set) = consume_clauses(&ticket, Utc::now(), &action, None);
        assert_eq!(set["password_hash"], json!("phc"));
        assert!(set.get("active").is_none());
    }
}
