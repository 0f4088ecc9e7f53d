//! Account service implementation.
//!
//! This module provides the `AccountService` trait and the `AccountManager`
//! implementation that coordinates the store, the mailer and token signing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use keyward_auth::{
    password::{hash_password_blocking, verify_password_blocking},
    JwtService, OAuthProfile,
};
use keyward_core::{RefreshToken, TicketKind, UserId};
use keyward_store::{Account, NewAccount, ProviderIdentity, Store, TicketAction};

use crate::email;
use crate::error::{email_conflict, AccountError, Result};
use crate::mailer::{MagicLinkAction, Mail, MailTemplate, Mailer};
use crate::session::{self, Session};
use crate::ticket;
use crate::types::{
    AccountInfo, AccountsConfig, LoginOutcome, LoginRequest, RegisterRequest, Registered,
};

/// Trait defining the account operations.
///
/// This trait provides the complete API behind the HTTP surface. Operations
/// taking a `UserId` act on behalf of an authenticated caller.
#[async_trait]
pub trait AccountService: Send + Sync {
    // =========================================================================
    // Registration & Sign-in
    // =========================================================================

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::EmailInUse` if the email is taken, and a 400
    /// class error if the email, password or roles are rejected.
    async fn register(&self, request: RegisterRequest) -> Result<Registered>;

    /// Activate an account with a `verifyEmail` ticket.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidTicket` if the ticket is unknown,
    /// expired, already used, or the account is already active.
    async fn activate(&self, ticket: &str) -> Result<Account>;

    /// Sign in with a password, or request a magic link.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidCredentials` for an unknown email or
    /// wrong password and `AccountError::AccountInactive` for an account
    /// that has not been activated.
    async fn login(&self, request: LoginRequest) -> Result<LoginOutcome>;

    /// Sign in with a `magicLink` ticket.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidTicket` if the ticket cannot be consumed.
    async fn complete_magic_link(&self, ticket: &str) -> Result<Session>;

    /// Sign in with a provider profile, creating or linking an account.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::AccountInactive` if the matched account is
    /// not active.
    async fn sign_in_with_provider(&self, profile: OAuthProfile) -> Result<Session>;

    // =========================================================================
    // Email Change
    // =========================================================================

    /// Start a confirmed email change by mailing the new address.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::FeatureDisabled` unless email verification is on.
    async fn request_email_change(&self, user_id: UserId, new_email: &str) -> Result<()>;

    /// Change the email immediately.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::FeatureDisabled` when email verification is on.
    async fn change_email_directly(&self, user_id: UserId, new_email: &str) -> Result<()>;

    /// Complete an email change with a `changeEmail` ticket.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidTicket` if the ticket cannot be consumed
    /// and `AccountError::EmailInUse` if the address was taken meanwhile.
    async fn confirm_email_change(&self, ticket: &str) -> Result<()>;

    // =========================================================================
    // Passwords
    // =========================================================================

    /// Mail a password reset link. Unknown and inactive emails succeed silently.
    async fn request_password_reset(&self, email: &str) -> Result<()>;

    /// Set a new password with a `passwordReset` ticket.
    ///
    /// All refresh tokens of the account are revoked.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::WeakPassword` if the password violates the
    /// policy (the ticket is kept) and `AccountError::InvalidTicket` if the
    /// ticket cannot be consumed.
    async fn reset_password(&self, ticket: &str, new_password: &str) -> Result<()>;

    /// Change the password of an authenticated user.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidCredentials` if the old password is wrong.
    async fn change_password(
        &self,
        user_id: UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<()>;

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Exchange a refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidRefreshToken` if the token cannot be used.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session>;

    /// Revoke a refresh token, or with `all` every token of its account.
    async fn logout(&self, refresh_token: &str, all: bool) -> Result<()>;

    // =========================================================================
    // Account
    // =========================================================================

    /// Get the authenticated user's account and profile.
    async fn account_info(&self, user_id: UserId) -> Result<AccountInfo>;

    /// Delete the authenticated user's account.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::FeatureDisabled` unless self deletion is allowed.
    async fn delete_account(&self, user_id: UserId) -> Result<()>;
}

/// The main account service implementation.
pub struct AccountManager<S: Store, M: Mailer> {
    store: Arc<S>,
    mailer: Arc<M>,
    jwt: Arc<JwtService>,
    config: AccountsConfig,
}

impl<S: Store, M: Mailer> AccountManager<S, M> {
    /// Create a new account service.
    #[must_use]
    pub fn new(store: Arc<S>, mailer: Arc<M>, jwt: Arc<JwtService>, config: AccountsConfig) -> Self {
        Self {
            store,
            mailer,
            jwt,
            config,
        }
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the token signer.
    #[must_use]
    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &AccountsConfig {
        &self.config
    }

    async fn account_for(&self, user_id: UserId) -> Result<Account> {
        self.store
            .account_by_user_id(user_id)
            .await?
            .ok_or(AccountError::NotFound)
    }

    async fn ensure_email_unused(&self, email: &str) -> Result<()> {
        if self.store.account_by_email(email).await?.is_some() {
            return Err(AccountError::EmailInUse);
        }
        Ok(())
    }

    async fn start_session(&self, account: &Account) -> Result<Session> {
        session::issue(&*self.store, &self.jwt, account, self.config.refresh_ttl()).await
    }

    async fn send_magic_link(
        &self,
        account: &Account,
        to: &str,
        action: MagicLinkAction,
    ) -> Result<()> {
        let grant = ticket::grant(&self.config, TicketKind::MagicLink, Utc::now(), None)?;
        self.store.set_ticket(account.account_id, &grant).await?;
        self.mail_magic_link(to, &grant.ticket.to_string(), action)
            .await
    }

    async fn mail_magic_link(&self, to: &str, ticket: &str, action: MagicLinkAction) -> Result<()> {
        let link = ticket::link(
            &self.config.server_url,
            "/auth/magic-link",
            &[("action", action.as_str()), ("token", ticket)],
        )?;
        self.mailer
            .send(Mail::new(to, MailTemplate::MagicLink { link, action }))
            .await?;
        Ok(())
    }

    async fn mail_activation(&self, to: &str, ticket: &str) -> Result<()> {
        let link = ticket::link(&self.config.server_url, "/auth/activate", &[("ticket", ticket)])?;
        self.mailer
            .send(Mail::new(to, MailTemplate::ActivateAccount { link }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<S: Store + 'static, M: Mailer + 'static> AccountService for AccountManager<S, M> {
    async fn register(&self, request: RegisterRequest) -> Result<Registered> {
        let email = email::validate(&request.email, &self.config.allowed_email_domains)?;
        let roles = self.config.role_policy.resolve(
            request.allowed_roles.as_deref(),
            request.default_role.as_deref(),
        )?;

        match &request.password {
            Some(password) => self.config.password_policy.check(password)?,
            None if !self.config.magic_link_enabled => return Err(AccountError::PasswordRequired),
            None => {}
        }

        self.ensure_email_unused(&email).await?;

        let passwordless = request.password.is_none();
        let password_hash = match request.password {
            Some(password) => Some(hash_password_blocking(password).await?),
            None => None,
        };

        let active = self.config.auto_activate_new_users;
        let ticket_kind = if passwordless {
            Some(TicketKind::MagicLink)
        } else if active {
            None
        } else {
            Some(TicketKind::VerifyEmail)
        };
        let grant = ticket_kind
            .map(|kind| ticket::grant(&self.config, kind, Utc::now(), None))
            .transpose()?;

        let account = self
            .store
            .insert_account(&NewAccount {
                email: Some(email.clone()),
                password_hash,
                active,
                default_role: roles.default,
                roles: roles.allowed,
                locale: request
                    .locale
                    .unwrap_or_else(|| self.config.default_locale.clone()),
                display_name: request.display_name,
                avatar_url: request.avatar_url,
                ticket: grant.clone(),
                provider: None,
            })
            .await
            .map_err(email_conflict)?;

        tracing::info!(
            account_id = %account.account_id,
            user_id = %account.user_id,
            active,
            passwordless,
            "Registered account"
        );

        match grant {
            Some(grant) if passwordless => {
                self.mail_magic_link(&email, &grant.ticket.to_string(), MagicLinkAction::Register)
                    .await?;
                Ok(Registered::VerificationPending)
            }
            Some(grant) => {
                self.mail_activation(&email, &grant.ticket.to_string())
                    .await?;
                Ok(Registered::VerificationPending)
            }
            None => Ok(Registered::Session(self.start_session(&account).await?)),
        }
    }

    async fn activate(&self, raw: &str) -> Result<Account> {
        let ticket = ticket::parse(raw, TicketKind::VerifyEmail)?;
        let consumed = self
            .store
            .consume_ticket(&ticket, Utc::now(), &TicketAction::Activate)
            .await?
            .ok_or(AccountError::InvalidTicket)?;

        tracing::info!(account_id = %consumed.account.account_id, "Activated account");
        Ok(consumed.account)
    }

    async fn login(&self, request: LoginRequest) -> Result<LoginOutcome> {
        let email = email::normalize(&request.email);

        let Some(password) = request.password else {
            if !self.config.magic_link_enabled {
                return Err(AccountError::PasswordRequired);
            }
            match self.store.account_by_email(&email).await? {
                Some(account) => {
                    self.send_magic_link(&account, &email, MagicLinkAction::Login)
                        .await?;
                    tracing::info!(account_id = %account.account_id, "Sent magic link");
                }
                None => tracing::debug!("Magic link requested for unknown email"),
            }
            return Ok(LoginOutcome::MagicLinkSent);
        };

        let account = self
            .store
            .account_by_email(&email)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;
        let hash = account
            .password_hash
            .clone()
            .ok_or(AccountError::InvalidCredentials)?;
        if !verify_password_blocking(password, hash).await? {
            tracing::debug!(account_id = %account.account_id, "Wrong password");
            return Err(AccountError::InvalidCredentials);
        }
        if !account.active {
            return Err(AccountError::AccountInactive);
        }

        tracing::info!(account_id = %account.account_id, "Signed in with password");
        Ok(LoginOutcome::Session(self.start_session(&account).await?))
    }

    async fn complete_magic_link(&self, raw: &str) -> Result<Session> {
        let ticket = ticket::parse(raw, TicketKind::MagicLink)?;
        let consumed = self
            .store
            .consume_ticket(&ticket, Utc::now(), &TicketAction::SignIn)
            .await?
            .ok_or(AccountError::InvalidTicket)?;

        tracing::info!(account_id = %consumed.account.account_id, "Signed in with magic link");
        self.start_session(&consumed.account).await
    }

    async fn sign_in_with_provider(&self, profile: OAuthProfile) -> Result<Session> {
        let identity = ProviderIdentity {
            provider: profile.provider.as_str().to_string(),
            provider_user_id: profile.provider_user_id.clone(),
        };

        let account = if let Some(account) = self.store.account_by_provider(&identity).await? {
            account
        } else {
            let email = profile.email.as_deref().map(email::normalize);
            let existing = match &email {
                Some(email) => self.store.account_by_email(email).await?,
                None => None,
            };

            if let Some(account) = existing {
                self.store
                    .link_provider(account.account_id, &identity)
                    .await?;
                tracing::info!(
                    account_id = %account.account_id,
                    provider = %profile.provider,
                    "Linked provider to existing account"
                );
                account
            } else {
                if let Some(email) = &email {
                    email::validate(email, &self.config.allowed_email_domains)?;
                }
                let roles = self.config.role_policy.resolve(None, None)?;
                let account = self
                    .store
                    .insert_account(&NewAccount {
                        email,
                        password_hash: None,
                        active: true,
                        default_role: roles.default,
                        roles: roles.allowed,
                        locale: self.config.default_locale.clone(),
                        display_name: profile.display_name,
                        avatar_url: profile.avatar_url,
                        ticket: None,
                        provider: Some(identity),
                    })
                    .await
                    .map_err(email_conflict)?;
                tracing::info!(
                    account_id = %account.account_id,
                    provider = %profile.provider,
                    "Registered account from provider"
                );
                account
            }
        };

        if !account.active {
            return Err(AccountError::AccountInactive);
        }
        self.start_session(&account).await
    }

    async fn request_email_change(&self, user_id: UserId, new_email: &str) -> Result<()> {
        if !self.config.verify_emails {
            return Err(AccountError::FeatureDisabled("email verification"));
        }
        let account = self.account_for(user_id).await?;
        let new_email = email::validate(new_email, &self.config.allowed_email_domains)?;
        self.ensure_email_unused(&new_email).await?;

        let grant = ticket::grant(
            &self.config,
            TicketKind::ChangeEmail,
            Utc::now(),
            Some(new_email.clone()),
        )?;
        self.store.set_ticket(account.account_id, &grant).await?;

        let token = grant.ticket.to_string();
        let link = ticket::link(
            &self.config.client_url,
            "/change-email",
            &[("ticket", token.as_str())],
        )?;
        self.mailer
            .send(Mail::new(
                new_email,
                MailTemplate::ConfirmEmailChange { link },
            ))
            .await?;

        tracing::info!(account_id = %account.account_id, "Requested email change");
        Ok(())
    }

    async fn change_email_directly(&self, user_id: UserId, new_email: &str) -> Result<()> {
        if self.config.verify_emails {
            return Err(AccountError::FeatureDisabled("direct email change"));
        }
        let account = self.account_for(user_id).await?;
        let new_email = email::validate(new_email, &self.config.allowed_email_domains)?;
        self.ensure_email_unused(&new_email).await?;

        self.store
            .update_email(account.account_id, &new_email)
            .await
            .map_err(email_conflict)?;

        tracing::info!(account_id = %account.account_id, "Changed email");
        Ok(())
    }

    async fn confirm_email_change(&self, raw: &str) -> Result<()> {
        let ticket = ticket::parse(raw, TicketKind::ChangeEmail)?;
        let consumed = self
            .store
            .consume_ticket(&ticket, Utc::now(), &TicketAction::PromoteNewEmail)
            .await
            .map_err(email_conflict)?
            .ok_or(AccountError::InvalidTicket)?;

        let account_id = consumed.account.account_id;
        tracing::info!(account_id = %account_id, "Confirmed email change");

        if self.config.notify_email_change {
            if let (Some(previous), Some(current)) =
                (consumed.previous_email, consumed.account.email)
            {
                let notice = Mail::new(previous, MailTemplate::EmailChanged { new_email: current });
                // The change is committed; a failed notice must not undo it.
                if let Err(e) = self.mailer.send(notice).await {
                    tracing::warn!(account_id = %account_id, error = %e, "Failed to send email change notice");
                }
            }
        }
        Ok(())
    }

    async fn request_password_reset(&self, email: &str) -> Result<()> {
        let email = email::normalize(email);
        let account = match self.store.account_by_email(&email).await? {
            Some(account) if account.active => account,
            _ => {
                tracing::debug!("Password reset requested for unknown or inactive email");
                return Ok(());
            }
        };

        let grant = ticket::grant(&self.config, TicketKind::PasswordReset, Utc::now(), None)?;
        self.store.set_ticket(account.account_id, &grant).await?;

        let token = grant.ticket.to_string();
        let link = ticket::link(
            &self.config.client_url,
            "/reset-password",
            &[("ticket", token.as_str())],
        )?;
        self.mailer
            .send(Mail::new(email, MailTemplate::ResetPassword { link }))
            .await?;

        tracing::info!(account_id = %account.account_id, "Requested password reset");
        Ok(())
    }

    async fn reset_password(&self, raw: &str, new_password: &str) -> Result<()> {
        let ticket = ticket::parse(raw, TicketKind::PasswordReset)?;
        self.config.password_policy.check(new_password)?;
        let hash = hash_password_blocking(new_password.to_string()).await?;

        let consumed = self
            .store
            .consume_ticket(&ticket, Utc::now(), &TicketAction::SetPassword(hash))
            .await?
            .ok_or(AccountError::InvalidTicket)?;

        let account_id = consumed.account.account_id;
        self.store.delete_refresh_tokens(account_id).await?;

        tracing::info!(account_id = %account_id, "Reset password");
        Ok(())
    }

    async fn change_password(
        &self,
        user_id: UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let account = self.account_for(user_id).await?;
        let current = account
            .password_hash
            .clone()
            .ok_or(AccountError::InvalidCredentials)?;
        if !verify_password_blocking(old_password.to_string(), current).await? {
            return Err(AccountError::InvalidCredentials);
        }

        self.config.password_policy.check(new_password)?;
        let hash = hash_password_blocking(new_password.to_string()).await?;
        self.store
            .update_password(account.account_id, &hash)
            .await?;

        tracing::info!(account_id = %account.account_id, "Changed password");
        Ok(())
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let presented = RefreshToken::from_client(refresh_token);
        session::rotate(&*self.store, &self.jwt, &presented, self.config.refresh_ttl()).await
    }

    async fn logout(&self, refresh_token: &str, all: bool) -> Result<()> {
        let digest = RefreshToken::from_client(refresh_token).digest();
        if !all {
            self.store.delete_refresh_token(&digest).await?;
            return Ok(());
        }

        if let Some(record) = self.store.take_refresh_token(&digest, Utc::now()).await? {
            self.store
                .delete_refresh_tokens(record.account_id)
                .await?;
            tracing::info!(account_id = %record.account_id, "Signed out everywhere");
        }
        Ok(())
    }

    async fn account_info(&self, user_id: UserId) -> Result<AccountInfo> {
        let account = self.account_for(user_id).await?;
        let user = self.store.user_by_id(user_id).await?;
        Ok(AccountInfo::from_parts(account, user))
    }

    async fn delete_account(&self, user_id: UserId) -> Result<()> {
        if !self.config.allow_self_delete {
            return Err(AccountError::FeatureDisabled("account deletion"));
        }
        let account = self.account_for(user_id).await?;
        self.store.delete_account(account.account_id).await?;

        tracing::info!(account_id = %account.account_id, "Deleted account");
        Ok(())
    }
}
