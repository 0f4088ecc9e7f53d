//! Outgoing mail for the account workflows.
//!
//! Workflows hand a [`Mail`] to a [`Mailer`]. Production deployments use
//! [`SmtpMailer`]; [`LogMailer`] replaces it when no SMTP relay is
//! configured, and `RecordingMailer` captures mail in tests.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or delivering mail.
#[derive(Debug, Error)]
pub enum MailError {
    /// The recipient or sender is not a valid mailbox.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The SMTP configuration is unusable.
    #[error("invalid SMTP configuration: {0}")]
    Config(String),

    /// The message could not be built.
    #[error("failed to build message: {0}")]
    Build(String),

    /// The relay rejected the message or could not be reached.
    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// Why a magic link was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MagicLinkAction {
    /// Completing a passwordless registration.
    Register,
    /// Signing in to an existing account.
    Login,
}

impl MagicLinkAction {
    /// The value carried in the link's `action` parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
        }
    }
}

/// The kinds of mail the workflows send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailTemplate {
    /// Confirm a new account's address.
    ActivateAccount {
        /// Activation link.
        link: String,
    },
    /// Sign in without a password.
    MagicLink {
        /// Sign-in link.
        link: String,
        /// Registration or login.
        action: MagicLinkAction,
    },
    /// Confirm a pending email change, sent to the new address.
    ConfirmEmailChange {
        /// Confirmation link.
        link: String,
    },
    /// Notice to the previous address after an email change.
    EmailChanged {
        /// The address now on the account.
        new_email: String,
    },
    /// Choose a new password.
    ResetPassword {
        /// Reset link.
        link: String,
    },
}

impl MailTemplate {
    /// The subject line.
    #[must_use]
    pub const fn subject(&self) -> &'static str {
        match self {
            Self::ActivateAccount { .. } => "Activate your account",
            Self::MagicLink {
                action: MagicLinkAction::Register,
                ..
            } => "Finish creating your account",
            Self::MagicLink { .. } => "Your sign-in link",
            Self::ConfirmEmailChange { .. } => "Confirm your new email address",
            Self::EmailChanged { .. } => "Your email address was changed",
            Self::ResetPassword { .. } => "Reset your password",
        }
    }

    /// The plain-text body.
    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::ActivateAccount { link } => format!(
                "Welcome!\n\nOpen the link below to activate your account:\n\n{link}\n\n\
                 If you did not sign up, you can ignore this message.\n"
            ),
            Self::MagicLink { link, .. } => format!(
                "Open the link below to sign in:\n\n{link}\n\n\
                 The link works once. If you did not ask for it, you can ignore this message.\n"
            ),
            Self::ConfirmEmailChange { link } => format!(
                "Open the link below to use this address for your account:\n\n{link}\n\n\
                 If you did not request the change, you can ignore this message.\n"
            ),
            Self::EmailChanged { new_email } => format!(
                "The email address of your account was changed to {new_email}.\n\n\
                 If you did not make this change, contact support right away.\n"
            ),
            Self::ResetPassword { link } => format!(
                "Open the link below to choose a new password:\n\n{link}\n\n\
                 If you did not request a reset, you can ignore this message.\n"
            ),
        }
    }

    /// The link embedded in the mail, if any.
    #[must_use]
    pub fn link(&self) -> Option<&str> {
        match self {
            Self::ActivateAccount { link }
            | Self::MagicLink { link, .. }
            | Self::ConfirmEmailChange { link }
            | Self::ResetPassword { link } => Some(link),
            Self::EmailChanged { .. } => None,
        }
    }
}

/// A message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    /// Recipient address.
    pub to: String,
    /// What to send.
    pub template: MailTemplate,
}

impl Mail {
    /// Address `template` to `to`.
    #[must_use]
    pub fn new(to: impl Into<String>, template: MailTemplate) -> Self {
        Self {
            to: to.into(),
            template,
        }
    }
}

/// Trait for mail delivery.
///
/// This trait abstracts the transport, allowing for logging and recording
/// implementations in development and tests.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be built or delivered.
    async fn send(&self, mail: Mail) -> Result<(), MailError>;
}

#[async_trait]
impl Mailer for Box<dyn Mailer> {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        (**self).send(mail).await
    }
}

// ============================================================================
// SMTP
// ============================================================================

/// SMTP relay settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay host name.
    pub host: String,
    /// Relay port.
    #[serde(default = "SmtpConfig::default_port")]
    pub port: u16,
    /// Login user, if the relay requires authentication.
    #[serde(default)]
    pub username: Option<String>,
    /// Login password.
    #[serde(default)]
    pub password: Option<String>,
    /// Use STARTTLS. Disable only for local relays such as mailhog.
    #[serde(default = "SmtpConfig::default_tls")]
    pub tls: bool,
    /// The `From` mailbox, e.g. `Keyward <noreply@example.com>`.
    pub sender: String,
}

impl SmtpConfig {
    const fn default_port() -> u16 {
        587
    }

    const fn default_tls() -> bool {
        true
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("tls", &self.tls)
            .field("sender", &self.sender)
            .finish()
    }
}

/// Delivers mail through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    /// Create a mailer for the configured relay.
    ///
    /// No connection is opened until the first message is sent.
    ///
    /// # Errors
    ///
    /// Returns `MailError::InvalidAddress` if the sender is not a valid
    /// mailbox and `MailError::Config` if the relay host is unusable.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let sender: Mailbox = config
            .sender
            .parse()
            .map_err(|e| MailError::InvalidAddress(format!("{}: {e}", config.sender)))?;

        let builder = if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| MailError::Config(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let builder = builder.port(config.port);
        let builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e| MailError::InvalidAddress(format!("{}: {e}", mail.to)))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(mail.template.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.template.body())
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        tracing::debug!(subject = mail.template.subject(), "Sent mail");
        Ok(())
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Logs mail instead of sending it.
///
/// Used when no SMTP relay is configured. Links are bearer credentials, so
/// they are only logged when `reveal_links` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer {
    reveal_links: bool,
}

impl LogMailer {
    /// Create a log mailer.
    #[must_use]
    pub const fn new(reveal_links: bool) -> Self {
        Self { reveal_links }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        match mail.template.link() {
            Some(link) if self.reveal_links => {
                tracing::info!(
                    to = %mail.to,
                    subject = mail.template.subject(),
                    link = %link,
                    "Mail not sent (no SMTP relay configured)"
                );
            }
            _ => {
                tracing::warn!(
                    subject = mail.template.subject(),
                    "Mail not sent (no SMTP relay configured)"
                );
            }
        }
        Ok(())
    }
}

// ============================================================================
// Recording (tests)
// ============================================================================

/// Keeps every message in memory.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: parking_lot::Mutex<Vec<Mail>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingMailer {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().clone()
    }

    /// The most recent message to `to`.
    #[must_use]
    pub fn last_to(&self, to: &str) -> Option<Mail> {
        self.sent.lock().iter().rev().find(|m| m.to == to).cloned()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        self.sent.lock().push(mail);
        Ok(())
    }
}
