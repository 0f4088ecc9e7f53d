//! Ticket issuance and parsing for the link-based flows.
//!
//! Each flow owns one ticket kind. A ticket string arriving from a link is
//! parsed and checked against the flow's kind before the store is asked to
//! consume it, so a ticket minted for one flow can never complete another.

use chrono::{DateTime, Utc};
use keyward_core::{Ticket, TicketKind};
use keyward_store::TicketGrant;
use url::Url;

use crate::error::{AccountError, Result};
use crate::types::AccountsConfig;

/// Mint a ticket of `kind` with the configured lifetime.
///
/// # Errors
///
/// Returns `AccountError::Internal` if the lifetime overflows the calendar.
pub fn grant(
    config: &AccountsConfig,
    kind: TicketKind,
    now: DateTime<Utc>,
    new_email: Option<String>,
) -> Result<TicketGrant> {
    let expires_at = now
        .checked_add_signed(config.ticket_ttl(kind))
        .ok_or_else(|| AccountError::Internal(format!("{kind} ticket lifetime out of range")))?;
    Ok(TicketGrant {
        ticket: Ticket::generate(kind),
        expires_at,
        new_email,
    })
}

/// Parse a ticket received from a client and require it to be of `kind`.
///
/// # Errors
///
/// Returns `AccountError::Ticket` if the string is malformed or names a
/// different flow.
pub fn parse(raw: &str, kind: TicketKind) -> Result<Ticket> {
    let ticket: Ticket = raw.trim().parse()?;
    Ok(ticket.expect_kind(kind)?)
}

/// Build `{base}{path}?{params}` with the parameters URL-encoded.
///
/// # Errors
///
/// Returns `AccountError::Internal` if `base` is not an absolute URL.
pub fn link(base: &str, path: &str, params: &[(&str, &str)]) -> Result<String> {
    let joined = format!("{}{path}", base.trim_end_matches('/'));
    let url = Url::parse_with_params(&joined, params)
        .map_err(|e| AccountError::Internal(format!("invalid link base {base}: {e}")))?;
    Ok(url.into())
}
