//! Email address normalization and validation.

use lettre::Address;

use crate::error::{AccountError, Result};

/// Normalize an address for storage and lookup: trimmed and lowercased.
#[must_use]
pub fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalize and validate an address, enforcing the domain allow list.
///
/// An empty allow list accepts every domain.
///
/// # Errors
///
/// Returns `AccountError::InvalidEmail` if the address does not parse and
/// `AccountError::EmailDomainNotAllowed` if its domain is not listed.
pub fn validate(email: &str, allowed_domains: &[String]) -> Result<String> {
    let normalized = normalize(email);
    let address: Address = normalized
        .parse()
        .map_err(|_| AccountError::InvalidEmail(email.trim().to_string()))?;

    if !allowed_domains.is_empty()
        && !allowed_domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(address.domain()))
    {
        return Err(AccountError::EmailDomainNotAllowed(
            address.domain().to_string(),
        ));
    }

    Ok(normalized)
}
