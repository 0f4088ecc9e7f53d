//! Core types and utilities for keyward.
//!
//! This crate provides the foundational types used throughout the service:
//!
//! - **Identifiers**: Strongly-typed IDs for accounts and users
//! - **Tickets**: Prefixed single-use tokens for link-click flows
//! - **Refresh tokens**: Opaque session tokens stored by digest
//! - **Errors**: `IdError` and `TicketError` for parse failures
//!
//! # Example
//!
//! ```
//! use keyward_core::{Ticket, TicketKind, RefreshToken};
//!
//! let ticket = Ticket::generate(TicketKind::VerifyEmail);
//! let parsed: Ticket = ticket.to_string().parse().unwrap();
//! assert_eq!(parsed.kind(), TicketKind::VerifyEmail);
//!
//! let token = RefreshToken::generate();
//! assert_eq!(token.digest().len(), 64);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod ticket;
pub mod token;

pub use ids::{AccountId, IdError, UserId};
pub use ticket::{is_live, Ticket, TicketError, TicketKind};
pub use token::RefreshToken;
