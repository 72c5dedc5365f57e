//! `vitrina-core` — shared foundation for the storefront client.
//!
//! This crate contains **pure types** (no I/O): the canonical response
//! envelope every API call resolves to, the transport error taxonomy, and
//! the principal/session models shared by the transport and session layers.

pub mod envelope;
pub mod error;
pub mod principal;

pub use envelope::{AuthPayload, Envelope};
pub use error::TransportError;
pub use principal::{AuthStatus, BearerSource, Principal, PrincipalKind};
