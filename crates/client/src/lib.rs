//! `vitrina-client` — HTTP transport and response normalization.
//!
//! One call-and-normalize entry point for every consumer: requests go out
//! with the bearer credential from the injected `BearerSource`
//! (`vitrina-core`), and every outcome (success, HTTP error, timeout, no
//! connectivity) comes back as a canonical `Envelope`.

pub mod api;
pub mod normalize;

pub use api::ApiClient;
