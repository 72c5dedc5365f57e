//! Principal model and session status.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Which kind of principal a session belongs to.
///
/// Staff users and storefront clients share one state-machine shape but
/// never share a live session; the kind selects the endpoint family.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Client,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::Client => "client",
        }
    }

    /// Path prefix for this kind's auth endpoints.
    pub fn route_prefix(&self) -> &'static str {
        match self {
            PrincipalKind::User => "",
            PrincipalKind::Client => "/client",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown principal kind: {0}")]
pub struct UnknownPrincipalKind(pub String);

impl FromStr for PrincipalKind {
    type Err = UnknownPrincipalKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(PrincipalKind::User),
            "client" => Ok(PrincipalKind::Client),
            other => Err(UnknownPrincipalKind(other.to_string())),
        }
    }
}

/// An authenticated identity as the backend reports it.
///
/// `id` stays an opaque JSON value (backends disagree on numeric vs string
/// ids); unknown fields survive round-trips through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Authentication state machine states.
///
/// A token is held only in `Authenticated` and `Refreshing`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthStatus {
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
    LoggedOut,
}

/// Source of the bearer credential attached to outgoing requests.
///
/// Implemented by the session state and injected into the transport client,
/// so no process-wide mutable session singleton exists.
pub trait BearerSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}
