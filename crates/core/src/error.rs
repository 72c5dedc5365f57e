//! Transport failure taxonomy and the fixed user-facing message table.
//!
//! The response normalizer in `vitrina-client` is the only producer of
//! these; nothing above it inspects transport-level error shapes.

use thiserror::Error;

use crate::envelope::Envelope;

pub const MSG_INVALID_CREDENTIALS: &str = "Invalid credentials. Please try again.";
pub const MSG_ACCOUNT_DISABLED: &str = "Account disabled or not registered.";
pub const MSG_NOT_FOUND: &str = "Resource not found.";
pub const MSG_VALIDATION: &str = "Validation error. Please review the fields.";
pub const MSG_SERVER_ERROR: &str = "Internal server error. Please try again later.";
pub const MSG_TIMEOUT: &str = "The request took too long. Please try again.";
pub const MSG_NO_CONNECTION: &str = "Connection error. Check your network.";

/// `details.exception` values stamped by the normalizer so that failure
/// envelopes stay classifiable after the transport error is gone.
pub const EXCEPTION_TIMEOUT: &str = "TimeoutError";
pub const EXCEPTION_NETWORK: &str = "NetworkError";
pub const EXCEPTION_HTTP: &str = "HttpError";

/// Typed view of a failure envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No response was received at all.
    #[error("no response received")]
    Network,

    /// The client-side request deadline elapsed.
    #[error("request deadline exceeded")]
    Timeout,

    /// The backend answered with a non-2xx status.
    #[error("http error {status}")]
    Http { status: u16 },

    /// Status 422 with a flattened field-message sequence.
    #[error("validation failed")]
    Validation { errors: Vec<String> },
}

impl TransportError {
    /// Classify a failure envelope back into the taxonomy.
    ///
    /// Returns `None` for success envelopes. The timeout/connectivity split
    /// relies on the `details.exception` tag the normalizer stamps on
    /// no-response failures.
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        if envelope.success {
            return None;
        }
        Some(match envelope.status {
            0 => {
                let exception = envelope
                    .details
                    .get("exception")
                    .and_then(serde_json::Value::as_str);
                if exception == Some(EXCEPTION_TIMEOUT) {
                    Self::Timeout
                } else {
                    Self::Network
                }
            }
            422 => Self::Validation {
                errors: envelope.validation_errors.clone(),
            },
            status => Self::Http { status },
        })
    }
}

/// Fixed user-facing message for an HTTP status, if the status has one.
pub fn status_message(status: u16) -> Option<&'static str> {
    match status {
        401 => Some(MSG_INVALID_CREDENTIALS),
        403 => Some(MSG_ACCOUNT_DISABLED),
        404 => Some(MSG_NOT_FOUND),
        422 => Some(MSG_VALIDATION),
        500 => Some(MSG_SERVER_ERROR),
        _ => None,
    }
}
