//! Response normalization.
//!
//! The single choke point where raw transport outcomes become canonical
//! [`Envelope`] values. Infallible by construction: every branch produces
//! an envelope, nothing re-raises a transport error.

use reqwest::Response;
use serde_json::{Map, Value};

use vitrina_core::Envelope;
use vitrina_core::error::{
    EXCEPTION_HTTP, EXCEPTION_NETWORK, EXCEPTION_TIMEOUT, MSG_NO_CONNECTION, MSG_TIMEOUT,
    MSG_VALIDATION, status_message,
};

/// Normalize a received HTTP response.
///
/// 2xx bodies already carry the canonical shape and are decoded verbatim;
/// success payloads are never reshaped. Anything else becomes a failure
/// envelope with the fixed status-keyed message.
pub async fn response(resp: Response) -> Envelope {
    let status = resp.status();
    if status.is_success() {
        match resp.json::<Envelope>().await {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(status = status.as_u16(), "unreadable success body: {err:?}");
                Envelope::failure(
                    status.as_u16(),
                    format!("Unreadable response body: {err}"),
                )
            }
        }
    } else {
        http_failure(resp).await
    }
}

/// Build a failure envelope from a non-2xx response.
pub async fn http_failure(resp: Response) -> Envelope {
    let status = resp.status().as_u16();
    let status_text = resp
        .status()
        .canonical_reason()
        .unwrap_or("Unknown Error")
        .to_string();
    let body: Value = resp.json().await.unwrap_or(Value::Null);

    let details = match body.get("details").and_then(Value::as_object) {
        Some(details) => details.clone(),
        None => {
            let mut fallback = Map::new();
            fallback.insert("exception".into(), Value::String(EXCEPTION_HTTP.into()));
            fallback.insert(
                "error_message".into(),
                Value::String(
                    body.get("message")
                        .and_then(Value::as_str)
                        .map(str::to_owned)
                        .unwrap_or_else(|| format!("Error {status}: {status_text}")),
                ),
            );
            fallback
        }
    };

    // The fixed status-keyed message always wins for user display; the
    // backend's own message survives in `details` for diagnostics.
    let mut validation_errors = flat_errors(&body);
    let message = match status {
        422 => {
            validation_errors = extract_validation(&body);
            MSG_VALIDATION.to_string()
        }
        other => status_message(other)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Error {status}: {status_text}")),
    };

    Envelope {
        success: false,
        message,
        data: None,
        status,
        details,
        validation_errors,
    }
}

/// Build a failure envelope from an error with no HTTP response at all.
/// Timeouts are distinguished from connectivity failures, each with its
/// own fixed message; `status` is 0 in both cases.
pub fn transport_failure(err: &reqwest::Error) -> Envelope {
    let (exception, message) = if err.is_timeout() {
        (EXCEPTION_TIMEOUT, MSG_TIMEOUT)
    } else {
        (EXCEPTION_NETWORK, MSG_NO_CONNECTION)
    };

    let mut details = Map::new();
    details.insert("exception".into(), Value::String(exception.into()));
    details.insert("error_message".into(), Value::String(err.to_string()));

    Envelope {
        success: false,
        message: message.to_string(),
        data: None,
        status: 0,
        details,
        validation_errors: Vec::new(),
    }
}

/// The backend's `errors` collection when it is already a flat sequence.
fn flat_errors(body: &Value) -> Vec<String> {
    match body.get("errors") {
        Some(Value::Array(list)) => list.iter().map(display_string).collect(),
        _ => Vec::new(),
    }
}

/// 422 extraction: a field→messages map flattens to `"{field}: {message}"`
/// preserving per-field order and field iteration order; a flat sequence is
/// used verbatim; otherwise an array `details` is used; otherwise empty.
fn extract_validation(body: &Value) -> Vec<String> {
    match body.get("errors") {
        Some(Value::Object(fields)) => fields
            .iter()
            .flat_map(|(field, messages)| flatten_field(field, messages))
            .collect(),
        Some(Value::Array(list)) => list.iter().map(display_string).collect(),
        _ => match body.get("details") {
            Some(Value::Array(list)) => list.iter().map(display_string).collect(),
            _ => Vec::new(),
        },
    }
}

fn flatten_field(field: &str, messages: &Value) -> Vec<String> {
    match messages {
        Value::Array(list) => list
            .iter()
            .map(|message| format!("{field}: {}", display_string(message)))
            .collect(),
        other => vec![format!("{field}: {}", display_string(other))],
    }
}

fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
