//! Canonical result envelope.
//!
//! Every backend endpoint answers in this shape, success or failure. The
//! transport layer guarantees that callers only ever see an [`Envelope`];
//! raw transport errors never escape it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::principal::Principal;

/// The canonical success/failure shape returned by every API operation.
///
/// Success envelopes are passed through from the backend unreshaped; failure
/// envelopes are built by the response normalizer with a fixed, status-keyed
/// user message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
    /// HTTP status of the response, or 0 when no response was received.
    pub status: u16,
    pub details: Map<String, Value>,
    pub validation_errors: Vec<String>,
}

impl Envelope {
    /// Build a failure envelope with empty data/details.
    pub fn failure(status: u16, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            status,
            ..Self::default()
        }
    }

    /// Decode `data` into a typed, per-endpoint-family payload.
    ///
    /// Absent `data` decodes as JSON null, which fails for struct targets,
    /// so a success envelope missing its payload surfaces as an error here
    /// rather than as a half-populated value.
    pub fn decode_data<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.data.clone().unwrap_or(Value::Null))
    }
}

/// Payload carried by `data` on login/register/refresh responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub token: String,
    /// Token lifetime in seconds, when the backend reports one.
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: Principal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_round_trips_backend_shape() {
        let raw = json!({
            "success": true,
            "message": "ok",
            "data": { "token": "abc", "expiresIn": 300, "user": { "id": 7, "name": "Ana" } },
            "status": 200,
            "details": {},
            "validationErrors": []
        });

        let envelope: Envelope = serde_json::from_value(raw.clone()).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.status, 200);

        let back = serde_json::to_value(&envelope).unwrap();
        assert_eq!(back["validationErrors"], json!([]));
        assert_eq!(back["data"]["user"]["name"], json!("Ana"));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let envelope: Envelope = serde_json::from_value(json!({ "success": true })).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.status, 0);
        assert!(envelope.data.is_none());
        assert!(envelope.validation_errors.is_empty());
    }

    #[test]
    fn decode_auth_payload() {
        let envelope: Envelope = serde_json::from_value(json!({
            "success": true,
            "message": "",
            "data": { "token": "t-1", "expiresIn": 900, "user": { "id": 1, "email": "a@b.c" } }
        }))
        .unwrap();

        let payload: AuthPayload = envelope.decode_data().unwrap();
        assert_eq!(payload.token, "t-1");
        assert_eq!(payload.expires_in, Some(900));
        assert_eq!(payload.user.email.as_deref(), Some("a@b.c"));
    }

    #[test]
    fn decode_data_fails_when_data_is_absent() {
        let envelope = Envelope::failure(500, "boom");
        assert!(envelope.decode_data::<AuthPayload>().is_err());
    }
}
