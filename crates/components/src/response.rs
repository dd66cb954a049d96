//! `ServiceResponse` — the uniform envelope returned by every component call.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result envelope of a component call.
///
/// `error` is only meaningful when `success` is false; `data` and
/// `metadata` are optional JSON objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ServiceResponse {
    /// Successful response without a payload.
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Successful response carrying `data`.
    ///
    /// A non-object `data` value is wrapped as `{"value": data}` so the
    /// envelope always holds a map.
    pub fn ok_with(data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_owned(), other);
                map
            }
        };
        Self {
            success: true,
            data: Some(data),
            ..Self::default()
        }
    }

    /// Unsuccessful response with an error message.
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    /// Error message of a failed response, with a fallback when the
    /// component left `error` empty.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("component reported failure without a message")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_with_wraps_scalar_payloads() {
        let resp = ServiceResponse::ok_with(json!(42));
        assert!(resp.success);
        assert_eq!(resp.data.unwrap()["value"], json!(42));
    }

    #[test]
    fn fail_without_message_has_fallback() {
        let resp = ServiceResponse {
            success: false,
            ..ServiceResponse::default()
        };
        assert!(resp.error_message().contains("without a message"));
        assert_eq!(ServiceResponse::fail("boom").error_message(), "boom");
    }

    #[test]
    fn absent_optionals_are_omitted_from_json() {
        let text = serde_json::to_string(&ServiceResponse::ok()).unwrap();
        assert_eq!(text, r#"{"success":true}"#);

        let parsed: ServiceResponse =
            serde_json::from_str(r#"{"success":false,"error":"nope"}"#).unwrap();
        assert_eq!(parsed, ServiceResponse::fail("nope"));
    }
}
