use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Notification posted by the provider when new data is available for a
/// link. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookEvent {
    #[serde(deserialize_with = "nullable")]
    pub webhook_id: String,
    #[serde(deserialize_with = "nullable")]
    pub webhook_type: String,
    #[serde(deserialize_with = "nullable")]
    pub process_type: String,
    #[serde(deserialize_with = "nullable")]
    pub webhook_code: String,
    #[serde(deserialize_with = "nullable")]
    pub link_id: String,
    #[serde(deserialize_with = "nullable")]
    pub request_id: String,
    #[serde(deserialize_with = "nullable")]
    pub external_id: String,
    pub data: Option<Map<String, Value>>,
}

/// `null` reads as an empty string.
fn nullable<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookType {
    Owners,
    Accounts,
    Transactions,
    Other(String),
}

impl From<&str> for WebhookType {
    fn from(s: &str) -> Self {
        match s {
            "OWNERS" => WebhookType::Owners,
            "ACCOUNTS" => WebhookType::Accounts,
            "TRANSACTIONS" => WebhookType::Transactions,
            other => WebhookType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for WebhookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookType::Owners => write!(f, "OWNERS"),
            WebhookType::Accounts => write!(f, "ACCOUNTS"),
            WebhookType::Transactions => write!(f, "TRANSACTIONS"),
            WebhookType::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessType {
    HistoricalUpdate,
    RecurrentUpdate,
    Other(String),
}

impl From<&str> for ProcessType {
    fn from(s: &str) -> Self {
        match s {
            "historical_update" => ProcessType::HistoricalUpdate,
            "recurrent_update" => ProcessType::RecurrentUpdate,
            other => ProcessType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessType::HistoricalUpdate => write!(f, "historical_update"),
            ProcessType::RecurrentUpdate => write!(f, "recurrent_update"),
            ProcessType::Other(s) => write!(f, "{}", s),
        }
    }
}

impl WebhookEvent {
    pub fn kind(&self) -> WebhookType {
        WebhookType::from(self.webhook_type.as_str())
    }

    pub fn process(&self) -> ProcessType {
        ProcessType::from(self.process_type.as_str())
    }

    fn error_list(&self) -> Option<&Vec<Value>> {
        self.data
            .as_ref()
            .and_then(|data| data.get("errors"))
            .and_then(Value::as_array)
            .filter(|errors| !errors.is_empty())
    }

    /// True when the provider reported a non-empty `data.errors` list.
    pub fn has_errors(&self) -> bool {
        self.error_list().is_some()
    }

    /// Object entries of `data.errors`; anything else in the list is skipped.
    pub fn errors(&self) -> Vec<WebhookError> {
        let text = |err: &Map<String, Value>, key: &str| {
            err.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        self.error_list()
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .map(|err| WebhookError {
                code: text(err, "code"),
                message: text(err, "message"),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn event(body: Value) -> WebhookEvent {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn parse_minimal_body() {
        let e = event(json!({
            "webhook_id": "w1",
            "webhook_type": "OWNERS",
            "link_id": "link-42",
            "data": {},
        }));

        assert_eq!(e.webhook_id, "w1");
        assert_eq!(e.kind(), WebhookType::Owners);
        assert_eq!(e.process_type, "");
        assert!(!e.has_errors());
        assert!(e.errors().is_empty());
    }

    #[test]
    fn null_or_missing_data() {
        assert!(!event(json!({"data": null})).has_errors());
        assert!(!event(json!({})).has_errors());
    }

    #[test]
    fn classifies_types() {
        assert_eq!(WebhookType::from("ACCOUNTS"), WebhookType::Accounts);
        assert_eq!(WebhookType::from("TRANSACTIONS"), WebhookType::Transactions);
        assert_eq!(WebhookType::from("FOO"), WebhookType::Other("FOO".into()));
        assert_eq!(
            ProcessType::from("historical_update"),
            ProcessType::HistoricalUpdate
        );
        assert_eq!(WebhookType::from("FOO").to_string(), "FOO");
    }

    #[test]
    fn extracts_provider_errors() {
        let e = event(json!({
            "webhook_type": "TRANSACTIONS",
            "data": {
                "errors": [
                    {"code": "login_error", "message": "Invalid credentials"},
                    {"code": 500},
                    "unexpected",
                ],
            },
        }));

        assert!(e.has_errors());
        assert_eq!(
            e.errors(),
            vec![
                WebhookError {
                    code: "login_error".into(),
                    message: "Invalid credentials".into(),
                },
                WebhookError {
                    code: "".into(),
                    message: "".into(),
                },
            ]
        );
    }

    #[test]
    fn empty_or_mistyped_error_list() {
        assert!(!event(json!({"data": {"errors": []}})).has_errors());
        assert!(!event(json!({"data": {"errors": "boom"}})).has_errors());
    }

    #[test]
    fn non_object_errors_still_count() {
        let e = event(json!({"data": {"errors": ["boom"]}}));

        assert!(e.has_errors());
        assert!(e.errors().is_empty());
    }

    #[test]
    fn null_strings_read_as_empty() {
        let e: WebhookEvent = serde_json::from_str(
            r#"{"webhook_id":"w1","webhook_type":"TRANSACTIONS","process_type":null,
                "webhook_code":"new_transactions_available","link_id":"link-42",
                "request_id":null,"external_id":null,"data":null}"#,
        )
        .unwrap();

        assert_eq!(e.webhook_id, "w1");
        assert_eq!(e.kind(), WebhookType::Transactions);
        assert_eq!(e.process_type, "");
        assert_eq!(e.request_id, "");
        assert_eq!(e.external_id, "");
        assert_eq!(e.data, None);
    }

    #[test]
    fn rejects_non_object_body() {
        assert!(serde_json::from_value::<WebhookEvent>(json!([1, 2])).is_err());
        assert!(serde_json::from_value::<WebhookEvent>(json!({"webhook_id": 7})).is_err());
    }
}
