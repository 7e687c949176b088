use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Read-only view over a provider object that never fails on shape.
///
/// Every accessor returns the typed value when the key is present with the
/// expected JSON type and falls back to the type's default otherwise.
#[derive(Clone, Copy)]
pub(crate) struct Fields<'a>(pub(crate) &'a Map<String, Value>);

impl<'a> Fields<'a> {
    pub(crate) fn string(&self, key: &str) -> String {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    pub(crate) fn number(&self, key: &str) -> f64 {
        self.0.get(key).and_then(Value::as_f64).unwrap_or_default()
    }

    /// RFC 3339 timestamp, `None` when absent or unparseable.
    pub(crate) fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    pub(crate) fn object(&self, key: &str) -> Option<Fields<'a>> {
        self.0.get(key).and_then(Value::as_object).map(Fields)
    }

    pub(crate) fn owned_object(&self, key: &str) -> Option<Map<String, Value>> {
        self.0.get(key).and_then(Value::as_object).cloned()
    }

    /// Identifier that the provider sends either as a plain string or as a
    /// nested object carrying an `id`.
    pub(crate) fn reference(&self, key: &str) -> String {
        match self.0.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Object(o)) => Fields(o).string("id"),
            _ => String::new(),
        }
    }
}
