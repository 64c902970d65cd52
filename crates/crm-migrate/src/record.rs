//! Source records and their per-batch reconciliation state.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier of a record in the source system.
///
/// Source ids arrive as JSON numbers in API payloads but as strings in
/// hand-maintained mapping tables and in property text read back from the
/// destination. Integral ids are canonicalised so `"42"`, `42` and `42.0`
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(String);

impl SourceId {
    /// Parse and canonicalise an id from text.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<i64>() {
            Ok(n) => Some(Self(n.to_string())),
            Err(_) => Some(Self(trimmed.to_string())),
        }
    }

    /// Read an id from a JSON value (number or string).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self(i.to_string()))
                } else if let Some(u) = n.as_u64() {
                    Some(Self(u.to_string()))
                } else {
                    let f = n.as_f64()?;
                    if f.fract() == 0.0 && f.is_finite() {
                        Some(Self((f as i64).to_string()))
                    } else {
                        Some(Self(n.to_string()))
                    }
                }
            }
            Value::String(s) => Self::parse(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for SourceId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl Serialize for SourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        SourceId::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid source id: {}", value)))
    }
}

/// Deserialize a destination id that may be a number or a string.
pub(crate) fn deserialize_destination_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "invalid destination id: {}",
            other
        ))),
    }
}

/// A record exactly as the source system delivered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRecord {
    fields: Map<String, Value>,
}

impl SourceRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build a record from a cached page item, unwrapping the
    /// `{"data": {...}, "meta": {...}}` envelope the source API uses.
    pub fn from_item(item: Value) -> Option<Self> {
        match item {
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Object(inner)) if map.contains_key("meta") || map.is_empty() => {
                    Some(Self::new(inner))
                }
                Some(other) => {
                    map.insert("data".to_string(), other);
                    Some(Self::new(map))
                }
                None => Some(Self::new(map)),
            },
            _ => None,
        }
    }

    pub fn id(&self) -> Option<SourceId> {
        self.fields.get("id").and_then(SourceId::from_value)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    /// String value of a field. Numbers are rendered as text.
    pub fn get_str(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Non-blank string value of a field.
    pub fn get_text(&self, field: &str) -> Option<String> {
        self.get_str(field).filter(|s| !s.trim().is_empty())
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        match self.get(field)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field)?.as_bool()
    }

    /// A field holding a foreign source id.
    pub fn get_source_id(&self, field: &str) -> Option<SourceId> {
        self.get(field).and_then(SourceId::from_value)
    }

    /// Foreign ids held in an array field (e.g. `associated_deal_ids`).
    pub fn get_source_ids(&self, field: &str) -> Vec<SourceId> {
        match self.get(field) {
            Some(Value::Array(items)) => items.iter().filter_map(SourceId::from_value).collect(),
            Some(single) => SourceId::from_value(single).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// The `resource_type` an activity is attached to.
    pub fn resource_type(&self) -> Option<String> {
        self.get_text("resource_type").map(|s| s.to_lowercase())
    }

    /// The `resource_id` an activity is attached to.
    pub fn resource_id(&self) -> Option<SourceId> {
        self.get_source_id("resource_id")
    }
}

/// Whether a record will be created on, or updated in, the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Create => f.write_str("create"),
            Action::Update => f.write_str("update"),
        }
    }
}

/// A source record annotated with its resolved action for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRecord {
    pub record: SourceRecord,
    pub action: Option<Action>,
    pub destination_id: Option<String>,
}

impl ReconciledRecord {
    pub fn new(record: SourceRecord) -> Self {
        Self {
            record,
            action: None,
            destination_id: None,
        }
    }

    /// Mark as an update of `destination_id`. The first match wins: a record
    /// already marked `update` keeps its original destination id.
    pub fn mark_update(&mut self, destination_id: impl Into<String>) {
        if self.action == Some(Action::Update) {
            return;
        }
        self.action = Some(Action::Update);
        self.destination_id = Some(destination_id.into());
    }

    /// Mark as a create unless an earlier pass already found a match.
    pub fn mark_create_if_unmatched(&mut self) {
        if self.action != Some(Action::Update) {
            self.action = Some(Action::Create);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> SourceRecord {
        SourceRecord::from_item(value).unwrap()
    }

    #[test]
    fn test_source_id_numeric_coercion() {
        assert_eq!(SourceId::from_value(&json!(42)), SourceId::parse("42"));
        assert_eq!(SourceId::from_value(&json!("0042")), SourceId::parse("42"));
        assert_eq!(SourceId::from_value(&json!(42.0)), SourceId::parse(" 42 "));
        assert_eq!(SourceId::parse("abc-1").unwrap().as_str(), "abc-1");
        assert!(SourceId::parse("   ").is_none());
        assert!(SourceId::from_value(&Value::Null).is_none());
    }

    #[test]
    fn test_source_id_serde_accepts_numbers_and_strings() {
        let a: SourceId = serde_json::from_value(json!(7)).unwrap();
        let b: SourceId = serde_json::from_value(json!("7")).unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_value(&a).unwrap(), json!("7"));
    }

    #[test]
    fn test_envelope_unwrapped() {
        let r = record(json!({"data": {"id": 5, "email": "a@b.c"}, "meta": {"type": "contact"}}));
        assert_eq!(r.id(), Some(SourceId::from(5)));
        assert_eq!(r.get_str("email").as_deref(), Some("a@b.c"));
    }

    #[test]
    fn test_bare_item_kept() {
        let r = record(json!({"id": 9, "data": "not an envelope"}));
        assert_eq!(r.id(), Some(SourceId::from(9)));
        assert_eq!(r.get_str("data").as_deref(), Some("not an envelope"));
    }

    #[test]
    fn test_typed_accessors() {
        let r = record(json!({
            "id": "11",
            "duration": "30",
            "missed": false,
            "resource_type": "Contact",
            "resource_id": 3,
            "associated_deal_ids": [1, "2", null],
            "blank": "  ",
            "nothing": null
        }));
        assert_eq!(r.get_i64("duration"), Some(30));
        assert_eq!(r.get_bool("missed"), Some(false));
        assert_eq!(r.resource_type().as_deref(), Some("contact"));
        assert_eq!(r.resource_id(), Some(SourceId::from(3)));
        assert_eq!(
            r.get_source_ids("associated_deal_ids"),
            vec![SourceId::from(1), SourceId::from(2)]
        );
        assert!(r.get_text("blank").is_none());
        assert!(r.get("nothing").is_none());
    }

    #[test]
    fn test_first_update_match_wins() {
        let mut r = ReconciledRecord::new(record(json!({"id": 1})));
        r.mark_update("100");
        r.mark_update("200");
        r.mark_create_if_unmatched();
        assert_eq!(r.action, Some(Action::Update));
        assert_eq!(r.destination_id.as_deref(), Some("100"));
    }

    #[test]
    fn test_unmatched_becomes_create() {
        let mut r = ReconciledRecord::new(record(json!({"id": 1})));
        r.mark_create_if_unmatched();
        assert_eq!(r.action, Some(Action::Create));
        assert!(r.destination_id.is_none());
    }
}
