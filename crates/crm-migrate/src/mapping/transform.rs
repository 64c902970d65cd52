//! Value transforms applied while translating source fields into
//! destination properties.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use super::tables::{FieldMap, FieldTarget};
use crate::record::SourceRecord;

/// Source fields holding phone numbers.
pub const PHONE_FIELDS: &[&str] = &["phone", "mobile", "fax"];

/// Source fields holding timestamps that become epoch milliseconds.
pub const DATE_FIELDS: &[&str] = &["created_at", "last_login_at", "updated_at", "due_at"];

/// Source field holding free-form tags.
pub const TAGS_FIELD: &str = "tags";

fn extension_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*ext(?:\.|\b)\s*(\d+)").expect("valid extension regex")
    })
}

fn phone_noise_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\D*ext.*)|\D").expect("valid phone regex"))
}

fn hashtag_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:#\w+(?:#*\w+)*|\s*#\w+(?:\s*#\w+)*\s*)$").expect("valid hashtag regex")
    })
}

fn hashtag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#(\w+)").expect("valid hashtag regex"))
}

/// `null`, `""`, `" "` and empty arrays carry no information and are never
/// written.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty() || s == " ",
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Normalise a phone number to `+<digits>` with an optional
/// `, ext. N` suffix.
///
/// Numbers without a leading `1`/`+1` get the `+1` country code. Returns
/// `None` when no digits remain.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let extension = extension_regex()
        .captures(trimmed)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str().to_string());
    let digits = phone_noise_regex().replace_all(trimmed, "");
    if digits.is_empty() {
        return None;
    }

    let has_country_code = trimmed.starts_with('1') || trimmed.starts_with("+1");
    let mut phone = if has_country_code {
        format!("+{}", digits)
    } else {
        format!("+1{}", digits)
    };
    if let Some(ext) = extension {
        phone.push_str(", ext. ");
        phone.push_str(&ext);
    }
    Some(phone)
}

/// Collapse a tag list into `;`-joined, lowercase, de-duplicated tokens.
///
/// Tags written as hashtags (`"#vip #gold"`) contribute each hashtag without
/// its `#`; anything else contributes the trimmed tag itself.
pub fn normalize_tags(tags: &[Value]) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut push = |token: String| {
        if !token.is_empty() && !tokens.contains(&token) {
            tokens.push(token);
        }
    };

    for tag in tags.iter().filter_map(Value::as_str) {
        if hashtag_line_regex().is_match(tag) {
            for capture in hashtag_regex().captures_iter(tag) {
                push(capture[1].to_lowercase());
            }
        } else {
            push(tag.trim().to_lowercase());
        }
    }
    tokens.join(";")
}

/// Convert a timestamp to epoch milliseconds.
///
/// Accepts RFC 3339 strings, naive `YYYY-MM-DD[ T]HH:MM:SS` (taken as UTC),
/// plain dates (midnight UTC) and numbers, which are assumed to already be
/// epoch milliseconds.
pub fn to_epoch_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => parse_timestamp(s.trim()),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Translate a record's fields into destination properties.
///
/// Unmapped fields and empty values are dropped. Phone, tag and date fields
/// are normalised; composite fields are flattened through their sub-map.
pub fn map_properties(field_map: &FieldMap, record: &SourceRecord) -> Map<String, Value> {
    let mut properties = Map::new();

    for (field, target) in field_map.iter() {
        let Some(value) = record.get(field).filter(|v| !is_empty_value(v)) else {
            continue;
        };

        match target {
            FieldTarget::Property(property) => {
                if let Some(value) = transform_value(field, value) {
                    properties.insert(property.clone(), value);
                }
            }
            FieldTarget::Composite(parts) => {
                let Value::Object(nested) = value else {
                    continue;
                };
                for (sub_field, sub_value) in nested {
                    if is_empty_value(sub_value) {
                        continue;
                    }
                    if let Some(property) = parts.get(sub_field) {
                        properties.insert(property.clone(), sub_value.clone());
                    }
                }
            }
        }
    }

    properties
}

fn transform_value(field: &str, value: &Value) -> Option<Value> {
    if PHONE_FIELDS.contains(&field) {
        let raw = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        return normalize_phone(&raw).map(Value::String);
    }
    if field == TAGS_FIELD {
        let joined = match value {
            Value::Array(tags) => normalize_tags(tags),
            Value::String(_) => normalize_tags(std::slice::from_ref(value)),
            _ => return None,
        };
        return Some(Value::String(joined)).filter(|v| !is_empty_value(v));
    }
    if DATE_FIELDS.contains(&field) {
        return to_epoch_millis(value).map(Value::from);
    }
    Some(value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> SourceRecord {
        SourceRecord::from_item(value).unwrap()
    }

    #[test]
    fn test_phone_with_extension() {
        assert_eq!(
            normalize_phone("555-1234 ext. 22").as_deref(),
            Some("+15551234, ext. 22")
        );
    }

    #[test]
    fn test_phone_formats() {
        assert_eq!(normalize_phone("(415) 555-0100").as_deref(), Some("+14155550100"));
        assert_eq!(normalize_phone("+1 415 555 0100").as_deref(), Some("+14155550100"));
        assert_eq!(normalize_phone("1-415-555-0100 EXT 7").as_deref(), Some("+14155550100, ext. 7"));
        assert_eq!(normalize_phone("n/a"), None);
    }

    #[test]
    fn test_tags_deduplicated() {
        let tags = vec![json!("#vip"), json!(" #VIP "), json!("plain")];
        assert_eq!(normalize_tags(&tags), "vip;plain");
    }

    #[test]
    fn test_multi_hashtag_tag() {
        let tags = vec![json!("#gold #Silver"), json!("Big Fish"), json!(3)];
        assert_eq!(normalize_tags(&tags), "gold;silver;big fish");
    }

    #[test]
    fn test_epoch_millis() {
        assert_eq!(to_epoch_millis(&json!("1970-01-01T00:00:01Z")), Some(1000));
        assert_eq!(to_epoch_millis(&json!("2024-01-02")), Some(1_704_153_600_000));
        assert_eq!(to_epoch_millis(&json!("2024-01-02 00:00:00")), Some(1_704_153_600_000));
        assert_eq!(to_epoch_millis(&json!(42)), Some(42));
        assert_eq!(to_epoch_millis(&json!("yesterday")), None);
    }

    #[test]
    fn test_empty_values() {
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!(" ")));
        assert!(is_empty_value(&json!([])));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
    }

    #[test]
    fn test_map_properties() {
        let map = FieldMap::new()
            .with_property("first_name", "firstname")
            .with_property("mobile", "mobilephone")
            .with_property("tags", "tags")
            .with_property("created_at", "createdate")
            .with_property("title", "jobtitle")
            .with_composite("address", [("line1", "address"), ("city", "city")]);
        let r = record(json!({
            "id": 1,
            "first_name": "Ada",
            "last_name": "Lovelace",
            "mobile": "555-0100",
            "tags": ["#vip"],
            "created_at": "1970-01-01T00:00:02Z",
            "title": " ",
            "address": {"line1": "1 Main St", "city": "", "zip": "12345"}
        }));

        let props = map_properties(&map, &r);
        assert_eq!(
            Value::Object(props),
            json!({
                "firstname": "Ada",
                "mobilephone": "+15550100",
                "tags": "vip",
                "createdate": 2000,
                "address": "1 Main St"
            })
        );
    }
}
