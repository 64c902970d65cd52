//! Static lookup tables: field maps, enumerated-code tables and the
//! id-correlation tables used for association lookup.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::record::{deserialize_destination_id, SourceId};

/// Where a source field lands on the destination.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldTarget {
    /// A single destination property.
    Property(String),
    /// A nested source object whose sub-fields map to separate properties
    /// (e.g. `address.line1` -> `address`, `address.city` -> `city`).
    Composite(BTreeMap<String, String>),
}

/// Source field name to destination property, per object type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FieldMap {
    fields: BTreeMap<String, FieldTarget>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain field-to-property mapping.
    pub fn with_property(mut self, field: impl Into<String>, property: impl Into<String>) -> Self {
        self.fields
            .insert(field.into(), FieldTarget::Property(property.into()));
        self
    }

    /// Add a composite mapping for a nested source object.
    pub fn with_composite<I, K, V>(mut self, field: impl Into<String>, parts: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let parts = parts
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.fields.insert(field.into(), FieldTarget::Composite(parts));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldTarget)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Enumerated source code to destination label (sources, stages, owners...).
///
/// Keys are canonicalised source ids, so a table written with `"117603"`
/// matches a record carrying `117603`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeTable {
    labels: HashMap<SourceId, Value>,
}

impl CodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, code: impl Into<SourceId>, label: impl Into<Value>) -> Self {
        self.labels.insert(code.into(), label.into());
        self
    }

    /// Label for a code. Absent and null labels are both `None`.
    pub fn label(&self, code: &SourceId) -> Option<&Value> {
        self.labels.get(code).filter(|v| !v.is_null())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl<'de> Deserialize<'de> for CodeTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        let mut labels = HashMap::with_capacity(raw.len());
        for (code, label) in raw {
            let id = SourceId::parse(&code)
                .ok_or_else(|| serde::de::Error::custom("empty code in lookup table"))?;
            labels.insert(id, label);
        }
        Ok(Self { labels })
    }
}

/// One `{sourceId, destinationId}` correlation pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdMapping {
    #[serde(alias = "zendeskID")]
    pub source_id: SourceId,
    #[serde(alias = "hubID", deserialize_with = "deserialize_destination_id")]
    pub destination_id: String,
}

/// Ordered source-id to destination-id table for one object type.
///
/// Lookups return the first entry for an id, matching a front-to-back scan.
#[derive(Debug, Clone, Default)]
pub struct IdMappingTable {
    entries: Vec<IdMapping>,
    index: HashMap<SourceId, usize>,
}

impl IdMappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = IdMapping>) -> Self {
        let mut table = Self::new();
        table.extend(entries);
        table
    }

    /// Append entries. Ids already present keep their earlier mapping.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = IdMapping>) {
        for entry in entries {
            let position = self.entries.len();
            self.index.entry(entry.source_id.clone()).or_insert(position);
            self.entries.push(entry);
        }
    }

    pub fn insert(&mut self, source_id: SourceId, destination_id: impl Into<String>) {
        self.extend(std::iter::once(IdMapping {
            source_id,
            destination_id: destination_id.into(),
        }));
    }

    /// Destination id for a source id.
    pub fn lookup(&self, source_id: &SourceId) -> Option<&str> {
        self.index
            .get(source_id)
            .map(|&i| self.entries[i].destination_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for IdMappingTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_entries(Vec::<IdMapping>::deserialize(deserializer)?))
    }
}

/// One `{name, destinationId}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameMapping {
    pub name: String,
    #[serde(alias = "hubID", deserialize_with = "deserialize_destination_id")]
    pub destination_id: String,
}

/// Company name to destination id, used to place leads in companies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct NameMappingTable {
    entries: Vec<NameMapping>,
}

impl NameMappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>, destination_id: impl Into<String>) -> Self {
        self.entries.push(NameMapping {
            name: name.into(),
            destination_id: destination_id.into(),
        });
        self
    }

    /// Exact-match lookup; the first entry wins.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.destination_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_map_parses_composites() {
        let map: FieldMap = serde_json::from_value(json!({
            "email": "email",
            "address": {"line1": "address", "city": "city"}
        }))
        .unwrap();
        assert_eq!(map.len(), 2);
        let targets: Vec<_> = map.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(targets, vec!["address", "email"]);
    }

    #[test]
    fn test_code_table_matches_numeric_codes() {
        let table: CodeTable =
            serde_json::from_value(json!({"117603": "closedwon", "7": null})).unwrap();
        assert_eq!(table.label(&SourceId::from(117603)), Some(&json!("closedwon")));
        assert_eq!(table.label(&SourceId::from(7)), None);
        assert_eq!(table.label(&SourceId::from(8)), None);
    }

    #[test]
    fn test_id_table_accepts_both_shapes() {
        let table: IdMappingTable = serde_json::from_value(json!([
            {"sourceId": "10", "destinationId": "500"},
            {"zendeskID": 11, "hubID": 501},
            {"sourceId": 10, "destinationId": "999"}
        ]))
        .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup(&SourceId::from(10)), Some("500"));
        assert_eq!(table.lookup(&SourceId::from(11)), Some("501"));
        assert_eq!(table.lookup(&SourceId::from(12)), None);
    }

    #[test]
    fn test_name_table_exact_match() {
        let table = NameMappingTable::new()
            .with_name("Acme", "1")
            .with_name("Acme", "2");
        assert_eq!(table.lookup("Acme"), Some("1"));
        assert_eq!(table.lookup("acme"), None);
    }
}
