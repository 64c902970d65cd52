//! Notes: always attached to a contact, company or deal.

use super::activity::{resolve_resource, ResourceLink};
use super::{put, put_label, Classification, Correlation, TypeRules, OWNER_PROPERTY};
use crate::mapping::{to_epoch_millis, MappingTables};
use crate::object_type::ObjectType;
use crate::record::{SourceId, SourceRecord};

pub struct NoteRules;

impl TypeRules for NoteRules {
    fn object_type(&self) -> ObjectType {
        ObjectType::Note
    }

    fn correlation(&self) -> Correlation {
        Correlation::BodyPrefix("hs_note_body")
    }

    fn classify(&self, record: &SourceRecord, source_id: &SourceId, tables: &MappingTables) -> Classification {
        let association = match resolve_resource(ObjectType::Note, record, tables) {
            ResourceLink::Linked(spec) => spec,
            ResourceLink::Unattached => return Classification::Diverted("note has no resource".into()),
            ResourceLink::Unresolved(reason) => return Classification::Diverted(reason),
        };

        let mut properties = serde_json::Map::new();
        let content = record.get_str("content");
        self.correlation().seed(&mut properties, source_id, content.as_deref());
        if let Some(ts) = record.get("created_at").and_then(to_epoch_millis) {
            put(&mut properties, "hs_timestamp", ts);
        }
        put_label(&mut properties, OWNER_PROPERTY, record, "creator_id", &tables.owners);

        Classification::Eligible {
            properties,
            associations: vec![association],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::AssociationSpec;
    use serde_json::json;

    fn tables() -> MappingTables {
        let mut tables = MappingTables::default();
        tables.deal_ids.insert(SourceId::from(30), "d-30");
        tables
    }

    #[test]
    fn test_note_on_deal() {
        let record = SourceRecord::from_item(json!({
            "id": 501,
            "content": "Spoke with procurement",
            "created_at": "1970-01-01T00:00:01Z",
            "resource_type": "deal",
            "resource_id": 30
        }))
        .unwrap();

        let Classification::Eligible { properties, associations } =
            NoteRules.classify(&record, &SourceId::from(501), &tables())
        else {
            panic!("note should be eligible");
        };
        assert_eq!(properties["hs_note_body"], json!("501 - Spoke with procurement"));
        assert_eq!(properties["hs_timestamp"], json!(1000));
        assert_eq!(associations, vec![AssociationSpec::new("d-30", 214)]);
    }

    #[test]
    fn test_note_without_core_object_is_diverted() {
        let orphan = SourceRecord::from_item(json!({"id": 502, "resource_type": "deal", "resource_id": 31})).unwrap();
        let detached = SourceRecord::from_item(json!({"id": 503, "content": "hi"})).unwrap();
        assert!(matches!(
            NoteRules.classify(&orphan, &SourceId::from(502), &tables()),
            Classification::Diverted(_)
        ));
        assert!(matches!(
            NoteRules.classify(&detached, &SourceId::from(503), &tables()),
            Classification::Diverted(_)
        ));
    }
}
