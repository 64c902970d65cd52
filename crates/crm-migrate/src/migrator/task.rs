//! Tasks: attached when the source names a resource, standalone otherwise.

use super::activity::{resolve_resource, ResourceLink};
use super::{put, put_label, Classification, Correlation, TypeRules, OWNER_PROPERTY};
use crate::mapping::{to_epoch_millis, MappingTables};
use crate::object_type::ObjectType;
use crate::record::{SourceId, SourceRecord};

pub struct TaskRules;

impl TypeRules for TaskRules {
    fn object_type(&self) -> ObjectType {
        ObjectType::Task
    }

    fn correlation(&self) -> Correlation {
        Correlation::BodyPrefix("hs_task_body")
    }

    fn classify(&self, record: &SourceRecord, source_id: &SourceId, tables: &MappingTables) -> Classification {
        let associations = match resolve_resource(ObjectType::Task, record, tables) {
            ResourceLink::Linked(spec) => vec![spec],
            ResourceLink::Unattached => Vec::new(),
            ResourceLink::Unresolved(reason) => return Classification::Diverted(reason),
        };

        let mut properties = serde_json::Map::new();
        let content = record.get_str("content");
        self.correlation().seed(&mut properties, source_id, content.as_deref());
        if let Some(ts) = record.get("due_date").and_then(to_epoch_millis) {
            put(&mut properties, "hs_timestamp", ts);
        }
        let status = if record.get_bool("completed") == Some(false) {
            "NOT_STARTED"
        } else {
            "COMPLETED"
        };
        put(&mut properties, "hs_task_status", status);
        put_label(&mut properties, OWNER_PROPERTY, record, "owner_id", &tables.owners);

        Classification::Eligible {
            properties,
            associations,
        }
    }
}
