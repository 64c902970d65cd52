//! Calls: need at least one association, either the resource or a deal.

use tracing::warn;

use super::activity::{link, resolve_resource, ResourceLink};
use super::{put, put_label, Classification, Correlation, TypeRules, OWNER_PROPERTY};
use crate::mapping::{to_epoch_millis, MappingTables};
use crate::object_type::ObjectType;
use crate::record::{SourceId, SourceRecord};

const MILLIS_PER_SECOND: i64 = 1000;

pub struct CallRules;

impl TypeRules for CallRules {
    fn object_type(&self) -> ObjectType {
        ObjectType::Call
    }

    fn correlation(&self) -> Correlation {
        Correlation::BodyPrefix("hs_call_body")
    }

    fn classify(&self, record: &SourceRecord, source_id: &SourceId, tables: &MappingTables) -> Classification {
        let mut associations = match resolve_resource(ObjectType::Call, record, tables) {
            ResourceLink::Linked(spec) => vec![spec],
            ResourceLink::Unattached => Vec::new(),
            ResourceLink::Unresolved(reason) => return Classification::Diverted(reason),
        };
        for deal_id in record.get_source_ids("associated_deal_ids") {
            match link(ObjectType::Call, ObjectType::Deal, &deal_id, tables) {
                Some(spec) => associations.push(spec),
                None => warn!("Deal {} of call {} not migrated yet", deal_id, source_id),
            }
        }
        if associations.is_empty() {
            return Classification::Diverted("call has no migrated resource or deal".into());
        }

        let mut properties = serde_json::Map::new();
        let summary = record.get_str("summary");
        self.correlation().seed(&mut properties, source_id, summary.as_deref());
        if let Some(ts) = record.get("made_at").and_then(to_epoch_millis) {
            put(&mut properties, "hs_timestamp", ts);
        }
        if let Some(number) = record.get_text("phone_number") {
            put(&mut properties, "hs_call_to_number", number);
        }
        let direction = if record.get_bool("incoming") == Some(false) {
            "OUTBOUND"
        } else {
            "INBOUND"
        };
        put(&mut properties, "hs_call_direction", direction);
        let status = if record.get_bool("missed") == Some(false) {
            "COMPLETED"
        } else {
            "NO_ANSWER"
        };
        put(&mut properties, "hs_call_status", status);
        if let Some(seconds) = record.get_i64("duration").filter(|s| *s > 0) {
            put(&mut properties, "hs_call_duration", seconds * MILLIS_PER_SECOND);
        }
        put_label(&mut properties, "hs_call_disposition", record, "outcome_id", &tables.call_outcomes);
        if let Some(url) = record.get_text("recording_url") {
            put(&mut properties, "hs_call_recording_url", url);
        }
        put_label(&mut properties, OWNER_PROPERTY, record, "user_id", &tables.owners);

        Classification::Eligible {
            properties,
            associations,
        }
    }
}
