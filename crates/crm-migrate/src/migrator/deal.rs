//! Deals: matched by source id; company and contact links are best effort.

use tracing::debug;

use super::activity::link;
use super::{put, put_label, Classification, Correlation, TypeRules, OWNER_PROPERTY};
use crate::mapping::{map_properties, to_epoch_millis, MappingTables};
use crate::object_type::ObjectType;
use crate::record::{SourceId, SourceRecord};
use crate::resolver::{KeySource, ResolutionPass};

const PASSES: [ResolutionPass; 1] = [ResolutionPass::new(KeySource::Field("id"), "zendesk_id")];

pub struct DealRules {
    closed_won_stage: Option<SourceId>,
}

impl DealRules {
    /// `closed_won_stage_id` is the source stage whose deals get a
    /// `closedate`.
    pub fn new(closed_won_stage_id: Option<i64>) -> Self {
        Self {
            closed_won_stage: closed_won_stage_id.map(SourceId::from),
        }
    }
}

impl TypeRules for DealRules {
    fn object_type(&self) -> ObjectType {
        ObjectType::Deal
    }

    fn resolution_passes(&self) -> &[ResolutionPass] {
        &PASSES
    }

    fn correlation(&self) -> Correlation {
        Correlation::Property("zendesk_id")
    }

    fn classify(&self, record: &SourceRecord, source_id: &SourceId, tables: &MappingTables) -> Classification {
        let mut properties = map_properties(&tables.deal_fields, record);
        self.correlation().seed(&mut properties, source_id, None);

        put_label(&mut properties, OWNER_PROPERTY, record, "owner_id", &tables.owners);
        put_label(&mut properties, "source", record, "source_id", &tables.deal_sources);
        put_label(
            &mut properties,
            "deal_unqualified_reason",
            record,
            "unqualified_reason_id",
            &tables.deal_unqualified_reasons,
        );
        put_label(&mut properties, "closed_lost_reason", record, "loss_reason_id", &tables.deal_lost_reasons);

        if let Some(stage) = record.get_source_id("stage_id") {
            put_label(&mut properties, "dealstage", record, "stage_id", &tables.deal_stages);
            if self.closed_won_stage.as_ref() == Some(&stage) {
                if let Some(closed) = record.get("last_stage_change_at").and_then(to_epoch_millis) {
                    put(&mut properties, "closedate", closed);
                }
            }
        }

        let mut associations = Vec::new();
        if let Some(company_id) = record.get_source_id("organization_id") {
            match link(ObjectType::Deal, ObjectType::Company, &company_id, tables) {
                Some(spec) => associations.push(spec),
                None => debug!("Company {} of deal {} not migrated yet", company_id, source_id),
            }
        }
        if let Some(contact_id) = record.get_source_id("contact_id") {
            match link(ObjectType::Deal, ObjectType::Contact, &contact_id, tables) {
                Some(spec) => associations.push(spec),
                None => debug!("Contact {} of deal {} not migrated yet", contact_id, source_id),
            }
        }

        Classification::Eligible {
            properties,
            associations,
        }
    }
}
