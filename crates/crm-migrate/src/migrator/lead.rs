//! Leads: written as destination contacts in the `lead` lifecycle stage.

use tracing::debug;

use super::{put, put_label, Classification, Correlation, TypeRules, OWNER_PROPERTY};
use crate::mapping::{map_properties, MappingTables};
use crate::object_type::ObjectType;
use crate::record::{SourceId, SourceRecord};
use crate::resolver::{association_type_id, AssociationSpec, KeySource, ResolutionPass};

const PASSES: [ResolutionPass; 2] = [
    ResolutionPass::new(KeySource::Field("email"), "email"),
    ResolutionPass::new(KeySource::Field("id"), "zendesk__id"),
];

pub struct LeadRules;

impl TypeRules for LeadRules {
    fn object_type(&self) -> ObjectType {
        ObjectType::Lead
    }

    fn resolution_passes(&self) -> &[ResolutionPass] {
        &PASSES
    }

    fn correlation(&self) -> Correlation {
        Correlation::Property("zendesk__id")
    }

    fn classify(&self, record: &SourceRecord, source_id: &SourceId, tables: &MappingTables) -> Classification {
        let mut properties = map_properties(&tables.lead_fields, record);
        self.correlation().seed(&mut properties, source_id, None);

        put(&mut properties, "lifecyclestage", "lead");
        put_label(&mut properties, OWNER_PROPERTY, record, "owner_id", &tables.owners);
        put_label(&mut properties, "lead_source", record, "source_id", &tables.lead_sources);
        put_label(
            &mut properties,
            "lead_unqualified_reason",
            record,
            "unqualified_reason_id",
            &tables.lead_unqualified_reasons,
        );

        let mut associations = Vec::new();
        if let Some(name) = record.get_text("organization_name") {
            let company = tables.company_names.lookup(&name);
            match (company, association_type_id(ObjectType::Lead, ObjectType::Company)) {
                (Some(id), Some(type_id)) => associations.push(AssociationSpec::new(id, type_id)),
                _ => debug!("Company '{}' of lead {} not migrated yet", name, source_id),
            }
        }

        Classification::Eligible {
            properties,
            associations,
        }
    }
}
