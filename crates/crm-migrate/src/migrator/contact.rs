//! Contacts: matched by email, then by source id.

use tracing::debug;

use super::activity::link;
use super::{Classification, Correlation, TypeRules};
use crate::mapping::{map_properties, MappingTables};
use crate::object_type::ObjectType;
use crate::record::{SourceId, SourceRecord};
use crate::resolver::{KeySource, ResolutionPass};

const PASSES: [ResolutionPass; 2] = [
    ResolutionPass::new(KeySource::Field("email"), "email"),
    ResolutionPass::new(KeySource::Field("id"), "zendesk_id"),
];

pub struct ContactRules;

impl TypeRules for ContactRules {
    fn object_type(&self) -> ObjectType {
        ObjectType::Contact
    }

    fn resolution_passes(&self) -> &[ResolutionPass] {
        &PASSES
    }

    fn correlation(&self) -> Correlation {
        Correlation::Property("zendesk_id")
    }

    fn classify(&self, record: &SourceRecord, source_id: &SourceId, tables: &MappingTables) -> Classification {
        let mut properties = map_properties(&tables.contact_fields, record);
        self.correlation().seed(&mut properties, source_id, None);

        let mut associations = Vec::new();
        if let Some(company_id) = record.get_source_id("parent_organization_id") {
            match link(ObjectType::Contact, ObjectType::Company, &company_id, tables) {
                Some(spec) => associations.push(spec),
                None => debug!("Company {} of contact {} not migrated yet", company_id, source_id),
            }
        }

        Classification::Eligible {
            properties,
            associations,
        }
    }
}
