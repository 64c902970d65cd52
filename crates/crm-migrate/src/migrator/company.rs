//! Companies: matched by website hostname, then by source id.

use tracing::{debug, warn};

use super::activity::link;
use super::{put, put_label, Classification, Correlation, TypeRules, OWNER_PROPERTY};
use crate::mapping::{map_properties, MappingTables};
use crate::object_type::ObjectType;
use crate::record::{SourceId, SourceRecord};
use crate::resolver::{hostname, KeySource, ResolutionPass};

const PASSES: [ResolutionPass; 2] = [
    ResolutionPass::new(KeySource::Hostname("website"), "domain"),
    ResolutionPass::new(KeySource::Field("id"), "zendesk_id"),
];

pub struct CompanyRules;

impl TypeRules for CompanyRules {
    fn object_type(&self) -> ObjectType {
        ObjectType::Company
    }

    fn resolution_passes(&self) -> &[ResolutionPass] {
        &PASSES
    }

    fn correlation(&self) -> Correlation {
        Correlation::Property("zendesk_id")
    }

    fn classify(&self, record: &SourceRecord, source_id: &SourceId, tables: &MappingTables) -> Classification {
        let mut properties = map_properties(&tables.company_fields, record);
        self.correlation().seed(&mut properties, source_id, None);

        if let Some(website) = record.get_text("website") {
            match hostname(&website) {
                Some(domain) => put(&mut properties, "domain", domain),
                None => warn!("The company {} doesn't have a valid website", source_id),
            }
        }
        put_label(&mut properties, OWNER_PROPERTY, record, "owner_id", &tables.owners);

        let mut associations = Vec::new();
        if let Some(parent_id) = record.get_source_id("parent_organization_id") {
            match link(ObjectType::Company, ObjectType::Company, &parent_id, tables) {
                Some(spec) => associations.push(spec),
                None => debug!("Parent company {} of {} not migrated yet", parent_id, source_id),
            }
        }

        Classification::Eligible {
            properties,
            associations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{CodeTable, FieldMap};
    use crate::resolver::AssociationSpec;
    use serde_json::json;

    #[test]
    fn test_company_domain_owner_and_parent() {
        let mut tables = MappingTables {
            company_fields: FieldMap::new().with_property("name", "name"),
            owners: CodeTable::new().with_label(SourceId::from(3), "owner-33"),
            ..Default::default()
        };
        tables.company_ids.insert(SourceId::from(1), "100");

        let record = SourceRecord::from_item(json!({
            "id": 2,
            "name": "Acme",
            "website": "https://www.acme.com/",
            "owner_id": 3,
            "parent_organization_id": 1
        }))
        .unwrap();

        let Classification::Eligible { properties, associations } =
            CompanyRules.classify(&record, &SourceId::from(2), &tables)
        else {
            panic!("company should be eligible");
        };
        assert_eq!(properties["domain"], json!("www.acme.com"));
        assert_eq!(properties[OWNER_PROPERTY], json!("owner-33"));
        assert_eq!(properties["zendesk_id"], json!("2"));
        assert_eq!(associations, vec![AssociationSpec::new("100", 14)]);
    }
}
