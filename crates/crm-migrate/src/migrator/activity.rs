//! Helpers shared by the activity types (notes, tasks, calls).

use crate::mapping::MappingTables;
use crate::object_type::ObjectType;
use crate::record::{SourceId, SourceRecord};
use crate::resolver::{association_type_id, resolve_association, AssociationSpec};

/// The core object an activity hangs off.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ResourceLink {
    /// The activity names no resource.
    Unattached,
    Linked(AssociationSpec),
    /// A resource is named but has no destination counterpart yet.
    Unresolved(String),
}

/// Resolve `resource_type`/`resource_id` to an association from `from`.
///
/// Source contacts include organisations, so a contact reference that is
/// not in the contact table is retried against the company table.
pub(crate) fn resolve_resource(from: ObjectType, record: &SourceRecord, tables: &MappingTables) -> ResourceLink {
    let Some(resource_type) = record.resource_type() else {
        return ResourceLink::Unattached;
    };
    let Some(resource_id) = record.resource_id() else {
        return ResourceLink::Unresolved(format!("{} reference without resource_id", resource_type));
    };

    let linked = match resource_type.as_str() {
        "contact" | "lead" => link(from, ObjectType::Contact, &resource_id, tables)
            .or_else(|| link(from, ObjectType::Company, &resource_id, tables)),
        "deal" => link(from, ObjectType::Deal, &resource_id, tables),
        other => return ResourceLink::Unresolved(format!("unsupported resource type {}", other)),
    };

    match linked {
        Some(spec) => ResourceLink::Linked(spec),
        None => ResourceLink::Unresolved(format!("{} {} has not been migrated", resource_type, resource_id)),
    }
}

/// Association from `from` to the migrated `to` object with `id`.
pub(crate) fn link(from: ObjectType, to: ObjectType, id: &SourceId, tables: &MappingTables) -> Option<AssociationSpec> {
    let type_id = association_type_id(from, to)?;
    resolve_association(id, tables.id_table(to)?, type_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tables() -> MappingTables {
        let mut tables = MappingTables::default();
        tables.contact_ids.insert(SourceId::from(1), "c1");
        tables.company_ids.insert(SourceId::from(2), "o2");
        tables.deal_ids.insert(SourceId::from(3), "d3");
        tables
    }

    fn record(value: serde_json::Value) -> SourceRecord {
        SourceRecord::from_item(value).unwrap()
    }

    #[test]
    fn test_contact_resource() {
        let link = resolve_resource(
            ObjectType::Note,
            &record(json!({"resource_type": "contact", "resource_id": 1})),
            &tables(),
        );
        assert_eq!(link, ResourceLink::Linked(AssociationSpec::new("c1", 202)));
    }

    #[test]
    fn test_organisation_falls_back_to_company() {
        let link = resolve_resource(
            ObjectType::Task,
            &record(json!({"resource_type": "contact", "resource_id": "2"})),
            &tables(),
        );
        assert_eq!(link, ResourceLink::Linked(AssociationSpec::new("o2", 192)));
    }

    #[test]
    fn test_deal_resource_and_misses() {
        let t = tables();
        assert_eq!(
            resolve_resource(ObjectType::Call, &record(json!({"resource_type": "deal", "resource_id": 3})), &t),
            ResourceLink::Linked(AssociationSpec::new("d3", 206))
        );
        assert!(matches!(
            resolve_resource(ObjectType::Call, &record(json!({"resource_type": "deal", "resource_id": 4})), &t),
            ResourceLink::Unresolved(_)
        ));
        assert!(matches!(
            resolve_resource(ObjectType::Call, &record(json!({"resource_type": "deal"})), &t),
            ResourceLink::Unresolved(_)
        ));
        assert_eq!(
            resolve_resource(ObjectType::Call, &record(json!({"id": 9})), &t),
            ResourceLink::Unattached
        );
    }
}
