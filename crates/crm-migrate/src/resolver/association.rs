//! Association lookup: source foreign reference to destination association.

use serde::{Deserialize, Serialize};

use crate::mapping::IdMappingTable;
use crate::object_type::ObjectType;
use crate::record::SourceId;

/// Category for the destination's built-in association types.
pub const HUBSPOT_DEFINED: &str = "HUBSPOT_DEFINED";

/// Association type id for a `from -> to` link, if the pair is supported.
///
/// Leads are destination contacts, so `lead -> company` shares the
/// contact-to-company type.
pub fn association_type_id(from: ObjectType, to: ObjectType) -> Option<u32> {
    use ObjectType::*;
    let id = match (from, to) {
        (Contact, Company) | (Lead, Company) => 279,
        (Company, Company) => 14,
        (Deal, Company) => 5,
        (Deal, Contact) => 3,
        (Note, Contact) => 202,
        (Note, Company) => 190,
        (Note, Deal) => 214,
        (Task, Contact) => 204,
        (Task, Company) => 192,
        (Task, Deal) => 216,
        (Call, Contact) => 194,
        (Call, Company) => 182,
        (Call, Deal) => 206,
        _ => return None,
    };
    Some(id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationTarget {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationType {
    pub association_category: String,
    pub association_type_id: u32,
}

/// `{to: {id}, types: [{associationCategory, associationTypeId}]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationSpec {
    pub to: AssociationTarget,
    pub types: Vec<AssociationType>,
}

impl AssociationSpec {
    pub fn new(destination_id: impl Into<String>, association_type_id: u32) -> Self {
        Self {
            to: AssociationTarget {
                id: destination_id.into(),
            },
            types: vec![AssociationType {
                association_category: HUBSPOT_DEFINED.to_string(),
                association_type_id,
            }],
        }
    }

    pub fn destination_id(&self) -> &str {
        &self.to.id
    }
}

/// Look a source id up in `table`. `None` when it has not been migrated.
pub fn resolve_association(
    source_id: &SourceId,
    table: &IdMappingTable,
    association_type_id: u32,
) -> Option<AssociationSpec> {
    table
        .lookup(source_id)
        .map(|destination_id| AssociationSpec::new(destination_id, association_type_id))
}
