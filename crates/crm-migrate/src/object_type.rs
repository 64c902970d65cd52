//! The closed set of CRM object types the migration knows how to move.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MigrateError;

/// Object types, in the order they should be migrated so that association
/// targets exist before the records pointing at them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Contact,
    Company,
    Lead,
    Deal,
    Note,
    Task,
    Call,
}

impl ObjectType {
    pub const ALL: [ObjectType; 7] = [
        ObjectType::Contact,
        ObjectType::Company,
        ObjectType::Lead,
        ObjectType::Deal,
        ObjectType::Note,
        ObjectType::Task,
        ObjectType::Call,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Contact => "contact",
            ObjectType::Company => "company",
            ObjectType::Lead => "lead",
            ObjectType::Deal => "deal",
            ObjectType::Note => "note",
            ObjectType::Task => "task",
            ObjectType::Call => "call",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            ObjectType::Contact => "contacts",
            ObjectType::Company => "companies",
            ObjectType::Lead => "leads",
            ObjectType::Deal => "deals",
            ObjectType::Note => "notes",
            ObjectType::Task => "tasks",
            ObjectType::Call => "calls",
        }
    }

    /// Source list endpoint and fixed query filters.
    pub fn source_endpoint(&self) -> (&'static str, &'static [(&'static str, &'static str)]) {
        match self {
            ObjectType::Contact => ("/v2/contacts", &[("is_organization", "false")]),
            ObjectType::Company => ("/v2/contacts", &[("is_organization", "true")]),
            ObjectType::Lead => ("/v2/leads", &[]),
            ObjectType::Deal => ("/v2/deals", &[]),
            ObjectType::Note => ("/v2/notes", &[]),
            ObjectType::Task => ("/v2/tasks", &[]),
            ObjectType::Call => ("/v2/calls", &[]),
        }
    }

    /// Destination object collection. Leads become contacts.
    pub fn destination_object(&self) -> &'static str {
        match self {
            ObjectType::Contact | ObjectType::Lead => "contacts",
            ObjectType::Company => "companies",
            ObjectType::Deal => "deals",
            ObjectType::Note => "notes",
            ObjectType::Task => "tasks",
            ObjectType::Call => "calls",
        }
    }

    /// Ledger holding the cached source records.
    pub fn data_key(&self) -> String {
        format!("{}_data", self.plural())
    }

    /// Ledger holding checkpoint entries.
    pub fn migrated_key(&self) -> String {
        format!("{}_migrated", self.plural())
    }

    /// Ledger holding records diverted for a missing core object.
    pub fn no_core_object_key(&self) -> String {
        format!("{}_without_core_object", self.plural())
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        ObjectType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized || t.plural() == normalized)
            .ok_or_else(|| MigrateError::Config(format!("Unknown object type: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_singular_and_plural() {
        assert_eq!("contact".parse::<ObjectType>().unwrap(), ObjectType::Contact);
        assert_eq!("Companies".parse::<ObjectType>().unwrap(), ObjectType::Company);
        assert!("tickets".parse::<ObjectType>().is_err());
    }

    #[test]
    fn test_ledger_keys() {
        assert_eq!(ObjectType::Note.data_key(), "notes_data");
        assert_eq!(ObjectType::Note.migrated_key(), "notes_migrated");
        assert_eq!(
            ObjectType::Note.no_core_object_key(),
            "notes_without_core_object"
        );
    }

    #[test]
    fn test_leads_land_in_contacts() {
        assert_eq!(ObjectType::Lead.destination_object(), "contacts");
    }
}
