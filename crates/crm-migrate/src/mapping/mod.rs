//! Field mapping and lookup tables.
//!
//! All tables are read once from the mappings directory into an immutable
//! [`MappingTables`] that every migrator shares. Missing files load as
//! empty tables so a deployment only has to provide what it uses.
//!
//! | file | table |
//! |------|-------|
//! | `contact.json`, `company.json`, `lead.json`, `deal.json` | field maps |
//! | `owners.json` | owner id -> destination owner id |
//! | `lead_source.json`, `lead_unqualified_reason.json` | lead labels |
//! | `deal_source.json`, `deal_unqualified_reason.json`, `deal_stage.json`, `deal_lost_reason.json` | deal labels |
//! | `call_outcomes.json` | call outcome -> disposition |
//! | `companies_ids.json`, `contacts_ids.json`, `deals_ids.json` | id correlation |
//! | `companies_names.json` | company name -> destination id |

mod tables;
pub mod transform;

pub use tables::{
    CodeTable, FieldMap, FieldTarget, IdMapping, IdMappingTable, NameMapping, NameMappingTable,
};
pub use transform::{map_properties, normalize_phone, normalize_tags, to_epoch_millis};

use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{MigrateError, Result};
use crate::object_type::ObjectType;
use crate::store::CheckpointEntry;

/// Every static table the migrators consult.
#[derive(Debug, Clone, Default)]
pub struct MappingTables {
    pub contact_fields: FieldMap,
    pub company_fields: FieldMap,
    pub lead_fields: FieldMap,
    pub deal_fields: FieldMap,

    pub owners: CodeTable,
    pub lead_sources: CodeTable,
    pub lead_unqualified_reasons: CodeTable,
    pub deal_sources: CodeTable,
    pub deal_unqualified_reasons: CodeTable,
    pub deal_stages: CodeTable,
    pub deal_lost_reasons: CodeTable,
    pub call_outcomes: CodeTable,

    pub company_ids: IdMappingTable,
    pub contact_ids: IdMappingTable,
    pub deal_ids: IdMappingTable,
    pub company_names: NameMappingTable,
}

impl MappingTables {
    /// Load every table from `dir`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let tables = Self {
            contact_fields: read_table(dir, "contact.json")?,
            company_fields: read_table(dir, "company.json")?,
            lead_fields: read_table(dir, "lead.json")?,
            deal_fields: read_table(dir, "deal.json")?,
            owners: read_table(dir, "owners.json")?,
            lead_sources: read_table(dir, "lead_source.json")?,
            lead_unqualified_reasons: read_table(dir, "lead_unqualified_reason.json")?,
            deal_sources: read_table(dir, "deal_source.json")?,
            deal_unqualified_reasons: read_table(dir, "deal_unqualified_reason.json")?,
            deal_stages: read_table(dir, "deal_stage.json")?,
            deal_lost_reasons: read_table(dir, "deal_lost_reason.json")?,
            call_outcomes: read_table(dir, "call_outcomes.json")?,
            company_ids: read_table(dir, "companies_ids.json")?,
            contact_ids: read_table(dir, "contacts_ids.json")?,
            deal_ids: read_table(dir, "deals_ids.json")?,
            company_names: read_table(dir, "companies_names.json")?,
        };

        info!(
            dir = %dir.display(),
            companies = tables.company_ids.len(),
            contacts = tables.contact_ids.len(),
            deals = tables.deal_ids.len(),
            "Loaded mapping tables"
        );
        Ok(tables)
    }

    /// Id-correlation table that records of `object_type` are found in when
    /// used as association targets. Leads become contacts, so they share the
    /// contact table.
    pub fn id_table(&self, object_type: ObjectType) -> Option<&IdMappingTable> {
        match object_type {
            ObjectType::Contact | ObjectType::Lead => Some(&self.contact_ids),
            ObjectType::Company => Some(&self.company_ids),
            ObjectType::Deal => Some(&self.deal_ids),
            _ => None,
        }
    }

    /// Append checkpoint entries of a core type to its id table, so records
    /// migrated by earlier runs can be association targets without a manual
    /// table refresh. Static entries keep precedence.
    pub fn absorb_checkpoints(&mut self, object_type: ObjectType, entries: &[CheckpointEntry]) {
        let table = match object_type {
            ObjectType::Contact | ObjectType::Lead => &mut self.contact_ids,
            ObjectType::Company => &mut self.company_ids,
            ObjectType::Deal => &mut self.deal_ids,
            _ => return,
        };
        table.extend(entries.iter().map(|e| IdMapping {
            source_id: e.source_id.clone(),
            destination_id: e.destination_id.clone(),
        }));
    }
}

fn read_table<T>(dir: &Path, file: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let path = dir.join(file);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Mapping table not found, using an empty one");
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&content)
        .map_err(|e| MigrateError::Config(format!("Invalid mapping table {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SourceId;
    use crate::store::CheckpointAction;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let tables = MappingTables::load(dir.path().join("absent")).unwrap();
        assert!(tables.contact_fields.is_empty());
        assert!(tables.company_ids.is_empty());
    }

    #[test]
    fn test_load_tables() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("deal.json"), r#"{"name": "dealname", "value": "amount"}"#)
            .unwrap();
        std::fs::write(dir.path().join("deal_stage.json"), r#"{"117603": "closedwon"}"#).unwrap();
        std::fs::write(
            dir.path().join("companies_ids.json"),
            r#"[{"zendeskID": "7", "hubID": "700"}]"#,
        )
        .unwrap();

        let tables = MappingTables::load(dir.path()).unwrap();
        assert_eq!(tables.deal_fields.len(), 2);
        assert!(tables.contact_fields.is_empty());
        assert!(tables.deal_stages.label(&SourceId::from(117603)).is_some());
        assert_eq!(
            tables.id_table(ObjectType::Company).unwrap().lookup(&SourceId::from(7)),
            Some("700")
        );
    }

    #[test]
    fn test_invalid_table_is_config_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("owners.json"), "[1, 2]").unwrap();
        assert!(matches!(
            MappingTables::load(dir.path()),
            Err(MigrateError::Config(_))
        ));
    }

    #[test]
    fn test_absorbed_checkpoints_do_not_override_static_entries() {
        let mut tables = MappingTables::default();
        tables.contact_ids.insert(SourceId::from(1), "static");
        tables.absorb_checkpoints(
            ObjectType::Lead,
            &[
                CheckpointEntry::new(SourceId::from(1), "ledger", CheckpointAction::Created),
                CheckpointEntry::new(SourceId::from(2), "fresh", CheckpointAction::Created),
            ],
        );
        let contacts = tables.id_table(ObjectType::Contact).unwrap();
        assert_eq!(contacts.lookup(&SourceId::from(1)), Some("static"));
        assert_eq!(contacts.lookup(&SourceId::from(2)), Some("fresh"));
    }
}
