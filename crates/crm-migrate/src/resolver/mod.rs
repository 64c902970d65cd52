//! Existing-object and association resolution.

mod association;
mod existing;

pub use association::{
    association_type_id, resolve_association, AssociationSpec, AssociationTarget, AssociationType,
    HUBSPOT_DEFINED,
};
pub use existing::{
    hostname, resolve_from_checkpoints, ExistingObjectResolver, KeySource, ResolutionPass,
};
