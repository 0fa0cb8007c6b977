//! Relationships: direct edges and mapped-relationship specifications
//! (spec §3, Relationship).

use serde::{Deserialize, Serialize};

use crate::entity::EntityClass;
use crate::Properties;

/// Direction a mapped relationship is synthesized in, relative to the
/// entity the run owns (`sourceEntityKey`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RelationshipDirection {
    #[serde(rename = "FORWARD")]
    Forward,
    #[serde(rename = "REVERSE")]
    Reverse,
}

/// A specification for the remote service to synthesize 0..N edges against
/// entities matched by `targetFilterKeys`. The core treats the mapping as
/// opaque after construction (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipMapping {
    pub relationship_direction: RelationshipDirection,
    pub source_entity_key: String,
    pub target_entity: serde_json::Value,
    pub target_filter_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_target_creation: Option<bool>,
}

/// An edge between two entities both owned by this run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectRelationship {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub type_name: String,
    #[serde(rename = "_class")]
    pub class: EntityClass,
    #[serde(rename = "_fromEntityKey")]
    pub from_entity_key: String,
    #[serde(rename = "_toEntityKey")]
    pub to_entity_key: String,
    #[serde(flatten)]
    pub properties: Properties,
}

/// A mapped relationship: `_mapping` replaces the direct from/to keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappedRelationship {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub type_name: String,
    #[serde(rename = "_class")]
    pub class: EntityClass,
    #[serde(rename = "_mapping")]
    pub mapping: RelationshipMapping,
}

/// Either a direct edge or a mapped-relationship specification.
///
/// `#[serde(untagged)]` tries `Direct` first; a relationship carrying a
/// `_mapping` field instead of `_fromEntityKey`/`_toEntityKey` falls through
/// to `Mapped`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Relationship {
    Direct(DirectRelationship),
    Mapped(MappedRelationship),
}

impl Relationship {
    pub fn key(&self) -> &str {
        match self {
            Relationship::Direct(r) => &r.key,
            Relationship::Mapped(r) => &r.key,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Relationship::Direct(r) => &r.type_name,
            Relationship::Mapped(r) => &r.type_name,
        }
    }
}
